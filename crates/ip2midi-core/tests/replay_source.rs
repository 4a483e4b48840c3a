mod common;

use std::fs;

use ip2midi_core::source::PcapFileSource;
use ip2midi_core::{FrameSource, SourceError};
use pcap_parser::Linktype;

use common::{TS_BASE, tcp_frame, udp_frame, write_pcap, write_pcapng};

fn collect(mut source: PcapFileSource) -> Vec<(i64, u32, Vec<u8>)> {
    let mut frames = Vec::new();
    while let Some(frame) = source.next_frame().unwrap() {
        assert_eq!(frame.linktype, Linktype::ETHERNET);
        assert_eq!(frame.meta.caplen as usize, frame.data.len());
        frames.push((frame.meta.ts_sec, frame.meta.ts_usec, frame.data.to_vec()));
    }
    frames
}

#[test]
fn replays_legacy_pcap_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.pcap");
    let frames = vec![
        udp_frame([192, 168, 0, 1], &[0x90, 0x3c, 0x40]),
        tcp_frame(),
        udp_frame([192, 168, 0, 1], &[0x80, 0x3c, 0x00]),
    ];
    write_pcap(&path, &frames);

    let replayed = collect(PcapFileSource::open(&path).unwrap());

    assert_eq!(replayed.len(), 3);
    for (i, (ts_sec, ts_usec, data)) in replayed.iter().enumerate() {
        assert_eq!(*ts_sec, i64::from(TS_BASE) + i as i64);
        assert_eq!(*ts_usec, 250_000);
        assert_eq!(data, &frames[i]);
    }
}

#[test]
fn replays_pcapng_without_block_padding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.pcapng");
    // 45-byte frame: the enhanced packet block pads it to 48 bytes.
    let frames = vec![
        udp_frame([192, 168, 0, 1], &[0x90, 0x3c, 0x40]),
        udp_frame([192, 168, 0, 1], &[0x90, 0x3c, 0x40, 0x01, 0x02, 0x03, 0x04]),
    ];
    write_pcapng(&path, &frames);

    let replayed = collect(PcapFileSource::open(&path).unwrap());

    assert_eq!(replayed.len(), 2);
    assert_eq!(replayed[0].2, frames[0]);
    assert_eq!(replayed[1].2, frames[1]);
    assert_eq!(replayed[1].0, i64::from(TS_BASE) + 1);
    assert_eq!(replayed[1].1, 250_000);
}

#[test]
fn rejects_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.pcapng");
    fs::write(&path, [0x0a, 0x0d, 0x0d]).unwrap();

    let err = match PcapFileSource::open(&path) {
        Ok(_) => panic!("expected truncated file to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, SourceError::Io(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = match PcapFileSource::open(&dir.path().join("missing.pcap")) {
        Ok(_) => panic!("expected missing file to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, SourceError::Io(_)));
}

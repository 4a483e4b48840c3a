use std::net::Ipv4Addr;

use etherparse::{EtherType, Ethernet2HeaderSlice, IpNumber, Ipv4HeaderSlice, UdpHeaderSlice};
use pcap_parser::Linktype;

use super::error::HeaderError;
use super::layout;
use super::reader::FrameReader;

/// Ethernet/IPv4/UDP headers of a captured frame.
///
/// Borrows the frame it was parsed from; the payload is a window into the
/// captured bytes, never a copy.
#[derive(Debug, Clone, Copy)]
pub struct UdpDatagram<'a> {
    pub src_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_addr: Ipv4Addr,
    pub dst_port: u16,
    /// IPv4 header length in bytes (IHL × 4).
    pub ip_header_len: usize,
    /// Offset of the UDP payload from the start of the frame.
    pub payload_offset: usize,
    /// UDP length field minus the UDP header; may be zero or negative for
    /// malformed datagrams.
    pub payload_len: i32,
    /// Payload bytes, `payload_len` long as far as the capture reaches.
    pub payload: &'a [u8],
}

/// Parse the UDP datagram carried by an Ethernet frame.
///
/// Returns `Ok(None)` when the frame is not UDP over IPv4 over Ethernet.
pub fn parse_udp_datagram(
    linktype: Linktype,
    data: &[u8],
) -> Result<Option<UdpDatagram<'_>>, HeaderError> {
    if linktype != Linktype::ETHERNET {
        return Ok(None);
    }

    let ethernet =
        Ethernet2HeaderSlice::from_slice(data).map_err(|e| HeaderError::Slice(e.to_string()))?;
    if ethernet.ether_type() != EtherType::IPV4 {
        return Ok(None);
    }

    let reader = FrameReader::new(data);
    let ipv4 = Ipv4HeaderSlice::from_slice(reader.read_from(layout::ETHERNET_HEADER_LEN)?)
        .map_err(|e| HeaderError::Slice(e.to_string()))?;
    if ipv4.protocol() != IpNumber::UDP {
        return Ok(None);
    }

    let ip_header_len = reader.ipv4_header_len()?;
    let transport_offset = layout::ETHERNET_HEADER_LEN + ip_header_len;
    let udp = UdpHeaderSlice::from_slice(reader.read_from(transport_offset)?)
        .map_err(|e| HeaderError::Slice(e.to_string()))?;

    let payload_offset = transport_offset + layout::UDP_HEADER_LEN;
    let payload_len = i32::from(udp.length()) - layout::UDP_HEADER_LEN as i32;

    Ok(Some(UdpDatagram {
        src_addr: ipv4.source_addr(),
        src_port: udp.source_port(),
        dst_addr: ipv4.destination_addr(),
        dst_port: udp.destination_port(),
        ip_header_len,
        payload_offset,
        payload_len,
        payload: reader.payload_window(payload_offset, payload_len),
    }))
}

#[cfg(test)]
mod tests {
    use super::parse_udp_datagram;
    use crate::headers::error::HeaderError;
    use crate::headers::layout;
    use etherparse::PacketBuilder;
    use pcap_parser::Linktype;
    use std::net::Ipv4Addr;

    fn udp_frame(payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 101], [192, 168, 0, 2], 64)
            .udp(5000, 9000);
        let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
        builder.write(&mut packet, payload).unwrap();
        packet
    }

    /// Rewrite a 20-byte IPv4 header into one carrying `words` option words.
    fn with_ip_options(mut packet: Vec<u8>, words: u8) -> Vec<u8> {
        let ip = layout::ETHERNET_HEADER_LEN;
        let extra = usize::from(words) * 4;
        packet[ip] = 0x40 | (5 + words);
        let total = u16::from_be_bytes([packet[ip + 2], packet[ip + 3]]) + extra as u16;
        packet[ip + 2..ip + 4].copy_from_slice(&total.to_be_bytes());
        let options = vec![0x01u8; extra];
        let at = ip + layout::IPV4_MIN_HEADER_LEN;
        packet.splice(at..at, options);
        packet
    }

    #[test]
    fn parse_udp_ok() {
        let frame = udp_frame(&[0x90, 0x3c, 0x40]);
        let parsed = parse_udp_datagram(Linktype::ETHERNET, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.src_addr, Ipv4Addr::new(192, 168, 0, 101));
        assert_eq!(parsed.dst_addr, Ipv4Addr::new(192, 168, 0, 2));
        assert_eq!(parsed.src_port, 5000);
        assert_eq!(parsed.dst_port, 9000);
        assert_eq!(parsed.ip_header_len, 20);
        assert_eq!(parsed.payload_offset, 42);
        assert_eq!(parsed.payload_len, 3);
        assert_eq!(parsed.payload, &[0x90, 0x3c, 0x40]);
    }

    #[test]
    fn transport_header_follows_ip_options() {
        for words in 1u8..=10 {
            let frame = with_ip_options(udp_frame(&[1, 2, 3, 4]), words);
            let parsed = parse_udp_datagram(Linktype::ETHERNET, &frame)
                .unwrap()
                .unwrap();
            let ihl = 5 + usize::from(words);
            assert_eq!(parsed.ip_header_len, ihl * 4);
            assert_eq!(
                parsed.payload_offset,
                layout::ETHERNET_HEADER_LEN + ihl * 4 + layout::UDP_HEADER_LEN
            );
            assert_eq!(parsed.dst_port, 9000);
            assert_eq!(parsed.payload, &[1, 2, 3, 4]);
        }
    }

    #[test]
    fn parse_non_udp() {
        let builder = PacketBuilder::ethernet2([1, 1, 1, 1, 1, 1], [2, 2, 2, 2, 2, 2])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(1000, 9000, 0, 0);
        let payload = [0x90u8, 0x3c, 0x40];
        let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
        builder.write(&mut packet, &payload).unwrap();

        let parsed = parse_udp_datagram(Linktype::ETHERNET, &packet).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn parse_ipv6_is_ignored() {
        let builder = PacketBuilder::ethernet2([1, 1, 1, 1, 1, 1], [2, 2, 2, 2, 2, 2])
            .ipv6([1; 16], [2; 16], 64)
            .udp(5000, 9000);
        let payload = [1u8, 2, 3];
        let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
        builder.write(&mut packet, &payload).unwrap();

        assert!(parse_udp_datagram(Linktype::ETHERNET, &packet).unwrap().is_none());
    }

    #[test]
    fn parse_non_ethernet_linktype_is_ignored() {
        let frame = udp_frame(&[1, 2, 3]);
        assert!(parse_udp_datagram(Linktype::RAW, &frame).unwrap().is_none());
    }

    #[test]
    fn zero_length_payload() {
        let frame = udp_frame(&[]);
        let parsed = parse_udp_datagram(Linktype::ETHERNET, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.payload_len, 0);
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn udp_length_below_header_is_negative() {
        let mut frame = udp_frame(&[1, 2, 3]);
        let len_at = layout::ETHERNET_HEADER_LEN + layout::IPV4_MIN_HEADER_LEN + 4;
        frame[len_at..len_at + 2].copy_from_slice(&4u16.to_be_bytes());
        let parsed = parse_udp_datagram(Linktype::ETHERNET, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.payload_len, -4);
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn payload_is_capped_by_udp_length() {
        let mut frame = udp_frame(&[1, 2, 3, 4, 5]);
        // Ethernet trailer bytes beyond the datagram must not leak into the payload.
        frame.extend_from_slice(&[0xee; 6]);
        let parsed = parse_udp_datagram(Linktype::ETHERNET, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.payload, &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn truncated_capture_clamps_payload() {
        let mut frame = udp_frame(&[1, 2, 3, 4, 5]);
        frame.truncate(frame.len() - 2);
        let parsed = parse_udp_datagram(Linktype::ETHERNET, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.payload_len, 5);
        assert_eq!(parsed.payload, &[1, 2, 3]);
    }

    #[test]
    fn parse_slice_error() {
        let data = [];
        let result = parse_udp_datagram(Linktype::ETHERNET, &data);
        assert!(matches!(result, Err(HeaderError::Slice(_))));
    }

    #[test]
    fn truncated_udp_header_is_an_error() {
        let frame = udp_frame(&[]);
        let cut = &frame[..layout::ETHERNET_HEADER_LEN + layout::IPV4_MIN_HEADER_LEN + 4];
        assert!(parse_udp_datagram(Linktype::ETHERNET, cut).is_err());
    }
}

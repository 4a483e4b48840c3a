use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use glob::glob;
use ip2midi_core::{
    ChannelListener, ChannelReceiver, Config, Controller, PayloadMode, SetupError, SourceError,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("IP2MIDI_BUILD_COMMIT"),
    ", ",
    env!("IP2MIDI_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "ip2midi")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Capture UDP datagrams and publish their payloads as MIDI events.",
    long_about = None,
    after_help = "Examples:\n  ip2midi capture --interface en0\n  ip2midi capture /tmp/ip2midi.sock --replay session.pcapng\n  ip2midi listen /tmp/ip2midi.sock --count 10"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the capture helper. Without CHANNEL it runs standalone until
    /// interrupted.
    #[command(
        after_help = "Examples:\n  ip2midi capture --interface en0 --filter 'udp port 9000'\n  ip2midi capture /tmp/ip2midi.sock --replay session.pcap\n  ip2midi capture --payload-mode hex-string --source-address 192.168.0.101"
    )]
    Capture(CaptureArgs),
    /// Accept one helper connection on SOCKET and print each forwarded
    /// message as a JSON line.
    Listen(ListenArgs),
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Parent channel (Unix socket path); selects attached mode
    channel: Option<String>,

    /// Network interface to capture on
    #[arg(short, long)]
    interface: Option<String>,

    /// Capture filter expression
    #[arg(short, long)]
    filter: Option<String>,

    /// Replay a .pcap or .pcapng file instead of capturing live
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// How payloads become events: raw-bytes or hex-string
    #[arg(long)]
    payload_mode: Option<PayloadMode>,

    /// Only translate frames sent from this IPv4 address
    #[arg(long)]
    source_address: Option<Ipv4Addr>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Socket path to bind
    socket: PathBuf,

    /// Exit after this many messages
    #[arg(short = 'n', long)]
    count: Option<u64>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            };
        }
    };
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Capture(args) => cmd_capture(args),
        Commands::Listen(args) => cmd_listen(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

impl From<SetupError> for CliError {
    fn from(err: SetupError) -> Self {
        let hint = match &err {
            SetupError::Channel(_) => Some(
                "start the parent first, e.g. `ip2midi listen <SOCKET>`, and pass the same path"
                    .to_string(),
            ),
            SetupError::Source(SourceError::LiveCaptureUnavailable) => Some(
                "rebuild with `--features live-capture` or pass --replay FILE".to_string(),
            ),
            SetupError::Source(SourceError::Open { .. }) => {
                Some("check the interface name and capture permissions".to_string())
            }
            SetupError::Source(SourceError::Filter { .. }) => {
                Some("check the capture filter syntax".to_string())
            }
            SetupError::Source(_) => Some("use a readable .pcap or .pcapng file".to_string()),
            SetupError::Output(_) => Some("check that the MIDI subsystem is available".to_string()),
            SetupError::Config(_) => Some("fix the configuration file".to_string()),
            SetupError::Signal(_) | SetupError::Spawn(_) => None,
        };
        CliError::new(err.to_string(), hint)
    }
}

fn cmd_capture(args: CaptureArgs) -> Result<(), CliError> {
    let mut config = match args.config.as_deref() {
        Some(path) => Config::load(path).map_err(|err| {
            CliError::new(
                err.to_string(),
                Some("see `ip2midi capture --help` for the available settings".to_string()),
            )
        })?,
        None => Config::default(),
    };

    if let Some(interface) = args.interface {
        config.capture.interface = interface;
    }
    if let Some(filter) = args.filter {
        config.capture.filter = filter;
    }
    if let Some(replay) = args.replay {
        config.capture.replay = Some(replay);
    }
    if let Some(mode) = args.payload_mode {
        config.translate.payload_mode = mode;
    }
    if let Some(addr) = args.source_address {
        config.translate.source_address = Some(addr);
    }
    if let Some(replay) = config.capture.replay.take() {
        let resolved = resolve_input_path(&replay)?;
        validate_input_file(&resolved)?;
        config.capture.replay = Some(resolved);
    }

    let summary = Controller::new(config).run(args.channel.as_deref())?;
    if !summary.is_clean() {
        return Err(CliError::new(
            "capture source failed after startup",
            Some("rerun with -v for details".to_string()),
        ));
    }
    Ok(())
}

/// One forwarded message as printed by `listen`.
#[derive(Debug, Serialize)]
struct ListenRecord<'a> {
    id: u32,
    timestamp: Option<String>,
    ts_sec: i64,
    ts_usec: u32,
    caplen: u32,
    orig_len: u32,
    provenance: &'a str,
    frame: String,
}

fn cmd_listen(args: ListenArgs) -> Result<(), CliError> {
    let listener = ChannelListener::bind(&args.socket).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("remove a stale socket file or choose another path".to_string()),
        )
    })?;
    tracing::info!(socket = %listener.path().display(), "waiting for helper");
    let receiver = listener
        .accept()
        .context("Failed to accept helper connection")?;
    tracing::info!("helper connected");

    let received = print_messages(receiver, args.count)?;
    tracing::info!(received, "listen finished");
    Ok(())
}

fn print_messages(mut receiver: ChannelReceiver, count: Option<u64>) -> Result<u64> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut received = 0u64;

    while count.is_none_or(|limit| received < limit) {
        let Some(envelope) = receiver.recv().context("Failed to read from helper")? else {
            tracing::info!("helper disconnected");
            break;
        };
        let message = envelope
            .message()
            .with_context(|| format!("Malformed message {}", envelope.id))?;
        let record = ListenRecord {
            id: envelope.id,
            timestamp: message.meta.timestamp_rfc3339(),
            ts_sec: message.meta.ts_sec,
            ts_usec: message.meta.ts_usec,
            caplen: message.meta.caplen,
            orig_len: message.meta.orig_len,
            provenance: message.provenance,
            frame: to_hex(message.frame),
        };
        let line = serde_json::to_string(&record).context("JSON serialization failed")?;
        writeln!(out, "{line}").context("Failed to write to stdout")?;
        out.flush().context("Failed to write to stdout")?;
        received += 1;
    }

    receiver.close();
    Ok(received)
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("replay file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("replay input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported replay format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid replay pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid replay pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        n => {
            let listed = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let more = if n > 3 { ", ..." } else { "" };
            Err(CliError::new(
                format!(
                    "multiple files match pattern '{}' ({} matches); matches: {}{}",
                    pattern, n, listed, more
                ),
                Some("pass a single capture file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}

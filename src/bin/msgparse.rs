use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use msgparse_core::{FetchMode, MessageParser, ParserConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Extract mentions, emoticons and link titles from a chat message.
#[derive(Debug, Parser)]
#[command(name = "msgparse", version)]
struct Cli {
    /// Message to parse; read from stdin when omitted
    message: Option<String>,

    /// Config file (defaults to <config dir>/msgparse/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-fetch timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Fetch link titles one at a time
    #[arg(long)]
    sequential: bool,

    /// Do not fetch link titles
    #[arg(long)]
    offline: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "msgparse_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> msgparse_core::Result<Option<String>> {
    let mut config = match &cli.config {
        Some(path) => ParserConfig::load(path)?,
        None => ParserConfig::load_or_default(),
    };
    if let Some(timeout) = cli.timeout {
        config.fetch_timeout_secs = timeout;
    }
    if cli.sequential {
        config.fetch_mode = FetchMode::Sequential;
    }

    let message = match cli.message {
        Some(message) => message,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let parser = if cli.offline {
        MessageParser::offline(config)
    } else {
        MessageParser::new(config)?
    };
    debug!(config = ?parser.config(), offline = cli.offline, "parser ready");

    Ok(parser.parse_sync(&message))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(Some(json)) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

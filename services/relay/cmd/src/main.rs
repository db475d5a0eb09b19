//! UDP fetch relay binary.
//!
//! `relay serve` runs the relay server: every request datagram is fetched over
//! HTTP and streamed back to the client as frames until the client ACKs.
//! `relay get` sends one request and prints the reassembled reply.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use relay_session::{
    resolve, HttpFetcher, ReceiveConfig, RelayClient, RelayServer, SessionConfig, TransferResult,
};
use relay_wire::{Fragmenter, Request, MAX_FRAGMENT_SIZE};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::RelayConfig;
use logging::RelayLogFormatter;

/// Fetch web resources through a UDP relay
#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Fetch web resources through a UDP relay")]
struct Args {
    /// Configuration file path (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server
    Serve {
        /// Listen address, e.g. 0.0.0.0:11111
        #[arg(long)]
        listen: Option<String>,

        /// Resend cycles before a transfer is abandoned
        #[arg(long)]
        max_retries: Option<u32>,

        /// Maximum payload bytes per frame
        #[arg(long)]
        max_fragment_size: Option<usize>,

        /// Time allowed for one fetch, e.g. 30s
        #[arg(long)]
        fetch_timeout: Option<humantime::Duration>,
    },

    /// Fetch one resource through a relay server
    Get {
        /// Resource URL; prompted for on stdin when omitted
        url: Option<String>,

        /// ACK timeout in whole seconds the server waits between resends;
        /// prompted for on stdin when the URL is prompted for
        #[arg(long)]
        ack_timeout: Option<u64>,

        /// Relay server address, e.g. localhost:11111
        #[arg(long)]
        server: Option<String>,

        /// Silence allowed between two datagrams, e.g. 5s
        #[arg(long)]
        idle_timeout: Option<humantime::Duration>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;

    let config = RelayConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Serve {
            listen,
            max_retries,
            max_fragment_size,
            fetch_timeout,
        } => {
            let mut settings = config.server;
            if let Some(listen) = listen {
                settings.listen = listen;
            }
            if let Some(retries) = max_retries {
                settings.max_retries = retries;
            }
            if let Some(size) = max_fragment_size {
                settings.max_fragment_size = size;
            }
            if let Some(timeout) = fetch_timeout {
                settings.fetch_timeout = timeout.into();
            }

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to build server runtime")?;
            runtime.block_on(serve(settings))?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Get {
            url,
            ack_timeout,
            server,
            idle_timeout,
        } => {
            let mut settings = config.client;
            if let Some(server) = server {
                settings.server = server;
            }
            if let Some(timeout) = idle_timeout {
                settings.idle_timeout = timeout.into();
            }

            let (url, ack_timeout_secs) = match url {
                Some(url) => (url, ack_timeout.unwrap_or(settings.ack_timeout.as_secs())),
                None => prompt_request()?,
            };
            let request = Request::new(url, ack_timeout_secs)?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to build client runtime")?;
            let result = runtime.block_on(get(&settings.server, settings.idle_timeout, &request))?;
            print_result(result)
        }
    }
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::new("info")
        .add_directive(format!("relay={}", log_level).parse()?)
        .add_directive(format!("relay_session={}", log_level).parse()?)
        .add_directive(format!("relay_wire={}", log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(RelayLogFormatter::new("relay"))
        .init();

    Ok(())
}

async fn serve(settings: config::ServerSettings) -> anyhow::Result<()> {
    info!(
        component = "server",
        "Starting UDP relay server v{}",
        env!("CARGO_PKG_VERSION")
    );

    Fragmenter::new(settings.max_fragment_size).with_context(|| {
        format!(
            "max_fragment_size must be between 1 and {}",
            MAX_FRAGMENT_SIZE
        )
    })?;

    let listen = resolve(settings.listen.as_str())
        .await
        .with_context(|| format!("cannot resolve listen address {}", settings.listen))?;

    let fetcher = Arc::new(HttpFetcher::new(settings.fetch_timeout)?);
    let session_config = SessionConfig {
        max_fragment_size: settings.max_fragment_size,
        max_retries: settings.max_retries,
    };

    let server = RelayServer::bind(listen, session_config, fetcher)
        .await
        .with_context(|| format!("cannot bind {}", listen))?;

    tokio::select! {
        result = server.run() => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!(component = "server", "Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}

async fn get(
    server: &str,
    idle_timeout: Duration,
    request: &Request,
) -> anyhow::Result<TransferResult> {
    let server_addr = resolve(server)
        .await
        .with_context(|| format!("cannot resolve relay server {}", server))?;

    let client = RelayClient::new(server_addr, ReceiveConfig { idle_timeout });
    let result = client
        .fetch(request)
        .await
        .with_context(|| format!("transfer from {} failed", server_addr))?;
    Ok(result)
}

/// Ask for the URL and ACK timeout on stdin
fn prompt_request() -> anyhow::Result<(String, u64)> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let url = prompt(&mut lines, "Enter web server URL:")?;
    let timer = prompt(&mut lines, "Enter timer value in seconds:")?;
    let ack_timeout_secs = timer
        .parse::<u64>()
        .with_context(|| format!("invalid timer value {:?}", timer))?;

    Ok((url, ack_timeout_secs))
}

fn prompt<I>(lines: &mut I, question: &str) -> anyhow::Result<String>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    eprintln!("{}", question);
    match lines.next() {
        Some(line) => Ok(line?.trim().to_string()),
        None => bail!("stdin closed before {:?} was answered", question),
    }
}

fn print_result(result: TransferResult) -> anyhow::Result<ExitCode> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match result {
        TransferResult::Ok(payload) => {
            eprintln!("All packets received");
            writeln!(out, "OK")?;
            out.write_all(&payload)?;
            out.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        TransferResult::Fail { received, expected } => {
            warn!(
                component = "client",
                "Transfer incomplete: received={} expected={:?}",
                received,
                expected
            );
            writeln!(out, "FAIL")?;
            out.flush()?;
            Ok(ExitCode::FAILURE)
        }
    }
}

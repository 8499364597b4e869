//! QuillDesk host process
//!
//! Reads [`DeskCommand`]s from stdin, one JSON object per line, and writes
//! responses and [`DeskEvent`]s to stdout the same way. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use quilldesk_host::config::Config;
use quilldesk_host::content::DirectoryProvider;
use quilldesk_host::persistence::{Debouncer, FileLayoutStore};
use quilldesk_host::{Flow, HostEvent, Session};
use quilldesk_ipc::{decode_command, encode_line, DeskCommand, DeskEvent, DeskResponse, ProtocolError, MAX_MESSAGE_SIZE};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "quilldesk-host")]
#[command(author, version, about = "Canvas window manager host for QuillDesk", long_about = None)]
struct Args {
    /// Novel whose layout and content to load.
    #[arg(long)]
    novel: String,

    /// Configuration file (defaults to the standard locations).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for saved layouts.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory holding novel content.
    #[arg(long)]
    content_root: Option<PathBuf>,
}

/// Serialize a message, falling back to a fixed error line.
fn to_line<T: serde::Serialize>(message: &T) -> String {
    match encode_line(message) {
        Ok(line) => line,
        Err(e) => {
            warn!("Failed to serialize message: {}", e);
            "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n".to_string()
        }
    }
}

/// Skip what is left of an oversized line.
async fn discard_rest_of_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}

/// Forward stdin commands to the event loop and their responses to stdout.
async fn run_stdin_reader(event_tx: mpsc::Sender<HostEvent>, line_tx: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();

    loop {
        line.clear();
        let read = (&mut reader).take(MAX_MESSAGE_SIZE as u64 + 1).read_line(&mut line).await;
        match read {
            Ok(0) => {
                info!("stdin closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }

        let cmd = match decode_command(&line) {
            Ok(cmd) => cmd,
            Err(ProtocolError::Empty) => continue,
            Err(e) => {
                if matches!(e, ProtocolError::TooLarge(_)) && !line.ends_with('\n') {
                    if let Err(e) = discard_rest_of_line(&mut reader).await {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
                let _ = line_tx.send(to_line(&DeskResponse::error(format!("Invalid command: {}", e))));
                continue;
            }
        };

        let is_stop = matches!(cmd, DeskCommand::Stop);
        let (resp_tx, resp_rx) = oneshot::channel();
        if event_tx
            .send(HostEvent::Command {
                cmd,
                responder: resp_tx,
            })
            .await
            .is_err()
        {
            let _ = line_tx.send(to_line(&DeskResponse::error("Host is shutting down")));
            return;
        }

        let response = match resp_rx.await {
            Ok(resp) => resp,
            Err(_) => DeskResponse::error("Failed to get response from host"),
        };
        let _ = line_tx.send(to_line(&response));
        if is_stop {
            return;
        }
    }

    let _ = event_tx.send(HostEvent::Shutdown).await;
}

/// Single writer for stdout so responses and events never interleave mid-line.
async fn run_stdout_writer(
    mut line_rx: mpsc::UnboundedReceiver<String>,
    mut event_rx: mpsc::UnboundedReceiver<DeskEvent>,
) {
    let mut stdout = tokio::io::stdout();
    loop {
        let line = tokio::select! {
            Some(line) = line_rx.recv() => line,
            Some(event) = event_rx.recv() => to_line(&event),
            else => break,
        };
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            error!("Failed to write stdout: {}", e);
            break;
        }
        if let Err(e) = stdout.flush().await {
            error!("Failed to flush stdout: {}", e);
            break;
        }
    }
}

fn log_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (needed for log level)
    let loaded = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        // Can't use tracing yet
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&config.behavior.log_level))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;

    for w in config.validate() {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("QuillDesk host starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Some(root) = &args.content_root {
        config.behavior.content_root = root.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.persistence.data_dir = Some(dir.clone());
    }
    let data_dir = config
        .persistence
        .data_dir
        .clone()
        .unwrap_or_else(FileLayoutStore::default_dir);
    info!(
        "Novel '{}': content from {}, layouts in {}",
        args.novel,
        config.behavior.content_root.display(),
        data_dir.display()
    );

    let (event_tx, mut event_rx) = mpsc::channel::<HostEvent>(100);
    let (out_tx, out_rx) = mpsc::unbounded_channel::<DeskEvent>();
    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();

    let provider = Arc::new(DirectoryProvider::new(
        config.behavior.content_root.clone(),
        args.novel.clone(),
    ));
    let store = Box::new(FileLayoutStore::new(data_dir));
    let mut debouncer = Debouncer::new(Duration::from_millis(config.persistence.debounce_ms));

    let mut session = Session::new(&args.novel, config, provider, store, event_tx.clone(), out_tx)
        .context("Invalid canvas settings")?;
    if let Some(path) = args.config {
        session = session.with_config_path(path);
    }

    let writer = tokio::spawn(run_stdout_writer(line_rx, out_rx));
    tokio::spawn(run_stdin_reader(event_tx.clone(), line_tx));

    {
        let shutdown_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                let _ = shutdown_tx.send(HostEvent::Shutdown).await;
            }
        });
    }
    drop(event_tx);

    session.begin_restore();
    info!("Ready.");

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let flow = session.handle_event(event);
                if session.take_changes() {
                    debouncer.set_delay(Duration::from_millis(session.config().persistence.debounce_ms));
                    debouncer.request(Instant::now());
                }
                if flow == Flow::Stop {
                    break;
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if debouncer.poll(Instant::now()) {
                    debug!("Debounced layout save");
                    if let Err(e) = session.save() {
                        warn!("Failed to save layout: {}", e);
                    }
                }
            }
        }
    }

    // Flush any pending layout change before exiting
    debouncer.cancel();
    if session.needs_save() {
        match session.save() {
            Ok(()) => info!("Layout saved"),
            Err(e) => warn!("Failed to save layout on shutdown: {}", e),
        }
    }

    drop(session);
    if tokio::time::timeout(Duration::from_secs(1), writer).await.is_err() {
        debug!("Writer did not finish in time");
    }

    info!("QuillDesk host stopped");
    Ok(())
}

use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{Level, debug};

mod client;
mod render;
mod session;
mod transcript;

use client::{ClientError, RelayClient};
use render::{StreamView, print_transcript};
use session::{Conversation, TurnState, TurnUpdate};

const UPDATE_BUFFER: usize = 64;
const HISTORY_COMMAND: &str = "/history";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("answer request failed")]
    TurnFailed,
}

#[derive(Parser, Debug)]
#[command(name = "answer-cli", about = "Streaming chat client for the answer relay")]
struct Cli {
    #[arg(long, env = "ANSWER_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Log debug output to stderr.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat; type `/history` to print the conversation.
    Chat,
    /// Ask a single question and print the streamed answer.
    Ask { query: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let client = Arc::new(RelayClient::new(&cli.base_url)?);
    debug!(endpoint = client.endpoint(), "relay client ready");

    match cli.command {
        Command::Chat => run_chat(client).await,
        Command::Ask { query } => run_ask(client, &query).await,
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

// =============================================================================
// ASK
// =============================================================================

async fn run_ask(client: Arc<RelayClient>, query: &str) -> Result<(), CliError> {
    let mut conversation = Conversation::new();
    let request = conversation.submit(query).ok_or(CliError::EmptyQuery)?;
    let (tx, mut rx) = mpsc::channel(UPDATE_BUFFER);
    tokio::spawn(async move { client.stream_turn(request, tx).await });

    let mut view = StreamView::new(io::stdout());
    view.update(&conversation)?;
    while let Some(update) = rx.recv().await {
        if conversation.apply(update) {
            view.update(&conversation)?;
        }
        if conversation.state().is_terminal() {
            break;
        }
    }

    match conversation.state() {
        TurnState::Complete => Ok(()),
        _ => Err(CliError::TurnFailed),
    }
}

// =============================================================================
// CHAT
// =============================================================================

async fn run_chat(client: Arc<RelayClient>) -> Result<(), CliError> {
    let mut conversation = Conversation::new();
    let mut view = StreamView::new(io::stdout());
    let (tx, mut rx) = mpsc::channel::<TurnUpdate>(UPDATE_BUFFER);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        if !stdin_open && !conversation.state().is_in_flight() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim() == HISTORY_COMMAND => {
                    let mut out = io::stdout();
                    print_transcript(&mut out, conversation.transcript())?;
                }
                Some(line) => {
                    if let Some(request) = conversation.submit(&line) {
                        debug!(turn = ?conversation.current_turn(), "turn started");
                        view.update(&conversation)?;
                        let client = Arc::clone(&client);
                        let tx = tx.clone();
                        tokio::spawn(async move { client.stream_turn(request, tx).await });
                    }
                }
                None => stdin_open = false,
            },
            Some(update) = rx.recv() => {
                if conversation.apply(update) {
                    view.update(&conversation)?;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                if !conversation.cancel() {
                    break;
                }
                view.update(&conversation)?;
            }
        }
    }

    io::stdout().flush()?;
    Ok(())
}

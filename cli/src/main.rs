use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use keyside::state::chat::{ChatSessionState, DeliveryState};
use keyside::util::storage::FileStore;
use keyside::{ClientError, KeysideClient, Store};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `keyside-cli login` first")]
    NotLoggedIn,
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Parser, Debug)]
#[command(name = "keyside-cli", about = "Keyside chat client CLI")]
struct Cli {
    #[arg(long, env = "KEYSIDE_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Override the local state directory (defaults to the platform data dir).
    #[arg(long, env = "KEYSIDE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate and persist the session for later commands.
    Login {
        email: String,
        #[arg(long, env = "KEYSIDE_PASSWORD")]
        password: String,
    },
    /// Clear the persisted session and cached rooms.
    Logout,
    /// Refresh and print the room directory, most urgent first.
    Rooms,
    /// Attach to one room: print history and live messages, send stdin lines.
    Watch { chat_room_id: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let store = match &cli.data_dir {
        Some(dir) => FileStore::open(dir)?,
        None => FileStore::open_default()?,
    };
    let client = KeysideClient::new(&cli.base_url, Arc::new(store))?;

    match cli.command {
        Command::Login { email, password } => run_login(&client, &email, &password).await,
        Command::Logout => {
            client.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Rooms => run_rooms(&client).await,
        Command::Watch { chat_room_id } => run_watch(&client, &chat_room_id).await,
    }
}

async fn run_login(client: &KeysideClient, email: &str, password: &str) -> Result<(), CliError> {
    let session = client.login(email, password).await?;
    println!("logged in as {} ({})", session.username, session.user_id);
    println!("{} room(s) available", client.rooms().len());
    Ok(())
}

async fn run_rooms(client: &KeysideClient) -> Result<(), CliError> {
    if client.restore().await.is_none() {
        return Err(CliError::NotLoggedIn);
    }
    let directory = client.directory();
    let fresh = directory.read(|dir| dir.last_refresh_ok);
    if !fresh {
        eprintln!("(offline: showing the last cached directory)");
    }

    let rooms = client.rooms();
    if rooms.is_empty() {
        println!("no chat rooms");
        return Ok(());
    }
    for room in &rooms {
        let title = directory.read(|dir| {
            room.property_id
                .as_deref()
                .and_then(|id| dir.property_title(id).map(ToOwned::to_owned))
        });
        let preview = room
            .last_message
            .as_ref()
            .map_or_else(String::new, |last| last.content.clone());
        println!(
            "{:>3}  {}  {}  {}",
            room.unread_count,
            room.id,
            title.unwrap_or_else(|| "(no listing)".to_owned()),
            preview
        );
    }
    Ok(())
}

async fn run_watch(client: &KeysideClient, chat_room_id: &str) -> Result<(), CliError> {
    let Some(session) = client.restore().await else {
        return Err(CliError::NotLoggedIn);
    };

    let live = client.open_room(chat_room_id).await?;
    let state = live.state();
    let mut revisions = state.subscribe();

    let mut printed = HashSet::new();
    print_new_messages(&state, &mut printed, &session.user_id);
    eprintln!("(watching {chat_room_id}; type a line to send, ctrl-d to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut peer_typing = false;
    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                print_new_messages(&state, &mut printed, &session.user_id);
                let typing = state.read(|chat| chat.peer_typing);
                if typing != peer_typing {
                    peer_typing = typing;
                    if typing {
                        eprintln!("(peer is typing...)");
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                live.input_changed(text);
                if let Err(error) = live.send_message(text) {
                    eprintln!("send failed: {error}");
                }
            }
        }
    }

    live.close();
    Ok(())
}

/// Print messages not yet seen by this terminal, oldest first. The store
/// keeps them newest first, so walk the snapshot in reverse.
fn print_new_messages(
    state: &Arc<Store<ChatSessionState>>,
    printed: &mut HashSet<String>,
    self_user_id: &str,
) {
    let messages = state.read(|chat| chat.messages.clone());
    for message in messages.iter().rev() {
        if !printed.insert(message.id.clone()) {
            continue;
        }
        let who = if message.sender_id == self_user_id {
            "you"
        } else {
            message.sender_id.as_str()
        };
        let marker = match message.delivery {
            DeliveryState::Pending => " (sending)",
            DeliveryState::Failed => " (failed)",
            DeliveryState::Sent => "",
        };
        println!(
            "[{}] {}: {}{}",
            message.timestamp.format("%H:%M:%S"),
            who,
            message.content,
            marker
        );
    }
}

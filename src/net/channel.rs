//! Live chat channel: websocket lifecycle for one open conversation.
//!
//! The channel task owns the socket. It connects with a handshake timeout,
//! registers the user and joins the room before reporting `Joined`, then
//! pumps outbound events from an mpsc queue and inbound events into the
//! state stores. Server-initiated drops trigger fixed-delay reconnects; a
//! foreground nudge restarts a connection that has given up.
//!
//! ERROR HANDLING
//! ==============
//! Transport and decode failures never escape the task; they are logged and
//! folded into the connection status so the session can recover through the
//! reconnect loop.

#[path = "channel_dispatch.rs"]
mod channel_dispatch;

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use events::{ClientEvent, ServerEvent, decode_event, encode_event};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use self::channel_dispatch::{handle_directory_event, handle_message_event, handle_typing_event};
use crate::error::ClientError;
use crate::state::chat::{ChatMessage, ChatSessionState, ConnectionStatus, DeliveryState};
use crate::state::directory::DirectoryState;
use crate::state::{Store, lock};
use crate::util::storage::{KeyValueStore, keys, save_json};

/// Handshake timeout per connection attempt.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Fixed delay between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Automatic reconnect attempts before waiting for a foreground nudge.
const RECONNECT_ATTEMPTS: u32 = 5;
/// How long a local optimistic echo survives after a successful emission
/// before the server copy is assumed to have arrived on the receive path.
const PENDING_ECHO_GRACE: Duration = Duration::from_millis(500);
/// Composing inactivity window before `typing_stop` is emitted.
const TYPING_STOP_DELAY: Duration = Duration::from_millis(1000);

/// Derive the channel endpoint from the REST base URL.
pub(crate) fn channel_url(base_url: &str) -> Result<String, ClientError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/ws/chat"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/ws/chat"));
    }
    Err(ClientError::Validation(format!("invalid base url: {base_url}")))
}

/// Connection parameters for one live session.
#[derive(Clone, Debug)]
pub(crate) struct ChannelConfig {
    pub url: String,
    pub user_id: String,
    pub chat_room_id: String,
}

/// Outbound queue item: the event plus the id of the optimistic echo it
/// settles, so a write failure can flip that echo to failed.
type Outbound = (ClientEvent, Option<String>);

/// Why a connection ended.
enum DropReason {
    /// The session is being torn down locally; do not reconnect.
    Teardown,
    /// The server closed the socket or the transport failed; reconnect.
    ServerInitiated,
}

/// One live conversation: owned channel task, shared chat state, and the
/// send/typing entry points the UI calls.
pub struct LiveChatSession {
    config: ChannelConfig,
    state: Arc<Store<ChatSessionState>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    conn_task: JoinHandle<()>,
    typing_stop: StdMutex<Option<JoinHandle<()>>>,
    foreground: Arc<Notify>,
}

impl LiveChatSession {
    /// Spawn the channel task for an already-hydrated session state.
    pub(crate) fn open(
        config: ChannelConfig,
        state: Arc<Store<ChatSessionState>>,
        directory: Arc<Store<DirectoryState>>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        let (outbound, rx) = mpsc::unbounded_channel();
        let foreground = Arc::new(Notify::new());
        let conn_task = tokio::spawn(channel_loop(
            config.clone(),
            state.clone(),
            directory,
            storage,
            rx,
            foreground.clone(),
        ));
        Self {
            config,
            state,
            outbound,
            conn_task,
            typing_stop: StdMutex::new(None),
            foreground,
        }
    }

    /// Shared handle to this conversation's state store.
    #[must_use]
    pub fn state(&self) -> Arc<Store<ChatSessionState>> {
        self.state.clone()
    }

    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.read(|chat| chat.connection_status)
    }

    #[must_use]
    pub fn peer_typing(&self) -> bool {
        self.state.read(|chat| chat.peer_typing)
    }

    /// Snapshot of the visible message list, newest first.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.read(|chat| chat.messages.clone())
    }

    /// Send a message with optimistic local echo.
    ///
    /// The echo is inserted at the head immediately under a temporary id.
    /// After a successful emission the echo is dropped once
    /// [`PENDING_ECHO_GRACE`] elapses; the authoritative copy arrives on the
    /// receive path under the server-assigned id.
    ///
    /// # Errors
    ///
    /// `Validation` for empty content. `ChannelNotConnected` when the channel
    /// is not joined or the emission fails; the echo is then marked failed
    /// and kept visible, never retried. A transport failure after the event
    /// is queued flips the echo to failed the same way, from the channel task.
    pub fn send_message(&self, content: &str) -> Result<String, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::Validation("empty message".to_owned()));
        }
        let temp_id = format!("tmp-{}", Uuid::new_v4());
        let echo = ChatMessage {
            id: temp_id.clone(),
            chat_room_id: self.config.chat_room_id.clone(),
            sender_id: self.config.user_id.clone(),
            content: content.to_owned(),
            timestamp: Utc::now(),
            delivery: DeliveryState::Pending,
        };

        let mut connected = false;
        self.state.update(|chat| {
            chat.insert_pending(echo);
            connected = chat.connection_status == ConnectionStatus::Joined;
            if !connected {
                chat.mark_failed(&temp_id);
            }
        });
        if !connected {
            return Err(ClientError::ChannelNotConnected);
        }

        let event = ClientEvent::SendMessage {
            chat_room_id: self.config.chat_room_id.clone(),
            sender_id: self.config.user_id.clone(),
            content: content.to_owned(),
        };
        if self.outbound.send((event, Some(temp_id.clone()))).is_err() {
            self.state.update(|chat| chat.mark_failed(&temp_id));
            return Err(ClientError::ChannelNotConnected);
        }

        let state = self.state.clone();
        let grace_id = temp_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(PENDING_ECHO_GRACE).await;
            state.update(|chat| chat.drop_if_pending(&grace_id));
        });
        Ok(temp_id)
    }

    /// Report a local input change. Non-empty input emits `typing_start` and
    /// re-arms the debounced `typing_stop`; each keystroke resets the timer.
    pub fn input_changed(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if self.connection_status() != ConnectionStatus::Joined {
            return;
        }
        let _ = self.outbound.send((
            ClientEvent::TypingStart {
                user_id: self.config.user_id.clone(),
                chat_room_id: self.config.chat_room_id.clone(),
            },
            None,
        ));

        let outbound = self.outbound.clone();
        let user_id = self.config.user_id.clone();
        let chat_room_id = self.config.chat_room_id.clone();
        let stop_task = tokio::spawn(async move {
            tokio::time::sleep(TYPING_STOP_DELAY).await;
            let _ = outbound.send((ClientEvent::TypingStop { user_id, chat_room_id }, None));
        });

        let mut guard = lock(&self.typing_stop);
        if let Some(previous) = guard.replace(stop_task) {
            previous.abort();
        }
    }

    /// Nudge the channel after the app returns to the foreground; reconnects
    /// immediately when the session is waiting between attempts or has run
    /// out of them. A nudge while connected wakes nothing and is not banked.
    pub fn notify_foreground(&self) {
        self.foreground.notify_waiters();
    }

    /// Tear the session down: abort the channel task and any armed timers.
    /// Terminal for this instance.
    pub fn close(&self) {
        self.conn_task.abort();
        if let Some(stop_task) = lock(&self.typing_stop).take() {
            stop_task.abort();
        }
        self.state
            .update(|chat| chat.connection_status = ConnectionStatus::Disconnected);
    }
}

impl Drop for LiveChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection loop: connect, run, reconnect on server-initiated drops.
async fn channel_loop(
    config: ChannelConfig,
    state: Arc<Store<ChatSessionState>>,
    directory: Arc<Store<DirectoryState>>,
    storage: Arc<dyn KeyValueStore>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    foreground: Arc<Notify>,
) {
    let mut attempts: u32 = 0;
    loop {
        state.update(|chat| chat.connection_status = ConnectionStatus::Connecting);

        match tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(&config.url)).await {
            Ok(Ok((socket, _response))) => {
                attempts = 0;
                let reason =
                    run_connection(socket, &config, &state, &directory, &storage, &mut rx).await;
                state.update(|chat| chat.connection_status = ConnectionStatus::Disconnected);
                fail_queued(&state, &mut rx);
                if matches!(reason, DropReason::Teardown) {
                    return;
                }
                tracing::debug!(room = %config.chat_room_id, "channel dropped by server; reconnecting");
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "channel connect failed");
                state.update(|chat| chat.connection_status = ConnectionStatus::Disconnected);
            }
            Err(_) => {
                tracing::warn!("channel handshake timed out");
                state.update(|chat| chat.connection_status = ConnectionStatus::Disconnected);
            }
        }

        attempts += 1;
        if attempts > RECONNECT_ATTEMPTS {
            // Out of automatic attempts; stay down until a foreground nudge.
            foreground.notified().await;
            attempts = 0;
            continue;
        }
        tokio::select! {
            () = tokio::time::sleep(RECONNECT_DELAY) => {}
            () = foreground.notified() => {}
        }
    }
}

/// Drive one established connection until it drops.
async fn run_connection(
    socket: WsStream,
    config: &ChannelConfig,
    state: &Arc<Store<ChatSessionState>>,
    directory: &Arc<Store<DirectoryState>>,
    storage: &Arc<dyn KeyValueStore>,
    rx: &mut mpsc::UnboundedReceiver<Outbound>,
) -> DropReason {
    let (mut write, mut read) = socket.split();

    // Register and join before reporting Joined so sends cannot race the
    // server-side room subscription.
    let register = ClientEvent::RegisterUser {
        user_id: config.user_id.clone(),
    };
    let join = ClientEvent::JoinRoom {
        chat_room_id: config.chat_room_id.clone(),
        user_id: config.user_id.clone(),
    };
    for event in [register, join] {
        if !emit(&mut write, &event).await {
            return DropReason::ServerInitiated;
        }
    }
    state.update(|chat| chat.connection_status = ConnectionStatus::Joined);

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some((event, echo_id)) => {
                    if !emit(&mut write, &event).await {
                        if let Some(id) = echo_id {
                            state.update(|chat| chat.mark_failed(&id));
                        }
                        return DropReason::ServerInitiated;
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    return DropReason::Teardown;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match decode_event::<ServerEvent>(text.as_str()) {
                        Ok(event) => dispatch_event(&event, config, state, directory, storage),
                        Err(error) => tracing::warn!(%error, "undecodable channel event"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return DropReason::ServerInitiated,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::warn!(%error, "channel receive error");
                    return DropReason::ServerInitiated;
                }
            },
        }
    }
}

/// Encode and write one outbound event. `false` means the event never made
/// it onto the wire.
async fn emit(write: &mut SplitSink<WsStream, Message>, event: &ClientEvent) -> bool {
    match encode_event(event) {
        Ok(raw) => write.send(Message::Text(raw.into())).await.is_ok(),
        Err(error) => {
            tracing::warn!(%error, "unencodable outbound event");
            false
        }
    }
}

/// Flip the echoes of events still queued when the connection died. Queued
/// events are never replayed on the next connection.
fn fail_queued(state: &Arc<Store<ChatSessionState>>, rx: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Ok((_event, echo_id)) = rx.try_recv() {
        if let Some(id) = echo_id {
            state.update(|chat| chat.mark_failed(&id));
        }
    }
}

/// Fan one inbound event out to the owning store, persisting the directory
/// after push-driven mutations.
fn dispatch_event(
    event: &ServerEvent,
    config: &ChannelConfig,
    state: &Arc<Store<ChatSessionState>>,
    directory: &Arc<Store<DirectoryState>>,
    storage: &Arc<dyn KeyValueStore>,
) {
    let handled = state.update(|chat| {
        handle_message_event(event, chat, &config.chat_room_id)
            || handle_typing_event(event, chat, &config.user_id)
    });
    if handled {
        return;
    }

    let is_directory_event = directory.update(|dir| handle_directory_event(event, dir));
    if is_directory_event {
        let rooms = directory.read(|dir| dir.rooms.clone());
        save_json(storage.as_ref(), keys::CHAT_ROOMS, &rooms);
        return;
    }

    if let ServerEvent::Error { message } = event {
        tracing::warn!(%message, "channel error event");
    }
}

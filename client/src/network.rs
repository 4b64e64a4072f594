//! WebSocket transport for the world connection.
//!
//! The socket event loop runs on a dedicated background thread (a
//! current-thread tokio runtime driving tokio-tungstenite). The thread does
//! exactly one thing with inbound traffic: append the raw text payload to an
//! internal queue under a short lock. No parsing and no world-state mutation
//! happen there; the simulation thread drains the queue once per tick with
//! [`WsTransport::poll_inbound`].
//!
//! `disconnect` signals the loop, joins the thread, and only then returns,
//! so no callback can touch shared state after teardown begins.

use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::ClientCommand;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

/// Connection lifecycle: Idle -> Connecting -> Open -> Closed, with
/// Open -> Idle on explicit disconnect and Connecting|Open -> Failed on a
/// network error. The reason travels in the status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

/// Seam for outbound commands so the controller can be exercised against a
/// recording sink in tests.
pub trait CommandSink {
    /// Fire-and-forget; returns false when the command was not sent.
    fn send_command(&self, command: &ClientCommand) -> bool;
}

pub struct WsTransport {
    inbound: Arc<Mutex<VecDeque<String>>>,
    status: Arc<Mutex<String>>,
    state: Arc<Mutex<TransportState>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    shutdown: Option<watch::Sender<bool>>,
    thread: Option<thread::JoinHandle<()>>,
}

fn set_status(status: &Arc<Mutex<String>>, text: impl Into<String>) {
    *status.lock().unwrap() = text.into();
}

fn set_state(state: &Arc<Mutex<TransportState>>, value: TransportState) {
    *state.lock().unwrap() = value;
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            status: Arc::new(Mutex::new("Disconnected".to_string())),
            state: Arc::new(Mutex::new(TransportState::Idle)),
            outbound: None,
            shutdown: None,
            thread: None,
        }
    }

    /// Starts a connection attempt. Returns false only when the request
    /// could not even be built; network-level failures surface later through
    /// `last_status`/`is_connected`.
    ///
    /// The token is carried both as a `token` query parameter and as an
    /// `Authorization: Bearer` header, matching differing server setups.
    pub fn connect(&mut self, url: &str, token: &str) -> bool {
        self.disconnect();

        let mut ws_url = url.to_string();
        if !token.is_empty() {
            ws_url.push(if ws_url.contains('?') { '&' } else { '?' });
            ws_url.push_str("token=");
            ws_url.push_str(token);
        }

        let mut request = match ws_url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                set_status(&self.status, format!("Connection build failed: {e}"));
                set_state(&self.state, TransportState::Failed);
                return false;
            }
        };
        if !token.is_empty() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(e) => {
                    set_status(&self.status, format!("Connection build failed: {e}"));
                    set_state(&self.state, TransportState::Failed);
                    return false;
                }
            }
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        set_status(&self.status, "Connecting to world socket");
        set_state(&self.state, TransportState::Connecting);

        let inbound = Arc::clone(&self.inbound);
        let status = Arc::clone(&self.status);
        let state = Arc::clone(&self.state);

        let handle = thread::Builder::new()
            .name("ws-transport".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        set_status(&status, format!("Connection failed: {e}"));
                        set_state(&state, TransportState::Failed);
                        return;
                    }
                };
                runtime.block_on(socket_loop(
                    request,
                    inbound,
                    status,
                    state,
                    outbound_rx,
                    shutdown_rx,
                ));
            });

        match handle {
            Ok(handle) => {
                self.outbound = Some(outbound_tx);
                self.shutdown = Some(shutdown_tx);
                self.thread = Some(handle);
                true
            }
            Err(e) => {
                set_status(&self.status, format!("Connection build failed: {e}"));
                set_state(&self.state, TransportState::Failed);
                false
            }
        }
    }

    /// Deterministic, idempotent teardown. Joins the I/O thread before
    /// returning and clears any frames that arrived in the meantime.
    pub fn disconnect(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        self.outbound = None;
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.inbound.lock().unwrap().clear();
        set_state(&self.state, TransportState::Idle);
        set_status(&self.status, "Disconnected");
    }

    /// Enqueues one text frame if currently connected. No buffering while
    /// disconnected; the frame is simply dropped and false returned.
    pub fn send_text(&self, payload: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        match &self.outbound {
            Some(tx) => tx.send(payload.to_string()).is_ok(),
            None => false,
        }
    }

    /// Atomically drains all frames received since the last call, in
    /// arrival order.
    pub fn poll_inbound(&self) -> Vec<String> {
        let mut queue = self.inbound.lock().unwrap();
        queue.drain(..).collect()
    }

    pub fn is_connected(&self) -> bool {
        *self.state.lock().unwrap() == TransportState::Open
    }

    pub fn state(&self) -> TransportState {
        *self.state.lock().unwrap()
    }

    pub fn last_status(&self) -> String {
        self.status.lock().unwrap().clone()
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl CommandSink for WsTransport {
    fn send_command(&self, command: &ClientCommand) -> bool {
        match serde_json::to_string(command) {
            Ok(payload) => self.send_text(&payload),
            Err(e) => {
                warn!("Failed to serialize outbound command: {e}");
                false
            }
        }
    }
}

async fn socket_loop(
    request: tokio_tungstenite::tungstenite::handshake::client::Request,
    inbound: Arc<Mutex<VecDeque<String>>>,
    status: Arc<Mutex<String>>,
    state: Arc<Mutex<TransportState>>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let stream = match connect_async(request).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            set_status(&status, format!("Connection failed: {e}"));
            set_state(&state, TransportState::Failed);
            return;
        }
    };

    info!("World socket connected");
    set_status(&status, "Connected to world socket");
    set_state(&state, TransportState::Open);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                let _ = write.send(Message::Close(None)).await;
                set_state(&state, TransportState::Closed);
                set_status(&status, "World socket closed");
                break;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        // Queue only; interpretation happens on the
                        // simulation thread.
                        inbound.lock().unwrap().push_back(text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        set_state(&state, TransportState::Closed);
                        set_status(&status, "World socket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        set_state(&state, TransportState::Failed);
                        set_status(&status, format!("WebSocket error: {e}"));
                        break;
                    }
                }
            }
            payload = outbound_rx.recv() => {
                match payload {
                    Some(payload) => {
                        if let Err(e) = write.send(Message::Text(payload)).await {
                            set_state(&state, TransportState::Failed);
                            set_status(&status, format!("Send failed: {e}"));
                            break;
                        }
                    }
                    // Sender dropped during teardown.
                    None => break,
                }
            }
        }
    }
}

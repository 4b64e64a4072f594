//! Integration tests for the world-client synchronization core.
//!
//! These tests validate cross-component interactions against a real
//! WebSocket server running inside the test process.

use client::dispatch;
use client::network::WsTransport;
use client::world::WorldState;
use futures_util::{SinkExt, StreamExt};
use shared::TileType;
use std::sync::mpsc::{channel, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Spawns a one-connection WebSocket server on an ephemeral port. It
/// reports the handshake query string and Authorization header through
/// `capture_tx`, pushes `frames_to_send` to the client, then collects text
/// frames until the connection closes.
fn spawn_ws_server(
    frames_to_send: Vec<String>,
    capture_tx: Sender<(String, String)>,
) -> (u16, thread::JoinHandle<Vec<String>>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
    let port = listener.local_addr().unwrap().port();
    listener.set_nonblocking(true).unwrap();

    let handle = thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let (stream, _) = listener.accept().await.unwrap();

            let callback = |req: &Request, resp: Response| {
                let query = req.uri().query().unwrap_or("").to_string();
                let auth = req
                    .headers()
                    .get("Authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let _ = capture_tx.send((query, auth));
                Ok(resp)
            };
            let mut ws = accept_hdr_async(stream, callback).await.unwrap();

            for frame in frames_to_send {
                ws.send(Message::Text(frame)).await.unwrap();
            }

            let mut received = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) => received.push(text),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            received
        })
    });

    (port, handle)
}

fn wait_for(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

/// TRANSPORT TESTS
mod transport_tests {
    use super::*;

    /// Tests the full connect/send/poll/disconnect cycle against a live
    /// socket, including token placement in both query and header.
    #[test]
    fn websocket_auth_and_roundtrip() {
        let (capture_tx, capture_rx) = channel();
        let welcome = r#"{"type":"welcome","selfId":"p1"}"#.to_string();
        let (port, server) = spawn_ws_server(vec![welcome], capture_tx);

        let mut transport = WsTransport::new();
        assert!(transport.connect(&format!("ws://127.0.0.1:{port}/v1/world/ws"), "secret"));

        assert!(
            wait_for(Duration::from_secs(5), || transport.is_connected()),
            "transport never reported connected: {}",
            transport.last_status()
        );

        let (query, auth) = capture_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("handshake not captured");
        assert!(query.contains("token=secret"), "query was {query:?}");
        assert_eq!(auth, "Bearer secret");

        let mut frames = Vec::new();
        assert!(wait_for(Duration::from_secs(5), || {
            frames.extend(transport.poll_inbound());
            !frames.is_empty()
        }));
        assert!(frames[0].contains("welcome"));

        assert!(transport.send_text(r#"{"type":"join","character_id":"c1","name":"Hero","class":"Warrior"}"#));
        // Let the I/O thread flush before teardown
        thread::sleep(Duration::from_millis(300));

        transport.disconnect();
        assert!(!transport.is_connected());
        assert!(transport.poll_inbound().is_empty());

        let received = server.join().unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].contains("\"type\":\"join\""));
    }

    /// Tests that a connection attempt against a closed port degrades to a
    /// status string rather than a panic or hang.
    #[test]
    fn refused_connection_reports_status() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = WsTransport::new();
        assert!(transport.connect(&format!("ws://127.0.0.1:{port}/"), "tok"));

        assert!(wait_for(Duration::from_secs(5), || {
            !transport.is_connected() && transport.last_status() != "Connecting to world socket"
        }));
        assert!(!transport.send_text("{}"));
        transport.disconnect();
    }
}

/// PIPELINE TESTS
mod pipeline_tests {
    use super::*;

    /// Frames received over a real socket, drained and dispatched in
    /// arrival order, hydrate the world exactly like the direct-call path.
    #[test]
    fn inbound_pipeline_hydrates_world() {
        let (capture_tx, _capture_rx) = channel();
        let frames = vec![
            r#"{"type":"welcome","selfId":"p1","map":{"width":2,"height":1,"tiles":["GW"]},"players":[{"id":"p1","x":0,"y":0}]}"#.to_string(),
            r#"{"type":"mob_update","mob":{"id":"m1","x":1,"y":0,"hp":40}}"#.to_string(),
            r#"{"type":"combat","targetId":"m1","damage":15}"#.to_string(),
        ];
        let (port, server) = spawn_ws_server(frames, capture_tx);

        let mut transport = WsTransport::new();
        let world = WorldState::new();
        assert!(transport.connect(&format!("ws://127.0.0.1:{port}/v1/world/ws"), "tok"));

        assert!(wait_for(Duration::from_secs(5), || {
            for raw in transport.poll_inbound() {
                dispatch::apply_message(&world, &raw);
            }
            world.snapshot().combat_texts.len() == 1
        }));

        let snap = world.snapshot();
        assert_eq!(snap.local_player_id, "p1");
        assert!(snap.world_ready);
        assert_eq!(snap.grid.get(0, 0), Some(TileType::Grass));
        assert_eq!(snap.grid.get(1, 0), Some(TileType::Water));
        assert_eq!((snap.players["p1"].x, snap.players["p1"].y), (0, 0));
        assert_eq!(snap.mobs["m1"].hp, 25);
        assert!(snap.mobs["m1"].alive);
        assert_eq!(snap.combat_texts[0].text, "-15");

        transport.disconnect();
        let _ = server.join();
    }
}

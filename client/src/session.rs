//! World session orchestration.
//!
//! Owns the transport, the shared world state, the controller and the
//! reconnect supervisor, and drives them from the fixed-timestep simulation
//! loop: drain inbound frames through the dispatcher, sync connection
//! status, fire the join handshake once per connection, route input, advance
//! cosmetic state, and retry dropped connections.

use crate::auth::CharacterInfo;
use crate::controller::{Controller, InputSample};
use crate::dispatch;
use crate::effects;
use crate::network::{CommandSink, TransportState, WsTransport};
use crate::world::WorldState;
use log::info;
use shared::{ClientCommand, ConnectionState, RECONNECT_INTERVAL_SECS};
use std::sync::Arc;

/// Fixed-interval retry while the world connection is down. No backoff;
/// repeated failures retry at the same cadence.
pub struct ReconnectSupervisor {
    accumulator: f32,
}

impl ReconnectSupervisor {
    pub fn new() -> Self {
        Self { accumulator: 0.0 }
    }

    /// Advances the timer and reports whether a reconnect attempt is due.
    /// The timer resets on every attempt regardless of outcome, and while
    /// connected.
    pub fn tick(&mut self, connected: bool, dt: f32) -> bool {
        if connected {
            self.accumulator = 0.0;
            return false;
        }
        self.accumulator += dt;
        if self.accumulator >= RECONNECT_INTERVAL_SECS {
            self.accumulator = 0.0;
            true
        } else {
            false
        }
    }
}

impl Default for ReconnectSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WorldSession {
    transport: WsTransport,
    world: Arc<WorldState>,
    controller: Controller,
    supervisor: ReconnectSupervisor,
    ws_url: String,
    token: String,
    character: CharacterInfo,
    join_sent: bool,
    in_world: bool,
}

impl WorldSession {
    pub fn new(ws_url: impl Into<String>, token: impl Into<String>, character: CharacterInfo) -> Self {
        Self {
            transport: WsTransport::new(),
            world: Arc::new(WorldState::new()),
            controller: Controller::new(),
            supervisor: ReconnectSupervisor::new(),
            ws_url: ws_url.into(),
            token: token.into(),
            character,
            join_sent: false,
            in_world: false,
        }
    }

    /// Shared handle for renderers or other readers; they copy snapshots
    /// out instead of holding the live lock.
    pub fn world(&self) -> Arc<WorldState> {
        Arc::clone(&self.world)
    }

    pub fn is_in_world(&self) -> bool {
        self.in_world
    }

    /// Resets session state and starts the connection attempt.
    pub fn start(&mut self) -> bool {
        self.world.reset();
        self.join_sent = false;
        self.in_world = true;

        if !self.transport.connect(&self.ws_url, &self.token) {
            self.world
                .set_connection_status(ConnectionState::Disconnected, self.transport.last_status());
            return false;
        }
        self.world
            .set_connection_status(ConnectionState::Connecting, self.transport.last_status());
        true
    }

    pub fn stop(&mut self) {
        self.in_world = false;
        self.join_sent = false;
        self.transport.disconnect();
        self.world
            .set_connection_status(ConnectionState::Disconnected, self.transport.last_status());
    }

    /// One fixed-timestep tick. `now_ms` feeds the controller cooldowns.
    pub fn tick(&mut self, dt: f32, input: &InputSample, now_ms: u64) {
        if !self.in_world {
            return;
        }

        for raw in self.transport.poll_inbound() {
            dispatch::apply_message(&self.world, &raw);
        }

        self.sync_connection_status();
        self.send_join_if_needed();
        self.controller
            .handle_input(input, &self.world, &self.transport, now_ms);
        effects::advance(&self.world, dt);
        self.maybe_reconnect(dt);
    }

    pub fn select_dialog_response(&mut self, npc_id: &str, response_id: &str) {
        self.controller
            .send_dialog_select(npc_id, response_id, &self.transport);
    }

    fn sync_connection_status(&self) {
        let connection = match self.transport.state() {
            TransportState::Open => ConnectionState::Connected,
            TransportState::Connecting => ConnectionState::Connecting,
            _ => ConnectionState::Disconnected,
        };
        self.world
            .set_connection_status(connection, self.transport.last_status());
    }

    /// The join handshake goes out once per connection, as soon as the
    /// socket reports open.
    fn send_join_if_needed(&mut self) {
        if self.join_sent || !self.transport.is_connected() {
            return;
        }
        let sent = self.transport.send_command(&ClientCommand::Join {
            character_id: self.character.id.clone(),
            name: self.character.name.clone(),
            class: self.character.class.clone(),
        });
        if sent {
            self.join_sent = true;
        }
    }

    fn maybe_reconnect(&mut self, dt: f32) {
        if !self.supervisor.tick(self.transport.is_connected(), dt) {
            return;
        }
        info!("World connection down, retrying");
        // Re-arm the handshake so a successful reconnect re-joins.
        self.join_sent = false;
        self.transport.connect(&self.ws_url, &self.token);
        self.world
            .set_connection_status(ConnectionState::Connecting, self.transport.last_status());
    }
}

impl Drop for WorldSession {
    fn drop(&mut self) {
        self.transport.disconnect();
    }
}

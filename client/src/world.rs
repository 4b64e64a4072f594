//! Shared world snapshot guarded by a single mutex.
//!
//! This is the only point of contention between the transport's background
//! thread (indirectly, via the drained inbound queue) and the simulation
//! thread. All mutation goes through named operations so the two critical
//! invariants stay centralized: render-position carryover on upsert, and the
//! fixed bounds on the chat/error/combat-text deques. Readers take a deep
//! copy via [`WorldState::snapshot`] instead of holding the lock while
//! drawing.

use shared::{
    ChatLine, ConnectionState, DialogState, FloatingCombatText, MobState, NpcState, PlayerState,
    TileGrid, MAX_CHAT_LINES, MAX_COMBAT_TEXTS, MAX_ERROR_LINES,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Point-in-time aggregate of everything the renderer needs.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    pub grid: TileGrid,
    pub local_player_id: String,
    pub players: HashMap<String, PlayerState>,
    pub npcs: HashMap<String, NpcState>,
    pub mobs: HashMap<String, MobState>,
    pub dialog: Option<DialogState>,
    pub chat_lines: VecDeque<ChatLine>,
    pub errors: VecDeque<String>,
    pub combat_texts: VecDeque<FloatingCombatText>,
    pub connection: ConnectionState,
    pub status_line: String,
    pub world_ready: bool,
    pub last_server_update_ms: u64,
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self {
            grid: TileGrid::default(),
            local_player_id: String::new(),
            players: HashMap::new(),
            npcs: HashMap::new(),
            mobs: HashMap::new(),
            dialog: None,
            chat_lines: VecDeque::new(),
            errors: VecDeque::new(),
            combat_texts: VecDeque::new(),
            connection: ConnectionState::Disconnected,
            status_line: "Disconnected".to_string(),
            world_ready: false,
            last_server_update_ms: 0,
        }
    }
}

fn push_bounded<T>(deque: &mut VecDeque<T>, item: T, max: usize) {
    deque.push_back(item);
    while deque.len() > max {
        deque.pop_front();
    }
}

impl WorldSnapshot {
    /// Insert-or-update a player. The rendered position is carried over from
    /// the existing entity so server updates never snap it on screen; it is
    /// only initialized (to the grid position) on first insertion.
    pub fn upsert_player(&mut self, mut incoming: PlayerState) {
        match self.players.get(&incoming.id) {
            Some(existing) => {
                incoming.render_x = existing.render_x;
                incoming.render_y = existing.render_y;
            }
            None => {
                incoming.render_x = incoming.x as f32;
                incoming.render_y = incoming.y as f32;
            }
        }
        self.players.insert(incoming.id.clone(), incoming);
    }

    pub fn upsert_npc(&mut self, mut incoming: NpcState) {
        match self.npcs.get(&incoming.id) {
            Some(existing) => {
                incoming.render_x = existing.render_x;
                incoming.render_y = existing.render_y;
            }
            None => {
                incoming.render_x = incoming.x as f32;
                incoming.render_y = incoming.y as f32;
            }
        }
        self.npcs.insert(incoming.id.clone(), incoming);
    }

    pub fn upsert_mob(&mut self, mut incoming: MobState) {
        match self.mobs.get(&incoming.id) {
            Some(existing) => {
                incoming.render_x = existing.render_x;
                incoming.render_y = existing.render_y;
            }
            None => {
                incoming.render_x = incoming.x as f32;
                incoming.render_y = incoming.y as f32;
            }
        }
        self.mobs.insert(incoming.id.clone(), incoming);
    }

    /// Full roster replacement. Entities omitted from `incoming` disappear;
    /// survivors keep their rendered position (upsert semantics).
    pub fn replace_players(&mut self, incoming: Vec<PlayerState>) {
        let old = std::mem::take(&mut self.players);
        for mut player in incoming {
            match old.get(&player.id) {
                Some(prev) => {
                    player.render_x = prev.render_x;
                    player.render_y = prev.render_y;
                }
                None => {
                    player.render_x = player.x as f32;
                    player.render_y = player.y as f32;
                }
            }
            self.players.insert(player.id.clone(), player);
        }
    }

    pub fn replace_npcs(&mut self, incoming: Vec<NpcState>) {
        let old = std::mem::take(&mut self.npcs);
        for mut npc in incoming {
            match old.get(&npc.id) {
                Some(prev) => {
                    npc.render_x = prev.render_x;
                    npc.render_y = prev.render_y;
                }
                None => {
                    npc.render_x = npc.x as f32;
                    npc.render_y = npc.y as f32;
                }
            }
            self.npcs.insert(npc.id.clone(), npc);
        }
    }

    pub fn replace_mobs(&mut self, incoming: Vec<MobState>) {
        let old = std::mem::take(&mut self.mobs);
        for mut mob in incoming {
            match old.get(&mob.id) {
                Some(prev) => {
                    mob.render_x = prev.render_x;
                    mob.render_y = prev.render_y;
                }
                None => {
                    mob.render_x = mob.x as f32;
                    mob.render_y = mob.y as f32;
                }
            }
            self.mobs.insert(mob.id.clone(), mob);
        }
    }

    pub fn remove_player(&mut self, id: &str) -> Option<PlayerState> {
        self.players.remove(id)
    }

    pub fn push_chat(&mut self, text: impl Into<String>, now_ms: u64) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        push_bounded(
            &mut self.chat_lines,
            ChatLine {
                text,
                created_at_ms: now_ms,
            },
            MAX_CHAT_LINES,
        );
    }

    pub fn push_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        push_bounded(&mut self.errors, text, MAX_ERROR_LINES);
    }

    pub fn push_combat_text(&mut self, entry: FloatingCombatText) {
        push_bounded(&mut self.combat_texts, entry, MAX_COMBAT_TEXTS);
    }

    pub fn local_player(&self) -> Option<&PlayerState> {
        self.players.get(&self.local_player_id)
    }
}

/// Owner of the live world snapshot. Mutation happens under a short-held
/// lock; rendering reads a copied-out snapshot instead.
pub struct WorldState {
    inner: Mutex<WorldSnapshot>,
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(WorldSnapshot::default()),
        }
    }

    pub fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis() as u64
    }

    /// Runs `f` with exclusive access to the live snapshot. The closure must
    /// only do in-memory work; never park a network call or render in here.
    pub fn with<R>(&self, f: impl FnOnce(&mut WorldSnapshot) -> R) -> R {
        let mut guard = self.inner.lock().unwrap();
        f(&mut guard)
    }

    /// Deep copy of the current state, safe to read on any thread.
    pub fn snapshot(&self) -> WorldSnapshot {
        self.inner.lock().unwrap().clone()
    }

    pub fn set_connection_status(&self, connection: ConnectionState, status: impl Into<String>) {
        self.with(|world| {
            world.connection = connection;
            world.status_line = status.into();
        });
    }

    pub fn push_chat(&self, text: impl Into<String>) {
        let now = Self::now_ms();
        self.with(|world| world.push_chat(text, now));
    }

    pub fn push_error(&self, text: impl Into<String>) {
        self.with(|world| world.push_error(text));
    }

    /// Movement legality check against the current tile grid.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.with(|world| world.grid.is_blocked(x, y))
    }

    /// Drops everything from a previous session before a fresh connect.
    pub fn reset(&self) {
        self.with(|world| *world = WorldSnapshot::default());
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

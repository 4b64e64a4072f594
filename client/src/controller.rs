//! Movement and combat controller.
//!
//! Turns continuous input polling into at most one outbound command per
//! category per tick, gated by independent cooldowns. Movement is applied
//! optimistically: the candidate cell is checked against the tile grid
//! locally and the authoritative position is mutated before the server
//! round-trip, hiding latency. The server stays the eventual source of
//! truth; its next upsert for the entity simply overwrites the local guess.

use crate::network::CommandSink;
use crate::world::WorldState;
use shared::{
    ClientCommand, ACTION_RANGE, ATTACK_COOLDOWN_MS, INTERACT_COOLDOWN_MS, MOVE_COOLDOWN_MS,
};

/// One tick's worth of sampled input, already reduced to intents.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSample {
    pub dx: i32,
    pub dy: i32,
    pub attack: bool,
    pub interact: bool,
}

pub struct Controller {
    last_move_at_ms: u64,
    last_attack_at_ms: u64,
    last_interact_at_ms: u64,
}

fn manhattan(ax: i32, ay: i32, bx: i32, by: i32) -> i32 {
    (ax - bx).abs() + (ay - by).abs()
}

impl Controller {
    pub fn new() -> Self {
        Self {
            last_move_at_ms: 0,
            last_attack_at_ms: 0,
            last_interact_at_ms: 0,
        }
    }

    /// Routes one input sample. `now_ms` comes from the caller so cooldown
    /// behavior stays deterministic under test.
    pub fn handle_input(
        &mut self,
        input: &InputSample,
        world: &WorldState,
        sink: &dyn CommandSink,
        now_ms: u64,
    ) {
        if input.dx != 0 || input.dy != 0 {
            self.try_move(input.dx, input.dy, world, sink, now_ms);
        }
        if input.attack {
            self.try_attack(world, sink, now_ms);
        }
        if input.interact {
            self.try_interact(world, sink, now_ms);
        }
    }

    /// Optimistic unit-step move. Rejected locally when on cooldown, when
    /// the input is not a single-axis unit step, or when the destination
    /// cell is out of bounds or impassable; nothing is sent in those cases.
    pub fn try_move(
        &mut self,
        dx: i32,
        dy: i32,
        world: &WorldState,
        sink: &dyn CommandSink,
        now_ms: u64,
    ) {
        if now_ms.saturating_sub(self.last_move_at_ms) < MOVE_COOLDOWN_MS {
            return;
        }
        if dx.abs() + dy.abs() != 1 {
            return;
        }

        let moved = world.with(|w| {
            let id = w.local_player_id.clone();
            let (x, y) = match w.local_player() {
                Some(player) => (player.x, player.y),
                None => return false,
            };
            let (nx, ny) = (x + dx, y + dy);
            if w.grid.is_blocked(nx, ny) {
                return false;
            }
            if let Some(player) = w.players.get_mut(&id) {
                player.x = nx;
                player.y = ny;
            }
            true
        });

        if moved {
            // The local guess stands even if the send is dropped while
            // disconnected; the next authoritative upsert reconciles it.
            sink.send_command(&ClientCommand::Move { dx, dy });
            self.last_move_at_ms = now_ms;
        }
    }

    /// Attacks the nearest living mob within range, ties broken by
    /// ascending id. No candidate in range means no command.
    pub fn try_attack(&mut self, world: &WorldState, sink: &dyn CommandSink, now_ms: u64) {
        if now_ms.saturating_sub(self.last_attack_at_ms) < ATTACK_COOLDOWN_MS {
            return;
        }

        let target = world.with(|w| {
            let (x, y) = match w.local_player() {
                Some(player) => (player.x, player.y),
                None => return None,
            };
            let mut best: Option<(i32, &str)> = None;
            for mob in w.mobs.values().filter(|m| m.alive) {
                let dist = manhattan(x, y, mob.x, mob.y);
                if dist > ACTION_RANGE {
                    continue;
                }
                let closer = match best {
                    None => true,
                    Some((best_dist, best_id)) => {
                        dist < best_dist || (dist == best_dist && mob.id.as_str() < best_id)
                    }
                };
                if closer {
                    best = Some((dist, mob.id.as_str()));
                }
            }
            best.map(|(_, id)| id.to_string())
        });

        if let Some(id) = target {
            sink.send_command(&ClientCommand::Attack {
                target_id: id.clone(),
                mob_id: id,
            });
            self.last_attack_at_ms = now_ms;
        }
    }

    /// Talks to the nearest NPC within range, ties broken by ascending id.
    pub fn try_interact(&mut self, world: &WorldState, sink: &dyn CommandSink, now_ms: u64) {
        if now_ms.saturating_sub(self.last_interact_at_ms) < INTERACT_COOLDOWN_MS {
            return;
        }

        let target = world.with(|w| {
            let (x, y) = match w.local_player() {
                Some(player) => (player.x, player.y),
                None => return None,
            };
            let mut best: Option<(i32, &str)> = None;
            for npc in w.npcs.values() {
                let dist = manhattan(x, y, npc.x, npc.y);
                if dist > ACTION_RANGE {
                    continue;
                }
                let closer = match best {
                    None => true,
                    Some((best_dist, best_id)) => {
                        dist < best_dist || (dist == best_dist && npc.id.as_str() < best_id)
                    }
                };
                if closer {
                    best = Some((dist, npc.id.as_str()));
                }
            }
            best.map(|(_, id)| id.to_string())
        });

        if let Some(id) = target {
            sink.send_command(&ClientCommand::interact_talk(id));
            self.last_interact_at_ms = now_ms;
        }
    }

    /// Dialog choices have no cooldown; they are already rate-limited by the
    /// server driving the conversation.
    pub fn send_dialog_select(
        &self,
        npc_id: impl Into<String>,
        response_id: impl Into<String>,
        sink: &dyn CommandSink,
    ) -> bool {
        sink.send_command(&ClientCommand::DialogSelect {
            npc_id: npc_id.into(),
            response_id: response_id.into(),
        })
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MobState, NpcState, PlayerState, TileGrid, TileType};
    use std::sync::Mutex;

    struct RecordingSink {
        sent: Mutex<Vec<ClientCommand>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn commands(&self) -> Vec<ClientCommand> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl CommandSink for RecordingSink {
        fn send_command(&self, command: &ClientCommand) -> bool {
            self.sent.lock().unwrap().push(command.clone());
            true
        }
    }

    fn world_with_local_at(x: i32, y: i32) -> WorldState {
        let world = WorldState::new();
        world.with(|w| {
            w.grid = TileGrid::new(10, 10);
            w.local_player_id = "me".to_string();
            let mut player = PlayerState::new("me");
            player.x = x;
            player.y = y;
            w.upsert_player(player);
        });
        world
    }

    fn add_mob(world: &WorldState, id: &str, x: i32, y: i32, alive: bool) {
        world.with(|w| {
            let mut mob = MobState::new(id);
            mob.x = x;
            mob.y = y;
            mob.alive = alive;
            w.upsert_mob(mob);
        });
    }

    fn add_npc(world: &WorldState, id: &str, x: i32, y: i32) {
        world.with(|w| {
            let mut npc = NpcState::new(id);
            npc.x = x;
            npc.y = y;
            w.upsert_npc(npc);
        });
    }

    #[test]
    fn test_move_applies_optimistically_and_sends() {
        let world = world_with_local_at(5, 5);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.try_move(1, 0, &world, &sink, 1000);

        let snap = world.snapshot();
        assert_eq!((snap.players["me"].x, snap.players["me"].y), (6, 5));
        assert_eq!(
            sink.commands(),
            vec![ClientCommand::Move { dx: 1, dy: 0 }]
        );
    }

    #[test]
    fn test_move_cooldown_limits_send_rate() {
        let world = world_with_local_at(5, 5);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        // Polled much faster than the 85ms window
        controller.try_move(1, 0, &world, &sink, 1000);
        controller.try_move(1, 0, &world, &sink, 1050);
        controller.try_move(1, 0, &world, &sink, 1084);
        assert_eq!(sink.commands().len(), 1);

        controller.try_move(1, 0, &world, &sink, 1085);
        assert_eq!(sink.commands().len(), 2);
    }

    #[test]
    fn test_move_into_water_is_rejected_locally() {
        let world = world_with_local_at(5, 5);
        world.with(|w| w.grid.set(6, 5, TileType::Water));
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.try_move(1, 0, &world, &sink, 1000);

        let snap = world.snapshot();
        assert_eq!((snap.players["me"].x, snap.players["me"].y), (5, 5));
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_move_out_of_bounds_is_rejected() {
        let world = world_with_local_at(0, 0);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.try_move(-1, 0, &world, &sink, 1000);
        controller.try_move(0, -1, &world, &sink, 2000);

        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_diagonal_or_zero_steps_are_not_sent() {
        let world = world_with_local_at(5, 5);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.try_move(1, 1, &world, &sink, 1000);
        controller.try_move(0, 0, &world, &sink, 2000);
        controller.try_move(2, 0, &world, &sink, 3000);

        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_attack_cooldown_allows_single_send() {
        let world = world_with_local_at(5, 5);
        add_mob(&world, "m1", 6, 5, true);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        // Two calls 100ms apart, under the 220ms cooldown
        controller.try_attack(&world, &sink, 1000);
        controller.try_attack(&world, &sink, 1100);

        assert_eq!(sink.commands().len(), 1);
        assert_eq!(
            sink.commands()[0],
            ClientCommand::Attack {
                target_id: "m1".to_string(),
                mob_id: "m1".to_string(),
            }
        );
    }

    #[test]
    fn test_attack_selects_nearest_living_mob() {
        let world = world_with_local_at(5, 5);
        add_mob(&world, "far", 7, 6, true); // distance 3, out of range
        add_mob(&world, "dead", 5, 6, false);
        add_mob(&world, "near", 6, 6, true); // distance 2
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.try_attack(&world, &sink, 1000);

        match &sink.commands()[..] {
            [ClientCommand::Attack { target_id, .. }] => assert_eq!(target_id, "near"),
            other => panic!("unexpected commands: {other:?}"),
        }
    }

    #[test]
    fn test_attack_tie_breaks_by_ascending_id() {
        let world = world_with_local_at(5, 5);
        add_mob(&world, "b", 6, 5, true);
        add_mob(&world, "a", 4, 5, true);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.try_attack(&world, &sink, 1000);

        match &sink.commands()[..] {
            [ClientCommand::Attack { target_id, .. }] => assert_eq!(target_id, "a"),
            other => panic!("unexpected commands: {other:?}"),
        }
    }

    #[test]
    fn test_attack_without_candidate_sends_nothing() {
        let world = world_with_local_at(5, 5);
        add_mob(&world, "far", 9, 9, true);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.try_attack(&world, &sink, 1000);

        assert!(sink.commands().is_empty());
        // Cooldown untouched, an in-range mob right after still fires
        add_mob(&world, "near", 5, 6, true);
        controller.try_attack(&world, &sink, 1001);
        assert_eq!(sink.commands().len(), 1);
    }

    #[test]
    fn test_interact_targets_nearest_npc_with_cooldown() {
        let world = world_with_local_at(5, 5);
        add_npc(&world, "npc1", 5, 6);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.try_interact(&world, &sink, 1000);
        controller.try_interact(&world, &sink, 1900);
        assert_eq!(sink.commands().len(), 1);

        controller.try_interact(&world, &sink, 2000);
        assert_eq!(sink.commands().len(), 2);
        assert_eq!(sink.commands()[0], ClientCommand::interact_talk("npc1"));
    }

    #[test]
    fn test_dialog_select_passes_through() {
        let sink = RecordingSink::new();
        let controller = Controller::new();

        assert!(controller.send_dialog_select("npc1", "r2", &sink));
        assert_eq!(
            sink.commands(),
            vec![ClientCommand::DialogSelect {
                npc_id: "npc1".to_string(),
                response_id: "r2".to_string(),
            }]
        );
    }

    #[test]
    fn test_handle_input_routes_all_categories() {
        let world = world_with_local_at(5, 5);
        add_mob(&world, "m1", 6, 5, true);
        add_npc(&world, "npc1", 5, 6);
        let sink = RecordingSink::new();
        let mut controller = Controller::new();

        controller.handle_input(
            &InputSample {
                dx: 0,
                dy: 1,
                attack: true,
                interact: true,
            },
            &world,
            &sink,
            1000,
        );

        assert_eq!(sink.commands().len(), 3);
    }
}

//! Visual interpolation and floating combat text aging.
//!
//! Each simulation tick eases every entity's rendered position toward its
//! authoritative grid position with an exponential smoothing step:
//! `render += (grid - render) * min(1, dt * k)`. The clamp guarantees
//! monotonic convergence without overshoot for any `dt`.

use crate::world::WorldState;
use shared::INTERPOLATION_RATE;

fn ease(render: f32, grid: f32, alpha: f32) -> f32 {
    render + (grid - render) * alpha
}

/// Advances render positions for all players, NPCs and mobs.
pub fn update_interpolation(world: &WorldState, dt: f32) {
    let alpha = (dt * INTERPOLATION_RATE).min(1.0).max(0.0);
    if alpha <= 0.0 {
        return;
    }

    world.with(|w| {
        for player in w.players.values_mut() {
            player.render_x = ease(player.render_x, player.x as f32, alpha);
            player.render_y = ease(player.render_y, player.y as f32, alpha);
        }
        for npc in w.npcs.values_mut() {
            npc.render_x = ease(npc.render_x, npc.x as f32, alpha);
            npc.render_y = ease(npc.render_y, npc.y as f32, alpha);
        }
        for mob in w.mobs.values_mut() {
            mob.render_x = ease(mob.render_x, mob.x as f32, alpha);
            mob.render_y = ease(mob.render_y, mob.y as f32, alpha);
        }
    });
}

/// Ages floating combat text by `dt` and evicts expired entries. Entries
/// expire oldest-first since the initial ttl is uniform and only decreases.
pub fn update_combat_texts(world: &WorldState, dt: f32) {
    world.with(|w| {
        for text in w.combat_texts.iter_mut() {
            text.ttl -= dt;
        }
        w.combat_texts.retain(|text| text.ttl > 0.0);
    });
}

/// One tick of all cosmetic state.
pub fn advance(world: &WorldState, dt: f32) {
    update_interpolation(world, dt);
    update_combat_texts(world, dt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{FloatingCombatText, PlayerState, COMBAT_TEXT_TTL};

    fn world_with_player(x: i32, y: i32, render_x: f32, render_y: f32) -> WorldState {
        let world = WorldState::new();
        world.with(|w| {
            let mut player = PlayerState::new("p1");
            player.x = x;
            player.y = y;
            w.upsert_player(player);
            let p = w.players.get_mut("p1").unwrap();
            p.render_x = render_x;
            p.render_y = render_y;
        });
        world
    }

    fn render_pos(world: &WorldState) -> (f32, f32) {
        let snap = world.snapshot();
        let p = &snap.players["p1"];
        (p.render_x, p.render_y)
    }

    #[test]
    fn test_interpolation_moves_toward_grid() {
        let world = world_with_player(10, 0, 0.0, 0.0);
        update_interpolation(&world, 1.0 / 60.0);

        let (rx, _) = render_pos(&world);
        assert!(rx > 0.0);
        assert!(rx < 10.0);
        assert_approx_eq!(rx, 10.0 * (1.0f32 / 60.0 * 12.0), 1e-4);
    }

    #[test]
    fn test_interpolation_is_idempotent_at_fixed_point() {
        let world = world_with_player(3, 4, 3.0, 4.0);
        update_interpolation(&world, 0.016);
        update_interpolation(&world, 1.0);
        update_interpolation(&world, 100.0);

        let (rx, ry) = render_pos(&world);
        assert_eq!((rx, ry), (3.0, 4.0));
    }

    #[test]
    fn test_interpolation_never_overshoots() {
        let world = world_with_player(5, 0, 0.0, 0.0);
        let mut previous_gap = 5.0f32;
        for _ in 0..200 {
            update_interpolation(&world, 0.016);
            let (rx, _) = render_pos(&world);
            let gap = (5.0 - rx).abs();
            assert!(rx <= 5.0, "render crossed past grid: {rx}");
            assert!(gap <= previous_gap + 1e-6, "gap grew: {gap} > {previous_gap}");
            previous_gap = gap;
        }
    }

    #[test]
    fn test_large_dt_clamps_to_target_exactly() {
        let world = world_with_player(7, 2, 0.0, 0.0);
        // dt * k > 1 clamps alpha to 1, landing exactly on the grid cell
        update_interpolation(&world, 10.0);
        assert_eq!(render_pos(&world), (7.0, 2.0));
    }

    #[test]
    fn test_combat_text_ages_and_expires_fifo() {
        let world = WorldState::new();
        world.with(|w| {
            for i in 0..3 {
                w.push_combat_text(FloatingCombatText {
                    text: format!("-{i}"),
                    world_x: 0.0,
                    world_y: 0.0,
                    color: (255, 80, 80),
                    ttl: COMBAT_TEXT_TTL,
                });
            }
        });

        update_combat_texts(&world, 0.5);
        assert_eq!(world.snapshot().combat_texts.len(), 3);

        update_combat_texts(&world, 0.7);
        assert!(world.snapshot().combat_texts.is_empty());
    }

    #[test]
    fn test_combat_text_survives_partial_aging() {
        let world = WorldState::new();
        world.with(|w| {
            w.push_combat_text(FloatingCombatText {
                text: "-5".to_string(),
                world_x: 1.0,
                world_y: 1.0,
                color: (255, 80, 80),
                ttl: COMBAT_TEXT_TTL,
            });
        });

        update_combat_texts(&world, 1.0);
        let snap = world.snapshot();
        assert_eq!(snap.combat_texts.len(), 1);
        assert_approx_eq!(snap.combat_texts[0].ttl, COMBAT_TEXT_TTL - 1.0, 1e-5);
    }
}

//! Inbound message dispatcher.
//!
//! Takes one raw text frame at a time, best-effort-decodes it, and applies
//! exactly one state transition to the shared world snapshot. This is the
//! interop layer against a server whose message shapes vary by feature, so
//! every field is looked up through an ordered list of accepted aliases and
//! falls back to a documented default when absent or of the wrong shape.
//! Nothing here panics past the boundary: malformed input degrades to a
//! no-op plus an error line, and references to unknown entities are ignored.

use crate::world::WorldState;
use log::debug;
use serde_json::Value;
use shared::{
    DialogOption, DialogState, FloatingCombatText, MobState, NpcState, PlayerState, TileGrid,
    TileType, COMBAT_TEXT_TTL, MAX_GRID_DIM,
};

const DAMAGE_TEXT_COLOR: (u8, u8, u8) = (255, 80, 80);
const HEAL_TEXT_COLOR: (u8, u8, u8) = (80, 220, 120);

/// First string value found under any of `keys`.
fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = value.get(key).and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    None
}

fn str_or(value: &Value, keys: &[&str], default: &str) -> String {
    str_field(value, keys).unwrap_or_else(|| default.to_string())
}

/// First integer value found under any of `keys`. Accepts JSON numbers
/// (floats truncate) and stringified numbers.
fn int_field(value: &Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        match value.get(key) {
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Some(i);
                }
                if let Some(f) = n.as_f64() {
                    return Some(f as i64);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    return Some(i);
                }
                if let Ok(f) = s.trim().parse::<f64>() {
                    return Some(f as i64);
                }
            }
            _ => {}
        }
    }
    None
}

fn int_or(value: &Value, keys: &[&str], default: i64) -> i64 {
    int_field(value, keys).unwrap_or(default)
}

fn bool_or(value: &Value, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Some(b) = value.get(key).and_then(Value::as_bool) {
            return b;
        }
    }
    default
}

/// Grid coordinates from either a nested `position` object or flat `x`/`y`.
fn grid_pos(value: &Value) -> (i32, i32) {
    let source = match value.get("position") {
        Some(p) if p.is_object() => p,
        _ => value,
    };
    (
        int_or(source, &["x", "col"], 0) as i32,
        int_or(source, &["y", "row"], 0) as i32,
    )
}

const ID_ALIASES: &[&str] = &["id", "playerId", "userId", "username", "name"];

fn parse_player(value: &Value) -> Option<PlayerState> {
    if !value.is_object() {
        return None;
    }
    let id = str_field(value, ID_ALIASES)?;

    let mut player = PlayerState::new(id);
    player.name = str_or(value, &["name", "username", "displayName"], &player.name);
    player.class_name = str_or(value, &["class", "className", "character"], "Unknown");
    let (x, y) = grid_pos(value);
    player.x = x;
    player.y = y;
    player.hp = int_or(value, &["hp", "health"], 100) as i32;
    player.max_hp = int_or(value, &["maxHp", "max_hp", "maxHealth"], 100) as i32;
    player.level = int_or(value, &["level", "lvl"], 1) as i32;
    player.experience = int_or(value, &["experience", "exp", "xp"], 0) as i32;
    player.alive = bool_or(value, &["alive"], player.hp > 0);
    Some(player)
}

fn parse_npc(value: &Value) -> Option<NpcState> {
    if !value.is_object() {
        return None;
    }
    let id = str_field(value, &["id", "npcId", "name"])?;

    let mut npc = NpcState::new(id);
    npc.name = str_or(value, &["name", "displayName"], &npc.name);
    npc.role = str_or(value, &["role", "title"], "");
    npc.portrait = str_or(value, &["portrait", "sprite"], "");
    let (x, y) = grid_pos(value);
    npc.x = x;
    npc.y = y;
    Some(npc)
}

fn parse_mob(value: &Value) -> Option<MobState> {
    if !value.is_object() {
        return None;
    }
    let id = str_field(value, &["id", "mobId", "name"])?;

    let mut mob = MobState::new(id);
    mob.name = str_or(value, &["name", "displayName"], &mob.name);
    let (x, y) = grid_pos(value);
    mob.x = x;
    mob.y = y;
    mob.hp = int_or(value, &["hp", "health"], 100) as i32;
    mob.max_hp = int_or(value, &["maxHp", "max_hp", "maxHealth"], 100) as i32;
    mob.alive = bool_or(value, &["alive"], mob.hp > 0);
    mob.aggressive = bool_or(value, &["aggressive", "hostile"], false);
    Some(mob)
}

/// Map payload: `width`/`height` plus `tiles` as row strings of tile letters
/// or a flat array of numeric codes. Missing cells stay grass. Dimensions
/// outside `1..=MAX_GRID_DIM` reject the whole map rather than truncating,
/// so a bogus frame cannot replace a good grid.
fn parse_grid(value: &Value) -> Option<TileGrid> {
    let width = int_or(value, &["width", "w"], 0);
    let height = int_or(value, &["height", "h"], 0);
    if width <= 0 || height <= 0 || width > MAX_GRID_DIM as i64 || height > MAX_GRID_DIM as i64 {
        return None;
    }
    let width = width as i32;
    let height = height as i32;

    let mut grid = TileGrid::new(width, height);
    match value.get("tiles") {
        Some(Value::Array(rows)) if rows.iter().all(Value::is_string) => {
            for (y, row) in rows.iter().enumerate() {
                let row = row.as_str().unwrap_or("");
                for (x, c) in row.chars().enumerate() {
                    grid.set(x as i32, y as i32, TileType::from_letter(c));
                }
            }
        }
        Some(Value::Array(flat)) => {
            for (i, cell) in flat.iter().enumerate() {
                let code = match cell {
                    Value::Number(n) => n.as_i64().unwrap_or(0),
                    Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
                    _ => 0,
                };
                let x = (i as i32) % width;
                let y = (i as i32) / width;
                grid.set(x, y, TileType::from_code(code));
            }
        }
        _ => {}
    }
    Some(grid)
}

fn parse_dialog_options(value: &Value) -> Vec<DialogOption> {
    let list = match value
        .get("options")
        .or_else(|| value.get("responses"))
        .and_then(Value::as_array)
    {
        Some(list) => list,
        None => return Vec::new(),
    };

    list.iter()
        .enumerate()
        .map(|(i, option)| {
            let id = str_or(
                option,
                &["id", "optionId", "option_id", "response_id"],
                &format!("{}", i + 1),
            );
            DialogOption {
                label: str_or(option, &["label", "text"], &id),
                next_node: str_or(option, &["next", "nextNode", "next_node"], ""),
                quest_trigger: str_field(option, &["quest", "questTrigger", "quest_trigger"]),
                id,
            }
        })
        .collect()
}

/// Applies one inbound frame to the world. Never raises past this boundary.
pub fn apply_message(world: &WorldState, raw: &str) {
    let msg: Value = match serde_json::from_str(raw) {
        Ok(msg) => msg,
        Err(_) => {
            world.push_error("Received invalid JSON from world socket");
            return;
        }
    };

    let msg_type = str_or(&msg, &["type"], "");
    let now = WorldState::now_ms();

    match msg_type.as_str() {
        "welcome" => apply_welcome(world, &msg, now),
        "player_joined" | "player_moved" | "player_update" => {
            let source = match msg.get("player") {
                Some(p) if p.is_object() => p,
                _ => &msg,
            };
            if let Some(player) = parse_player(source) {
                let joined = msg_type == "player_joined";
                let name = player.name.clone();
                world.with(|w| {
                    w.upsert_player(player);
                    if joined {
                        w.push_chat(format!("{name} joined the world"), now);
                    }
                    w.last_server_update_ms = now;
                });
            }
        }
        "player_left" => {
            if let Some(id) = str_field(&msg, &["playerId", "id", "username", "name"]) {
                world.with(|w| {
                    if let Some(removed) = w.remove_player(&id) {
                        w.push_chat(format!("{} left the world", removed.name), now);
                    }
                    w.last_server_update_ms = now;
                });
            }
        }
        "mob_update" => {
            world.with(|w| {
                match msg.get("mobs").and_then(Value::as_array) {
                    Some(mobs) => {
                        for mob in mobs.iter().filter_map(parse_mob) {
                            w.upsert_mob(mob);
                        }
                    }
                    None => {
                        let source = match msg.get("mob") {
                            Some(m) if m.is_object() => m,
                            _ => &msg,
                        };
                        if let Some(mob) = parse_mob(source) {
                            w.upsert_mob(mob);
                        }
                    }
                }
                w.last_server_update_ms = now;
            });
        }
        "combat" => apply_combat(world, &msg, now),
        "player_died" => {
            if let Some(id) = str_field(&msg, &["playerId", "targetId", "id"]) {
                world.with(|w| {
                    if let Some(player) = w.players.get_mut(&id) {
                        player.hp = 0;
                        player.alive = false;
                    } else if let Some(mob) = w.mobs.get_mut(&id) {
                        mob.hp = 0;
                        mob.alive = false;
                    }
                    w.last_server_update_ms = now;
                });
            }
        }
        "dialog_start" | "dialog_update" => apply_dialog(world, &msg, now),
        "dialog_end" => {
            world.with(|w| {
                w.dialog = None;
                w.last_server_update_ms = now;
            });
        }
        "npc_response" => apply_npc_response(world, &msg, now),
        "error" => {
            let text = str_or(
                &msg,
                &["message", "error", "text", "reason"],
                "Unknown server error",
            );
            world.with(|w| {
                w.push_error(text);
                w.last_server_update_ms = now;
            });
        }
        other => {
            // Unknown types funnel to a generic chat fallback when they
            // carry any readable text.
            if let Some(text) = str_field(&msg, &["message", "text", "error"]) {
                world.with(|w| {
                    w.push_chat(text, now);
                    w.last_server_update_ms = now;
                });
            } else {
                debug!("Ignoring message of unknown type {other:?}");
            }
        }
    }
}

/// One-time bulk hydrate: local id, tile grid, and full rosters. Only
/// array-present fields replace their roster; the local player is created
/// if the roster omitted it.
fn apply_welcome(world: &WorldState, msg: &Value, now: u64) {
    let self_id = str_field(msg, &["selfId", "playerId", "id"]);
    let grid = match msg.get("map") {
        Some(map) if map.is_object() => parse_grid(map),
        _ => parse_grid(msg),
    };
    let players = msg
        .get("players")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(parse_player).collect::<Vec<_>>());
    let npcs = msg
        .get("npcs")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(parse_npc).collect::<Vec<_>>());
    let mobs = msg
        .get("mobs")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(parse_mob).collect::<Vec<_>>());

    world.with(|w| {
        if let Some(id) = self_id {
            w.local_player_id = id;
        }
        if let Some(grid) = grid {
            w.grid = grid;
        }
        if let Some(players) = players {
            w.replace_players(players);
        }
        if let Some(npcs) = npcs {
            w.replace_npcs(npcs);
        }
        if let Some(mobs) = mobs {
            w.replace_mobs(mobs);
        }
        if !w.local_player_id.is_empty() && !w.players.contains_key(&w.local_player_id) {
            let player = PlayerState::new(w.local_player_id.clone());
            w.upsert_player(player);
        }
        w.world_ready = true;
        w.last_server_update_ms = now;
    });
}

/// Damage resolution: mob first, then player. Unknown targets are a no-op
/// since the entity may simply not be known locally yet. Negative damage is
/// a heal; hp stays within `0..=max_hp` either way.
fn apply_combat(world: &WorldState, msg: &Value, now: u64) {
    let target_id = match str_field(msg, &["targetId", "mobId", "id"]) {
        Some(id) => id,
        None => return,
    };
    let damage = int_or(msg, &["damage", "amount", "value"], 0) as i32;

    world.with(|w| {
        let anchor = if let Some(mob) = w.mobs.get_mut(&target_id) {
            mob.hp = (mob.hp - damage).clamp(0, mob.max_hp);
            mob.alive = mob.hp > 0;
            Some((mob.x, mob.y))
        } else if let Some(player) = w.players.get_mut(&target_id) {
            player.hp = (player.hp - damage).clamp(0, player.max_hp);
            player.alive = player.hp > 0;
            Some((player.x, player.y))
        } else {
            None
        };

        if let Some((x, y)) = anchor {
            let (text, color) = if damage >= 0 {
                (format!("-{damage}"), DAMAGE_TEXT_COLOR)
            } else {
                (format!("+{}", -damage), HEAL_TEXT_COLOR)
            };
            w.push_combat_text(FloatingCombatText {
                text,
                world_x: x as f32,
                world_y: y as f32,
                color,
                ttl: COMBAT_TEXT_TTL,
            });
            w.last_server_update_ms = now;
        }
    });
}

/// Replaces the active dialog wholesale, backfilling NPC metadata from the
/// known roster when the message omits it.
fn apply_dialog(world: &WorldState, msg: &Value, now: u64) {
    let npc_id = str_or(msg, &["npcId", "npc_id", "id"], "");
    let options = parse_dialog_options(msg);
    let node_id = str_or(msg, &["nodeId", "node_id", "node"], "start");
    let text = str_or(msg, &["text", "message"], "");
    let msg_name = str_field(msg, &["npcName", "npc_name", "name"]);
    let msg_role = str_field(msg, &["role", "npcRole"]);
    let msg_portrait = str_field(msg, &["portrait", "npcPortrait"]);

    world.with(|w| {
        let known = w.npcs.get(&npc_id);
        let dialog = DialogState {
            npc_name: msg_name
                .or_else(|| known.map(|n| n.name.clone()))
                .unwrap_or_else(|| npc_id.clone()),
            npc_role: msg_role
                .or_else(|| known.map(|n| n.role.clone()))
                .unwrap_or_default(),
            npc_portrait: msg_portrait
                .or_else(|| known.map(|n| n.portrait.clone()))
                .unwrap_or_default(),
            npc_id,
            node_id,
            text,
            options,
        };
        w.dialog = Some(dialog);
        w.last_server_update_ms = now;
    });
}

fn apply_npc_response(world: &WorldState, msg: &Value, now: u64) {
    let npc_id = str_or(msg, &["npcId", "npc_id", "id"], "");
    let text = str_or(msg, &["text", "message"], "");
    let options: Vec<String> = msg
        .get("options")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|option| match option {
                    Value::String(s) => Some(s.clone()),
                    other => str_field(other, &["label", "text"]),
                })
                .collect()
        })
        .unwrap_or_default();

    world.with(|w| {
        let name = str_field(msg, &["npcName", "name"])
            .or_else(|| w.npcs.get(&npc_id).map(|n| n.name.clone()))
            .unwrap_or_else(|| "NPC".to_string());

        let mut line = format!("{name}: {text}");
        if !options.is_empty() {
            let summary = options
                .iter()
                .enumerate()
                .map(|(i, label)| format!("{}) {label}", i + 1))
                .collect::<Vec<_>>()
                .join("  ");
            line.push_str(&format!(" [{summary}]"));
        }
        w.push_chat(line, now);
        w.last_server_update_ms = now;
    });
}

use serde::{Deserialize, Serialize};

/// Minimum time between outbound `move` commands.
pub const MOVE_COOLDOWN_MS: u64 = 85;
/// Minimum time between outbound `attack` commands.
pub const ATTACK_COOLDOWN_MS: u64 = 220;
/// Minimum time between outbound `interact` commands.
pub const INTERACT_COOLDOWN_MS: u64 = 1000;
/// Manhattan range for attack/interact target selection.
pub const ACTION_RANGE: i32 = 2;
/// Rate constant for the exponential render-position smoothing step.
pub const INTERPOLATION_RATE: f32 = 12.0;
/// Lifetime of a floating combat text entry, in seconds.
pub const COMBAT_TEXT_TTL: f32 = 1.1;
/// Fixed interval between reconnect attempts while disconnected in-world.
pub const RECONNECT_INTERVAL_SECS: f32 = 3.0;

pub const MAX_CHAT_LINES: usize = 12;
pub const MAX_ERROR_LINES: usize = 6;
pub const MAX_COMBAT_TEXTS: usize = 32;

/// Upper bound on accepted map width/height. Frames claiming larger maps
/// are rejected before allocation.
pub const MAX_GRID_DIM: i32 = 1024;

/// Kind of a single map cell. Water and walls block movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileType {
    Grass,
    Water,
    Wall,
    Forest,
}

impl TileType {
    pub fn blocks_movement(self) -> bool {
        matches!(self, TileType::Water | TileType::Wall)
    }

    /// Maps a tile letter from a map row string. Unknown letters degrade to
    /// grass rather than failing the whole map.
    pub fn from_letter(c: char) -> TileType {
        match c {
            'W' | 'w' => TileType::Water,
            '#' | 'X' | 'x' => TileType::Wall,
            'F' | 'f' | 'T' => TileType::Forest,
            _ => TileType::Grass,
        }
    }

    /// Maps a numeric tile code (0..=3). Out-of-range codes degrade to grass.
    pub fn from_code(code: i64) -> TileType {
        match code {
            1 => TileType::Water,
            2 => TileType::Wall,
            3 => TileType::Forest,
            _ => TileType::Grass,
        }
    }
}

/// Row-major tile grid, replaced wholesale whenever a map payload arrives.
/// This is the authority for client-side movement legality.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    pub width: i32,
    pub height: i32,
    pub tiles: Vec<TileType>,
}

impl TileGrid {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.clamp(0, MAX_GRID_DIM);
        let height = height.clamp(0, MAX_GRID_DIM);
        // usize multiply; the i32 product can overflow for large claims
        Self {
            width,
            height,
            tiles: vec![TileType::Grass; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<TileType> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        self.tiles.get((y * self.width + x) as usize).copied()
    }

    /// Out-of-bounds cells count as blocked.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        match self.get(x, y) {
            Some(tile) => tile.blocks_movement(),
            None => true,
        }
    }

    pub fn set(&mut self, x: i32, y: i32, tile: TileType) {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            self.tiles[(y * self.width + x) as usize] = tile;
        }
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        TileGrid::new(50, 50)
    }
}

/// One player entity as known locally. `x`/`y` are the authoritative grid
/// coordinates; `render_x`/`render_y` are the smoothed on-screen position and
/// carry continuity across server updates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub x: i32,
    pub y: i32,
    pub render_x: f32,
    pub render_y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub level: i32,
    pub experience: i32,
    pub alive: bool,
}

impl PlayerState {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            class_name: "Unknown".to_string(),
            x: 0,
            y: 0,
            render_x: 0.0,
            render_y: 0.0,
            hp: 100,
            max_hp: 100,
            level: 1,
            experience: 0,
            alive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpcState {
    pub id: String,
    pub name: String,
    pub role: String,
    pub portrait: String,
    pub x: i32,
    pub y: i32,
    pub render_x: f32,
    pub render_y: f32,
}

impl NpcState {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            role: String::new(),
            portrait: String::new(),
            x: 0,
            y: 0,
            render_x: 0.0,
            render_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MobState {
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub render_x: f32,
    pub render_y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub alive: bool,
    pub aggressive: bool,
}

impl MobState {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            x: 0,
            y: 0,
            render_x: 0.0,
            render_y: 0.0,
            hp: 100,
            max_hp: 100,
            alive: true,
            aggressive: false,
        }
    }
}

/// Short-lived damage/heal number anchored at a grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingCombatText {
    pub text: String,
    pub world_x: f32,
    pub world_y: f32,
    pub color: (u8, u8, u8),
    pub ttl: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub text: String,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogOption {
    pub id: String,
    pub label: String,
    pub next_node: String,
    pub quest_trigger: Option<String>,
}

/// The single active conversation, replaced wholesale by dialog messages.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogState {
    pub npc_id: String,
    pub npc_name: String,
    pub npc_role: String,
    pub npc_portrait: String,
    pub node_id: String,
    pub text: String,
    pub options: Vec<DialogOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Outbound client -> server commands. Serialized to the exact JSON shapes
/// the world server expects, tagged by a `type` string field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Join {
        character_id: String,
        name: String,
        class: String,
    },
    Move {
        dx: i32,
        dy: i32,
    },
    Attack {
        #[serde(rename = "targetId")]
        target_id: String,
        #[serde(rename = "mobId")]
        mob_id: String,
    },
    Interact {
        #[serde(rename = "npcId")]
        npc_id: String,
        action: String,
    },
    DialogSelect {
        #[serde(rename = "npcId")]
        npc_id: String,
        response_id: String,
    },
}

impl ClientCommand {
    pub fn interact_talk(npc_id: impl Into<String>) -> Self {
        ClientCommand::Interact {
            npc_id: npc_id.into(),
            action: "talk".to_string(),
        }
    }
}

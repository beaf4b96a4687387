//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::input::{Intent, Motion};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Absolute position (`x`,`y`) or velocity (`vx`,`vy`), plus aim
    Move {
        #[serde(default)]
        x: Option<f32>,
        #[serde(default)]
        y: Option<f32>,
        #[serde(default)]
        vx: Option<f32>,
        #[serde(default)]
        vy: Option<f32>,
        /// Aim direction in radians
        angle: f32,
    },

    /// Fire weapon, subject to cooldown
    Shoot,

    /// Collect a pickup by id
    Pickup { id: u32 },
}

impl ClientMsg {
    /// Shape check; `None` when the message carries no usable intent
    pub fn into_intent(self) -> Option<Intent> {
        match self {
            ClientMsg::Move {
                x,
                y,
                vx,
                vy,
                angle,
            } => {
                if !angle.is_finite() {
                    return None;
                }
                let motion = match (x, y, vx, vy) {
                    (Some(x), Some(y), _, _) => Motion::Position { x, y },
                    (_, _, Some(vx), Some(vy)) => Motion::Velocity { vx, vy },
                    _ => return None,
                };
                let finite = match motion {
                    Motion::Position { x, y } => x.is_finite() && y.is_finite(),
                    Motion::Velocity { vx, vy } => vx.is_finite() && vy.is_finite(),
                };
                finite.then_some(Intent::Move { motion, angle })
            }
            ClientMsg::Shoot => Some(Intent::Fire),
            ClientMsg::Pickup { id } => Some(Intent::Pickup { id }),
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once on join with the client's own player id
    Id { id: Uuid, map: MapInfo },

    /// Full room snapshot, sent every tick
    State {
        players: BTreeMap<Uuid, PlayerSnapshot>,
        bullets: Vec<BulletSnapshot>,
        loot: Vec<LootSnapshot>,
        safezone: ZoneSnapshot,
    },
}

/// Arena dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    pub width: f32,
    pub height: f32,
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub x: f32,
    pub y: f32,
    /// Aim in radians
    pub angle: f32,
    pub hp: i32,
    pub color: String,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub owner: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootKind {
    Health,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub kind: LootKind,
}

/// Safe zone (shrinking play area) state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

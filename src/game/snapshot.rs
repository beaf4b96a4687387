//! Snapshot building for network transmission

use std::sync::Arc;

use crate::ws::protocol::{
    BulletSnapshot, LootKind, LootSnapshot, PlayerSnapshot, ServerMsg, ZoneSnapshot,
};

use super::store::{EntityStore, PickupKind};

/// Encoded message shared by every connection it is sent to
pub type Payload = Arc<str>;

/// Builds full-state snapshots of a room
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    /// Size of the last encoded snapshot
    last_bytes: usize,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the state message for the current store contents
    pub fn build(&self, store: &EntityStore) -> ServerMsg {
        let players = store
            .players()
            .map(|p| {
                (
                    p.id,
                    PlayerSnapshot {
                        x: p.x,
                        y: p.y,
                        angle: p.angle,
                        hp: p.health,
                        color: p.color.clone(),
                        alive: p.alive,
                    },
                )
            })
            .collect();

        let bullets = store
            .projectiles()
            .iter()
            .map(|b| BulletSnapshot {
                x: b.x,
                y: b.y,
                angle: b.angle,
                owner: b.owner,
            })
            .collect();

        let loot = store
            .pickups()
            .map(|l| LootSnapshot {
                id: l.id,
                x: l.x,
                y: l.y,
                kind: match l.kind {
                    PickupKind::Health => LootKind::Health,
                },
            })
            .collect();

        let zone = store.zone();
        ServerMsg::State {
            players,
            bullets,
            loot,
            safezone: ZoneSnapshot {
                x: zone.x,
                y: zone.y,
                radius: zone.radius,
            },
        }
    }

    /// Build and encode once; the payload is shared by all recipients
    pub fn encode(&mut self, store: &EntityStore) -> Result<Payload, serde_json::Error> {
        let json = serde_json::to_string(&self.build(store))?;
        self.last_bytes = json.len();
        Ok(Arc::from(json))
    }

    pub fn last_bytes(&self) -> usize {
        self.last_bytes
    }
}

/// Encode any server message into a payload
pub fn encode(msg: &ServerMsg) -> Result<Payload, serde_json::Error> {
    serde_json::to_string(msg).map(Arc::from)
}

//! Room manager - creates rooms and routes connections to them

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;

use super::room::{Connection, Reservation, Room, RoomHandle};
use super::RoomError;

/// Attempts at joining before giving up on a connection
const JOIN_ATTEMPTS: usize = 3;

/// Registry of all active rooms
pub struct RoomManager {
    rooms: Arc<DashMap<Uuid, RoomHandle>>,
    game: Arc<GameConfig>,
    max_players_per_room: usize,
    /// Serializes find-or-reserve so concurrent joins never overfill a room
    routing: Mutex<()>,
}

impl RoomManager {
    pub fn new(game: GameConfig, max_players_per_room: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            game: Arc::new(game),
            max_players_per_room: max_players_per_room.max(1),
            routing: Mutex::new(()),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Handles of every active room
    pub fn rooms(&self) -> Vec<RoomHandle> {
        self.rooms.iter().map(|r| r.value().clone()).collect()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Spawn a new room with its initial loot
    pub fn create_room(&self) -> RoomHandle {
        let id = Uuid::new_v4();
        let (room, handle) = Room::new(id, self.game.clone(), rand::random());
        self.rooms.insert(id, handle.clone());
        self.supervise(id, tokio::spawn(room.run()));

        info!(room_id = %id, "Room created");
        handle
    }

    /// Drop the room from the registry once its task ends, whether it closed
    /// normally or panicked
    fn supervise(&self, id: Uuid, task: JoinHandle<()>) {
        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(()) => info!(room_id = %id, "Room closed"),
                Err(e) if e.is_panic() => {
                    error!(room_id = %id, error = %e, "Room task panicked")
                }
                Err(e) => warn!(room_id = %id, error = %e, "Room task cancelled"),
            }
            rooms.remove(&id);
        });
    }

    /// Pick a room with a free slot and reserve it, creating a room when
    /// none has space
    pub fn route(&self) -> (RoomHandle, Reservation) {
        let _guard = self.routing.lock();
        let available = self
            .rooms
            .iter()
            .find(|r| {
                let room = r.value();
                !room.is_closed() && room.occupancy() < self.max_players_per_room
            })
            .map(|r| r.value().clone());

        let handle = available.unwrap_or_else(|| self.create_room());
        let reservation = handle.reserve();
        (handle, reservation)
    }

    /// Route a new connection and join it to a room
    pub async fn join(&self) -> Result<(RoomHandle, Connection), RoomError> {
        for _ in 0..JOIN_ATTEMPTS {
            let (handle, _reservation) = self.route();
            match handle.join().await {
                Ok(connection) => return Ok((handle, connection)),
                Err(RoomError::Closed(id)) => {
                    warn!(room_id = %id, "Room closed during join, rerouting");
                    self.rooms.remove(&id);
                }
                Err(e) => return Err(e),
            }
        }
        Err(RoomError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use serde_json::Value;
    use tokio_test::assert_ok;

    use super::*;

    fn config() -> GameConfig {
        GameConfig {
            initial_pickups: 2,
            ..GameConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_join_creates_single_room() {
        let manager = RoomManager::new(config(), 4);
        assert_eq!(manager.active_rooms(), 0);

        let (first, _a) = assert_ok!(manager.join().await);
        let (second, _b) = assert_ok!(manager.join().await);

        assert_eq!(first.id, second.id);
        assert_eq!(manager.active_rooms(), 1);
        assert_eq!(manager.total_players(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn full_room_spills_into_new_room() {
        let manager = RoomManager::new(config(), 1);

        let (first, _a) = assert_ok!(manager.join().await);
        let (second, _b) = assert_ok!(manager.join().await);

        assert_ne!(first.id, second.id);
        assert_eq!(manager.rooms().len(), 2);
        assert!(manager.get(&first.id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_room_is_deregistered_and_replaced() {
        let manager = RoomManager::new(config(), 4);
        let tick = GameConfig::default().tick_interval;

        let (room, conn) = assert_ok!(manager.join().await);
        assert_ok!(room.leave(conn.player_id).await);
        tokio::time::sleep(tick * 3).await;

        assert!(manager.get(&room.id).is_none());
        let (fresh, _conn) = assert_ok!(manager.join().await);
        assert_ne!(fresh.id, room.id);
        assert_eq!(manager.active_rooms(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_respect_room_cap() {
        let manager = Arc::new(RoomManager::new(config(), 2));

        let joins: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.join().await })
            })
            .collect();

        let mut connections = Vec::new();
        let mut per_room: HashMap<Uuid, usize> = HashMap::new();
        for join in joins {
            let (room, conn) = assert_ok!(assert_ok!(join.await));
            *per_room.entry(room.id).or_default() += 1;
            connections.push(conn);
        }

        assert_eq!(per_room.len(), 4);
        assert!(per_room.values().all(|&n| n <= 2), "{per_room:?}");
        assert_eq!(manager.total_players(), 8);
        assert!(manager.rooms().iter().all(|r| r.occupancy() <= 2));
    }

    #[tokio::test(start_paused = true)]
    async fn reservation_is_released_after_join() {
        let manager = RoomManager::new(config(), 1);

        let (room, reservation) = manager.route();
        assert_eq!(room.occupancy(), 1);
        let (other, _held) = manager.route();
        assert_ne!(room.id, other.id);

        drop(reservation);
        assert_eq!(room.occupancy(), 0);
        let (again, _conn) = assert_ok!(manager.join().await);
        assert_eq!(again.id, room.id);
        assert_eq!(again.occupancy(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicked_room_is_removed_without_disturbing_others() {
        let manager = RoomManager::new(config(), 4);
        let tick = GameConfig::default().tick_interval;

        let (healthy, mut conn) = assert_ok!(manager.join().await);

        let (doomed, doomed_handle) = Room::new(Uuid::new_v4(), manager.game.clone(), 1);
        manager.rooms.insert(doomed_handle.id, doomed_handle.clone());
        manager.supervise(
            doomed_handle.id,
            tokio::spawn(async move {
                let _room = doomed;
                panic!("room state corrupted");
            }),
        );
        tokio::time::sleep(tick * 2).await;

        assert!(manager.get(&doomed_handle.id).is_none());
        assert!(doomed_handle.is_closed());
        assert_eq!(manager.active_rooms(), 1);

        // The surviving room keeps ticking and accepting players
        let (joined, _second) = assert_ok!(manager.join().await);
        assert_eq!(joined.id, healthy.id);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            assert!(tokio::time::Instant::now() < deadline, "room stopped ticking");
            let payload = conn.outbound.recv().await.expect("healthy room stopped");
            let value: Value = serde_json::from_str(&payload).unwrap();
            if value["type"] == "state" && value["players"].as_object().unwrap().len() == 2 {
                break;
            }
        }
        assert_eq!(manager.total_players(), 2);
    }
}

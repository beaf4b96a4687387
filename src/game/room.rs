//! Room actor and authoritative tick loop
//!
//! Each room is one tokio task that owns its [`EntityStore`]. Joins, leaves,
//! intents, deferred respawns and ticks all reach the store through the same
//! `select!` loop, so every mutation of a room is serialized.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::protocol::{MapInfo, ServerMsg};

use super::input::{apply_intent, Intent, IntentOutcome};
use super::registry::{outbound_channel, ConnectionRegistry, Delivery, OutboundRx, OutboundTx};
use super::snapshot::{self, SnapshotBuilder};
use super::step::{apply_respawn, step};
use super::store::{Arena, EntityStore, PickupKind, Player};
use super::RoomError;

/// Command queue depth per room
const COMMAND_BUFFER: usize = 256;

/// Messages processed sequentially by a room
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        player_id: Uuid,
        outbound: OutboundTx,
        reply: oneshot::Sender<()>,
    },
    Leave {
        player_id: Uuid,
    },
    Intent {
        player_id: Uuid,
        intent: Intent,
        received_at: Instant,
    },
    /// Deferred respawn, valid only for the life it was scheduled for
    Respawn {
        player_id: Uuid,
        life: u32,
    },
}

/// A joined player's side of the room
#[derive(Debug)]
pub struct Connection {
    pub player_id: Uuid,
    /// Encoded server messages for this player
    pub outbound: OutboundRx,
}

/// Handle to a running room
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub id: Uuid,
    command_tx: mpsc::Sender<RoomCommand>,
    player_count: Arc<AtomicUsize>,
    /// Slots claimed by joins still in flight
    reserved: Arc<AtomicUsize>,
}

/// A claimed slot in a room, released on drop
#[derive(Debug)]
pub struct Reservation {
    reserved: Arc<AtomicUsize>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.reserved.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Acquire)
    }

    /// Joined players plus joins still in flight
    pub fn occupancy(&self) -> usize {
        self.player_count() + self.reserved.load(Ordering::Acquire)
    }

    /// Hold a slot until the join it was taken for completes or fails
    pub fn reserve(&self) -> Reservation {
        self.reserved.fetch_add(1, Ordering::AcqRel);
        Reservation {
            reserved: self.reserved.clone(),
        }
    }

    /// True once the room task has stopped
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Add a new player; its `id` message is the first thing on `outbound`
    pub async fn join(&self) -> Result<Connection, RoomError> {
        let player_id = Uuid::new_v4();
        let (outbound_tx, outbound_rx) = outbound_channel();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(RoomCommand::Join {
                player_id,
                outbound: outbound_tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Closed(self.id))?;
        reply_rx.await.map_err(|_| RoomError::Closed(self.id))?;

        Ok(Connection {
            player_id,
            outbound: outbound_rx,
        })
    }

    /// Queue an intent from `player_id`
    pub async fn submit(&self, player_id: Uuid, intent: Intent) -> Result<(), RoomError> {
        self.command_tx
            .send(RoomCommand::Intent {
                player_id,
                intent,
                received_at: Instant::now(),
            })
            .await
            .map_err(|_| RoomError::Closed(self.id))
    }

    pub async fn leave(&self, player_id: Uuid) -> Result<(), RoomError> {
        self.command_tx
            .send(RoomCommand::Leave { player_id })
            .await
            .map_err(|_| RoomError::Closed(self.id))
    }
}

/// The authoritative room
pub struct Room {
    id: Uuid,
    config: Arc<GameConfig>,
    store: EntityStore,
    registry: ConnectionRegistry,
    snapshots: SnapshotBuilder,
    rng: ChaCha8Rng,
    command_rx: mpsc::Receiver<RoomCommand>,
    /// Used by respawn timers; weak so timers never keep a room alive
    command_tx: mpsc::WeakSender<RoomCommand>,
    player_count: Arc<AtomicUsize>,
    had_players: bool,
    tick: u64,
}

impl Room {
    /// Create a room with its initial loot
    pub fn new(id: Uuid, config: Arc<GameConfig>, seed: u64) -> (Self, RoomHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            id,
            command_tx: command_tx.clone(),
            player_count: player_count.clone(),
            reserved: Arc::new(AtomicUsize::new(0)),
        };

        let store = EntityStore::new(
            Arena::new(config.arena_width, config.arena_height),
            config.zone_initial_radius,
        );
        let mut room = Self {
            id,
            config,
            store,
            registry: ConnectionRegistry::new(),
            snapshots: SnapshotBuilder::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            command_rx,
            command_tx: command_tx.downgrade(),
            player_count,
            had_players: false,
            tick: 0,
        };

        for _ in 0..room.config.initial_pickups {
            let (x, y) = room.spawn_position();
            room.store.add_pickup(PickupKind::Health, x, y);
        }

        (room, handle)
    }

    /// Run the tick loop until the room empties or every handle is gone
    pub async fn run(mut self) {
        info!(
            room_id = %self.id,
            pickups = self.store.pickup_count(),
            "Room started"
        );

        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.run_tick();
                    if self.had_players && self.store.player_count() == 0 {
                        info!(
                            room_id = %self.id,
                            tick = self.tick,
                            "All players left, closing room"
                        );
                        break;
                    }
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!(room_id = %self.id, "Command channel closed");
                        break;
                    }
                },
            }
        }

        info!(room_id = %self.id, ticks = self.tick, "Room stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                outbound,
                reply,
            } => self.handle_join(player_id, outbound, reply),
            RoomCommand::Leave { player_id } => self.handle_leave(player_id),
            RoomCommand::Intent {
                player_id,
                intent,
                received_at,
            } => self.handle_intent(player_id, intent, received_at),
            RoomCommand::Respawn { player_id, life } => self.handle_respawn(player_id, life),
        }
    }

    fn handle_join(&mut self, player_id: Uuid, outbound: OutboundTx, reply: oneshot::Sender<()>) {
        let (x, y) = self.spawn_position();
        let color = self.random_color();
        self.store.add_player(Player::new(
            player_id,
            x,
            y,
            self.config.max_health,
            color,
        ));
        self.registry.register(player_id, outbound);
        self.had_players = true;
        self.sync_player_count();

        let hello = ServerMsg::Id {
            id: player_id,
            map: MapInfo {
                width: self.config.arena_width,
                height: self.config.arena_height,
            },
        };
        match snapshot::encode(&hello) {
            Ok(payload) => {
                if self.registry.send_to(&player_id, payload) != Delivery::Sent {
                    warn!(room_id = %self.id, player_id = %player_id, "Failed to queue id message");
                }
            }
            Err(e) => error!(room_id = %self.id, error = %e, "Failed to encode id message"),
        }

        if reply.send(()).is_err() {
            // Joiner went away before the room answered
            self.handle_leave(player_id);
            return;
        }

        info!(
            room_id = %self.id,
            player_id = %player_id,
            player_count = self.store.player_count(),
            "Player joined room"
        );
    }

    fn handle_leave(&mut self, player_id: Uuid) {
        let registered = self.registry.unregister(&player_id);
        if self.store.remove_player(&player_id).is_some() || registered {
            self.sync_player_count();
            info!(
                room_id = %self.id,
                player_id = %player_id,
                player_count = self.store.player_count(),
                "Player left room"
            );
        }
    }

    fn handle_intent(&mut self, player_id: Uuid, intent: Intent, received_at: Instant) {
        let outcome = apply_intent(
            &mut self.store,
            &self.config,
            &player_id,
            intent,
            received_at,
        );
        match outcome {
            IntentOutcome::Fired { projectile_id } => {
                debug!(
                    room_id = %self.id,
                    player_id = %player_id,
                    projectile_id,
                    "Projectile fired"
                );
            }
            IntentOutcome::Collected { pickup_id, healed } => {
                info!(
                    room_id = %self.id,
                    player_id = %player_id,
                    pickup_id,
                    healed,
                    "Pickup collected"
                );
            }
            IntentOutcome::Moved | IntentOutcome::OnCooldown => {}
            other => {
                debug!(
                    room_id = %self.id,
                    player_id = %player_id,
                    outcome = ?other,
                    "Intent ignored"
                );
            }
        }
    }

    fn handle_respawn(&mut self, player_id: Uuid, life: u32) {
        let (x, y) = self.respawn_position();
        if apply_respawn(&mut self.store, &player_id, life, x, y) {
            info!(room_id = %self.id, player_id = %player_id, x, y, "Player respawned");
        } else {
            debug!(room_id = %self.id, player_id = %player_id, life, "Discarded stale respawn");
        }
    }

    /// Run a single simulation tick and broadcast the result
    fn run_tick(&mut self) {
        self.tick += 1;
        let outcome = step(&mut self.store, &self.config);

        for hit in &outcome.hits {
            debug!(
                room_id = %self.id,
                shooter_id = %hit.shooter_id,
                target_id = %hit.target_id,
                projectile_id = hit.projectile_id,
                damage = hit.damage,
                "Player hit"
            );
        }
        for (player_id, life) in outcome.eliminated {
            info!(
                room_id = %self.id,
                player_id = %player_id,
                tick = self.tick,
                "Player eliminated"
            );
            self.schedule_respawn(player_id, life);
        }

        self.broadcast_snapshot();
    }

    fn broadcast_snapshot(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        let payload = match self.snapshots.encode(&self.store) {
            Ok(payload) => payload,
            Err(e) => {
                error!(room_id = %self.id, error = %e, "Failed to encode snapshot");
                return;
            }
        };

        let report = self.registry.broadcast(&payload);
        if report.dropped > 0 {
            debug!(
                room_id = %self.id,
                dropped = report.dropped,
                bytes = self.snapshots.last_bytes(),
                "Snapshot dropped for slow clients"
            );
        }
        for player_id in report.closed {
            debug!(room_id = %self.id, player_id = %player_id, "Outbound channel closed");
            self.handle_leave(player_id);
        }
    }

    /// Deliver a respawn after the configured delay without blocking the tick
    fn schedule_respawn(&self, player_id: Uuid, life: u32) {
        let command_tx = self.command_tx.clone();
        let delay = self.config.respawn_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = command_tx.upgrade() {
                let _ = tx.send(RoomCommand::Respawn { player_id, life }).await;
            }
        });
    }

    fn sync_player_count(&self) {
        self.player_count
            .store(self.store.player_count(), Ordering::Release);
    }

    /// Random point inside the play area, away from the edges
    fn spawn_position(&mut self) -> (f32, f32) {
        let arena = *self.store.arena();
        let margin_x = self.config.spawn_margin.clamp(0.0, arena.width / 2.0);
        let margin_y = self.config.spawn_margin.clamp(0.0, arena.height / 2.0);
        let x = self.rng.gen_range(margin_x..=arena.width - margin_x);
        let y = self.rng.gen_range(margin_y..=arena.height - margin_y);
        (x, y)
    }

    /// Random point near the arena center
    fn respawn_position(&mut self) -> (f32, f32) {
        let (cx, cy) = self.store.arena().center();
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = self.rng.gen_range(0.0..=self.config.respawn_spread.max(0.0));
        self.store
            .arena()
            .clamp(cx + angle.cos() * distance, cy + angle.sin() * distance)
    }

    fn random_color(&mut self) -> String {
        format!("hsl({}, 80%, 60%)", self.rng.gen_range(0..360))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::game::input::Motion;

    fn test_config() -> GameConfig {
        GameConfig {
            zone_initial_radius: 10_000.0,
            projectile_damage: 100,
            initial_pickups: 3,
            ..GameConfig::default()
        }
    }

    fn start(config: GameConfig) -> RoomHandle {
        let (room, handle) = Room::new(Uuid::new_v4(), Arc::new(config), 42);
        tokio::spawn(room.run());
        handle
    }

    async fn next_state(rx: &mut OutboundRx) -> Value {
        loop {
            let payload = rx.recv().await.expect("room stopped");
            let value: Value = serde_json::from_str(&payload).unwrap();
            if value["type"] == "state" {
                return value;
            }
        }
    }

    async fn place(handle: &RoomHandle, player_id: Uuid, x: f32, y: f32, angle: f32) {
        let motion = Motion::Position { x, y };
        handle
            .submit(player_id, Intent::Move { motion, angle })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn join_sends_id_then_states_with_loot() {
        let handle = start(test_config());
        let mut conn = handle.join().await.unwrap();

        let first = conn.outbound.recv().await.unwrap();
        let first: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(first["type"], "id");
        assert_eq!(first["id"], conn.player_id.to_string());

        let state = next_state(&mut conn.outbound).await;
        let me = &state["players"][conn.player_id.to_string()];
        assert_eq!(me["hp"], 100);
        assert_eq!(me["alive"], true);
        assert_eq!(state["loot"].as_array().unwrap().len(), 3);
        assert_eq!(handle.player_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn eliminated_player_respawns_after_fixed_delay() {
        let config = test_config();
        let delay = config.respawn_delay;
        let tick = config.tick_interval;
        let handle = start(config);

        let shooter = handle.join().await.unwrap();
        let mut victim = handle.join().await.unwrap();
        let victim_key = victim.player_id.to_string();

        place(&handle, shooter.player_id, 100.0, 100.0, 0.0).await;
        place(&handle, victim.player_id, 130.0, 100.0, 0.0).await;
        handle.submit(shooter.player_id, Intent::Fire).await.unwrap();

        let eliminated_at = loop {
            let state = next_state(&mut victim.outbound).await;
            if state["players"][&victim_key]["alive"] == false {
                assert_eq!(state["players"][&victim_key]["hp"], 0);
                break Instant::now();
            }
        };

        let respawned_at = loop {
            let state = next_state(&mut victim.outbound).await;
            let me = &state["players"][&victim_key];
            if me["alive"] == true {
                assert_eq!(me["hp"], 100);
                break Instant::now();
            }
            assert_eq!(me["hp"], 0);
        };

        let waited = respawned_at - eliminated_at;
        assert!(waited >= delay, "respawned early after {:?}", waited);
        assert!(waited <= delay + tick * 2, "respawned late after {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn respawn_after_disconnect_is_discarded() {
        let config = test_config();
        let delay = config.respawn_delay;
        let handle = start(config);

        let mut shooter = handle.join().await.unwrap();
        let victim = handle.join().await.unwrap();
        let victim_key = victim.player_id.to_string();

        place(&handle, shooter.player_id, 100.0, 100.0, 0.0).await;
        place(&handle, victim.player_id, 130.0, 100.0, 0.0).await;
        handle.submit(shooter.player_id, Intent::Fire).await.unwrap();

        loop {
            let state = next_state(&mut shooter.outbound).await;
            if state["players"][&victim_key]["alive"] == false {
                break;
            }
        }
        handle.leave(victim.player_id).await.unwrap();

        let deadline = Instant::now() + delay + Duration::from_secs(1);
        while Instant::now() < deadline {
            let state = next_state(&mut shooter.outbound).await;
            let players = state["players"].as_object().unwrap();
            if !players.contains_key(&victim_key) {
                assert_eq!(players.len(), 1);
            }
        }
        let state = next_state(&mut shooter.outbound).await;
        assert!(state["players"].get(&victim_key).is_none());
        assert!(!handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_intents_after_leave_are_harmless() {
        let handle = start(test_config());
        let mut stays = handle.join().await.unwrap();
        let leaves = handle.join().await.unwrap();

        handle.leave(leaves.player_id).await.unwrap();
        handle.submit(leaves.player_id, Intent::Fire).await.unwrap();
        handle
            .submit(leaves.player_id, Intent::Pickup { id: 1 })
            .await
            .unwrap();

        loop {
            let state = next_state(&mut stays.outbound).await;
            if state["players"].as_object().unwrap().len() == 1 {
                break;
            }
        }
        // Commands queued behind the leave are applied before the next tick
        let state = next_state(&mut stays.outbound).await;
        assert!(state["bullets"].as_array().unwrap().is_empty());
        assert_eq!(state["loot"].as_array().unwrap().len(), 3);
        assert_eq!(handle.player_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn room_closes_once_everyone_left() {
        let config = test_config();
        let tick = config.tick_interval;
        let handle = start(config);

        let conn = handle.join().await.unwrap();
        handle.leave(conn.player_id).await.unwrap();
        tokio::time::sleep(tick * 3).await;

        assert!(handle.is_closed());
        assert!(matches!(handle.join().await, Err(RoomError::Closed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_connection_is_removed_on_broadcast() {
        let handle = start(test_config());
        let mut stays = handle.join().await.unwrap();
        let dropped = handle.join().await.unwrap();
        let dropped_key = dropped.player_id.to_string();
        drop(dropped);

        let mut removed = false;
        for _ in 0..5 {
            let state = next_state(&mut stays.outbound).await;
            if state["players"].get(&dropped_key).is_none() {
                removed = true;
                break;
            }
        }
        assert!(removed);
        assert_eq!(handle.player_count(), 1);
    }
}

//! Input ingestion - applies client intents to the sender's own player

use tokio::time::Instant;
use uuid::Uuid;

use crate::config::GameConfig;

use super::combat::CombatSystem;
use super::physics::PhysicsSystem;
use super::store::{EntityStore, PickupKind};

/// How a move intent drives the player
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Absolute position, trusted as-is apart from the arena clamp
    Position { x: f32, y: f32 },
    /// Velocity integrated by the simulation step
    Velocity { vx: f32, vy: f32 },
}

/// A validated client request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Move { motion: Motion, angle: f32 },
    Fire,
    Pickup { id: u32 },
}

/// What applying an intent did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    Moved,
    Fired { projectile_id: u64 },
    OnCooldown,
    Collected { pickup_id: u32, healed: i32 },
    OutOfReach,
    /// Player or pickup no longer exists
    Stale,
    /// Player is eliminated and waiting to respawn
    Eliminated,
}

/// Apply `intent` on behalf of `player_id`
pub fn apply_intent(
    store: &mut EntityStore,
    config: &GameConfig,
    player_id: &Uuid,
    intent: Intent,
    now: Instant,
) -> IntentOutcome {
    match store.player(player_id) {
        None => return IntentOutcome::Stale,
        Some(player) if !player.alive => return IntentOutcome::Eliminated,
        Some(_) => {}
    }

    match intent {
        Intent::Move { motion, angle } => apply_move(store, config, player_id, motion, angle),
        Intent::Fire => apply_fire(store, config, player_id, now),
        Intent::Pickup { id } => apply_pickup(store, config, player_id, id),
    }
}

fn apply_move(
    store: &mut EntityStore,
    config: &GameConfig,
    player_id: &Uuid,
    motion: Motion,
    angle: f32,
) -> IntentOutcome {
    let arena = *store.arena();
    let Some(player) = store.player_mut(player_id) else {
        return IntentOutcome::Stale;
    };

    player.angle = angle;
    match motion {
        Motion::Position { x, y } => {
            player.set_position(x, y, &arena);
            player.vel_x = 0.0;
            player.vel_y = 0.0;
        }
        Motion::Velocity { vx, vy } => {
            let (vx, vy) = PhysicsSystem::clamp_velocity(vx, vy, config.player_speed);
            player.vel_x = vx;
            player.vel_y = vy;
        }
    }
    IntentOutcome::Moved
}

fn apply_fire(
    store: &mut EntityStore,
    config: &GameConfig,
    player_id: &Uuid,
    now: Instant,
) -> IntentOutcome {
    let Some(player) = store.player_mut(player_id) else {
        return IntentOutcome::Stale;
    };
    if !CombatSystem::can_fire(player.last_fire, now, config.fire_cooldown) {
        return IntentOutcome::OnCooldown;
    }
    player.last_fire = Some(now);
    let (x, y, angle) = (player.x, player.y, player.angle);

    let projectile_id = store.add_projectile(
        *player_id,
        x,
        y,
        angle,
        config.projectile_speed,
        config.projectile_lifetime_steps,
    );
    IntentOutcome::Fired { projectile_id }
}

fn apply_pickup(
    store: &mut EntityStore,
    config: &GameConfig,
    player_id: &Uuid,
    pickup_id: u32,
) -> IntentOutcome {
    let Some(pickup) = store.pickup(pickup_id).cloned() else {
        return IntentOutcome::Stale;
    };
    let Some(player) = store.player_mut(player_id) else {
        return IntentOutcome::Stale;
    };
    if player.distance_to(pickup.x, pickup.y) > config.pickup_radius {
        return IntentOutcome::OutOfReach;
    }

    let healed = match pickup.kind {
        PickupKind::Health => player.heal(config.pickup_heal),
    };
    store.remove_pickup(pickup_id);
    IntentOutcome::Collected { pickup_id, healed }
}

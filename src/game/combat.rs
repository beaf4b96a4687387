//! Combat system - cooldowns and hit detection

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use super::store::{Player, Projectile};

/// Combat rules shared by input handling and the simulation step
pub struct CombatSystem;

impl CombatSystem {
    /// Check if a player can fire (cooldown check)
    pub fn can_fire(last_fire: Option<Instant>, now: Instant, cooldown: Duration) -> bool {
        match last_fire {
            Some(last) => now.saturating_duration_since(last) >= cooldown,
            None => true,
        }
    }

    /// A projectile hits a player when it is a living non-owner within `hit_radius`
    pub fn check_hit(projectile: &Projectile, target: &Player, hit_radius: f32) -> bool {
        target.alive
            && target.id != projectile.owner
            && target.distance_to(projectile.x, projectile.y) < hit_radius
    }
}

/// Hit result from combat resolution
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub projectile_id: u64,
    pub shooter_id: Uuid,
    pub target_id: Uuid,
    pub damage: i32,
}

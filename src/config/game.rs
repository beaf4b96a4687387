//! Gameplay constants for one arena

use std::time::Duration;

use crate::util::time::tick_duration;

/// Tuning shared by every room in the process
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Arena width in world units
    pub arena_width: f32,
    /// Arena height in world units
    pub arena_height: f32,

    /// Safe-zone radius at room creation
    pub zone_initial_radius: f32,
    /// Radius lost every step
    pub zone_shrink_per_step: f32,
    /// Damage per step while strictly outside the zone
    pub zone_damage: i32,

    /// Max distance a velocity-driven player covers per step
    pub player_speed: f32,
    /// Projectile displacement per step
    pub projectile_speed: f32,
    /// Damage dealt by one projectile hit
    pub projectile_damage: i32,
    /// Steps a projectile lives before expiring
    pub projectile_lifetime_steps: u32,
    /// Minimum time between two shots of the same player
    pub fire_cooldown: Duration,

    /// Full health
    pub max_health: i32,
    /// Projectile-to-player distance that counts as a hit
    pub hit_radius: f32,
    /// Player-to-pickup distance required to collect
    pub pickup_radius: f32,
    /// Health restored by a health pickup
    pub pickup_heal: i32,
    /// Pickups spawned when a room is created
    pub initial_pickups: usize,

    /// Time between elimination and respawn
    pub respawn_delay: Duration,
    /// Max offset from the arena center for respawn positions
    pub respawn_spread: f32,
    /// Distance kept from the arena edge for join spawns and loot
    pub spawn_margin: f32,

    /// Fixed simulation step interval
    pub tick_interval: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            arena_width: 3000.0,
            arena_height: 3000.0,
            zone_initial_radius: 1200.0,
            zone_shrink_per_step: 0.5,
            zone_damage: 1,
            player_speed: 5.0,
            projectile_speed: 20.0,
            projectile_damage: 20,
            projectile_lifetime_steps: 90,
            fire_cooldown: Duration::from_millis(250),
            max_health: 100,
            hit_radius: 20.0,
            pickup_radius: 40.0,
            pickup_heal: 30,
            initial_pickups: 12,
            respawn_delay: Duration::from_secs(3),
            respawn_spread: 300.0,
            spawn_margin: 100.0,
            tick_interval: tick_duration(),
        }
    }
}

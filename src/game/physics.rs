//! Player movement and zone geometry

use super::store::{Arena, SafeZone};

/// Physics helpers for player movement and the safe zone
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Clamp a requested velocity to `max_speed` magnitude
    pub fn clamp_velocity(vel_x: f32, vel_y: f32, max_speed: f32) -> (f32, f32) {
        let speed = (vel_x * vel_x + vel_y * vel_y).sqrt();
        if speed > max_speed && speed > 0.0 {
            let scale = max_speed / speed;
            (vel_x * scale, vel_y * scale)
        } else {
            (vel_x, vel_y)
        }
    }

    /// Advance a position by one step of velocity, clamped to the arena
    pub fn integrate(x: f32, y: f32, vel_x: f32, vel_y: f32, arena: &Arena) -> (f32, f32) {
        arena.clamp(x + vel_x, y + vel_y)
    }

    /// Distance from zone edge (negative = inside, positive = outside)
    pub fn zone_distance(x: f32, y: f32, zone: &SafeZone) -> f32 {
        let dx = x - zone.x;
        let dy = y - zone.y;
        (dx * dx + dy * dy).sqrt() - zone.radius
    }

    /// Strictly outside the zone
    pub fn is_outside_zone(x: f32, y: f32, zone: &SafeZone) -> bool {
        Self::zone_distance(x, y, zone) > 0.0
    }
}

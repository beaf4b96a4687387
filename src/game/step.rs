//! Fixed-rate authoritative simulation step

use std::collections::HashSet;

use uuid::Uuid;

use crate::config::GameConfig;

use super::combat::{CombatSystem, HitResult};
use super::physics::PhysicsSystem;
use super::store::EntityStore;

/// Everything a step produced that the room needs to act on
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub hits: Vec<HitResult>,
    /// Newly eliminated players with the life counter their respawn must match
    pub eliminated: Vec<(Uuid, u32)>,
    /// Projectiles reaped this step (out of bounds, expired, or hit)
    pub reaped: usize,
}

/// Advance one room by one tick
pub fn step(store: &mut EntityStore, config: &GameConfig) -> StepOutcome {
    let arena = *store.arena();

    for player in store.players_mut() {
        if player.alive && (player.vel_x != 0.0 || player.vel_y != 0.0) {
            let (x, y) =
                PhysicsSystem::integrate(player.x, player.y, player.vel_x, player.vel_y, &arena);
            player.x = x;
            player.y = y;
        }
    }

    // Integrate projectiles, then cull those out of bounds or out of time
    let mut dead: HashSet<u64> = HashSet::new();
    for projectile in store.projectiles_mut() {
        projectile.x += projectile.dir_x * projectile.speed;
        projectile.y += projectile.dir_y * projectile.speed;
        projectile.ttl = projectile.ttl.saturating_sub(1);
        if !arena.contains(projectile.x, projectile.y) || projectile.ttl == 0 {
            dead.insert(projectile.id);
        }
    }

    // At most one victim per projectile; first match in store order wins
    let mut hits = Vec::new();
    for projectile in store.projectiles() {
        if dead.contains(&projectile.id) {
            continue;
        }
        let victim = store
            .players()
            .find(|player| CombatSystem::check_hit(projectile, player, config.hit_radius));
        if let Some(victim) = victim {
            hits.push(HitResult {
                projectile_id: projectile.id,
                shooter_id: projectile.owner,
                target_id: victim.id,
                damage: config.projectile_damage,
            });
            dead.insert(projectile.id);
        }
    }
    for hit in &hits {
        if let Some(target) = store.player_mut(&hit.target_id) {
            target.damage(hit.damage);
        }
    }

    let reaped = store.remove_projectiles(|p| dead.contains(&p.id));

    store.shrink_zone(config.zone_shrink_per_step);
    let zone = *store.zone();
    for player in store.players_mut() {
        if player.alive && PhysicsSystem::is_outside_zone(player.x, player.y, &zone) {
            player.damage(config.zone_damage);
        }
    }

    let mut eliminated = Vec::new();
    for player in store.players_mut() {
        if player.alive && player.health <= 0 {
            player.alive = false;
            player.vel_x = 0.0;
            player.vel_y = 0.0;
            player.life = player.life.wrapping_add(1);
            eliminated.push((player.id, player.life));
        }
    }

    StepOutcome {
        hits,
        eliminated,
        reaped,
    }
}

/// Bring an eliminated player back, returns false when the respawn is stale
///
/// A respawn is stale when the player disconnected, is already alive, or was
/// eliminated again since it was scheduled.
pub fn apply_respawn(
    store: &mut EntityStore,
    player_id: &Uuid,
    life: u32,
    x: f32,
    y: f32,
) -> bool {
    let arena = *store.arena();
    let Some(player) = store.player_mut(player_id) else {
        return false;
    };
    if player.alive || player.life != life {
        return false;
    }

    player.set_position(x, y, &arena);
    let max_health = player.max_health;
    player.set_health(max_health);
    player.alive = true;
    player.vel_x = 0.0;
    player.vel_y = 0.0;
    true
}

//! Entity store - in-memory state of one arena
//!
//! Pure storage. The only rules enforced here are the clamping invariants:
//! player positions stay inside the arena and health stays in
//! `[0, max_health]`. Cross-entity logic lives in [`super::step`].

use std::collections::{BTreeMap, HashMap};

use tokio::time::Instant;
use uuid::Uuid;

/// Arena dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
}

impl Arena {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Clamp a point into `[0,width] x [0,height]`
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }
}

/// Authoritative player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub health: i32,
    pub max_health: i32,
    pub alive: bool,
    pub last_fire: Option<Instant>,
    pub color: String,
    /// Bumped on every elimination so stale respawns can be recognised
    pub life: u32,
}

impl Player {
    pub fn new(id: Uuid, x: f32, y: f32, max_health: i32, color: String) -> Self {
        Self {
            id,
            x,
            y,
            angle: 0.0,
            vel_x: 0.0,
            vel_y: 0.0,
            health: max_health,
            max_health,
            alive: true,
            last_fire: None,
            color,
            life: 0,
        }
    }

    /// Write a position, clamped to the arena
    pub fn set_position(&mut self, x: f32, y: f32, arena: &Arena) {
        let (x, y) = arena.clamp(x, y);
        self.x = x;
        self.y = y;
    }

    /// Write health, clamped to `[0, max_health]`
    pub fn set_health(&mut self, health: i32) {
        self.health = health.clamp(0, self.max_health);
    }

    /// Subtract damage, returns the health actually lost
    pub fn damage(&mut self, amount: i32) -> i32 {
        let before = self.health;
        self.set_health(before.saturating_sub(amount.max(0)));
        before - self.health
    }

    /// Add health up to the cap, returns the health actually gained
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.health;
        self.set_health(before.saturating_add(amount.max(0)));
        self.health - before
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Active projectile in the arena
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub owner: Uuid,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub dir_x: f32,
    pub dir_y: f32,
    pub speed: f32,
    /// Steps left before the projectile expires
    pub ttl: u32,
}

/// Pickup effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupKind {
    Health,
}

/// Collectible item lying in the arena
#[derive(Debug, Clone)]
pub struct Pickup {
    pub id: u32,
    pub kind: PickupKind,
    pub x: f32,
    pub y: f32,
}

/// Shrinking circular safe area
#[derive(Debug, Clone, Copy)]
pub struct SafeZone {
    pub x: f32,
    pub y: f32,
    /// Never floored; goes negative once the zone has fully closed
    pub radius: f32,
}

/// All entities of one room
#[derive(Debug)]
pub struct EntityStore {
    arena: Arena,
    players: HashMap<Uuid, Player>,
    projectiles: Vec<Projectile>,
    pickups: BTreeMap<u32, Pickup>,
    zone: SafeZone,
    next_projectile_id: u64,
    next_pickup_id: u32,
}

impl EntityStore {
    pub fn new(arena: Arena, zone_radius: f32) -> Self {
        let (cx, cy) = arena.center();
        Self {
            arena,
            players: HashMap::new(),
            projectiles: Vec::new(),
            pickups: BTreeMap::new(),
            zone: SafeZone {
                x: cx,
                y: cy,
                radius: zone_radius,
            },
            next_projectile_id: 1,
            next_pickup_id: 1,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    // -- players --

    /// Insert a player, clamping its position into the arena
    pub fn add_player(&mut self, mut player: Player) {
        let (x, y) = (player.x, player.y);
        player.set_position(x, y, &self.arena);
        let health = player.health;
        player.set_health(health);
        self.players.insert(player.id, player);
    }

    pub fn remove_player(&mut self, id: &Uuid) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn player(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Returns false when the player is gone
    pub fn set_player_position(&mut self, id: &Uuid, x: f32, y: f32) -> bool {
        let arena = self.arena;
        match self.players.get_mut(id) {
            Some(player) => {
                player.set_position(x, y, &arena);
                true
            }
            None => false,
        }
    }

    /// Returns false when the player is gone
    pub fn set_player_health(&mut self, id: &Uuid, health: i32) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.set_health(health);
                true
            }
            None => false,
        }
    }

    // -- projectiles --

    pub fn add_projectile(
        &mut self,
        owner: Uuid,
        x: f32,
        y: f32,
        angle: f32,
        speed: f32,
        ttl: u32,
    ) -> u64 {
        let id = self.next_projectile_id;
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
        self.projectiles.push(Projectile {
            id,
            owner,
            x,
            y,
            angle,
            dir_x: angle.cos(),
            dir_y: angle.sin(),
            speed,
            ttl,
        });
        id
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn projectiles_mut(&mut self) -> &mut [Projectile] {
        &mut self.projectiles
    }

    /// Remove every projectile matching `pred`, returns how many went
    pub fn remove_projectiles<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&Projectile) -> bool,
    {
        let before = self.projectiles.len();
        self.projectiles.retain(|p| !pred(p));
        before - self.projectiles.len()
    }

    // -- pickups --

    pub fn add_pickup(&mut self, kind: PickupKind, x: f32, y: f32) -> u32 {
        let id = self.next_pickup_id;
        self.next_pickup_id = self.next_pickup_id.wrapping_add(1);
        let (x, y) = self.arena.clamp(x, y);
        self.pickups.insert(id, Pickup { id, kind, x, y });
        id
    }

    pub fn pickup(&self, id: u32) -> Option<&Pickup> {
        self.pickups.get(&id)
    }

    pub fn remove_pickup(&mut self, id: u32) -> Option<Pickup> {
        self.pickups.remove(&id)
    }

    pub fn pickups(&self) -> impl Iterator<Item = &Pickup> {
        self.pickups.values()
    }

    pub fn pickup_count(&self) -> usize {
        self.pickups.len()
    }

    // -- safe zone --

    pub fn zone(&self) -> &SafeZone {
        &self.zone
    }

    /// Shrink the zone; negative amounts are ignored so the radius never grows
    pub fn shrink_zone(&mut self, amount: f32) {
        if amount > 0.0 {
            self.zone.radius -= amount;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EntityStore {
        EntityStore::new(Arena::new(1000.0, 800.0), 400.0)
    }

    #[test]
    fn add_player_clamps_position() {
        let mut store = store();
        let id = Uuid::new_v4();
        store.add_player(Player::new(id, -50.0, 9000.0, 100, "red".into()));

        let player = store.player(&id).unwrap();
        assert_eq!((player.x, player.y), (0.0, 800.0));
    }

    #[test]
    fn position_and_health_writes_are_clamped() {
        let mut store = store();
        let id = Uuid::new_v4();
        store.add_player(Player::new(id, 10.0, 10.0, 100, "red".into()));

        assert!(store.set_player_position(&id, 2000.0, -3.0));
        assert!(store.set_player_health(&id, 250));
        let player = store.player(&id).unwrap();
        assert_eq!((player.x, player.y), (1000.0, 0.0));
        assert_eq!(player.health, 100);

        store.set_player_health(&id, -20);
        assert_eq!(store.player(&id).unwrap().health, 0);
    }

    #[test]
    fn writes_to_removed_player_are_noops() {
        let mut store = store();
        let id = Uuid::new_v4();
        store.add_player(Player::new(id, 10.0, 10.0, 100, "red".into()));
        assert!(store.remove_player(&id).is_some());

        assert!(!store.set_player_position(&id, 1.0, 1.0));
        assert!(!store.set_player_health(&id, 1));
        assert!(store.remove_player(&id).is_none());
    }

    #[test]
    fn damage_and_heal_report_actual_change() {
        let mut player = Player::new(Uuid::new_v4(), 0.0, 0.0, 100, "red".into());
        assert_eq!(player.damage(30), 30);
        assert_eq!(player.damage(500), 70);
        assert_eq!(player.health, 0);
        assert_eq!(player.heal(150), 100);
        assert_eq!(player.heal(10), 0);
    }

    #[test]
    fn remove_projectiles_by_predicate() {
        let mut store = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.add_projectile(a, 1.0, 1.0, 0.0, 10.0, 5);
        store.add_projectile(b, 1.0, 1.0, 0.0, 10.0, 5);
        store.add_projectile(a, 1.0, 1.0, 0.0, 10.0, 5);

        assert_eq!(store.remove_projectiles(|p| p.owner == a), 2);
        assert_eq!(store.projectiles().len(), 1);
        assert_eq!(store.projectiles()[0].owner, b);
    }

    #[test]
    fn zone_is_centered_and_never_grows() {
        let mut store = store();
        assert_eq!((store.zone().x, store.zone().y), (500.0, 400.0));

        store.shrink_zone(10.0);
        store.shrink_zone(-50.0);
        assert_eq!(store.zone().radius, 390.0);
    }

    #[test]
    fn pickups_get_unique_ids() {
        let mut store = store();
        let first = store.add_pickup(PickupKind::Health, 5.0, 5.0);
        let second = store.add_pickup(PickupKind::Health, 6.0, 6.0);
        assert_ne!(first, second);

        assert!(store.remove_pickup(first).is_some());
        assert!(store.remove_pickup(first).is_none());
        assert_eq!(store.pickup_count(), 1);
    }
}

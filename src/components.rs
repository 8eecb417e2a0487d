use bevy::prelude::*;

/// Marks the player entity
#[derive(Component)]
pub struct Player;

/// Tile component for tilemap entities
#[derive(Component, Clone, Copy)]
pub struct Tile {
    pub tile_type: TileType,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum TileType {
    Empty = 0,
    Solid = 1,
    Spike = 2,
    Goal = 3,
}

impl TileType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => TileType::Solid,
            2 => TileType::Spike,
            3 => TileType::Goal,
            _ => TileType::Empty,
        }
    }

    pub fn is_solid(self) -> bool {
        self == TileType::Solid
    }
}

/// What the entity is doing. Picks the sprite; movement actions mutate it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize)]
pub enum EntityState {
    /// The entity is standing still.
    #[default]
    Standing,
    /// The entity is walking.
    Walking,
    /// The entity is jumping.
    Jumping,
}

/// Kinematic state of a simulated entity, in tile units.
///
/// `position` is the bottom-centre of the collision box.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing_right: bool,
    pub on_ground: bool,
    pub state: EntityState,
    pub alive: bool,
}

impl Body {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            velocity: Vec2::ZERO,
            facing_right: true,
            on_ground: false,
            state: EntityState::Standing,
            alive: true,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

/// Movement intents for the current tick. Written by input, read by physics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

/// Whether the app runs without a window
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// Physics constants (as a resource so they can be tuned)
#[derive(Resource, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Signed vertical acceleration in tiles/s².
    pub gravity: f32,
    pub jump_velocity: f32,
    pub max_velocity: f32,
    pub max_fall_speed: f32,
    /// Horizontal velocity multiplier applied once per tick.
    pub damping: f32,
    pub stop_threshold: f32,
    /// Bodies below this y die.
    pub death_y: f32,
    pub body_width: f32,
    pub body_height: f32,
    /// Pixels per tile, for rendering only.
    pub tile_size: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -30.0,
            jump_velocity: 12.0,
            max_velocity: 6.0,
            max_fall_speed: 30.0,
            damping: 0.87,
            stop_threshold: 1.0,
            death_y: -5.0,
            body_width: 0.75,
            body_height: 0.9,
            tile_size: 16.0,
        }
    }
}

impl PhysicsConfig {
    pub fn gravity_magnitude(&self) -> f32 {
        self.gravity.abs().max(0.0001)
    }

    /// Highest a jump from flat ground can lift the feet, in tiles.
    pub fn max_jump_height(&self) -> f32 {
        (self.jump_velocity * self.jump_velocity) / (2.0 * self.gravity_magnitude())
    }

    /// Horizontal distance covered at full speed while airborne on flat ground.
    pub fn max_jump_distance(&self) -> f32 {
        2.0 * self.jump_velocity / self.gravity_magnitude() * self.max_velocity
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.gravity >= 0.0 {
            return Err(format!("gravity must be negative, got {}", self.gravity));
        }
        if self.jump_velocity <= 0.0 || self.max_velocity <= 0.0 {
            return Err("jump_velocity and max_velocity must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(format!("damping must be within 0..=1, got {}", self.damping));
        }
        if self.body_width <= 0.0 || self.body_width >= 1.0 {
            return Err(format!(
                "body_width must be within (0, 1) tiles, got {}",
                self.body_width
            ));
        }
        if self.body_height <= 0.0 || self.tile_size <= 0.0 {
            return Err("body_height and tile_size must be positive".to_string());
        }
        Ok(())
    }
}

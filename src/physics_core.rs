use bevy::math::Vec2;

use crate::components::{Body, EntityState, MoveIntent, PhysicsConfig, TileType};
use crate::tilemap::TileQuery;

/// Inset used when probing tile edges so a body flush against a tile face
/// does not read the neighbouring tile.
const PROBE_INSET: f32 = 0.05;
/// Gap left between a body and the wall it was pushed out of.
const WALL_GAP: f32 = 0.001;
/// Longest distance, in tiles, a body may travel on one axis per substep.
/// Below one tile, so collision probes never skip a row or column.
const MAX_STEP: f32 = 0.5;
/// Bounds the work done for absurdly long ticks.
const MAX_SUBSTEPS: u32 = 1024;

#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    /// Box standing on `(x, y)`, the bottom-centre of the body.
    pub fn from_feet(x: f32, y: f32, width: f32, height: f32) -> Self {
        let hw = width / 2.0;
        Self {
            min_x: x - hw,
            min_y: y,
            max_x: x + hw,
            max_y: y + height,
        }
    }
}

pub fn horizontal_velocity(left: bool, right: bool, speed: f32) -> f32 {
    let mut dir = 0.0;
    if left {
        dir -= 1.0;
    }
    if right {
        dir += 1.0;
    }
    dir * speed
}

/// Substeps needed so neither axis moves more than `MAX_STEP` per step.
fn substeps(velocity: Vec2, dt: f32, config: &PhysicsConfig) -> u32 {
    let fall = (velocity.y.abs() + config.gravity.abs() * dt).min(
        velocity.y.abs().max(config.max_fall_speed),
    );
    let speed = velocity.x.abs().max(fall);
    let steps = (speed * dt.abs() / MAX_STEP).ceil();
    if steps.is_finite() {
        (steps as u32).clamp(1, MAX_SUBSTEPS)
    } else {
        MAX_SUBSTEPS
    }
}

pub fn apply_gravity(vy: &mut f32, gravity: f32, max_fall_speed: f32, dt: f32) {
    *vy += gravity * dt;
    *vy = vy.max(-max_fall_speed);
}

/// Whether the body's box overlaps any tile of type `target`.
pub fn overlaps_tile(
    body: &Body,
    map: &impl TileQuery,
    config: &PhysicsConfig,
    target: TileType,
) -> bool {
    let aabb = Aabb::from_feet(
        body.position.x,
        body.position.y,
        config.body_width,
        config.body_height,
    );
    let min_tx = (aabb.min_x + 0.01).floor() as i32;
    let max_tx = (aabb.max_x - 0.01).floor() as i32;
    let min_ty = (aabb.min_y + 0.01).floor() as i32;
    let max_ty = (aabb.max_y - 0.01).floor() as i32;

    for ty in min_ty..=max_ty {
        for tx in min_tx..=max_tx {
            if map.tile_at(tx as f32 + 0.5, ty as f32 + 0.5) == target {
                return true;
            }
        }
    }
    false
}

impl Body {
    pub fn move_left(&mut self, config: &PhysicsConfig) {
        self.velocity.x = -config.max_velocity;
        if self.on_ground {
            self.state = EntityState::Walking;
        }
        self.facing_right = false;
    }

    pub fn move_right(&mut self, config: &PhysicsConfig) {
        self.velocity.x = config.max_velocity;
        if self.on_ground {
            self.state = EntityState::Walking;
        }
        self.facing_right = true;
    }

    /// Returns whether the jump happened. Airborne bodies cannot jump.
    pub fn jump(&mut self, config: &PhysicsConfig) -> bool {
        if !self.on_ground {
            return false;
        }
        self.velocity.y = config.jump_velocity;
        self.state = EntityState::Jumping;
        self.on_ground = false;
        true
    }

    /// Resolve this tick's intents into velocity and state changes.
    pub fn apply_intents(&mut self, intents: MoveIntent, config: &PhysicsConfig) {
        if !self.alive {
            return;
        }
        match horizontal_velocity(intents.left, intents.right, 1.0) {
            dir if dir < 0.0 => self.move_left(config),
            dir if dir > 0.0 => self.move_right(config),
            _ => {}
        }
        if intents.jump {
            self.jump(config);
        }
    }

    /// Intents then physics, as one simulation step.
    pub fn tick(
        &mut self,
        dt: f32,
        intents: MoveIntent,
        map: &impl TileQuery,
        config: &PhysicsConfig,
    ) {
        if dt == 0.0 || !self.alive {
            return;
        }
        self.apply_intents(intents, config);
        self.update(dt, map, config);
    }

    /// Advance the body by `dt` seconds against `map`.
    ///
    /// A zero `dt` is a no-op. Updating a dead body is a caller error and is
    /// ignored. Long ticks are integrated in substeps short enough that the
    /// body never moves more than `MAX_STEP` tiles at once.
    pub fn update(&mut self, dt: f32, map: &impl TileQuery, config: &PhysicsConfig) {
        if dt == 0.0 || !self.alive {
            return;
        }

        let steps = substeps(self.velocity, dt, config);
        let step_dt = dt / steps as f32;
        for _ in 0..steps {
            apply_gravity(
                &mut self.velocity.y,
                config.gravity,
                config.max_fall_speed,
                step_dt,
            );
            self.resolve_horizontal(step_dt, map, config);
            self.resolve_vertical(step_dt, map, config);
        }

        if self.on_ground && self.state == EntityState::Jumping {
            self.state = if self.velocity.x != 0.0 {
                EntityState::Walking
            } else {
                EntityState::Standing
            };
        }

        self.velocity.x *= config.damping;
        if self.velocity.x.abs() < config.stop_threshold {
            self.velocity.x = 0.0;
            if self.on_ground {
                self.state = EntityState::Standing;
            }
        }

        if self.position.y < config.death_y {
            self.alive = false;
        }
    }

    fn resolve_horizontal(&mut self, dt: f32, map: &impl TileQuery, config: &PhysicsConfig) {
        let dx = self.velocity.x * dt;
        if dx == 0.0 {
            return;
        }
        let new_x = self.position.x + dx;
        let aabb = Aabb::from_feet(
            new_x,
            self.position.y,
            config.body_width,
            config.body_height,
        );
        let edge = if dx > 0.0 { aabb.max_x } else { aabb.min_x };
        let probes = [
            aabb.min_y + PROBE_INSET,
            (aabb.min_y + aabb.max_y) / 2.0,
            aabb.max_y - PROBE_INSET,
        ];
        if probes.iter().any(|&py| map.is_solid_at(edge, py)) {
            let half = config.body_width / 2.0;
            self.position.x = if dx > 0.0 {
                edge.floor() - half - WALL_GAP
            } else {
                edge.floor() + 1.0 + half + WALL_GAP
            };
            self.velocity.x = 0.0;
        } else {
            self.position.x = new_x;
        }
    }

    fn resolve_vertical(&mut self, dt: f32, map: &impl TileQuery, config: &PhysicsConfig) {
        let new_y = self.position.y + self.velocity.y * dt;
        let aabb = Aabb::from_feet(
            self.position.x,
            new_y,
            config.body_width,
            config.body_height,
        );
        let left = aabb.min_x + PROBE_INSET;
        let right = aabb.max_x - PROBE_INSET;

        if self.velocity.y <= 0.0 {
            if map.is_solid_at(left, new_y) || map.is_solid_at(right, new_y) {
                self.position.y = new_y.floor() + 1.0;
                self.velocity.y = 0.0;
                self.on_ground = true;
                return;
            }
        } else if map.is_solid_at(left, aabb.max_y) || map.is_solid_at(right, aabb.max_y) {
            self.position.y = aabb.max_y.floor() - config.body_height;
            self.velocity.y = 0.0;
            self.on_ground = false;
            return;
        }

        self.position.y = new_y;
        self.on_ground = false;
    }
}

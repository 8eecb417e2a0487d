use crate::components::{PhysicsConfig, TileType};
use crate::tilemap::Tilemap;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};
use serde::Serialize;

/// Number of level packs shown on the level select.
pub const LEVEL_PACKS: u32 = 2;
/// Levels per pack; ids continue across packs.
pub const LEVELS_PER_PACK: u32 = 6;

const LEVEL_HEIGHT: usize = 14;
const START_RUN: usize = 5;
const FINISH_RUN: usize = 6;
const PLATFORM_ATTEMPTS: u32 = 8;
const PLATFORM_GAP_CLEARANCE: usize = 6;

pub fn level_count() -> u32 {
    LEVEL_PACKS * LEVELS_PER_PACK
}

/// Zero-based pack a level id belongs to.
pub fn pack_of(level_id: u32) -> u32 {
    level_id.saturating_sub(1) / LEVELS_PER_PACK
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DifficultyMetrics {
    pub required_jumps: u32,
    pub max_gap: u32,
    pub spike_count: u32,
    pub platforms: u32,
}

struct Rng(SmallRng);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    fn float(&mut self) -> f32 {
        self.0.gen()
    }

    /// Inclusive on both ends.
    fn range(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        self.0.gen_range(min..=max)
    }
}

fn difficulty_for(level_id: u32) -> f32 {
    let last = level_count().saturating_sub(1).max(1);
    (level_id.saturating_sub(1) as f32 / last as f32).clamp(0.0, 1.0)
}

/// Widest gap a running jump clears with a tile of margin.
fn max_gap_for(physics: &PhysicsConfig) -> u32 {
    (physics.max_jump_distance().floor() as u32).saturating_sub(1).max(2)
}

/// Highest row whose top a standing jump from the floor can reach.
fn max_platform_row(physics: &PhysicsConfig) -> usize {
    ((1.0 + physics.max_jump_height()).floor() as usize)
        .saturating_sub(1)
        .max(2)
}

/// Deterministic layout for `level_id`; later levels are longer and harder.
pub fn generate_level(level_id: u32, physics: &PhysicsConfig) -> (Tilemap, DifficultyMetrics) {
    let difficulty = difficulty_for(level_id);
    let width = 48 + 6 * level_id.min(level_count()) as usize;
    let height = LEVEL_HEIGHT;
    let mut rng = Rng::new(0x1ed6_e000 ^ u64::from(level_id));
    let mut metrics = DifficultyMetrics::default();

    let mut tiles = vec![TileType::Empty as u8; width * height];

    let gap_chance = 0.08 + difficulty * 0.2;
    let spike_chance = difficulty * 0.5;
    let max_gap = 2 + (difficulty * (max_gap_for(physics) - 2) as f32).round() as u32;

    // Floor with gaps; start and finish runs stay solid.
    let mut gaps: Vec<(usize, usize)> = Vec::new();
    let mut x = 0usize;
    while x < width {
        let in_middle = x >= START_RUN && x + FINISH_RUN + 1 < width;
        if in_middle && rng.float() < gap_chance {
            let room = (width - FINISH_RUN - 1 - x) as u32;
            let gap_width = rng.range(2, max_gap.min(room)) as usize;
            metrics.max_gap = metrics.max_gap.max(gap_width as u32);
            metrics.required_jumps += 1;
            gaps.push((x, x + gap_width));

            if rng.float() < spike_chance {
                for tile in tiles.iter_mut().skip(x).take(gap_width) {
                    *tile = TileType::Spike as u8;
                    metrics.spike_count += 1;
                }
            }
            // Solid landing after every gap.
            x += gap_width;
            for tile in tiles.iter_mut().skip(x).take(2) {
                *tile = TileType::Solid as u8;
            }
            x += 2;
        } else {
            tiles[x] = TileType::Solid as u8;
            x += 1;
        }
    }

    // Floating platforms, kept clear of gaps so they never cut a jump short.
    let top_row = max_platform_row(physics).min(height - 2);
    let num_platforms = 2 + (difficulty * 6.0).round() as u32;
    for _ in 0..num_platforms {
        let pw = rng.range(2, 4) as usize;
        let max_px = (width - FINISH_RUN - 1 - pw) as u32;
        let placement = (0..PLATFORM_ATTEMPTS)
            .map(|_| rng.range(START_RUN as u32, max_px) as usize)
            .find(|&px| {
                gaps.iter().all(|&(start, end)| {
                    px + pw + PLATFORM_GAP_CLEARANCE <= start
                        || px >= end + PLATFORM_GAP_CLEARANCE
                })
            });
        let Some(px) = placement else {
            continue;
        };
        let py = rng.range(2, top_row as u32) as usize;
        for dx in 0..pw {
            tiles[py * width + px + dx] = TileType::Solid as u8;
        }
        metrics.platforms += 1;
    }

    let goal_x = (width - 3) as i32;
    let goal_y = 1i32;
    tiles[goal_y as usize * width + goal_x as usize] = TileType::Goal as u8;

    let tilemap = Tilemap {
        width,
        height,
        tiles,
        player_spawn: (2.5, 1.0),
        goal: Some((goal_x, goal_y)),
        bottom: 0.0,
        end: width as f32,
    };
    (tilemap, metrics)
}

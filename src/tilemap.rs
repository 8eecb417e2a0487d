use crate::components::*;
use bevy::prelude::*;

pub struct TilemapPlugin;

impl Plugin for TilemapPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Tilemap>()
            .add_systems(Update, rebuild_tile_sprites);
    }
}

/// Read-only tile geometry as seen by physics. One world unit is one tile.
pub trait TileQuery {
    fn tile_at(&self, world_x: f32, world_y: f32) -> TileType;

    fn width_in_tiles(&self) -> usize;

    /// Out-of-range coordinates are never solid.
    fn is_solid_at(&self, world_x: f32, world_y: f32) -> bool {
        self.tile_at(world_x, world_y).is_solid()
    }
}

#[derive(Resource, Clone, Debug, serde::Serialize, serde::Deserialize, Default)]
pub struct Tilemap {
    pub width: usize,
    pub height: usize,
    /// Row-major, row 0 at the bottom.
    pub tiles: Vec<u8>,
    pub player_spawn: (f32, f32),
    pub goal: Option<(i32, i32)>,
    /// Camera y anchor.
    #[serde(default)]
    pub bottom: f32,
    /// Where the playable area stops, in tiles from the left edge.
    #[serde(default)]
    pub end: f32,
}

impl Tilemap {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get_tile(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width() as i32 || y >= self.height() as i32 {
            return TileType::Empty as u8;
        }
        self.tiles
            .get(y as usize * self.width() + x as usize)
            .copied()
            .unwrap_or(TileType::Empty as u8)
    }

    pub fn get(&self, x: i32, y: i32) -> TileType {
        TileType::from_u8(self.get_tile(x, y))
    }

    pub fn set(&mut self, x: i32, y: i32, tile: TileType) {
        if x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32 {
            self.tiles[y as usize * self.width + x as usize] = tile as u8;
        }
    }

    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        self.get(x, y).is_solid()
    }

    /// Playable end, falling back to the full width when unset.
    pub fn map_end(&self) -> f32 {
        if self.end > 0.0 {
            self.end
        } else {
            self.width_in_tiles() as f32
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("tilemap must have non-zero dimensions".to_string());
        }
        if self.tiles.len() != self.width * self.height {
            return Err(format!(
                "tilemap has {} tiles, expected {}x{}={}",
                self.tiles.len(),
                self.width,
                self.height,
                self.width * self.height
            ));
        }
        Ok(())
    }
}

impl TileQuery for Tilemap {
    fn tile_at(&self, world_x: f32, world_y: f32) -> TileType {
        if !world_x.is_finite() || !world_y.is_finite() {
            return TileType::Empty;
        }
        self.get(world_x.floor() as i32, world_y.floor() as i32)
    }

    fn width_in_tiles(&self) -> usize {
        self.width
    }
}

/// Marker for tile visual entities (so we can despawn them when reloading)
#[derive(Component)]
pub struct TileEntity;

pub fn tile_color_sprite(tile_type: TileType, ts: f32) -> Sprite {
    let color = match tile_type {
        TileType::Solid => Color::srgb(0.4, 0.4, 0.45),
        TileType::Spike => Color::srgb(0.9, 0.15, 0.15),
        TileType::Goal => Color::srgb(0.95, 0.8, 0.2),
        TileType::Empty => Color::srgb(0.5, 0.5, 0.5),
    };
    Sprite::from_color(color, Vec2::new(ts, ts))
}

fn rebuild_tile_sprites(
    mut commands: Commands,
    tilemap: Res<Tilemap>,
    physics: Res<PhysicsConfig>,
    headless: Res<HeadlessMode>,
    existing: Query<Entity, With<TileEntity>>,
) {
    if headless.0 || !tilemap.is_changed() {
        return;
    }
    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }

    let ts = physics.tile_size;
    for y in 0..tilemap.height {
        for x in 0..tilemap.width {
            let tile_type = tilemap.get(x as i32, y as i32);
            if tile_type == TileType::Empty {
                continue;
            }
            commands.spawn((
                TileEntity,
                Tile { tile_type },
                tile_color_sprite(tile_type, ts),
                Transform::from_xyz((x as f32 + 0.5) * ts, (y as f32 + 0.5) * ts, 0.0),
            ));
        }
    }
}

#[cfg(test)]
pub(crate) fn tilemap_from_rows(rows: &[&str]) -> Tilemap {
    // Rows are given top-down, like a picture of the level.
    let height = rows.len();
    let width = rows.first().map_or(0, |r| r.len());
    let mut tilemap = Tilemap {
        width,
        height,
        tiles: vec![0; width * height],
        ..Default::default()
    };
    for (row_idx, row) in rows.iter().enumerate() {
        let y = (height - 1 - row_idx) as i32;
        for (x, ch) in row.chars().enumerate() {
            let tile = match ch {
                '#' => TileType::Solid,
                '^' => TileType::Spike,
                'G' => TileType::Goal,
                _ => TileType::Empty,
            };
            tilemap.set(x as i32, y, tile);
        }
    }
    tilemap.end = width as f32;
    tilemap
}

use bevy::prelude::*;
use bevy::render::camera::ScalingMode;

use crate::components::{Body, HeadlessMode, PhysicsConfig, Player};
use crate::level::ActiveLevel;
use crate::tilemap::Tilemap;

/// Camera framing, in tiles.
#[derive(Resource, Clone, Debug)]
pub struct CameraConfig {
    /// Half the visible width.
    pub half_view: f32,
    /// Half the visible height at the default 16:9 window.
    pub half_view_height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            half_view: 8.0,
            half_view_height: 4.5,
        }
    }
}

#[derive(Component)]
pub struct MainCamera;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraConfig>()
            .add_systems(Startup, spawn_camera)
            .add_systems(PostUpdate, camera_follow.before(TransformSystem::TransformPropagate));
    }
}

/// Follow `target_x`, keeping the view inside `[0, map_end]`.
///
/// The lower clamp is applied first, so on a map narrower than the view the
/// upper clamp wins.
pub fn follow_x(target_x: f32, map_end: f32, half_view: f32) -> f32 {
    let mut x = target_x;
    if x < half_view {
        x = half_view;
    }
    if x > map_end - half_view {
        x = map_end - half_view;
    }
    x
}

/// The camera does not track vertical motion.
pub fn camera_y(spawn_y: f32, bottom: f32, half_view_height: f32) -> f32 {
    (spawn_y + 0.5).max(bottom + half_view_height)
}

fn spawn_camera(
    mut commands: Commands,
    headless: Res<HeadlessMode>,
    config: Res<CameraConfig>,
    physics: Res<PhysicsConfig>,
) {
    if headless.0 {
        return;
    }
    commands.spawn((
        MainCamera,
        Camera2d,
        OrthographicProjection {
            scaling_mode: ScalingMode::FixedHorizontal {
                viewport_width: config.half_view * 2.0 * physics.tile_size,
            },
            ..OrthographicProjection::default_2d()
        },
        Transform::from_xyz(0.0, 0.0, 100.0),
    ));
}

fn camera_follow(
    config: Res<CameraConfig>,
    physics: Res<PhysicsConfig>,
    tilemap: Res<Tilemap>,
    active: Res<ActiveLevel>,
    player_query: Query<&Body, With<Player>>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let Ok(mut cam_transform) = camera_query.get_single_mut() else {
        return;
    };
    let Ok(body) = player_query.get_single() else {
        return;
    };

    let ts = physics.tile_size;
    let x = follow_x(body.position.x, tilemap.map_end(), config.half_view);
    let y = camera_y(active.spawn.y, tilemap.bottom, config.half_view_height);
    cam_transform.translation.x = x * ts;
    cam_transform.translation.y = y * ts;
}

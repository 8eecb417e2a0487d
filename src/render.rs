use crate::components::*;
use bevy::prelude::*;

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, sync_body_to_transform);
    }
}

/// Body position is the feet in tiles; sprites are centred, in pixels.
fn sync_body_to_transform(
    config: Res<PhysicsConfig>,
    mut query: Query<(&Body, &mut Transform), Changed<Body>>,
) {
    let ts = config.tile_size;
    for (body, mut transform) in query.iter_mut() {
        transform.translation.x = body.position.x * ts;
        transform.translation.y = (body.position.y + config.body_height / 2.0) * ts;
    }
}

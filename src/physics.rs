use bevy::prelude::*;

use crate::components::*;
use crate::game_runtime::GameSet;
use crate::input::VirtualInput;
use crate::tilemap::Tilemap;

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(FixedUpdate, step_player.in_set(GameSet::Physics));
    }
}

fn step_player(
    time: Res<Time<Fixed>>,
    config: Res<PhysicsConfig>,
    tilemap: Res<Tilemap>,
    input: Option<Res<VirtualInput>>,
    mut query: Query<&mut Body, With<Player>>,
) {
    let dt = time.delta_secs();
    let intents = input.map(|i| i.move_intent()).unwrap_or_default();
    for mut body in query.iter_mut() {
        let was_jumping = body.state == EntityState::Jumping;
        body.tick(dt, intents, tilemap.as_ref(), &config);
        if !was_jumping && body.state == EntityState::Jumping {
            debug!("[ledgehop physics] jump from x={:.2}", body.position.x);
        }
    }
}

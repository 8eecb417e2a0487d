use crate::components::*;
use crate::tilemap::Tilemap;
use bevy::prelude::*;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_player)
            .add_systems(Update, update_player_sprite);
    }
}

fn spawn_player(
    mut commands: Commands,
    tilemap: Res<Tilemap>,
    config: Res<PhysicsConfig>,
    headless: Res<HeadlessMode>,
) {
    let (sx, sy) = tilemap.player_spawn;
    let ts = config.tile_size;

    let mut entity = commands.spawn((
        Player,
        Body::at(sx, sy),
        Transform::from_xyz(sx * ts, (sy + config.body_height / 2.0) * ts, 10.0),
    ));

    if !headless.0 {
        entity.insert(Sprite::from_color(
            state_color(EntityState::Standing),
            Vec2::new(config.body_width * ts, config.body_height * ts),
        ));
    }
}

fn state_color(state: EntityState) -> Color {
    match state {
        EntityState::Standing => Color::srgb(0.2, 0.4, 0.9),
        EntityState::Walking => Color::srgb(0.25, 0.55, 0.95),
        EntityState::Jumping => Color::srgb(0.45, 0.7, 1.0),
    }
}

fn update_player_sprite(mut query: Query<(&Body, &mut Sprite), (With<Player>, Changed<Body>)>) {
    for (body, mut sprite) in query.iter_mut() {
        sprite.flip_x = !body.facing_right;
        sprite.color = state_color(body.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_spawns_at_tilemap_spawn() {
        let mut app = App::new();
        let mut tilemap = Tilemap::default();
        tilemap.player_spawn = (3.5, 2.0);
        app.insert_resource(tilemap)
            .insert_resource(PhysicsConfig::default())
            .insert_resource(HeadlessMode(true))
            .add_plugins(PlayerPlugin);

        app.update();

        let mut query = app.world_mut().query_filtered::<(&Body, Option<&Sprite>), With<Player>>();
        let (body, sprite) = query.single(app.world());
        assert_eq!(body.position, Vec2::new(3.5, 2.0));
        assert!(sprite.is_none());
    }
}

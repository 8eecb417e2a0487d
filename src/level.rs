//! Drives the active level: startup progress loading, level switching,
//! per-tick rules (spikes, death, bounds, goal) and the level-select gate.

use bevy::prelude::*;
use thiserror::Error;

use crate::components::*;
use crate::events::{GameEventBus, GameEventKind};
use crate::game_runtime::{FlowState, GameSet};
use crate::generation::{generate_level, pack_of};
use crate::input::{Action, VirtualInput};
use crate::physics_core::overlaps_tile;
use crate::progress::{LevelId, LevelProgressStore};
use crate::tilemap::Tilemap;

/// Level requested at startup. Falls back to the first unlocked level.
#[derive(Resource, Clone, Copy, Debug)]
pub struct StartLevel(pub LevelId);

impl Default for StartLevel {
    fn default() -> Self {
        Self(1)
    }
}

#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct ActiveLevel {
    /// 0 until the first level has been entered.
    pub id: LevelId,
    pub spawn: Vec2,
}

/// Level to switch to on the next frame.
#[derive(Resource, Default, Debug)]
pub struct PendingLevelChange(pub Option<LevelId>);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelSelectError {
    #[error("level {0} does not exist")]
    Unknown(LevelId),
    #[error("level {0} is locked")]
    Locked(LevelId),
}

/// Navigation gate: only registered, unlocked levels can be entered.
pub fn select_level(store: &LevelProgressStore, id: LevelId) -> Result<LevelId, LevelSelectError> {
    if !store.is_level(id) {
        return Err(LevelSelectError::Unknown(id));
    }
    if !store.is_unlocked(id) {
        return Err(LevelSelectError::Locked(id));
    }
    Ok(id)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
    Continue,
    Died,
    ReachedGoal,
}

/// Spike contact, death, horizontal bounds and goal contact for one tick.
pub fn apply_rules(body: &mut Body, map: &Tilemap, config: &PhysicsConfig) -> RuleOutcome {
    if body.alive && overlaps_tile(body, map, config, TileType::Spike) {
        body.alive = false;
    }
    if !body.alive {
        return RuleOutcome::Died;
    }

    let max_x = (map.map_end() - 1.0).max(0.5);
    if body.position.x < 0.5 {
        body.position.x = 0.5;
        body.velocity.x = body.velocity.x.max(0.0);
    } else if body.position.x > max_x {
        body.position.x = max_x;
        body.velocity.x = body.velocity.x.min(0.0);
    }

    if overlaps_tile(body, map, config, TileType::Goal) {
        RuleOutcome::ReachedGoal
    } else {
        RuleOutcome::Continue
    }
}

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StartLevel>()
            .init_resource::<ActiveLevel>()
            .init_resource::<PendingLevelChange>()
            .add_systems(Startup, init_progress)
            .add_systems(Update, (navigate_levels, apply_level_change).chain())
            .add_systems(FixedUpdate, run_level_rules.in_set(GameSet::Rules));
    }
}

fn init_progress(
    mut store: ResMut<LevelProgressStore>,
    start: Res<StartLevel>,
    mut pending: ResMut<PendingLevelChange>,
    mut flow: ResMut<FlowState>,
) {
    for err in store.load_all() {
        error!("[ledgehop level] {err}");
    }
    let ids: Vec<LevelId> = store.level_ids().collect();

    if let Some(&first) = ids.first() {
        if store.is_loaded(first) && !store.is_unlocked(first) {
            let unlocked = store.unlock(first).and_then(|_| store.save(first));
            if let Err(err) = unlocked {
                error!("[ledgehop level] Could not unlock level {first}: {err}");
            }
        }
    }

    let chosen = match select_level(&store, start.0) {
        Ok(id) => Some(id),
        Err(err) => {
            warn!("[ledgehop level] Start level rejected: {err}");
            ids.iter().copied().find(|id| store.is_unlocked(*id))
        }
    };
    match chosen {
        Some(id) => pending.0 = Some(id),
        None => {
            error!("[ledgehop level] No playable level; waiting in level select");
            *flow = FlowState::LevelSelect;
        }
    }
}

fn navigate_levels(
    input: Res<VirtualInput>,
    store: Res<LevelProgressStore>,
    active: Res<ActiveLevel>,
    flow: Res<FlowState>,
    mut pending: ResMut<PendingLevelChange>,
    mut bus: ResMut<GameEventBus>,
) {
    if *flow == FlowState::Paused {
        return;
    }
    let requested = if let Some(id) = input.selected_level() {
        Some(id)
    } else if input.just_pressed(Action::NextLevel) {
        store.next_level(active.id)
    } else if input.just_pressed(Action::PrevLevel) {
        store.level_ids().take_while(|id| *id < active.id).last()
    } else {
        None
    };
    let Some(id) = requested else {
        return;
    };

    match select_level(&store, id) {
        Ok(id) => {
            info!("[ledgehop level] Selected level {id}");
            bus.emit(GameEventKind::LevelSelected { level: id });
            pending.0 = Some(id);
        }
        Err(err @ LevelSelectError::Locked(level)) => {
            warn!("[ledgehop level] {err}");
            bus.emit(GameEventKind::LevelLocked { level });
        }
        Err(err) => warn!("[ledgehop level] {err}"),
    }
}

fn apply_level_change(
    mut pending: ResMut<PendingLevelChange>,
    physics: Res<PhysicsConfig>,
    mut tilemap: ResMut<Tilemap>,
    mut active: ResMut<ActiveLevel>,
    mut flow: ResMut<FlowState>,
    mut bus: ResMut<GameEventBus>,
    mut players: Query<&mut Body, With<Player>>,
) {
    let Some(id) = pending.0.take() else {
        return;
    };

    let (map, metrics) = generate_level(id, &physics);
    let spawn = Vec2::new(map.player_spawn.0, map.player_spawn.1);
    *tilemap = map;
    *active = ActiveLevel { id, spawn };
    for mut body in players.iter_mut() {
        *body = Body::at(spawn.x, spawn.y);
    }
    *flow = FlowState::Playing;

    info!(
        "[ledgehop level] Entered level {} (pack {}, {} tiles, {} gaps)",
        id,
        pack_of(id),
        tilemap.width,
        metrics.required_jumps
    );
    bus.emit(GameEventKind::LevelStarted { level: id });
}

#[allow(clippy::too_many_arguments)]
fn run_level_rules(
    time: Res<Time<Fixed>>,
    physics: Res<PhysicsConfig>,
    tilemap: Res<Tilemap>,
    active: Res<ActiveLevel>,
    mut store: ResMut<LevelProgressStore>,
    mut pending: ResMut<PendingLevelChange>,
    mut flow: ResMut<FlowState>,
    mut bus: ResMut<GameEventBus>,
    mut players: Query<&mut Body, With<Player>>,
) {
    if time.delta_secs() == 0.0 || active.id == 0 || pending.0.is_some() {
        return;
    }

    for mut body in players.iter_mut() {
        match apply_rules(&mut body, &tilemap, &physics) {
            RuleOutcome::Continue => {}
            RuleOutcome::Died => {
                info!("[ledgehop level] Player died on level {}", active.id);
                bus.emit(GameEventKind::PlayerDied { level: active.id });
                *body = Body::at(active.spawn.x, active.spawn.y);
            }
            RuleOutcome::ReachedGoal => {
                let unlocked = match store.complete_level(active.id) {
                    Ok(unlocked) => unlocked,
                    Err(err) => {
                        error!("[ledgehop level] {err}");
                        None
                    }
                };
                info!("[ledgehop level] Completed level {}", active.id);
                bus.emit(GameEventKind::LevelCompleted {
                    level: active.id,
                    unlocked,
                });
                match store.next_level(active.id) {
                    Some(next) if store.is_unlocked(next) => pending.0 = Some(next),
                    _ => *flow = FlowState::LevelSelect,
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::tilemap_from_rows;
    use bevy::ecs::system::RunSystemOnce;
    use std::path::Path;
    use std::time::Duration;

    fn level_app(dir: &Path) -> App {
        let mut app = App::new();
        let mut fixed = Time::<Fixed>::from_hz(60.0);
        fixed.advance_by(Duration::from_secs_f64(1.0 / 60.0));
        app.insert_resource(fixed)
            .insert_resource(LevelProgressStore::with_levels(dir, 1..=3))
            .insert_resource(PhysicsConfig::default())
            .init_resource::<Tilemap>()
            .init_resource::<FlowState>()
            .insert_resource(GameEventBus::default())
            .insert_resource(VirtualInput::default())
            .add_plugins(LevelPlugin);
        app.world_mut().spawn((Player, Body::default()));
        app
    }

    fn player_body(app: &mut App) -> Body {
        let mut query = app.world_mut().query_filtered::<&Body, With<Player>>();
        *query.single(app.world())
    }

    fn set_player(app: &mut App, body: Body) {
        let mut query = app.world_mut().query_filtered::<&mut Body, With<Player>>();
        *query.single_mut(app.world_mut()) = body;
    }

    fn event_kinds(app: &App) -> Vec<GameEventKind> {
        app.world()
            .resource::<GameEventBus>()
            .recent
            .iter()
            .map(|ev| ev.kind)
            .collect()
    }

    #[test]
    fn rules_clamp_to_map_bounds() {
        let map = tilemap_from_rows(&["......", "######"]);
        let config = PhysicsConfig::default();

        let mut body = Body::at(-0.3, 1.0);
        body.velocity.x = -6.0;
        assert_eq!(apply_rules(&mut body, &map, &config), RuleOutcome::Continue);
        assert_eq!(body.position.x, 0.5);
        assert_eq!(body.velocity.x, 0.0);

        let mut body = Body::at(9.0, 1.0);
        apply_rules(&mut body, &map, &config);
        assert_eq!(body.position.x, 5.0);
    }

    #[test]
    fn spikes_kill_and_goal_is_detected() {
        let map = tilemap_from_rows(&["......", ".^..G.", "######"]);
        let config = PhysicsConfig::default();

        let mut body = Body::at(1.5, 1.0);
        assert_eq!(apply_rules(&mut body, &map, &config), RuleOutcome::Died);
        assert!(!body.alive);

        let mut body = Body::at(4.5, 1.0);
        assert_eq!(apply_rules(&mut body, &map, &config), RuleOutcome::ReachedGoal);
    }

    #[test]
    fn select_level_gates_locked_and_unknown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = LevelProgressStore::with_levels(dir.path(), 1..=3);
        assert!(store.load_all().is_empty());
        store.unlock(1).expect("unlock");

        assert_eq!(select_level(&store, 1), Ok(1));
        assert_eq!(select_level(&store, 2), Err(LevelSelectError::Locked(2)));
        assert_eq!(select_level(&store, 9), Err(LevelSelectError::Unknown(9)));
    }

    #[test]
    fn startup_unlocks_first_level_and_enters_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = level_app(dir.path());
        app.update();

        let active = *app.world().resource::<ActiveLevel>();
        assert_eq!(active.id, 1);
        assert_eq!(player_body(&mut app), Body::at(active.spawn.x, active.spawn.y));
        assert!(app.world().resource::<Tilemap>().width > 0);
        assert!(event_kinds(&app).contains(&GameEventKind::LevelStarted { level: 1 }));

        let mut reopened = LevelProgressStore::with_levels(dir.path(), 1..=3);
        assert!(reopened.load(1).expect("load").unlocked);
        assert!(!reopened.load(2).expect("load").unlocked);
    }

    #[test]
    fn death_respawns_at_level_spawn() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = level_app(dir.path());
        app.update();
        let spawn = app.world().resource::<ActiveLevel>().spawn;

        let mut body = Body::at(10.0, -8.0);
        body.alive = false;
        set_player(&mut app, body);
        app.world_mut()
            .run_system_once(run_level_rules)
            .expect("rules");

        let body = player_body(&mut app);
        assert!(body.alive);
        assert_eq!(body.position, spawn);
        assert!(event_kinds(&app).contains(&GameEventKind::PlayerDied { level: 1 }));
    }

    #[test]
    fn reaching_goal_unlocks_and_enters_next_level() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = level_app(dir.path());
        app.update();

        let (gx, gy) = app.world().resource::<Tilemap>().goal.expect("goal");
        set_player(&mut app, Body::at(gx as f32 + 0.5, gy as f32));
        app.world_mut()
            .run_system_once(run_level_rules)
            .expect("rules");

        assert!(event_kinds(&app).contains(&GameEventKind::LevelCompleted {
            level: 1,
            unlocked: Some(2),
        }));
        let store = app.world().resource::<LevelProgressStore>();
        assert!(store.record(1).is_some_and(|r| r.completed));
        assert!(store.is_unlocked(2));

        app.update();
        assert_eq!(app.world().resource::<ActiveLevel>().id, 2);
    }

    #[test]
    fn finishing_last_level_opens_level_select() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = level_app(dir.path());
        app.update();
        app.world_mut().resource_mut::<PendingLevelChange>().0 = Some(3);
        app.update();
        assert_eq!(app.world().resource::<ActiveLevel>().id, 3);

        let (gx, gy) = app.world().resource::<Tilemap>().goal.expect("goal");
        set_player(&mut app, Body::at(gx as f32 + 0.5, gy as f32));
        app.world_mut()
            .run_system_once(run_level_rules)
            .expect("rules");

        assert_eq!(*app.world().resource::<FlowState>(), FlowState::LevelSelect);
        assert!(event_kinds(&app).contains(&GameEventKind::LevelCompleted {
            level: 3,
            unlocked: None,
        }));
    }

    #[test]
    fn locked_selection_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = level_app(dir.path());
        app.update();

        app.world_mut()
            .resource_mut::<VirtualInput>()
            .press(Action::SelectLevel(2));
        app.update();

        assert_eq!(app.world().resource::<ActiveLevel>().id, 1);
        assert!(event_kinds(&app).contains(&GameEventKind::LevelLocked { level: 2 }));
    }
}

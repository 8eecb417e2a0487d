use bevy::prelude::*;

use crate::events::{GameEventBus, GameEventKind};
use crate::input::{Action, VirtualInput};

/// Which part of the game loop is live.
#[derive(Resource, Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum FlowState {
    #[default]
    Playing,
    Paused,
    /// Waiting for the player to pick a level.
    LevelSelect,
}

/// Ordering of the fixed-step gameplay systems.
#[derive(SystemSet, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GameSet {
    Physics,
    Rules,
}

pub struct RuntimeStatePlugin;

impl Plugin for RuntimeStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FlowState>()
            .configure_sets(
                FixedUpdate,
                (GameSet::Physics, GameSet::Rules)
                    .chain()
                    .run_if(gameplay_systems_enabled),
            )
            .add_systems(Update, toggle_pause);
    }
}

pub fn gameplay_systems_enabled(state: Option<Res<FlowState>>) -> bool {
    state.map_or(true, |s| *s == FlowState::Playing)
}

/// Flip between playing and paused. Level select ignores the toggle.
pub fn toggle(state: &mut FlowState) -> Option<GameEventKind> {
    match *state {
        FlowState::Playing => {
            *state = FlowState::Paused;
            Some(GameEventKind::Paused)
        }
        FlowState::Paused => {
            *state = FlowState::Playing;
            Some(GameEventKind::Resumed)
        }
        FlowState::LevelSelect => None,
    }
}

fn toggle_pause(
    input: Res<VirtualInput>,
    mut state: ResMut<FlowState>,
    mut bus: ResMut<GameEventBus>,
) {
    if !input.just_pressed(Action::Pause) {
        return;
    }
    if let Some(kind) = toggle(&mut state) {
        info!("[ledgehop] Flow state is now {:?}", *state);
        bus.emit(kind);
    }
}

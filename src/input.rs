use bevy::prelude::*;
use std::collections::HashSet;

use crate::components::MoveIntent;
use crate::progress::LevelId;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Action {
    Left,
    Right,
    Jump,
    Pause,
    NextLevel,
    PrevLevel,
    SelectLevel(LevelId),
}

/// Abstraction layer between raw input and game systems.
/// Both keyboard (windowed) and tests (headless) write to this.
#[derive(Resource, Default, Clone)]
pub struct VirtualInput {
    pub active: HashSet<Action>,
    pub just_pressed: HashSet<Action>,
}

impl VirtualInput {
    pub fn pressed(&self, action: Action) -> bool {
        self.active.contains(&action)
    }

    pub fn just_pressed(&self, action: Action) -> bool {
        self.just_pressed.contains(&action)
    }

    pub fn press(&mut self, action: Action) {
        if self.active.insert(action) {
            self.just_pressed.insert(action);
        }
    }

    /// Level picked this frame, if any.
    pub fn selected_level(&self) -> Option<LevelId> {
        self.just_pressed.iter().find_map(|action| match action {
            Action::SelectLevel(id) => Some(*id),
            _ => None,
        })
    }

    pub fn move_intent(&self) -> MoveIntent {
        MoveIntent {
            left: self.pressed(Action::Left),
            right: self.pressed(Action::Right),
            jump: self.pressed(Action::Jump),
        }
    }

    pub fn clear_frame(&mut self) {
        self.just_pressed.clear();
    }
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default())
            .add_systems(
                PreUpdate,
                keyboard_to_virtual.run_if(resource_exists::<ButtonInput<KeyCode>>),
            )
            .add_systems(Last, clear_virtual_input);
    }
}

const DIGIT_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

/// Translate keyboard input to virtual actions
fn keyboard_to_virtual(keyboard: Res<ButtonInput<KeyCode>>, mut vinput: ResMut<VirtualInput>) {
    vinput.active.clear();
    vinput.just_pressed.clear();

    let bindings: [(Action, &[KeyCode]); 6] = [
        (Action::Left, &[KeyCode::KeyA, KeyCode::ArrowLeft]),
        (Action::Right, &[KeyCode::KeyD, KeyCode::ArrowRight]),
        (
            Action::Jump,
            &[KeyCode::Space, KeyCode::KeyW, KeyCode::ArrowUp],
        ),
        (Action::Pause, &[KeyCode::Escape, KeyCode::KeyP]),
        (Action::NextLevel, &[KeyCode::BracketRight, KeyCode::PageDown]),
        (Action::PrevLevel, &[KeyCode::BracketLeft, KeyCode::PageUp]),
    ];
    for (action, keys) in bindings {
        if keyboard.any_pressed(keys.iter().copied()) {
            vinput.active.insert(action);
        }
        if keyboard.any_just_pressed(keys.iter().copied()) {
            vinput.just_pressed.insert(action);
        }
    }

    for (idx, key) in DIGIT_KEYS.iter().enumerate() {
        let action = Action::SelectLevel(idx as LevelId + 1);
        if keyboard.pressed(*key) {
            vinput.active.insert(action);
        }
        if keyboard.just_pressed(*key) {
            vinput.just_pressed.insert(action);
        }
    }
}

fn clear_virtual_input(mut vinput: ResMut<VirtualInput>) {
    vinput.clear_frame();
}

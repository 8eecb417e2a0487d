use std::collections::VecDeque;

use bevy::prelude::*;

use crate::progress::LevelId;

const MAX_EVENTS: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEventKind {
    LevelStarted { level: LevelId },
    PlayerDied { level: LevelId },
    LevelCompleted { level: LevelId, unlocked: Option<LevelId> },
    LevelSelected { level: LevelId },
    LevelLocked { level: LevelId },
    Paused,
    Resumed,
}

#[derive(Clone, Debug)]
pub struct GameEvent {
    pub kind: GameEventKind,
    pub frame: u64,
    /// Monotonic, so readers can resume after the last event they saw.
    pub seq: u64,
}

#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    next_seq: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(&mut self, kind: GameEventKind) {
        self.next_seq = self.next_seq.saturating_add(1);
        self.recent.push_back(GameEvent {
            kind,
            frame: self.frame,
            seq: self.next_seq,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[ledgehop events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    /// Events newer than `seq`, oldest first.
    pub fn since(&self, seq: u64) -> impl Iterator<Item = &GameEvent> {
        self.recent.iter().filter(move |ev| ev.seq > seq)
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default()).add_systems(
            FixedUpdate,
            tick_event_frame.run_if(crate::game_runtime::gameplay_systems_enabled),
        );
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}

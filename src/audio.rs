use std::collections::HashMap;

use bevy::audio::Volume;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::events::{GameEvent, GameEventBus, GameEventKind};
use crate::generation::{pack_of, LEVEL_PACKS};

const MAX_AUDIO_EVENTS: usize = 256;

fn default_volume() -> f32 {
    1.0
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SfxDefinition {
    pub path: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

/// Volume knobs read from `game.json`.
#[derive(Clone, Copy, Deserialize, Debug)]
pub struct AudioSettings {
    #[serde(default = "default_volume")]
    pub master_volume: f32,
    #[serde(default = "default_volume")]
    pub sfx_volume: f32,
    #[serde(default = "default_volume")]
    pub music_volume: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            sfx_volume: 1.0,
            music_volume: 1.0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioChannel {
    Sfx,
    Music,
}

#[derive(Clone, Debug, Serialize)]
pub struct AudioEventLog {
    pub frame: u64,
    pub channel: AudioChannel,
    pub name: String,
    pub path: String,
    pub volume: f32,
}

#[derive(Resource)]
pub struct AudioManager {
    pub sfx: HashMap<String, SfxDefinition>,
    /// One looping track per level pack, indexed by pack.
    pub music: Vec<String>,
    pub current_music: Option<String>,
    pub master_volume: f32,
    pub sfx_volume: f32,
    pub music_volume: f32,
    pub recent_events: Vec<AudioEventLog>,
    /// Playback requests not yet handed to the audio backend.
    pending: Vec<AudioEventLog>,
}

impl Default for AudioManager {
    fn default() -> Self {
        let sfx = ["player-death", "correct-answer", "button-click", "wrong-answer"]
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    SfxDefinition {
                        path: format!("sounds/{name}.ogg"),
                        volume: 1.0,
                    },
                )
            })
            .collect();
        let music = (0..LEVEL_PACKS)
            .map(|pack| format!("music/music{pack}.ogg"))
            .collect();
        Self {
            sfx,
            music,
            current_music: None,
            master_volume: 1.0,
            sfx_volume: 1.0,
            music_volume: 1.0,
            recent_events: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl AudioManager {
    pub fn with_settings(settings: AudioSettings) -> Self {
        Self {
            master_volume: settings.master_volume.clamp(0.0, 2.0),
            sfx_volume: settings.sfx_volume.clamp(0.0, 2.0),
            music_volume: settings.music_volume.clamp(0.0, 2.0),
            ..Self::default()
        }
    }

    pub fn play_sfx(&mut self, name: &str, frame: u64) -> Result<(), String> {
        let Some(def) = self.sfx.get(name) else {
            return Err(format!("Unknown sfx: {name}"));
        };
        let volume = def.volume * self.sfx_volume * self.master_volume;
        let path = def.path.clone();
        self.push_event(AudioEventLog {
            frame,
            channel: AudioChannel::Sfx,
            name: name.to_string(),
            path,
            volume,
        });
        Ok(())
    }

    /// Start the track for `pack` unless it is already playing.
    pub fn play_pack_music(&mut self, pack: u32, frame: u64) -> Result<bool, String> {
        let Some(path) = self.music.get(pack as usize).cloned() else {
            return Err(format!("No music for pack {pack}"));
        };
        if self.current_music.as_deref() == Some(path.as_str()) {
            return Ok(false);
        }
        let volume = self.music_volume * self.master_volume;
        self.current_music = Some(path.clone());
        self.push_event(AudioEventLog {
            frame,
            channel: AudioChannel::Music,
            name: format!("music{pack}"),
            path,
            volume,
        });
        Ok(true)
    }

    pub fn take_pending(&mut self) -> Vec<AudioEventLog> {
        std::mem::take(&mut self.pending)
    }

    fn push_event(&mut self, event: AudioEventLog) {
        self.pending.push(event.clone());
        self.recent_events.push(event);
        if self.recent_events.len() > MAX_AUDIO_EVENTS {
            let excess = self.recent_events.len() - MAX_AUDIO_EVENTS;
            self.recent_events.drain(0..excess);
        }
    }
}

/// Sound cue for a gameplay event.
pub fn cue_for(kind: &GameEventKind) -> Option<&'static str> {
    match kind {
        GameEventKind::PlayerDied { .. } => Some("player-death"),
        GameEventKind::LevelCompleted { .. } => Some("correct-answer"),
        GameEventKind::LevelLocked { .. } => Some("wrong-answer"),
        GameEventKind::LevelSelected { .. } | GameEventKind::Paused | GameEventKind::Resumed => {
            Some("button-click")
        }
        GameEventKind::LevelStarted { .. } => None,
    }
}

#[derive(Resource, Default)]
struct AudioEventCursor {
    last_seq: u64,
}

#[derive(Component)]
struct MusicTrack;

pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<AudioManager>() {
            app.insert_resource(AudioManager::default());
        }
        app.insert_resource(AudioEventCursor::default())
            .add_systems(Update, (auto_audio_from_events, play_pending_audio).chain());
    }
}

fn auto_audio_from_events(
    mut audio: ResMut<AudioManager>,
    bus: Res<GameEventBus>,
    mut cursor: ResMut<AudioEventCursor>,
) {
    for ev in bus.since(cursor.last_seq) {
        handle_event(&mut audio, ev);
    }
    cursor.last_seq = bus.last_seq();
}

fn handle_event(audio: &mut AudioManager, ev: &GameEvent) {
    if let GameEventKind::LevelStarted { level } = ev.kind {
        if let Err(err) = audio.play_pack_music(pack_of(level), ev.frame) {
            warn!("[ledgehop audio] {err}");
        }
        return;
    }
    if let Some(cue) = cue_for(&ev.kind) {
        if let Err(err) = audio.play_sfx(cue, ev.frame) {
            warn!("[ledgehop audio] {err}");
        }
    }
}

/// Hand queued cues to Bevy's audio backend. Without an asset server
/// (headless) the queue is only drained.
fn play_pending_audio(
    mut commands: Commands,
    mut audio: ResMut<AudioManager>,
    asset_server: Option<Res<AssetServer>>,
    music_query: Query<Entity, With<MusicTrack>>,
) {
    let pending = audio.take_pending();
    let Some(asset_server) = asset_server else {
        return;
    };
    for cue in pending {
        match cue.channel {
            AudioChannel::Sfx => {
                commands.spawn((
                    AudioPlayer::new(asset_server.load(cue.path)),
                    PlaybackSettings::DESPAWN.with_volume(Volume::new(cue.volume)),
                ));
            }
            AudioChannel::Music => {
                for entity in music_query.iter() {
                    commands.entity(entity).despawn();
                }
                commands.spawn((
                    MusicTrack,
                    AudioPlayer::new(asset_server.load(cue.path)),
                    PlaybackSettings::LOOP.with_volume(Volume::new(cue.volume)),
                ));
            }
        }
    }
}

//! Headless replay of a scripted input timeline against one level.

use serde::{Deserialize, Serialize};

use crate::components::{Body, EntityState, MoveIntent, PhysicsConfig};
use crate::generation::{generate_level, level_count};
use crate::level::{apply_rules, RuleOutcome};
use crate::tilemap::Tilemap;

const SIM_DT: f32 = 1.0 / 60.0;
/// Five minutes of play at 60 Hz.
pub const MAX_SIM_FRAMES: u32 = 18_000;

#[derive(Deserialize, Clone)]
pub struct SimulationRequest {
    /// Explicit layout. Takes precedence over `level`.
    pub tilemap: Option<Tilemap>,
    pub level: Option<u32>,
    #[serde(default)]
    pub inputs: Vec<SimInput>,
    pub max_frames: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval: u32,
    pub physics: Option<PhysicsConfig>,
}

fn default_record_interval() -> u32 {
    1
}

#[derive(Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum SimAction {
    Left,
    Right,
    Jump,
}

#[derive(Deserialize, Clone)]
pub struct SimInput {
    pub frame: u32,
    pub action: SimAction,
    #[serde(default)]
    pub duration: u32,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum SimOutcome {
    Goal,
    Died,
    Timeout,
}

#[derive(Serialize, Clone)]
pub struct SimulationResult {
    pub outcome: SimOutcome,
    pub frames_elapsed: u32,
    pub trace: Vec<TraceFrame>,
    pub events: Vec<SimEvent>,
}

#[derive(Serialize, Clone)]
pub struct TraceFrame {
    pub frame: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub grounded: bool,
    pub state: EntityState,
}

#[derive(Serialize, Clone)]
pub struct SimEvent {
    pub frame: u32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub x: f32,
    pub y: f32,
}

impl SimulationRequest {
    /// Physics overrides, checked for sanity.
    pub fn physics(&self) -> Result<PhysicsConfig, String> {
        let config = self.physics.clone().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// The layout to simulate: the explicit tilemap, else the generated level.
    pub fn resolve_tilemap(&self, physics: &PhysicsConfig) -> Result<Tilemap, String> {
        if let Some(tilemap) = &self.tilemap {
            tilemap.validate()?;
            return Ok(tilemap.clone());
        }
        match self.level {
            Some(id) if (1..=level_count()).contains(&id) => Ok(generate_level(id, physics).0),
            Some(id) => Err(format!("Unknown level {id}")),
            None => Err("Simulation needs either a tilemap or a level".to_string()),
        }
    }
}

pub fn run_simulation(
    tilemap: &Tilemap,
    config: &PhysicsConfig,
    request: &SimulationRequest,
) -> SimulationResult {
    let spawn = tilemap.player_spawn;
    let mut body = Body::at(spawn.0, spawn.1);
    let max_frames = request.max_frames.min(MAX_SIM_FRAMES);

    // Pre-process inputs into per-frame intents
    let mut intents = vec![MoveIntent::default(); max_frames as usize];
    for input in &request.inputs {
        let duration = input.duration.max(1);
        let end = input.frame.saturating_add(duration).min(max_frames);
        for f in input.frame..end {
            let intent = &mut intents[f as usize];
            match input.action {
                SimAction::Left => intent.left = true,
                SimAction::Right => intent.right = true,
                SimAction::Jump => intent.jump = true,
            }
        }
    }

    let mut trace = Vec::new();
    let mut events = Vec::new();
    let mut outcome = SimOutcome::Timeout;
    let mut frames_elapsed = max_frames;

    for frame in 0..max_frames {
        let was_grounded = body.on_ground;
        let was_jumping = body.state == EntityState::Jumping;

        body.tick(SIM_DT, intents[frame as usize], tilemap, config);
        let rule = apply_rules(&mut body, tilemap, config);

        if !was_jumping && body.state == EntityState::Jumping {
            events.push(sim_event(frame, "jump", &body));
        }
        if body.on_ground && !was_grounded {
            events.push(sim_event(frame, "land", &body));
        }

        let finished = match rule {
            RuleOutcome::Continue => None,
            RuleOutcome::Died => Some(SimOutcome::Died),
            RuleOutcome::ReachedGoal => Some(SimOutcome::Goal),
        };
        if let Some(result) = finished {
            events.push(sim_event(
                frame,
                if result == SimOutcome::Goal { "goal" } else { "death" },
                &body,
            ));
            trace.push(trace_frame(frame, &body));
            outcome = result;
            frames_elapsed = frame + 1;
            break;
        }

        if request.record_interval > 0 && frame % request.record_interval == 0 {
            trace.push(trace_frame(frame, &body));
        }
    }

    SimulationResult {
        outcome,
        frames_elapsed,
        trace,
        events,
    }
}

fn sim_event(frame: u32, event_type: &str, body: &Body) -> SimEvent {
    SimEvent {
        frame,
        event_type: event_type.to_string(),
        x: body.position.x,
        y: body.position.y,
    }
}

fn trace_frame(frame: u32, body: &Body) -> TraceFrame {
    TraceFrame {
        frame,
        x: body.position.x,
        y: body.position.y,
        vx: body.velocity.x,
        vy: body.velocity.y,
        grounded: body.on_ground,
        state: body.state,
    }
}

mod audio;
mod camera;
mod components;
mod events;
mod game_runtime;
mod generation;
mod input;
mod level;
mod physics;
mod physics_core;
mod player;
mod progress;
mod render;
mod simulation;
mod tilemap;

use bevy::app::AppExit;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use components::{HeadlessMode, PhysicsConfig};

#[derive(serde::Deserialize, Default)]
struct StartupConfig {
    window_title: Option<String>,
    window_width: Option<f32>,
    window_height: Option<f32>,
    background_color: Option<[f32; 3]>,
    assets_dir: Option<String>,
    data_dir: Option<String>,
    start_level: Option<u32>,
    physics: Option<PhysicsConfig>,
    #[serde(default)]
    audio: audio::AudioSettings,
}

fn load_startup_config() -> StartupConfig {
    let path = env_override("LEDGEHOP_GAME_CONFIG").unwrap_or_else(|| "game.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<StartupConfig>(&contents) {
            Ok(cfg) => {
                println!("[ledgehop] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[ledgehop] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Resolved startup settings, logged once the logger is up.
#[derive(Resource, Debug)]
struct StartupReport {
    headless: bool,
    data_dir: String,
    start_level: u32,
    physics_error: Option<String>,
}

fn log_startup_report(report: Res<StartupReport>) {
    info!(
        "[ledgehop] Starting in {} mode; progress under {}; start level {}",
        if report.headless { "HEADLESS" } else { "WINDOWED" },
        report.data_dir,
        report.start_level
    );
    if let Some(err) = &report.physics_error {
        warn!("[ledgehop] Ignoring physics overrides: {err}");
    }
}

#[derive(Resource)]
struct FrameLimit(u64);

fn exit_after_frame_limit(
    mut frames: Local<u64>,
    limit: Res<FrameLimit>,
    mut exit: EventWriter<AppExit>,
) {
    *frames += 1;
    if *frames >= limit.0 {
        info!("[ledgehop] Frame limit {} reached", limit.0);
        exit.send(AppExit::Success);
    }
}

fn run_simulation_file(path: &str) -> Result<String, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
    let request: simulation::SimulationRequest =
        serde_json::from_str(&contents).map_err(|e| format!("Invalid request {path}: {e}"))?;
    let physics = request.physics()?;
    let tilemap = request.resolve_tilemap(&physics)?;
    let result = simulation::run_simulation(&tilemap, &physics, &request);
    serde_json::to_string_pretty(&result).map_err(|e| e.to_string())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if let Some(path) = arg_value(&args, "--simulate") {
        match run_simulation_file(path) {
            Ok(json) => {
                println!("{json}");
                return;
            }
            Err(e) => {
                eprintln!("[ledgehop] Simulation failed: {e}");
                std::process::exit(2);
            }
        }
    }

    let headless = args.iter().any(|a| a == "--headless");
    let startup_config = load_startup_config();

    let data_dir = env_override("LEDGEHOP_DATA_DIR")
        .or(startup_config.data_dir)
        .unwrap_or_else(|| "data".to_string());
    let start_level = startup_config.start_level.unwrap_or(1);
    let requested_physics = startup_config.physics.unwrap_or_default();
    let (physics, physics_error) = match requested_physics.validate() {
        Ok(()) => (requested_physics, None),
        Err(e) => (PhysicsConfig::default(), Some(e)),
    };

    let mut app = App::new();
    app.insert_resource(HeadlessMode(headless));

    if headless {
        // Headless mode: no window, no rendering, just ECS
        app.add_plugins(MinimalPlugins).add_plugins(LogPlugin::default());
        if let Some(limit) = arg_value(&args, "--frames").and_then(|v| v.parse::<u64>().ok()) {
            app.insert_resource(FrameLimit(limit))
                .add_systems(Last, exit_after_frame_limit);
        }
    } else {
        // Env vars override game.json values
        let assets_dir = env_override("LEDGEHOP_ASSETS_DIR")
            .or(startup_config.assets_dir)
            .unwrap_or_else(|| "assets".to_string());

        let window_title = startup_config
            .window_title
            .unwrap_or_else(|| "Ledgehop".to_string());
        let window_width = startup_config.window_width.unwrap_or(960.0);
        let window_height = startup_config.window_height.unwrap_or(540.0);

        app.add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: window_title,
                        resolution: (window_width, window_height).into(),
                        present_mode: bevy::window::PresentMode::AutoVsync,
                        ..default()
                    }),
                    ..default()
                })
                .set(bevy::asset::AssetPlugin {
                    file_path: assets_dir,
                    ..default()
                })
                .set(ImagePlugin::default_nearest()),
        );
        let bg = startup_config.background_color.unwrap_or([0.1, 0.12, 0.2]);
        app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])));
    }

    app.insert_resource(StartupReport {
        headless,
        data_dir: data_dir.clone(),
        start_level,
        physics_error,
    })
    .insert_resource(physics)
    .insert_resource(progress::LevelProgressStore::with_levels(
        data_dir,
        1..=generation::level_count(),
    ))
    .insert_resource(level::StartLevel(start_level))
    .insert_resource(audio::AudioManager::with_settings(startup_config.audio))
    .insert_resource(Time::<Fixed>::from_hz(60.0))
    .add_systems(Startup, log_startup_report)
    .add_plugins(input::InputPlugin)
    .add_plugins(game_runtime::RuntimeStatePlugin)
    .add_plugins(events::GameEventsPlugin)
    .add_plugins(tilemap::TilemapPlugin)
    .add_plugins(player::PlayerPlugin)
    .add_plugins(physics::PhysicsPlugin)
    .add_plugins(level::LevelPlugin)
    .add_plugins(camera::CameraPlugin)
    .add_plugins(render::RenderPlugin)
    .add_plugins(audio::AudioPlugin);

    app.run();
}

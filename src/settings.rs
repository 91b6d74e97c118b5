//! Tunable game configuration and the shared random source.
//!
//! `GameSettings` is a plain resource with sensible defaults; native builds may override any
//! field from a `settings.json` file placed next to the executable. Missing fields keep their
//! defaults thanks to `#[serde(default)]`.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const SETTINGS_PATH: &str = "settings.json";

#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Width of one screen; screen `n` spans `n * W .. (n + 1) * W`.
    pub screen_width: f32,
    pub screen_height: f32,
    /// World y of the walkable ground surface.
    pub ground_y: f32,
    /// Downward acceleration applied to dynamic bodies, in px/s².
    pub gravity: f32,
    pub max_health: u32,
    /// Restore the player to full health on every screen advance.
    pub heal_on_advance: bool,
    /// Distance from a screen's left edge where the player stands.
    pub player_spawn_offset: f32,
    /// Minimum seconds between two player shots.
    pub player_shot_cooldown: f32,
    /// Angle in radians between the centre arrow and each side arrow of a triple shot.
    pub triple_shot_spread: f32,
    /// Swordsmen never spawn closer to the player than this.
    pub swordsman_safety_margin: f32,
    pub rng_seed: Option<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            screen_width: 1280.0,
            screen_height: 720.0,
            ground_y: -250.0,
            gravity: 600.0,
            max_health: 3,
            heal_on_advance: true,
            player_spawn_offset: 100.0,
            player_shot_cooldown: 0.5,
            triple_shot_spread: 0.15,
            swordsman_safety_margin: 400.0,
            rng_seed: None,
        }
    }
}

impl GameSettings {
    /// Reads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Loads `settings.json` when present. A missing file is the normal case and yields the
    /// defaults quietly; a broken file is reported and also yields the defaults.
    pub fn load_or_default() -> Self {
        match Self::load(SETTINGS_PATH) {
            Ok(settings) => {
                info!("Loaded game settings from '{}'.", SETTINGS_PATH);
                settings
            }
            Err(SettingsError::Io(err)) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                warn!("Ignoring '{}': {}. Using default settings.", SETTINGS_PATH, err);
                Self::default()
            }
        }
    }

    /// Player and swordsman feet rest on the ground; bodies are centred half their height above it.
    pub fn standing_y(&self, body_height: f32) -> f32 {
        self.ground_y + body_height * 0.5
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "could not read settings: {err}"),
            SettingsError::Parse(err) => write!(f, "malformed settings: {err}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(err) => Some(err),
            SettingsError::Parse(err) => Some(err),
        }
    }
}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        SettingsError::Io(err)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Parse(err)
    }
}

/// Every random draw in the game goes through this resource so a fixed seed replays a run.
#[derive(Resource)]
pub struct GameRng(pub StdRng);

impl GameRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl FromWorld for GameRng {
    fn from_world(world: &mut World) -> Self {
        match world.get_resource::<GameSettings>().and_then(|s| s.rng_seed) {
            Some(seed) => Self::seeded(seed),
            None => Self(StdRng::from_entropy()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = GameSettings::from_json(r#"{ "max_health": 5, "rng_seed": 7 }"#).unwrap();
        assert_eq!(settings.max_health, 5);
        assert_eq!(settings.rng_seed, Some(7));
        assert_eq!(settings.screen_width, GameSettings::default().screen_width);
        assert!(settings.heal_on_advance);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = GameSettings::from_json("{ max_health: }").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
        assert!(err.to_string().starts_with("malformed settings"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = GameSettings::load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn seed_comes_from_settings() {
        use rand::Rng;

        let mut world = World::new();
        world.insert_resource(GameSettings {
            rng_seed: Some(42),
            ..default()
        });
        let mut a = GameRng::from_world(&mut world);
        let mut b = GameRng::seeded(42);
        assert_eq!(a.0.gen::<u64>(), b.0.gen::<u64>());
    }
}

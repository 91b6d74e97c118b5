//! High-level plugin composition.
//!
//! `TowerArchersPlugin` registers every subsystem plugin and fixes the order their systems run
//! in each frame. Each subsystem owns its own state; this module only wires them together.

use bevy::prelude::*;

use crate::bonus::BonusPlugin;
use crate::camera::CameraPlugin;
use crate::collision::CollisionPlugin;
use crate::combat::CombatPlugin;
use crate::health::HealthPlugin;
use crate::host::HostPlugin;
use crate::level::LevelPlugin;
use crate::physics::PhysicsPlugin;
use crate::player::PlayerPlugin;
use crate::projectile::ProjectilePlugin;
use crate::scenery::SceneryPlugin;
use crate::settings::{GameRng, GameSettings};
use crate::state::{pause_clock, resume_clock, toggle_pause, GameSet, GameState};
use crate::ui::UiPlugin;

pub struct TowerArchersPlugin;

impl Plugin for TowerArchersPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(load_settings())
            .init_resource::<GameRng>()
            .init_state::<GameState>()
            .add_plugins((
                PhysicsPlugin,    // Body integration + collision-start detection.
                CollisionPlugin,  // Collision pairs -> game effects.
                ProjectilePlugin, // Arrow lifecycle.
                CombatPlugin,     // Enemy archers and swordsmen.
                PlayerPlugin,     // Bow input and screen slide.
                BonusPlugin,      // Triple-shot pickups.
                HealthPlugin,     // Damage, score, game over.
                LevelPlugin,      // Scene setup and screen progression.
                CameraPlugin,
                SceneryPlugin,
                UiPlugin,
                HostPlugin,
            ))
            // One frame of play: physics step, game logic, then cosmetics. Nothing in these sets
            // runs outside `Playing`, which is how pause and game over freeze the scene.
            .configure_sets(
                Update,
                (
                    GameSet::Physics,
                    GameSet::Collision,
                    GameSet::Input,
                    GameSet::Ai,
                    GameSet::Lifecycle,
                    GameSet::Progression,
                    GameSet::Effects,
                )
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Update, toggle_pause)
            .add_systems(OnEnter(GameState::Paused), pause_clock)
            .add_systems(OnExit(GameState::Paused), resume_clock)
            .add_systems(OnEnter(GameState::GameOver), pause_clock)
            .add_systems(OnExit(GameState::GameOver), resume_clock);
    }
}

/// Built after the log plugin so a broken settings file is reported. The browser build has no
/// settings file to read.
fn load_settings() -> GameSettings {
    if cfg!(target_arch = "wasm32") {
        GameSettings::default()
    } else {
        GameSettings::load_or_default()
    }
}

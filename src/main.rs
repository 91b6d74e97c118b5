//! Application entry point: window configuration, default plugins and the game plugin.

mod app;
mod bonus;
mod camera;
mod collision;
mod combat;
mod health;
mod host;
mod level;
mod physics;
mod player;
mod projectile;
mod scenery;
mod settings;
mod state;
mod tower;
mod tween;
mod ui;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod wasm;

use app::TowerArchersPlugin;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::window::{Window, WindowResizeConstraints, WindowResolution};
use settings::GameSettings;

fn main() {
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    wasm::set_panic_hook();

    // Logical resolution matches one screen of the default settings; the camera scales the view
    // if the settings file changes the screen size.
    let screen = GameSettings::default();
    let primary_window = Window {
        title: "Tower Archers".to_string(),
        resolution: WindowResolution::new(screen.screen_width, screen.screen_height),
        resizable: true,
        resize_constraints: WindowResizeConstraints {
            min_width: 640.0,
            min_height: 360.0,
            max_width: f32::INFINITY,
            max_height: f32::INFINITY,
        },
        canvas: cfg!(all(target_arch = "wasm32", feature = "web"))
            .then(|| "#bevy-canvas".to_owned()),
        ..default()
    };

    let mut default_plugins = DefaultPlugins.set(WindowPlugin {
        primary_window: Some(primary_window),
        ..default()
    });

    #[cfg(not(target_arch = "wasm32"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(true),
            ..default()
        });
    }

    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(false),
            ..default()
        });
    }

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.55, 0.75, 0.92)))
        .add_plugins(default_plugins)
        .add_plugins(TowerArchersPlugin)
        .run();
}

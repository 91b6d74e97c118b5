//! The single 2D camera. It frames exactly one screen and pans to the next one when a screen is
//! cleared; it never follows the player.

use bevy::prelude::*;
use bevy::render::camera::ScalingMode;

use crate::settings::GameSettings;
use crate::state::{GameSet, GameState};
use crate::tween::{Ease, Tween};

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera)
            .add_systems(OnEnter(GameState::Loading), reset_camera)
            .add_systems(
                Update,
                pan_camera
                    .in_set(GameSet::Effects)
                    .run_if(camera_is_panning),
            );
    }
}

const PAN_SECS: f32 = 0.6;

#[derive(Component)]
pub struct MainCamera;

/// An in-progress horizontal pan.
#[derive(Component, Debug, Clone, Copy)]
pub struct CameraPan {
    from_x: f32,
    to_x: f32,
    tween: Tween,
}

impl CameraPan {
    pub fn new(from_x: f32, to_x: f32, now: f32) -> Self {
        Self {
            from_x,
            to_x,
            tween: Tween::new(now, PAN_SECS, Ease::QuadInOut),
        }
    }

    pub fn x_at(&self, now: f32) -> f32 {
        self.tween.lerp(self.from_x, self.to_x, now)
    }

    pub fn is_finished(&self, now: f32) -> bool {
        self.tween.is_finished(now)
    }
}

/// Horizontal centre of a screen.
pub fn screen_centre_x(settings: &GameSettings, screen: u32) -> f32 {
    (screen as f32 + 0.5) * settings.screen_width
}

/// Vertical centre of the view: the ground sits a fixed distance above the bottom edge.
fn view_centre_y(settings: &GameSettings) -> f32 {
    settings.ground_y + settings.screen_height * 0.5 - 110.0
}

fn spawn_camera(mut commands: Commands, settings: Res<GameSettings>) {
    let mut camera = Camera2dBundle::default();
    camera.projection.scaling_mode = ScalingMode::AutoMin {
        min_width: settings.screen_width,
        min_height: settings.screen_height,
    };
    camera.transform.translation.x = screen_centre_x(&settings, 0);
    camera.transform.translation.y = view_centre_y(&settings);

    commands.spawn((Name::new("MainCamera"), camera, MainCamera));
}

fn reset_camera(
    mut commands: Commands,
    settings: Res<GameSettings>,
    mut camera: Query<(Entity, &mut Transform), With<MainCamera>>,
) {
    let Ok((entity, mut transform)) = camera.get_single_mut() else {
        return;
    };
    transform.translation.x = screen_centre_x(&settings, 0);
    transform.translation.y = view_centre_y(&settings);
    commands.entity(entity).remove::<CameraPan>();
}

fn camera_is_panning(camera: Query<(), (With<MainCamera>, With<CameraPan>)>) -> bool {
    !camera.is_empty()
}

fn pan_camera(
    mut commands: Commands,
    time: Res<Time>,
    mut camera: Query<(Entity, &CameraPan, &mut Transform), With<MainCamera>>,
) {
    let now = time.elapsed_seconds();
    let Ok((entity, pan, mut transform)) = camera.get_single_mut() else {
        return;
    };
    transform.translation.x = pan.x_at(now);
    if pan.is_finished(now) {
        commands.entity(entity).remove::<CameraPan>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_lands_on_the_target() {
        let pan = CameraPan::new(640.0, 1920.0, 3.0);
        assert_eq!(pan.x_at(3.0), 640.0);
        assert!((pan.x_at(3.0 + PAN_SECS * 0.5) - 1280.0).abs() < 1e-3);
        assert_eq!(pan.x_at(3.0 + PAN_SECS), 1920.0);
        assert!(pan.is_finished(3.0 + PAN_SECS));
    }

    #[test]
    fn screens_are_centred() {
        let settings = GameSettings::default();
        assert_eq!(screen_centre_x(&settings, 0), 640.0);
        assert_eq!(screen_centre_x(&settings, 2), 3200.0);
    }
}

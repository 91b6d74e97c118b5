//! Ground segments, parallax backdrops and drifting clouds. Only the ground takes part in play;
//! everything else is decoration and is dropped with a warning when its texture is missing.

use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy::sprite::Anchor;
use rand::Rng;

use crate::camera::MainCamera;
use crate::level::{SceneEntity, ScopeLayer, ScreenScoped};
use crate::physics::{layers, BodyKind, BodyRole, PhysicsBody};
use crate::settings::{GameRng, GameSettings};
use crate::state::GameSet;

pub struct SceneryPlugin;

impl Plugin for SceneryPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (drop_missing_layers, scroll_parallax, drift_clouds).in_set(GameSet::Effects),
        );
    }
}

const GROUND_DEPTH: f32 = 400.0;
const CLOUD_SPEED: f32 = 45.0;
const CLOUD_PARALLAX: f32 = 0.45;
const CLOUD_CULL_MARGIN: f32 = 260.0;
const CLOUD_SIZE: Vec2 = Vec2::new(220.0, 90.0);

/// A decorative layer that scrolls at `factor` times the camera speed.
#[derive(Component, Debug)]
pub struct ParallaxLayer {
    pub factor: f32,
    origin_x: f32,
    label: &'static str,
}

impl ParallaxLayer {
    /// Placed so that it sits centred on `centre_x` while the camera is there.
    pub fn new(label: &'static str, factor: f32, centre_x: f32) -> Self {
        Self {
            factor,
            origin_x: centre_x * factor,
            label,
        }
    }

    pub fn x_for_camera(&self, camera_x: f32) -> f32 {
        self.origin_x + camera_x * (1.0 - self.factor)
    }
}

struct LayerSpec {
    label: &'static str,
    texture: &'static str,
    factor: f32,
    width_screens: f32,
    height: f32,
    /// Bottom edge relative to the ground surface.
    bottom: f32,
    z: f32,
}

const BACKDROP: [LayerSpec; 2] = [
    LayerSpec {
        label: "backHouses",
        texture: "backHouses.png",
        factor: 0.6,
        width_screens: 1.8,
        height: 520.0,
        bottom: -100.0,
        z: -0.9,
    },
    LayerSpec {
        label: "bushes",
        texture: "green.png",
        factor: 1.0,
        width_screens: 1.2,
        height: 170.0,
        bottom: 70.0,
        z: -0.6,
    },
];

pub fn spawn_ground(commands: &mut Commands, settings: &GameSettings, screen: u32) -> Entity {
    let size = Vec2::new(settings.screen_width, GROUND_DEPTH);
    let centre = Vec2::new(
        (screen as f32 + 0.5) * settings.screen_width,
        settings.ground_y - GROUND_DEPTH * 0.5,
    );
    commands
        .spawn((
            Name::new("Ground"),
            SceneEntity,
            ScreenScoped::new(screen, ScopeLayer::Backdrop),
            BodyRole::Ground,
            PhysicsBody::rect(BodyKind::Static, size, layers::GROUND, layers::ARROW),
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.33, 0.42, 0.2),
                    custom_size: Some(size),
                    ..default()
                },
                transform: Transform::from_translation(centre.extend(0.5)),
                ..default()
            },
        ))
        .id()
}

pub fn spawn_backdrop(
    commands: &mut Commands,
    asset_server: &AssetServer,
    settings: &GameSettings,
    screen: u32,
    camera_x: f32,
) {
    let centre_x = (screen as f32 + 0.5) * settings.screen_width;
    for backdrop in &BACKDROP {
        let layer = ParallaxLayer::new(backdrop.label, backdrop.factor, centre_x);
        let x = layer.x_for_camera(camera_x);
        commands.spawn((
            Name::new(backdrop.label),
            SceneEntity,
            ScreenScoped::new(screen, ScopeLayer::Backdrop),
            layer,
            SpriteBundle {
                texture: asset_server.load(backdrop.texture),
                sprite: Sprite {
                    custom_size: Some(Vec2::new(
                        settings.screen_width * backdrop.width_screens,
                        backdrop.height,
                    )),
                    anchor: Anchor::BottomCenter,
                    ..default()
                },
                transform: Transform::from_xyz(x, settings.ground_y + backdrop.bottom, backdrop.z),
                ..default()
            },
        ));
    }
}

fn drop_missing_layers(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    layers: Query<(Entity, &ParallaxLayer, &Handle<Image>)>,
) {
    for (entity, layer, texture) in &layers {
        if let Some(LoadState::Failed(_)) = asset_server.get_load_state(texture.id()) {
            warn!("[{}] texture missing or not loaded; skipping layer.", layer.label);
            commands.entity(entity).despawn_recursive();
        }
    }
}

fn scroll_parallax(
    camera: Query<&Transform, With<MainCamera>>,
    mut layers: Query<(&ParallaxLayer, &mut Transform), Without<MainCamera>>,
) {
    let Ok(camera) = camera.get_single() else {
        return;
    };
    for (layer, mut transform) in &mut layers {
        transform.translation.x = layer.x_for_camera(camera.translation.x);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudSide {
    Left,
    Right,
}

#[derive(Component, Debug)]
pub struct Cloud {
    /// Sky-space x; the drawn position adds the camera's parallax share.
    x: f32,
    base_y: f32,
    breath_amp: f32,
    breath_freq: f32,
    born: f32,
}

impl Cloud {
    pub fn world_x(&self, camera_left: f32) -> f32 {
        self.x + camera_left * (1.0 - CLOUD_PARALLAX)
    }

    pub fn is_out_of_view(&self, camera_left: f32, view_width: f32) -> bool {
        self.x > camera_left + view_width + CLOUD_CULL_MARGIN
            || self.x < camera_left - CLOUD_CULL_MARGIN - 400.0
    }
}

pub fn spawn_clouds(
    commands: &mut Commands,
    rng: &mut GameRng,
    settings: &GameSettings,
    camera_left: f32,
    side: Option<CloudSide>,
    now: f32,
) {
    let count = rng.0.gen_range(1..=3);
    for _ in 0..count {
        let side = side.unwrap_or(if rng.0.gen_bool(0.5) {
            CloudSide::Left
        } else {
            CloudSide::Right
        });
        let scale = rng.0.gen_range(0.7..=1.25);
        let half = CLOUD_SIZE.x * scale * 0.5;
        let x = match side {
            CloudSide::Left => camera_left - half - 40.0 - rng.0.gen_range(50.0..=400.0),
            CloudSide::Right => {
                camera_left + settings.screen_width + rng.0.gen_range(20.0..=CLOUD_CULL_MARGIN - 20.0)
            }
        };
        let base_y = settings.ground_y + rng.0.gen_range(320.0..=620.0);
        let cloud = Cloud {
            x,
            base_y,
            breath_amp: rng.0.gen_range(0.0..=8.0),
            breath_freq: rng.0.gen_range(1.0..=3.0),
            born: now,
        };
        let drawn_x = cloud.world_x(camera_left);
        commands.spawn((
            Name::new("Cloud"),
            SceneEntity,
            cloud,
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgba(1.0, 1.0, 1.0, 0.9),
                    custom_size: Some(CLOUD_SIZE * scale),
                    ..default()
                },
                transform: Transform::from_xyz(drawn_x, base_y, -0.95),
                ..default()
            },
        ));
    }
}

fn drift_clouds(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<GameSettings>,
    camera: Query<&Transform, With<MainCamera>>,
    mut clouds: Query<(Entity, &mut Cloud, &mut Transform), Without<MainCamera>>,
) {
    let Ok(camera) = camera.get_single() else {
        return;
    };
    let camera_left = camera.translation.x - settings.screen_width * 0.5;
    let now = time.elapsed_seconds();
    let dt = time.delta_seconds();

    for (entity, mut cloud, mut transform) in &mut clouds {
        cloud.x += CLOUD_SPEED * dt;
        if cloud.is_out_of_view(camera_left, settings.screen_width) {
            commands.entity(entity).despawn_recursive();
            continue;
        }
        let breath = (((now - cloud.born) * cloud.breath_freq).sin()) * cloud.breath_amp;
        transform.translation.x = cloud.world_x(camera_left);
        transform.translation.y = cloud.base_y + breath;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallax_layer_is_centred_when_the_camera_is() {
        let houses = ParallaxLayer::new("backHouses", 0.6, 1920.0);
        assert!((houses.x_for_camera(1920.0) - 1920.0).abs() < 1e-3);
        // Slower than the camera: panning one screen right moves it 40% of that.
        let moved = houses.x_for_camera(1920.0 + 1280.0) - 1920.0;
        assert!((moved - 1280.0 * 0.4).abs() < 1e-3);

        let bushes = ParallaxLayer::new("bushes", 1.0, 640.0);
        assert_eq!(bushes.x_for_camera(5000.0), 640.0);
    }

    #[test]
    fn clouds_are_culled_past_either_edge() {
        let cloud = Cloud {
            x: 0.0,
            base_y: 0.0,
            breath_amp: 0.0,
            breath_freq: 1.0,
            born: 0.0,
        };
        assert!(!cloud.is_out_of_view(-100.0, 1280.0));
        assert!(cloud.is_out_of_view(-1280.0 - CLOUD_CULL_MARGIN - 1.0, 1280.0));
        assert!(cloud.is_out_of_view(CLOUD_CULL_MARGIN + 401.0, 1280.0));
    }
}

//! Towers are stacks of decorative segments with a single sensor body covering the stack. Their
//! only gameplay job is to put an archer at the right height.

use bevy::prelude::*;
use rand::Rng;

use crate::level::{SceneEntity, ScopeLayer, ScreenScoped};
use crate::physics::{layers, BodyRole, PhysicsBody};
use crate::settings::GameRng;

const WIDTH: f32 = 110.0;
const BOTTOM_HEIGHT: f32 = 70.0;
const BODY_HEIGHT: f32 = 46.0;
const TOP_HEIGHT: f32 = 52.0;
const MAX_BODY_SEGMENTS: u32 = 7;

/// Height of the archer's body centre above the tower top.
pub const ARCHER_PERCH: f32 = 80.0;

pub fn stack_height(body_segments: u32) -> f32 {
    BOTTOM_HEIGHT + BODY_HEIGHT * body_segments as f32 + TOP_HEIGHT
}

/// Builds a tower standing on `ground_y` at `x` and returns its top.
pub fn spawn_tower(
    commands: &mut Commands,
    x: f32,
    ground_y: f32,
    screen: u32,
    rng: &mut GameRng,
) -> f32 {
    let segments = rng.0.gen_range(1..=MAX_BODY_SEGMENTS);
    let height = stack_height(segments);
    let top_y = ground_y + height;
    let centre_y = ground_y + height * 0.5;

    commands
        .spawn((
            Name::new("Tower"),
            SceneEntity,
            ScreenScoped::new(screen, ScopeLayer::Fixtures),
            BodyRole::Tower,
            PhysicsBody::sensor(Vec2::new(WIDTH, height), layers::TOWER, layers::NONE),
            SpatialBundle::from_transform(Transform::from_xyz(x, centre_y, 1.0)),
        ))
        .with_children(|stack| {
            let stone = Color::srgb(0.5, 0.48, 0.45);
            let mortar = Color::srgb(0.46, 0.44, 0.41);
            let mut floor = -height * 0.5;
            let mut lay = |h: f32, w: f32, color: Color| {
                stack.spawn(SpriteBundle {
                    sprite: Sprite {
                        color,
                        custom_size: Some(Vec2::new(w, h)),
                        ..default()
                    },
                    transform: Transform::from_xyz(0.0, floor + h * 0.5, 0.0),
                    ..default()
                });
                floor += h;
            };
            lay(BOTTOM_HEIGHT, WIDTH, Color::srgb(0.42, 0.4, 0.38));
            for i in 0..segments {
                let shade = if i % 2 == 0 { stone } else { mortar };
                lay(BODY_HEIGHT, WIDTH * 0.9, shade);
            }
            lay(TOP_HEIGHT, WIDTH * 1.1, Color::srgb(0.36, 0.34, 0.33));
        });

    top_y
}

/// Screens from the tenth on get a second tower.
pub fn tower_count(screen: u32) -> usize {
    if screen >= 10 {
        2
    } else {
        1
    }
}

/// Tower x positions within a screen starting at `left`.
pub fn tower_slots(screen: u32, left: f32, width: f32) -> Vec<f32> {
    match tower_count(screen) {
        1 => vec![left + width * 0.75],
        _ => vec![left + width * 0.6, left + width * 0.85],
    }
}

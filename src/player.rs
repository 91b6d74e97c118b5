//! The player archer: pointer-driven bow, shots (single or triple volleys), and the slide to the
//! next screen.
//!
//! The player entity is created once per run by the level setup and lives until the next restart.

use bevy::prelude::*;
use bevy::window::{CursorLeft, PrimaryWindow};

use crate::bonus::{volley_angles, TripleShot};
use crate::camera::MainCamera;
use crate::level::SceneEntity;
use crate::physics::{layers, BodyKind, BodyRole, PhysicsBody};
use crate::projectile::{spawn_arrow, ArrowLaunch, ArrowOwner};
use crate::settings::GameSettings;
use crate::state::GameSet;
use crate::tween::{yoyo, Ease, Tween};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SlideFinished>()
            .add_systems(Update, handle_bow_input.in_set(GameSet::Input))
            .add_systems(Update, slide_player.in_set(GameSet::Ai))
            .add_systems(
                Update,
                (pose_player, draw_player_bowstring).in_set(GameSet::Effects),
            );
    }
}

pub const PLAYER_SIZE: Vec2 = Vec2::new(60.0, 160.0);
const PIVOT_OFFSET: Vec2 = Vec2::new(20.0, 30.0);
const BOW_REACH: f32 = 70.0;
const STRING_HALF_SPAN: f32 = 45.0;
/// Horizontal drag to draw offset, and the offset range.
const DRAW_GAIN: f32 = 0.1;
const MAX_DRAW: f32 = 30.0;
const PULL_NORMALIZER: f32 = 20.0;
const AIM_GAIN: f32 = 0.0015;
const AIM_LIMIT: f32 = 0.8;
const SLIDE_MIN_SECS: f32 = 0.5;
const SLIDE_SECS_PER_PX: f32 = 0.0012;
const BOB_HEIGHT: f32 = 6.0;
const BOB_HALF_PERIOD: f32 = 0.18;

#[derive(Component)]
pub struct Player;

/// Sent once when the player reaches the next screen.
#[derive(Event, Debug, Clone, Copy)]
pub struct SlideFinished;

#[derive(Component, Debug, Default)]
pub struct PlayerBow {
    pulling: bool,
    anchor: Vec2,
    /// How far the drawing hand sits behind the bow, `-MAX_DRAW..=0`.
    pub draw: f32,
    /// Radians above the horizontal.
    pub aim: f32,
    pub strength: f32,
    last_shot: Option<f32>,
}

impl PlayerBow {
    pub fn is_pulling(&self) -> bool {
        self.pulling
    }

    pub fn begin_pull(&mut self, cursor: Vec2) {
        self.pulling = true;
        self.anchor = cursor;
        self.strength = 0.0;
    }

    /// Dragging back draws the bow; dragging down raises the aim.
    pub fn drag(&mut self, cursor: Vec2) {
        if !self.pulling {
            return;
        }
        let delta = cursor - self.anchor;
        self.draw = (delta.x * DRAW_GAIN).clamp(-MAX_DRAW, 0.0);
        self.strength = self.draw.abs() / PULL_NORMALIZER;
        self.aim = (-delta.y * AIM_GAIN).clamp(-AIM_LIMIT, AIM_LIMIT);
    }

    /// Ends the pull. Returns the shot strength when a shot should go out: the bow was drawn
    /// and the cooldown has passed.
    pub fn release(&mut self, now: f32, cooldown: f32) -> Option<f32> {
        let strength = self.strength;
        self.pulling = false;
        self.draw = 0.0;
        self.strength = 0.0;

        if strength <= 0.0 {
            return None;
        }
        if let Some(last) = self.last_shot {
            if now - last < cooldown {
                return None;
            }
        }
        self.last_shot = Some(now);
        Some(strength)
    }

    /// Drops any pull in progress and levels the bow.
    pub fn reset(&mut self) {
        self.pulling = false;
        self.draw = 0.0;
        self.strength = 0.0;
        self.aim = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slide {
    from_x: f32,
    to_x: f32,
    base_y: f32,
    tween: Tween,
}

#[derive(Component, Debug, Default)]
pub struct PlayerMotion {
    slide: Option<Slide>,
}

impl PlayerMotion {
    /// True while sliding; the bow ignores input until arrival.
    pub fn is_moving(&self) -> bool {
        self.slide.is_some()
    }

    pub fn slide_to(&mut self, from_x: f32, to_x: f32, base_y: f32, now: f32) {
        let duration = slide_duration((to_x - from_x).abs());
        self.slide = Some(Slide {
            from_x,
            to_x,
            base_y,
            tween: Tween::new(now, duration, Ease::QuadOut),
        });
    }

    /// Position at `now`, and whether the slide just ended.
    pub fn advance(&mut self, now: f32) -> Option<(Vec2, bool)> {
        let slide = self.slide?;
        if slide.tween.is_finished(now) {
            self.slide = None;
            return Some((Vec2::new(slide.to_x, slide.base_y), true));
        }
        let x = slide.tween.lerp(slide.from_x, slide.to_x, now);
        let bob = yoyo(now - slide.tween.started, BOB_HALF_PERIOD, Ease::SineInOut) * BOB_HEIGHT;
        Some((Vec2::new(x, slide.base_y + bob), false))
    }
}

pub fn slide_duration(distance: f32) -> f32 {
    (distance * SLIDE_SECS_PER_PX).max(SLIDE_MIN_SECS)
}

fn bow_position(centre: Vec2, aim: f32) -> Vec2 {
    centre + PIVOT_OFFSET + Vec2::from_angle(aim) * BOW_REACH
}

/// Top limb, drawing hand, bottom limb.
pub fn player_bowstring(centre: Vec2, aim: f32, draw: f32) -> [Vec2; 3] {
    let forward = Vec2::from_angle(aim);
    let across = forward.perp();
    let bow = bow_position(centre, aim);
    [
        bow + across * STRING_HALF_SPAN,
        bow + forward * (draw - 4.0),
        bow - across * STRING_HALF_SPAN,
    ]
}

#[derive(Component)]
struct PlayerPivot;

#[derive(Component)]
struct DrawingHand;

pub fn spawn_player(commands: &mut Commands, position: Vec2) -> Entity {
    let skin = Color::srgb(0.85, 0.66, 0.48);
    commands
        .spawn((
            Name::new("Player"),
            Player,
            SceneEntity,
            PlayerBow::default(),
            PlayerMotion::default(),
            BodyRole::Player,
            PhysicsBody::rect(BodyKind::Static, PLAYER_SIZE, layers::PLAYER, layers::ARROW),
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.2, 0.45, 0.3),
                    custom_size: Some(Vec2::new(50.0, 70.0)),
                    ..default()
                },
                transform: Transform::from_translation(position.extend(2.0)),
                ..default()
            },
        ))
        .with_children(|rig| {
            rig.spawn(SpriteBundle {
                sprite: Sprite {
                    color: skin,
                    custom_size: Some(Vec2::splat(56.0)),
                    ..default()
                },
                transform: Transform::from_xyz(0.0, 60.0, 0.1),
                ..default()
            });
            for x in [-12.0, 12.0] {
                rig.spawn(SpriteBundle {
                    sprite: Sprite {
                        color: Color::srgb(0.25, 0.22, 0.2),
                        custom_size: Some(Vec2::new(14.0, 40.0)),
                        ..default()
                    },
                    transform: Transform::from_xyz(x, -55.0, -0.1),
                    ..default()
                });
            }
            rig.spawn((
                PlayerPivot,
                SpatialBundle::from_transform(Transform::from_translation(
                    PIVOT_OFFSET.extend(0.2),
                )),
            ))
            .with_children(|arm| {
                arm.spawn(SpriteBundle {
                    sprite: Sprite {
                        color: skin,
                        custom_size: Some(Vec2::new(BOW_REACH, 13.0)),
                        ..default()
                    },
                    transform: Transform::from_xyz(BOW_REACH * 0.5, 0.0, 0.0),
                    ..default()
                });
                arm.spawn(SpriteBundle {
                    sprite: Sprite {
                        color: Color::srgb(0.4, 0.25, 0.1),
                        custom_size: Some(Vec2::new(8.0, STRING_HALF_SPAN * 2.0)),
                        ..default()
                    },
                    transform: Transform::from_xyz(BOW_REACH, 0.0, 0.1),
                    ..default()
                });
                arm.spawn((
                    DrawingHand,
                    SpriteBundle {
                        sprite: Sprite {
                            color: skin,
                            custom_size: Some(Vec2::new(40.0, 12.0)),
                            ..default()
                        },
                        transform: Transform::from_xyz(BOW_REACH - 20.0, -6.0, 0.05),
                        ..default()
                    },
                ));
            });
        })
        .id()
}

fn cursor_world_position(
    windows: &Query<&Window, With<PrimaryWindow>>,
    camera: &Query<(&Camera, &GlobalTransform), With<MainCamera>>,
) -> Option<Vec2> {
    let window = windows.get_single().ok()?;
    let (camera, camera_transform) = camera.get_single().ok()?;
    let cursor = window.cursor_position()?;
    camera.viewport_to_world_2d(camera_transform, cursor)
}

#[allow(clippy::too_many_arguments)]
fn handle_bow_input(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<GameSettings>,
    mouse: Res<ButtonInput<MouseButton>>,
    mut cursor_left: EventReader<CursorLeft>,
    windows: Query<&Window, With<PrimaryWindow>>,
    camera: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    mut triple: ResMut<TripleShot>,
    mut player: Query<(&Transform, &mut PlayerBow, &PlayerMotion), With<Player>>,
) {
    let left_window = cursor_left.read().count() > 0;
    let Ok((transform, mut bow, motion)) = player.get_single_mut() else {
        return;
    };
    if motion.is_moving() {
        return;
    }

    let cursor = cursor_world_position(&windows, &camera);
    if mouse.just_pressed(MouseButton::Left) {
        if let Some(cursor) = cursor {
            bow.begin_pull(cursor);
        }
    }
    if mouse.pressed(MouseButton::Left) {
        if let Some(cursor) = cursor {
            bow.drag(cursor);
        }
    }

    let released = mouse.just_released(MouseButton::Left) || (left_window && bow.is_pulling());
    if !released {
        return;
    }

    let now = time.elapsed_seconds();
    let aim = bow.aim;
    let Some(strength) = bow.release(now, settings.player_shot_cooldown) else {
        return;
    };
    let origin = bow_position(transform.translation.truncate(), aim);
    for angle in volley_angles(aim, settings.triple_shot_spread, triple.take()) {
        spawn_arrow(
            &mut commands,
            ArrowLaunch {
                owner: ArrowOwner::Player,
                origin,
                angle,
                pull: strength,
            },
            now,
        );
    }
}

fn slide_player(
    time: Res<Time>,
    mut arrivals: EventWriter<SlideFinished>,
    mut player: Query<(&mut Transform, &mut PlayerMotion), With<Player>>,
) {
    let Ok((mut transform, mut motion)) = player.get_single_mut() else {
        return;
    };
    let Some((position, arrived)) = motion.advance(time.elapsed_seconds()) else {
        return;
    };
    transform.translation.x = position.x;
    transform.translation.y = position.y;
    if arrived {
        debug!("Player arrived at x = {}.", position.x);
        arrivals.send(SlideFinished);
    }
}

fn pose_player(
    player: Query<&PlayerBow, With<Player>>,
    mut pivots: Query<&mut Transform, (With<PlayerPivot>, Without<DrawingHand>)>,
    mut hands: Query<&mut Transform, (With<DrawingHand>, Without<PlayerPivot>)>,
) {
    let Ok(bow) = player.get_single() else {
        return;
    };
    for mut pivot in &mut pivots {
        pivot.rotation = Quat::from_rotation_z(bow.aim);
    }
    for mut hand in &mut hands {
        hand.translation.x = BOW_REACH - 20.0 + bow.draw;
    }
}

fn draw_player_bowstring(mut gizmos: Gizmos, player: Query<(&PlayerBow, &Transform), With<Player>>) {
    let Ok((bow, transform)) = player.get_single() else {
        return;
    };
    let points = player_bowstring(transform.translation.truncate(), bow.aim, bow.draw);
    gizmos.linestrip_2d(points, Color::WHITE);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawn_bow() -> PlayerBow {
        let mut bow = PlayerBow::default();
        bow.begin_pull(Vec2::new(500.0, 0.0));
        bow.drag(Vec2::new(300.0, 0.0));
        bow
    }

    #[test]
    fn drag_maps_to_draw_and_aim() {
        let mut bow = PlayerBow::default();
        bow.begin_pull(Vec2::new(500.0, 200.0));
        bow.drag(Vec2::new(400.0, 100.0));
        assert!((bow.draw + 10.0).abs() < 1e-4);
        assert!((bow.strength - 0.5).abs() < 1e-4);
        assert!((bow.aim - 0.15).abs() < 1e-4);

        // Clamped at both ends; dragging forward never draws.
        bow.drag(Vec2::new(-5000.0, -5000.0));
        assert_eq!(bow.draw, -MAX_DRAW);
        assert_eq!(bow.aim, AIM_LIMIT);
        bow.drag(Vec2::new(900.0, 200.0));
        assert_eq!(bow.draw, 0.0);
        assert_eq!(bow.strength, 0.0);
    }

    #[test]
    fn undrawn_release_shoots_nothing() {
        let mut bow = PlayerBow::default();
        bow.begin_pull(Vec2::ZERO);
        assert_eq!(bow.release(1.0, 0.5), None);
        assert!(!bow.is_pulling());
    }

    #[test]
    fn cooldown_suppresses_quick_second_shot() {
        let mut bow = drawn_bow();
        assert!(bow.release(10.0, 0.5).is_some());

        let mut again = drawn_bow();
        again.last_shot = bow.last_shot;
        assert_eq!(again.release(10.3, 0.5), None);

        again.begin_pull(Vec2::new(500.0, 0.0));
        again.drag(Vec2::new(300.0, 0.0));
        assert!(again.release(10.5, 0.5).is_some());
    }

    #[test]
    fn shots_far_enough_apart_both_go_out() {
        let mut bow = drawn_bow();
        assert!(bow.release(1.0, 0.5).is_some());
        bow.begin_pull(Vec2::new(500.0, 0.0));
        bow.drag(Vec2::new(300.0, 0.0));
        assert!(bow.release(2.0, 0.5).is_some());
    }

    #[test]
    fn slide_takes_longer_for_longer_trips() {
        assert_eq!(slide_duration(100.0), SLIDE_MIN_SECS);
        assert!((slide_duration(1280.0) - 1.536).abs() < 1e-4);
    }

    #[test]
    fn slide_bobs_then_lands_once() {
        let mut motion = PlayerMotion::default();
        assert!(motion.advance(0.0).is_none());

        motion.slide_to(1180.0, 1380.0, -170.0, 2.0);
        assert!(motion.is_moving());
        let (mid, arrived) = motion.advance(2.0 + BOB_HALF_PERIOD).unwrap();
        assert!(!arrived);
        assert!(mid.x > 1180.0 && mid.x < 1380.0);
        assert!((mid.y - (-170.0 + BOB_HEIGHT)).abs() < 1e-3);

        let (end, arrived) = motion.advance(2.0 + SLIDE_MIN_SECS).unwrap();
        assert!(arrived);
        assert_eq!(end, Vec2::new(1380.0, -170.0));
        assert!(!motion.is_moving());
        assert!(motion.advance(3.0).is_none());
    }

    #[test]
    fn reset_levels_the_bow() {
        let mut bow = drawn_bow();
        bow.aim = 0.4;
        bow.reset();
        assert!(!bow.is_pulling());
        assert_eq!((bow.draw, bow.aim, bow.strength), (0.0, 0.0, 0.0));
    }
}

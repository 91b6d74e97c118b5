//! Arrow lifecycle: spawn with an owner and launch velocity, orient to the flight path, stick
//! into the ground and fade, and cull anything that leaves the world.
//!
//! An arrow is despawned exactly once. Every path that removes one goes through
//! [`Arrow::retire`], which only succeeds for the first caller.

use bevy::color::Alpha;
use bevy::prelude::*;

use crate::level::SceneEntity;
use crate::physics::{
    layers, AngularVelocity, Body, BodyKind, BodyRole, PhysicsBody, Velocity,
};
use crate::settings::GameSettings;
use crate::state::GameSet;
use crate::tween::{Ease, Tween};

pub struct ProjectilePlugin;

impl Plugin for ProjectilePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                (cull_arrows, settle_stuck_arrows).in_set(GameSet::Lifecycle),
                (orient_arrows, drop_trail_markers, fade_trail_markers).in_set(GameSet::Effects),
            ),
        );
    }
}

pub const ARROW_SIZE: Vec2 = Vec2::new(40.0, 6.0);
/// Arrow speed per unit of pull strength, in px per 60 Hz step.
pub const ARROW_SPEED_PER_PULL: f32 = 15.0;
pub const STEPS_PER_SECOND: f32 = 60.0;
/// How long a stuck arrow stays fully visible, then how long it takes to fade.
pub const STICK_HOLD: f32 = 1.5;
pub const STICK_FADE: f32 = 0.3;
/// Extra depth an arrow sinks into the ground when it sticks.
const STICK_NUDGE: f32 = 2.0;
const TRAIL_INTERVAL: f32 = 0.04;
const TRAIL_LIFETIME: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrowOwner {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrowFlight {
    Flying,
    Stuck { since: f32 },
    Removed,
}

#[derive(Component, Debug)]
pub struct Arrow {
    flight: ArrowFlight,
    last_trail: f32,
}

impl Arrow {
    pub fn new(now: f32) -> Self {
        Self {
            flight: ArrowFlight::Flying,
            last_trail: now,
        }
    }

    pub fn flight(&self) -> ArrowFlight {
        self.flight
    }

    pub fn is_flying(&self) -> bool {
        self.flight == ArrowFlight::Flying
    }

    /// `Flying → Stuck`. Returns false if the arrow was not in flight.
    pub fn stick(&mut self, now: f32) -> bool {
        if !self.is_flying() {
            return false;
        }
        self.flight = ArrowFlight::Stuck { since: now };
        true
    }

    /// `Flying → Removed` after striking a target. Returns false if the arrow had already hit
    /// something, so a contact reported twice resolves once.
    pub fn strike(&mut self) -> bool {
        if !self.is_flying() {
            return false;
        }
        self.flight = ArrowFlight::Removed;
        true
    }

    /// Any state → `Removed`. Returns true only the first time.
    pub fn retire(&mut self) -> bool {
        if self.flight == ArrowFlight::Removed {
            return false;
        }
        self.flight = ArrowFlight::Removed;
        true
    }

    /// Opacity of a stuck arrow, or `None` once it has fully faded (or never stuck).
    pub fn stuck_alpha(&self, now: f32) -> Option<f32> {
        let ArrowFlight::Stuck { since } = self.flight else {
            return None;
        };
        let fade = Tween::new(since + STICK_HOLD, STICK_FADE, Ease::Linear);
        if fade.is_finished(now) {
            return None;
        }
        Some(fade.lerp(1.0, 0.0, now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowLaunch {
    pub owner: ArrowOwner,
    pub origin: Vec2,
    pub angle: f32,
    /// Pull strength; the launch speed is derived from it.
    pub pull: f32,
}

impl ArrowLaunch {
    /// Launch speed in px/s.
    pub fn speed(&self) -> f32 {
        self.pull * ARROW_SPEED_PER_PULL * STEPS_PER_SECOND
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::from_angle(self.angle) * self.speed()
    }
}

pub fn spawn_arrow(commands: &mut Commands, launch: ArrowLaunch, now: f32) -> Entity {
    let color = match launch.owner {
        ArrowOwner::Player => Color::srgb(0.35, 0.22, 0.12),
        ArrowOwner::Enemy => Color::srgb(0.55, 0.12, 0.1),
    };

    commands
        .spawn((
            Name::new("Arrow"),
            SceneEntity,
            Arrow::new(now),
            BodyRole::Arrow {
                owner: launch.owner,
            },
            PhysicsBody::rect(
                BodyKind::Dynamic,
                ARROW_SIZE,
                layers::ARROW,
                layers::GROUND | layers::PLAYER | layers::ENEMY | layers::BONUS,
            ),
            Velocity(launch.velocity()),
            AngularVelocity::default(),
            SpriteBundle {
                sprite: Sprite {
                    color,
                    custom_size: Some(ARROW_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(launch.origin.extend(4.0))
                    .with_rotation(Quat::from_rotation_z(launch.angle)),
                ..default()
            },
        ))
        .id()
}

/// Freezes a flying arrow where it is. Guarded so a second call does nothing.
pub fn stick_arrow(
    arrow: &mut Arrow,
    body: &mut Body,
    velocity: &mut Velocity,
    transform: &mut Transform,
    now: f32,
) -> bool {
    if !arrow.stick(now) {
        return false;
    }
    halt(body, velocity);
    let heading = transform.rotation.to_euler(EulerRot::XYZ).2;
    let nudge = Vec2::from_angle(heading) * STICK_NUDGE;
    transform.translation += nudge.extend(0.0);
    true
}

/// Zeroes motion and turns the body static.
pub fn halt(body: &mut Body, velocity: &mut Velocity) {
    velocity.0 = Vec2::ZERO;
    body.make_static();
}

/// Despawns the arrow if nobody else has. Stale entities are ignored.
pub fn despawn_arrow(commands: &mut Commands, entity: Entity, arrow: &mut Arrow) {
    if !arrow.retire() {
        return;
    }
    if let Some(entity_commands) = commands.get_entity(entity) {
        entity_commands.despawn_recursive();
    }
}

/// The rectangle outside which arrows are considered lost.
pub fn world_bounds(settings: &GameSettings) -> Rect {
    Rect::new(
        -100.0,
        settings.ground_y - 700.0,
        settings.screen_width * 110.0,
        settings.ground_y + 1700.0,
    )
}

fn orient_arrows(mut arrows: Query<(&Arrow, &Velocity, &mut Transform)>) {
    for (arrow, velocity, mut transform) in &mut arrows {
        if !arrow.is_flying() || velocity.0 == Vec2::ZERO {
            continue;
        }
        transform.rotation = Quat::from_rotation_z(velocity.y.atan2(velocity.x));
    }
}

fn cull_arrows(
    mut commands: Commands,
    settings: Res<GameSettings>,
    mut arrows: Query<(Entity, &mut Arrow, &Transform)>,
) {
    let bounds = world_bounds(&settings);
    for (entity, mut arrow, transform) in &mut arrows {
        if bounds.contains(transform.translation.truncate()) {
            continue;
        }
        despawn_arrow(&mut commands, entity, &mut arrow);
    }
}

fn settle_stuck_arrows(
    mut commands: Commands,
    time: Res<Time>,
    mut arrows: Query<(Entity, &mut Arrow, &mut Sprite)>,
) {
    let now = time.elapsed_seconds();
    for (entity, mut arrow, mut sprite) in &mut arrows {
        if !matches!(arrow.flight(), ArrowFlight::Stuck { .. }) {
            continue;
        }
        match arrow.stuck_alpha(now) {
            Some(alpha) => sprite.color.set_alpha(alpha),
            None => {
                debug!("Stuck arrow {:?} faded out.", entity);
                despawn_arrow(&mut commands, entity, &mut arrow);
            }
        }
    }
}

/// Short-lived marker left behind a flying arrow. Purely decorative.
#[derive(Component)]
struct TrailMarker {
    born: f32,
}

fn drop_trail_markers(
    mut commands: Commands,
    time: Res<Time>,
    mut arrows: Query<(&mut Arrow, &Transform)>,
) {
    let now = time.elapsed_seconds();
    for (mut arrow, transform) in &mut arrows {
        if !arrow.is_flying() || now - arrow.last_trail < TRAIL_INTERVAL {
            continue;
        }
        arrow.last_trail = now;
        commands.spawn((
            Name::new("ArrowTrail"),
            SceneEntity,
            TrailMarker { born: now },
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgba(1.0, 1.0, 1.0, 0.6),
                    custom_size: Some(Vec2::splat(4.0)),
                    ..default()
                },
                transform: Transform::from_translation(transform.translation.with_z(3.0)),
                ..default()
            },
        ));
    }
}

fn fade_trail_markers(
    mut commands: Commands,
    time: Res<Time>,
    mut markers: Query<(Entity, &TrailMarker, &mut Sprite)>,
) {
    let now = time.elapsed_seconds();
    for (entity, marker, mut sprite) in &mut markers {
        let age = now - marker.born;
        if age >= TRAIL_LIFETIME {
            commands.entity(entity).despawn();
        } else {
            sprite.color.set_alpha(0.6 * (1.0 - age / TRAIL_LIFETIME));
        }
    }
}

//! Physics: hand-integrated motion on top of rapier's collision detection.
//!
//! Rapier never simulates anything here. Every body is kinematic and position based, so the
//! entity's `Transform` is the body position and whatever moves a visual (tweens, AI,
//! followers, arrow flight) moves its collider too. Rapier supplies the collider shapes,
//! membership/filter groups and `CollisionEvent::Started` reports. Only top-level entities
//! carry bodies.

use bevy::prelude::*;
use bevy_rapier2d::geometry::Group;
use bevy_rapier2d::prelude::{
    ActiveCollisionTypes, ActiveEvents, Collider, CollisionGroups, NoUserData,
    RapierPhysicsPlugin, RigidBody, Sensor,
};

use crate::combat::CombatantKind;
use crate::projectile::ArrowOwner;
use crate::settings::GameSettings;
use crate::state::GameSet;

const PIXELS_PER_METER: f32 = 100.0;

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::pixels_per_meter(
            PIXELS_PER_METER,
        ))
        .add_systems(Update, integrate_bodies.in_set(GameSet::Physics));
    }
}

/// Collision groups. A pair is only tested when each body's membership appears in the other
/// body's filter.
pub mod layers {
    use bevy_rapier2d::geometry::Group;

    pub const GROUND: Group = Group::GROUP_1;
    pub const ARROW: Group = Group::GROUP_2;
    pub const PLAYER: Group = Group::GROUP_3;
    pub const ENEMY: Group = Group::GROUP_4;
    pub const BONUS: Group = Group::GROUP_5;
    pub const TOWER: Group = Group::GROUP_6;
    pub const BLADE: Group = Group::GROUP_7;
    pub const NONE: Group = Group::NONE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Moved only by the system that owns it.
    Static,
    /// Never pushes anything; exists to report overlaps.
    Sensor,
    /// Integrated every step from `Velocity`, with gravity.
    Dynamic,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Body {
    pub kind: BodyKind,
}

impl Body {
    pub fn make_static(&mut self) {
        self.kind = BodyKind::Static;
    }
}

/// A rectangle body with its rapier collider, groups and event flags.
#[derive(Bundle)]
pub struct PhysicsBody {
    body: Body,
    rigid_body: RigidBody,
    collider: Collider,
    groups: CollisionGroups,
    collision_types: ActiveCollisionTypes,
    events: ActiveEvents,
}

impl PhysicsBody {
    pub fn rect(kind: BodyKind, size: Vec2, memberships: Group, filters: Group) -> Self {
        Self {
            body: Body { kind },
            rigid_body: RigidBody::KinematicPositionBased,
            collider: Collider::cuboid(size.x * 0.5, size.y * 0.5),
            groups: CollisionGroups::new(memberships, filters),
            // Every body is kinematic, so kinematic pairs must be tested too.
            collision_types: ActiveCollisionTypes::all(),
            events: ActiveEvents::COLLISION_EVENTS,
        }
    }

    pub fn sensor(size: Vec2, memberships: Group, filters: Group) -> (Self, Sensor) {
        (Self::rect(BodyKind::Sensor, size, memberships, filters), Sensor)
    }
}

#[derive(Component, Debug, Default, Clone, Copy, Deref, DerefMut)]
pub struct Velocity(pub Vec2);

#[derive(Component, Debug, Default, Clone, Copy, Deref, DerefMut)]
pub struct AngularVelocity(pub f32);

/// What a body stands for in the game. Collision resolution looks the role up by entity instead
/// of inspecting the body itself.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRole {
    Arrow { owner: ArrowOwner },
    Ground,
    Enemy(CombatantKind),
    Player,
    Bonus,
    Tower,
    Blade,
}

/// Stops a body from reporting any further contacts.
pub fn disable_contacts(groups: &mut CollisionGroups) {
    groups.filters = layers::NONE;
}

fn integrate_bodies(
    time: Res<Time>,
    settings: Res<GameSettings>,
    mut bodies: Query<(
        &Body,
        &mut Transform,
        &mut Velocity,
        Option<&AngularVelocity>,
    )>,
) {
    let dt = time.delta_seconds();
    if dt <= 0.0 {
        return;
    }

    for (body, mut transform, mut velocity, angular) in &mut bodies {
        if body.kind != BodyKind::Dynamic {
            continue;
        }

        velocity.y -= settings.gravity * dt;
        transform.translation.x += velocity.x * dt;
        transform.translation.y += velocity.y * dt;

        if let Some(angular) = angular {
            if angular.0 != 0.0 {
                transform.rotate_z(angular.0 * dt);
            }
        }
    }
}

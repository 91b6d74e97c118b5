//! Tower archers: aim at the player every tick, and cycle through pull → release → recover on a
//! randomised cooldown.

use std::f32::consts::PI;

use bevy::prelude::*;
use rand::Rng;

use super::{Combatant, CombatantKind};
use crate::level::SceneEntity;
use crate::physics::{layers, BodyKind, BodyRole, PhysicsBody};
use crate::player::Player;
use crate::projectile::{spawn_arrow, ArrowLaunch, ArrowOwner};
use crate::settings::GameRng;
use crate::state::GameSet;
use crate::tween::{Ease, Tween};

pub struct ArcherPlugin;

impl Plugin for ArcherPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, drive_archers.in_set(GameSet::Ai))
            .add_systems(
                Update,
                (pose_archers, draw_archer_bowstrings).in_set(GameSet::Effects),
            );
    }
}

/// Seconds between shots, drawn fresh after every shot.
pub const COOLDOWN_RANGE: (f32, f32) = (0.9, 1.6);
pub const AIM_OFFSET_DEG: (f32, f32) = (-60.0, 10.0);
pub const PULL_RANGE: (f32, f32) = (0.5, 3.5);
/// Draw distance in px for one unit of pull strength.
pub const PULL_NORMALIZER: f32 = 20.0;
const PULL_PX_CLAMP: (f32, f32) = (4.0, 80.0);
const PULL_BASE_SECS: f32 = 0.24;
const PULL_SECS_PER_PX: f32 = 0.003;
const RECOVER_SECS: f32 = 0.14;
const AIM_GAIN: f32 = 0.0015;
const AIM_LIMIT: f32 = 0.8;

pub const ARCHER_SIZE: Vec2 = Vec2::new(60.0, 160.0);
/// Shoulder pivot relative to the archer's centre.
const PIVOT_OFFSET: Vec2 = Vec2::new(-20.0, 30.0);
/// Distance from the pivot to the resting bow hand.
const HAND_REACH: f32 = 70.0;
const STRING_HALF_SPAN: f32 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArcherPhase {
    Idle,
    Pulling { tween: Tween, target_px: f32 },
    Recovering { tween: Tween, from_px: f32 },
}

/// What an archer asks of the world after advancing one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArcherStep {
    Hold,
    /// Release an arrow with this pull strength.
    Fire { pull: f32 },
}

#[derive(Component, Debug)]
pub struct EnemyArcher {
    pub phase: ArcherPhase,
    /// Randomised per shot, in radians.
    pub aim_offset: f32,
    pub pull_target: f32,
    pub pull_strength: f32,
    /// Current bowstring draw in px.
    pub draw_px: f32,
    /// Upper-body rotation; 0 aims straight left, positive tilts the shot downward.
    pub tilt: f32,
    pub last_shot: f32,
    pub cooldown: f32,
}

impl EnemyArcher {
    pub fn new(now: f32, cooldown: f32) -> Self {
        Self {
            phase: ArcherPhase::Idle,
            aim_offset: 0.0,
            pull_target: 1.0,
            pull_strength: 0.0,
            draw_px: 0.0,
            tilt: 0.0,
            last_shot: now,
            cooldown,
        }
    }

    pub fn is_pulling(&self) -> bool {
        !matches!(self.phase, ArcherPhase::Idle)
    }

    /// Tracks the player vertically; the per-shot offset rides on top.
    pub fn aim(&mut self, archer_y: f32, player_y: f32) {
        let base = ((archer_y - player_y) * AIM_GAIN).clamp(-AIM_LIMIT, AIM_LIMIT);
        self.tilt = base + self.aim_offset;
    }

    pub fn ready(&self, now: f32) -> bool {
        !self.is_pulling() && now - self.last_shot >= self.cooldown
    }

    pub fn begin_pull(&mut self, now: f32, rng: &mut impl Rng) {
        let offset = rng
            .gen_range(AIM_OFFSET_DEG.0..=AIM_OFFSET_DEG.1)
            .to_radians();
        let target = rng.gen_range(PULL_RANGE.0..=PULL_RANGE.1);
        self.begin_pull_with(now, offset, target);
    }

    pub fn begin_pull_with(&mut self, now: f32, aim_offset: f32, pull_target: f32) {
        self.aim_offset = aim_offset;
        self.pull_target = pull_target;
        self.draw_px = 0.0;
        self.pull_strength = 0.0;

        let target_px = pull_pixels(pull_target);
        self.phase = ArcherPhase::Pulling {
            tween: Tween::new(now, pull_duration(target_px), Ease::QuadOut),
            target_px,
        };
    }

    /// Advances the pull/recover phases. Fires once at the end of the pull; draws a fresh
    /// cooldown when the arm is back at rest.
    pub fn advance(&mut self, now: f32, rng: &mut impl Rng) -> ArcherStep {
        match self.phase {
            ArcherPhase::Idle => ArcherStep::Hold,
            ArcherPhase::Pulling { tween, target_px } => {
                self.draw_px = tween.lerp(0.0, target_px, now);
                self.pull_strength = self.draw_px / PULL_NORMALIZER;
                if !tween.is_finished(now) {
                    return ArcherStep::Hold;
                }
                self.draw_px = target_px;
                self.pull_strength = target_px / PULL_NORMALIZER;
                let pull = self.pull_strength;
                self.phase = ArcherPhase::Recovering {
                    tween: Tween::new(now, RECOVER_SECS, Ease::QuadIn),
                    from_px: target_px,
                };
                ArcherStep::Fire { pull }
            }
            ArcherPhase::Recovering { tween, from_px } => {
                self.draw_px = tween.lerp(from_px, 0.0, now);
                if tween.is_finished(now) {
                    self.phase = ArcherPhase::Idle;
                    self.draw_px = 0.0;
                    self.pull_strength = 0.0;
                    self.last_shot = now;
                    self.cooldown = rng.gen_range(COOLDOWN_RANGE.0..=COOLDOWN_RANGE.1);
                }
                ArcherStep::Hold
            }
        }
    }

    /// Drops any pull in progress without firing.
    pub fn cancel(&mut self) {
        self.phase = ArcherPhase::Idle;
        self.draw_px = 0.0;
        self.pull_strength = 0.0;
    }

    /// World angle of the shot. The archer faces left, so tilt 0 fires along −x.
    pub fn fire_angle(&self) -> f32 {
        self.tilt + PI
    }

    /// Where an arrow leaves the bow, given the archer's centre.
    pub fn release_point(&self, centre: Vec2) -> Vec2 {
        centre + PIVOT_OFFSET + Vec2::from_angle(self.fire_angle()) * HAND_REACH
    }
}

pub fn pull_pixels(pull_target: f32) -> f32 {
    (pull_target * PULL_NORMALIZER).clamp(PULL_PX_CLAMP.0, PULL_PX_CLAMP.1)
}

/// Longer draws take longer.
pub fn pull_duration(pull_px: f32) -> f32 {
    PULL_BASE_SECS + (pull_px - 20.0) * PULL_SECS_PER_PX
}

/// Rotating part of the archer rig (arms and bow).
#[derive(Component)]
pub struct ArcherPivot;

pub fn spawn_archer(commands: &mut Commands, centre: Vec2, now: f32, rng: &mut GameRng) -> Entity {
    let cooldown = rng.0.gen_range(COOLDOWN_RANGE.0..=COOLDOWN_RANGE.1);
    let skin = Color::srgb(0.38, 0.24, 0.15);

    commands
        .spawn((
            Name::new("EnemyArcher"),
            SceneEntity,
            EnemyArcher::new(now, cooldown),
            Combatant::new(CombatantKind::Archer),
            BodyRole::Enemy(CombatantKind::Archer),
            PhysicsBody::rect(BodyKind::Static, ARCHER_SIZE, layers::ENEMY, layers::ARROW),
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.45, 0.2, 0.2),
                    custom_size: Some(Vec2::new(50.0, 70.0)),
                    ..default()
                },
                transform: Transform::from_translation(centre.extend(2.0)),
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
                        color: skin,
                        custom_size: Some(Vec2::new(14.0, 40.0)),
                        ..default()
                    },
                    transform: Transform::from_xyz(x, -55.0, -0.1),
                    ..default()
                });
            }
            rig.spawn((
                ArcherPivot,
                SpatialBundle::from_transform(Transform::from_translation(
                    PIVOT_OFFSET.extend(0.2),
                )),
            ))
            .with_children(|arm| {
                arm.spawn(SpriteBundle {
                    sprite: Sprite {
                        color: skin,
                        custom_size: Some(Vec2::new(HAND_REACH, 13.0)),
                        ..default()
                    },
                    transform: Transform::from_xyz(-HAND_REACH * 0.5, 0.0, 0.0),
                    ..default()
                });
                arm.spawn(SpriteBundle {
                    sprite: Sprite {
                        color: Color::srgb(0.3, 0.18, 0.08),
                        custom_size: Some(Vec2::new(8.0, STRING_HALF_SPAN * 2.0)),
                        ..default()
                    },
                    transform: Transform::from_xyz(-HAND_REACH, 0.0, 0.1),
                    ..default()
                });
            });
        })
        .id()
}

fn drive_archers(
    mut commands: Commands,
    time: Res<Time>,
    mut rng: ResMut<GameRng>,
    player: Query<&Transform, With<Player>>,
    mut archers: Query<(&mut EnemyArcher, &Combatant, &Transform), Without<Player>>,
) {
    let Ok(player_transform) = player.get_single() else {
        return;
    };
    let now = time.elapsed_seconds();
    let player_y = player_transform.translation.y;

    for (mut archer, combatant, transform) in &mut archers {
        if combatant.is_dying() {
            if archer.is_pulling() {
                archer.cancel();
            }
            continue;
        }

        let centre = transform.translation.truncate();
        archer.aim(centre.y, player_y);

        if archer.ready(now) {
            archer.begin_pull(now, &mut rng.0);
        }

        if let ArcherStep::Fire { pull } = archer.advance(now, &mut rng.0) {
            if pull <= 0.0 {
                continue;
            }
            spawn_arrow(
                &mut commands,
                ArrowLaunch {
                    owner: ArrowOwner::Enemy,
                    origin: archer.release_point(centre),
                    angle: archer.fire_angle(),
                    pull,
                },
                now,
            );
        }
    }
}

fn pose_archers(
    archers: Query<&EnemyArcher>,
    mut pivots: Query<(&Parent, &mut Transform), With<ArcherPivot>>,
) {
    for (parent, mut transform) in &mut pivots {
        if let Ok(archer) = archers.get(parent.get()) {
            transform.rotation = Quat::from_rotation_z(archer.tilt);
        }
    }
}

/// Bowstring from the top limb through the drawing hand to the bottom limb.
pub fn bowstring_points(centre: Vec2, tilt: f32, draw_px: f32) -> [Vec2; 3] {
    let pivot = centre + PIVOT_OFFSET;
    let forward = Vec2::from_angle(tilt + PI);
    let across = forward.perp();
    let bow = pivot + forward * HAND_REACH;
    [
        bow + across * STRING_HALF_SPAN,
        bow - forward * draw_px,
        bow - across * STRING_HALF_SPAN,
    ]
}

fn draw_archer_bowstrings(mut gizmos: Gizmos, archers: Query<(&EnemyArcher, &Combatant, &Transform)>) {
    for (archer, combatant, transform) in &archers {
        if combatant.is_dying() {
            continue;
        }
        let points = bowstring_points(transform.translation.truncate(), archer.tilt, archer.draw_px);
        gizmos.linestrip_2d(points, Color::WHITE);
    }
}

//! Melee swordsmen walk in from the right, stop within reach of the player and swing on a
//! cooldown. The blade is a follower: its transform and sensor body are recomputed from the
//! wielding arm every tick.

use std::f32::consts::PI;

use bevy::prelude::*;
use rand::Rng;

use super::{Combatant, CombatantKind};
use crate::camera::MainCamera;
use crate::health::DamagePlayer;
use crate::level::{retire_enemy, SceneEntity, Screen, ScreenRoster};
use crate::physics::{layers, BodyKind, BodyRole, PhysicsBody};
use crate::player::Player;
use crate::settings::{GameRng, GameSettings};
use crate::state::GameSet;
use crate::tween::{Ease, Tween};

pub struct SwordsmanPlugin;

impl Plugin for SwordsmanPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (drive_swordsmen, follow_blades)
                .chain()
                .in_set(GameSet::Ai),
        )
        .add_systems(Update, pose_swordsmen.in_set(GameSet::Effects));
    }
}

pub const SPEED_RANGE: (f32, f32) = (90.0, 150.0);
pub const ATTACK_RANGE: f32 = 110.0;
pub const ATTACK_COOLDOWN: f32 = 1.1;
/// Rounding allowance so a swordsman parked at exactly `ATTACK_RANGE` stays parked.
const RANGE_SLACK: f32 = 0.01;
pub const ATTACK_DAMAGE: u32 = 1;
const WINDUP_SECS: f32 = 0.22;
const STRIKE_SECS: f32 = 0.12;
const RECOVER_SECS: f32 = 0.26;
/// Arm angles relative to hanging straight down; positive raises the arm forward.
const WINDUP_ANGLE: f32 = 2.2;
const STRIKE_ANGLE: f32 = 0.4;
const REST_ANGLE: f32 = 0.9;
const WALK_STRIDE_HZ: f32 = 2.2;
const WALK_SWING: f32 = 0.35;
/// How far past the trailing camera edge a swordsman may drift before being dropped.
const TRAILING_SLACK: f32 = 120.0;

pub const SWORDSMAN_SIZE: Vec2 = Vec2::new(50.0, 140.0);
const SHOULDER: Vec2 = Vec2::new(-6.0, 35.0);
const ARM_LENGTH: f32 = 45.0;
pub const BLADE_SIZE: Vec2 = Vec2::new(70.0, 8.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackStage {
    Windup,
    Strike,
    Recover,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwordsmanPhase {
    Walking,
    /// In reach, waiting for the cooldown.
    Idle,
    Attacking { stage: AttackStage, tween: Tween },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwordStep {
    Hold,
    /// The blade connects this tick.
    Strike,
}

#[derive(Component, Debug)]
pub struct Swordsman {
    pub speed: f32,
    pub phase: SwordsmanPhase,
    pub last_attack: f32,
    pub arm_angle: f32,
    pub leg_swing: f32,
    walk_clock: f32,
    pub blade: Entity,
}

impl Swordsman {
    pub fn new(speed: f32, now: f32, blade: Entity) -> Self {
        Self {
            speed,
            phase: SwordsmanPhase::Walking,
            last_attack: now,
            arm_angle: REST_ANGLE,
            leg_swing: 0.0,
            walk_clock: 0.0,
            blade,
        }
    }

    pub fn is_walking(&self) -> bool {
        self.phase == SwordsmanPhase::Walking
    }

    /// Advances one tick. `x` is the swordsman's horizontal position and is moved while walking.
    pub fn advance(&mut self, now: f32, dt: f32, x: &mut f32, player_x: f32) -> SwordStep {
        if let SwordsmanPhase::Attacking { stage, tween } = self.phase {
            return self.advance_attack(stage, tween, now, (player_x - *x).abs());
        }

        let distance = (player_x - *x).abs();
        if distance > ATTACK_RANGE + RANGE_SLACK {
            self.phase = SwordsmanPhase::Walking;
            let step = (self.speed * dt).min(distance - ATTACK_RANGE);
            *x += (player_x - *x).signum() * step;
            self.walk_clock += dt;
            self.leg_swing = (self.walk_clock * WALK_STRIDE_HZ * 2.0 * PI).sin() * WALK_SWING;
            self.arm_angle = REST_ANGLE - self.leg_swing;
            return SwordStep::Hold;
        }

        if self.is_walking() {
            self.phase = SwordsmanPhase::Idle;
            self.last_attack = now;
            self.leg_swing = 0.0;
            self.arm_angle = REST_ANGLE;
        }

        if now - self.last_attack >= ATTACK_COOLDOWN {
            self.phase = SwordsmanPhase::Attacking {
                stage: AttackStage::Windup,
                tween: Tween::new(now, WINDUP_SECS, Ease::QuadOut),
            };
        }
        SwordStep::Hold
    }

    fn advance_attack(
        &mut self,
        stage: AttackStage,
        tween: Tween,
        now: f32,
        distance: f32,
    ) -> SwordStep {
        match stage {
            AttackStage::Windup => {
                self.arm_angle = tween.lerp(REST_ANGLE, WINDUP_ANGLE, now);
                if tween.is_finished(now) {
                    self.phase = SwordsmanPhase::Attacking {
                        stage: AttackStage::Strike,
                        tween: Tween::new(now, STRIKE_SECS, Ease::QuadIn),
                    };
                    return SwordStep::Strike;
                }
            }
            AttackStage::Strike => {
                self.arm_angle = tween.lerp(WINDUP_ANGLE, STRIKE_ANGLE, now);
                if tween.is_finished(now) {
                    self.phase = SwordsmanPhase::Attacking {
                        stage: AttackStage::Recover,
                        tween: Tween::new(now, RECOVER_SECS, Ease::QuadOut),
                    };
                }
            }
            AttackStage::Recover => {
                self.arm_angle = tween.lerp(STRIKE_ANGLE, REST_ANGLE, now);
                if tween.is_finished(now) {
                    self.last_attack = now;
                    self.phase = if distance > ATTACK_RANGE + RANGE_SLACK {
                        SwordsmanPhase::Walking
                    } else {
                        SwordsmanPhase::Idle
                    };
                }
            }
        }
        SwordStep::Hold
    }
}

/// World position and rotation of the blade for a swordsman at `centre` facing left.
pub fn blade_pose(centre: Vec2, arm_angle: f32) -> (Vec2, f32) {
    // Hanging straight down, rotated toward the facing side (−x) by `arm_angle`.
    let arm_heading = -PI * 0.5 - arm_angle;
    let direction = Vec2::from_angle(arm_heading);
    let hand = centre + SHOULDER + direction * ARM_LENGTH;
    let blade_centre = hand + direction * (BLADE_SIZE.x * 0.5);
    (blade_centre, arm_heading)
}

/// Links a blade to the swordsman holding it.
#[derive(Component, Debug)]
pub struct SwordBlade {
    pub wielder: Entity,
}

#[derive(Component)]
pub struct SwordArm;

#[derive(Component)]
pub struct SwordLeg {
    pub side: f32,
}

pub fn spawn_swordsman(
    commands: &mut Commands,
    centre: Vec2,
    now: f32,
    rng: &mut GameRng,
) -> Entity {
    let speed = rng.0.gen_range(SPEED_RANGE.0..=SPEED_RANGE.1);
    let (blade_pos, blade_angle) = blade_pose(centre, REST_ANGLE);

    let blade = commands
        .spawn((
            Name::new("SwordBlade"),
            SceneEntity,
            BodyRole::Blade,
            PhysicsBody::sensor(BLADE_SIZE, layers::BLADE, layers::NONE),
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.82, 0.84, 0.88),
                    custom_size: Some(BLADE_SIZE),
                    ..default()
                },
                transform: Transform::from_translation(blade_pos.extend(2.5))
                    .with_rotation(Quat::from_rotation_z(blade_angle)),
                ..default()
            },
        ))
        .id();

    let skin = Color::srgb(0.72, 0.55, 0.38);
    let swordsman = commands
        .spawn((
            Name::new("Swordsman"),
            SceneEntity,
            Swordsman::new(speed, now, blade),
            Combatant::new(CombatantKind::Swordsman),
            BodyRole::Enemy(CombatantKind::Swordsman),
            PhysicsBody::rect(
                BodyKind::Static,
                SWORDSMAN_SIZE,
                layers::ENEMY,
                layers::ARROW,
            ),
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.25, 0.3, 0.45),
                    custom_size: Some(Vec2::new(46.0, 64.0)),
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
                    custom_size: Some(Vec2::splat(44.0)),
                    ..default()
                },
                transform: Transform::from_xyz(0.0, 52.0, 0.1),
                ..default()
            });
            for side in [-1.0, 1.0] {
                rig.spawn((
                    SwordLeg { side },
                    SpriteBundle {
                        sprite: Sprite {
                            color: Color::srgb(0.2, 0.2, 0.25),
                            custom_size: Some(Vec2::new(14.0, 40.0)),
                            ..default()
                        },
                        transform: Transform::from_xyz(side * 10.0, -50.0, -0.1),
                        ..default()
                    },
                ));
            }
            rig.spawn((
                SwordArm,
                SpatialBundle::from_transform(Transform::from_translation(SHOULDER.extend(0.2))),
            ))
            .with_children(|arm| {
                arm.spawn(SpriteBundle {
                    sprite: Sprite {
                        color: skin,
                        custom_size: Some(Vec2::new(12.0, ARM_LENGTH)),
                        ..default()
                    },
                    transform: Transform::from_xyz(0.0, -ARM_LENGTH * 0.5, 0.0),
                    ..default()
                });
            });
        })
        .id();

    commands.entity(blade).insert(SwordBlade { wielder: swordsman });
    swordsman
}

#[allow(clippy::too_many_arguments)]
fn drive_swordsmen(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<GameSettings>,
    mut screen: ResMut<Screen>,
    mut roster: ResMut<ScreenRoster>,
    mut damage: EventWriter<DamagePlayer>,
    player: Query<&Transform, With<Player>>,
    camera: Query<&Transform, (With<MainCamera>, Without<Player>)>,
    mut swordsmen: Query<
        (Entity, &mut Swordsman, &mut Combatant, &mut Transform),
        (Without<Player>, Without<MainCamera>),
    >,
) {
    let Ok(player_transform) = player.get_single() else {
        return;
    };
    let now = time.elapsed_seconds();
    let dt = time.delta_seconds();
    let player_x = player_transform.translation.x;
    let trailing_edge = camera
        .get_single()
        .map(|cam| cam.translation.x - settings.screen_width * 0.5)
        .unwrap_or(f32::NEG_INFINITY);

    for (entity, mut swordsman, mut combatant, mut transform) in &mut swordsmen {
        if combatant.is_dying() {
            continue;
        }

        let mut x = transform.translation.x;
        let step = swordsman.advance(now, dt, &mut x, player_x);
        transform.translation.x = x;

        if step == SwordStep::Strike && screen.is_populated() {
            damage.send(DamagePlayer {
                amount: ATTACK_DAMAGE,
            });
        }

        if x < trailing_edge - TRAILING_SLACK && combatant.retire() {
            debug!("Swordsman {:?} left the screen.", entity);
            if let Some(blade) = commands.get_entity(swordsman.blade) {
                blade.despawn_recursive();
            }
            commands.entity(entity).despawn_recursive();
            retire_enemy(entity, CombatantKind::Swordsman, &mut roster, &mut screen);
        }
    }
}

fn follow_blades(
    swordsmen: Query<(&Swordsman, &Transform), Without<SwordBlade>>,
    mut blades: Query<(&SwordBlade, &mut Transform)>,
) {
    for (blade, mut transform) in &mut blades {
        let Ok((swordsman, wielder)) = swordsmen.get(blade.wielder) else {
            continue;
        };
        let (position, angle) = blade_pose(wielder.translation.truncate(), swordsman.arm_angle);
        transform.translation = position.extend(transform.translation.z);
        transform.rotation = Quat::from_rotation_z(angle);
    }
}

fn pose_swordsmen(
    swordsmen: Query<&Swordsman>,
    mut arms: Query<(&Parent, &mut Transform), (With<SwordArm>, Without<SwordLeg>)>,
    mut legs: Query<(&Parent, &SwordLeg, &mut Transform), Without<SwordArm>>,
) {
    for (parent, mut transform) in &mut arms {
        if let Ok(swordsman) = swordsmen.get(parent.get()) {
            transform.rotation = Quat::from_rotation_z(-swordsman.arm_angle);
        }
    }
    for (parent, leg, mut transform) in &mut legs {
        if let Ok(swordsman) = swordsmen.get(parent.get()) {
            transform.rotation = Quat::from_rotation_z(swordsman.leg_swing * leg.side);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn swordsman() -> Swordsman {
        Swordsman::new(120.0, 0.0, Entity::PLACEHOLDER)
    }

    /// Runs the swordsman until `until`, returning how many strikes landed.
    fn run(s: &mut Swordsman, x: &mut f32, player_x: f32, from: f32, until: f32) -> u32 {
        let mut strikes = 0;
        let mut now = from;
        while now < until {
            now += DT;
            if s.advance(now, DT, x, player_x) == SwordStep::Strike {
                strikes += 1;
            }
        }
        strikes
    }

    #[test]
    fn walks_toward_the_player_and_stops_in_range() {
        let mut s = swordsman();
        let mut x = 800.0;
        let player_x = 100.0;

        s.advance(DT, DT, &mut x, player_x);
        assert!(s.is_walking());
        assert!((x - (800.0 - 120.0 * DT)).abs() < 1e-3);

        let strikes = run(&mut s, &mut x, player_x, DT, 8.0);
        assert!((x - player_x - ATTACK_RANGE).abs() < 1e-3, "stopped at {x}");
        assert!(!s.is_walking());
        assert!(strikes >= 1);
    }

    #[test]
    fn first_swing_waits_for_the_cooldown() {
        let mut s = swordsman();
        let mut x = 150.0;
        let player_x = 100.0;

        // Arrives in range at t = 1: the cooldown starts there.
        s.advance(1.0, DT, &mut x, player_x);
        assert_eq!(s.phase, SwordsmanPhase::Idle);
        assert_eq!(run(&mut s, &mut x, player_x, 1.0, 1.0 + ATTACK_COOLDOWN - 0.05), 0);
        assert!(!matches!(s.phase, SwordsmanPhase::Attacking { .. }));

        let strikes = run(
            &mut s,
            &mut x,
            player_x,
            1.0 + ATTACK_COOLDOWN - 0.05,
            1.0 + ATTACK_COOLDOWN + WINDUP_SECS + 0.05,
        );
        assert_eq!(strikes, 1);
    }

    #[test]
    fn one_strike_per_attack_cycle() {
        let mut s = swordsman();
        let mut x = 150.0;
        let cycle = WINDUP_SECS + STRIKE_SECS + RECOVER_SECS + ATTACK_COOLDOWN;
        s.advance(0.0, DT, &mut x, 100.0);
        let strikes = run(&mut s, &mut x, 100.0, 0.0, ATTACK_COOLDOWN + cycle * 3.0 - 0.1);
        assert_eq!(strikes, 3);
    }

    #[test]
    fn resumes_walking_if_the_player_moved_away() {
        let mut s = swordsman();
        let mut x = 150.0;
        s.advance(0.0, DT, &mut x, 100.0);
        run(&mut s, &mut x, 100.0, 0.0, ATTACK_COOLDOWN + 0.05);
        assert!(matches!(s.phase, SwordsmanPhase::Attacking { .. }));

        // The player slides off mid-swing; the swing finishes, then the chase resumes.
        let strikes = run(&mut s, &mut x, 1_000.0, ATTACK_COOLDOWN + 0.05, ATTACK_COOLDOWN + 1.0);
        assert_eq!(strikes, 1);
        assert!(s.is_walking());
        assert!(x > 150.0);
    }

    #[test]
    fn blade_hangs_from_the_hand() {
        let (rest, _) = blade_pose(Vec2::ZERO, 0.0);
        assert!((rest.x - SHOULDER.x).abs() < 1e-3);
        assert!(rest.y < SHOULDER.y - ARM_LENGTH);

        // Raised to horizontal, the blade points to the facing side.
        let (raised, angle) = blade_pose(Vec2::ZERO, PI * 0.5);
        assert!(raised.x < SHOULDER.x - ARM_LENGTH);
        assert!((Vec2::from_angle(angle) - Vec2::NEG_X).length() < 1e-4);

        // Follows the wielder.
        let (moved, _) = blade_pose(Vec2::new(500.0, 20.0), 0.0);
        assert!((moved - rest - Vec2::new(500.0, 20.0)).length() < 1e-3);
    }
}

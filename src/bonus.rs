//! The triple-shot pickup: a floating target that, once shot, turns the next player shot into a
//! three-arrow volley.

use bevy::color::Alpha;
use bevy::prelude::*;

use crate::level::{SceneEntity, ScopeLayer, ScreenScoped};
use crate::physics::{layers, BodyRole, PhysicsBody};
use crate::settings::GameSettings;
use crate::state::GameSet;
use crate::tween::{yoyo, Ease};

pub struct BonusPlugin;

impl Plugin for BonusPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TripleShot>()
            .add_systems(Update, animate_pickups.in_set(GameSet::Effects));
    }
}

const HEIGHT_ABOVE_GROUND: f32 = 330.0;
const OFFSET_FROM_CENTRE: f32 = 150.0;
const BOB_AMPLITUDE: f32 = 40.0;
const BOB_HALF_PERIOD: f32 = 1.4;
const COLLECT_SECS: f32 = 0.25;
pub const BONUS_SIZE: Vec2 = Vec2::splat(48.0);

/// Volleys the player has earned but not yet fired.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TripleShot {
    pending: u32,
}

impl TripleShot {
    pub fn add(&mut self) {
        self.pending += 1;
    }

    /// Spends one volley if any is banked.
    pub fn take(&mut self) -> bool {
        if self.pending == 0 {
            return false;
        }
        self.pending -= 1;
        true
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }
}

/// Launch angles for one shot: the centre arrow, then the two flanking ones.
pub fn volley_angles(centre: f32, spread: f32, triple: bool) -> Vec<f32> {
    if triple {
        vec![centre, centre - spread, centre + spread]
    } else {
        vec![centre]
    }
}

/// The first screen and every fifth one after it.
pub fn bonus_due(screen: u32) -> bool {
    screen == 0 || (screen + 1) % 5 == 0
}

#[derive(Component, Debug)]
pub struct BonusPickup {
    anchor_y: f32,
    spawned: f32,
    collected_at: Option<f32>,
}

impl BonusPickup {
    pub fn new(anchor_y: f32, now: f32) -> Self {
        Self {
            anchor_y,
            spawned: now,
            collected_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.collected_at.is_none()
    }

    /// One-shot: only the first arrow to reach the pickup collects it.
    pub fn collect(&mut self, now: f32) -> bool {
        if !self.is_active() {
            return false;
        }
        self.collected_at = Some(now);
        true
    }

    pub fn hover_y(&self, now: f32) -> f32 {
        let swing = yoyo(now - self.spawned, BOB_HALF_PERIOD, Ease::SineInOut);
        self.anchor_y - BOB_AMPLITUDE + swing * BOB_AMPLITUDE * 2.0
    }

    /// Remaining size/opacity after being collected, `None` once the animation is over.
    pub fn vanish(&self, now: f32) -> Option<f32> {
        let since = self.collected_at?;
        let t = (now - since) / COLLECT_SECS;
        (t < 1.0).then(|| 1.0 - Ease::QuadIn.apply(t))
    }
}

pub fn spawn_bonus(
    commands: &mut Commands,
    settings: &GameSettings,
    screen: u32,
    now: f32,
) -> Entity {
    let x = screen as f32 * settings.screen_width + settings.screen_width * 0.5 + OFFSET_FROM_CENTRE;
    let y = settings.ground_y + HEIGHT_ABOVE_GROUND;
    commands
        .spawn((
            Name::new("TripleShotBonus"),
            SceneEntity,
            ScreenScoped::new(screen, ScopeLayer::Fixtures),
            BonusPickup::new(y, now),
            BodyRole::Bonus,
            PhysicsBody::sensor(BONUS_SIZE, layers::BONUS, layers::ARROW),
            SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.95, 0.78, 0.2),
                    custom_size: Some(BONUS_SIZE),
                    ..default()
                },
                transform: Transform::from_xyz(x, y, 3.0)
                    .with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_4)),
                ..default()
            },
        ))
        .id()
}

fn animate_pickups(
    mut commands: Commands,
    time: Res<Time>,
    mut pickups: Query<(Entity, &BonusPickup, &mut Transform, &mut Sprite)>,
) {
    let now = time.elapsed_seconds();
    for (entity, pickup, mut transform, mut sprite) in &mut pickups {
        if pickup.is_active() {
            transform.translation.y = pickup.hover_y(now);
            continue;
        }
        match pickup.vanish(now) {
            Some(left) => {
                transform.scale = Vec3::splat(left);
                sprite.color.set_alpha(left);
            }
            None => commands.entity(entity).despawn_recursive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Picks up `pickups` bonuses, fires `shots` times and returns how many arrows each shot had.
    fn volleys(pickups: u32, shots: u32) -> (Vec<usize>, TripleShot) {
        let mut triple = TripleShot::default();
        for _ in 0..pickups {
            triple.add();
        }
        let sizes = (0..shots)
            .map(|_| volley_angles(0.0, 0.15, triple.take()).len())
            .collect();
        (sizes, triple)
    }

    #[test]
    fn banked_volleys_are_spent_in_order() {
        let (sizes, triple) = volleys(3, 2);
        assert_eq!(sizes, vec![3, 3]);
        assert_eq!(triple.pending(), 1);

        let (sizes, triple) = volleys(2, 4);
        assert_eq!(sizes, vec![3, 3, 1, 1]);
        assert_eq!(triple.pending(), 0);
    }

    #[test]
    fn empty_bank_fires_single_arrows() {
        let (sizes, _) = volleys(0, 2);
        assert_eq!(sizes, vec![1, 1]);
    }

    #[test]
    fn volley_is_symmetric_about_the_aim() {
        let angles = volley_angles(0.5, 0.15, true);
        assert_eq!(angles[0], 0.5);
        assert!((angles[0] - angles[1] - 0.15).abs() < 1e-6);
        assert!((angles[2] - angles[0] - 0.15).abs() < 1e-6);
    }

    #[test]
    fn pickup_screens() {
        let due: Vec<u32> = (0..20).filter(|&s| bonus_due(s)).collect();
        assert_eq!(due, vec![0, 4, 9, 14, 19]);
    }

    #[test]
    fn pickup_collects_once_and_vanishes() {
        let mut pickup = BonusPickup::new(100.0, 0.0);
        assert!(pickup.vanish(1.0).is_none());
        assert!(pickup.collect(2.0));
        assert!(!pickup.collect(2.1));
        let half = pickup.vanish(2.0 + COLLECT_SECS * 0.5).unwrap();
        assert!(half > 0.0 && half < 1.0);
        assert!(pickup.vanish(2.0 + COLLECT_SECS).is_none());
    }

    #[test]
    fn pickup_bobs_around_its_anchor() {
        let pickup = BonusPickup::new(100.0, 0.0);
        assert!((pickup.hover_y(0.0) - (100.0 - BOB_AMPLITUDE)).abs() < 1e-3);
        assert!((pickup.hover_y(BOB_HALF_PERIOD) - (100.0 + BOB_AMPLITUDE)).abs() < 1e-3);
    }
}

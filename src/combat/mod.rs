//! Enemy combatants: the shared dying/kill routine plus the two AI variants.

pub mod archer;
pub mod swordsman;

use bevy::color::Alpha;
use bevy::prelude::*;

use crate::level::{retire_enemy, Screen, ScreenRoster};
use crate::state::GameSet;
use crate::tween::{yoyo, Ease};

use self::swordsman::Swordsman;

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((archer::ArcherPlugin, swordsman::SwordsmanPlugin))
            .add_systems(Update, play_deaths.in_set(GameSet::Lifecycle));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombatantKind {
    Archer,
    Swordsman,
}

/// Delay between the killing blow and the start of the fade, per kind.
const ARCHER_FADE_DELAY: f32 = 0.35;
const SWORDSMAN_FADE_DELAY: f32 = 0.25;
const FADE_DURATION: f32 = 0.3;
/// Half-period of the hit squash; it plays out and back once.
const SQUASH_HALF: f32 = 0.12;
const SQUASH: Vec2 = Vec2::new(1.08, 0.92);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeathStage {
    Alive,
    /// Still fully opaque, squash scale applied.
    Reeling { scale: Vec2 },
    Fading { alpha: f32 },
    Gone,
}

/// State every enemy carries regardless of its AI. `dying_since` is terminal once set.
#[derive(Component, Debug)]
pub struct Combatant {
    pub kind: CombatantKind,
    dying_since: Option<f32>,
    retired: bool,
}

impl Combatant {
    pub fn new(kind: CombatantKind) -> Self {
        Self {
            kind,
            dying_since: None,
            retired: false,
        }
    }

    pub fn is_dying(&self) -> bool {
        self.dying_since.is_some()
    }

    /// The kill routine's guard. Only the first call succeeds; later hits change nothing.
    pub fn begin_dying(&mut self, now: f32) -> bool {
        if self.is_dying() {
            return false;
        }
        self.dying_since = Some(now);
        true
    }

    fn fade_delay(&self) -> f32 {
        match self.kind {
            CombatantKind::Archer => ARCHER_FADE_DELAY,
            CombatantKind::Swordsman => SWORDSMAN_FADE_DELAY,
        }
    }

    pub fn death_stage(&self, now: f32) -> DeathStage {
        let Some(since) = self.dying_since else {
            return DeathStage::Alive;
        };
        let elapsed = now - since;
        let delay = self.fade_delay();

        if elapsed < delay {
            let squash = if elapsed < SQUASH_HALF * 2.0 {
                yoyo(elapsed, SQUASH_HALF, Ease::QuadOut)
            } else {
                0.0
            };
            return DeathStage::Reeling {
                scale: Vec2::ONE.lerp(SQUASH, squash),
            };
        }
        let fade = (elapsed - delay) / FADE_DURATION;
        if fade >= 1.0 {
            DeathStage::Gone
        } else {
            DeathStage::Fading {
                alpha: 1.0 - Ease::QuadIn.apply(fade),
            }
        }
    }

    /// Marks the body as removed. True only the first time, so the removal and the screen-clear
    /// check run once per enemy.
    pub fn retire(&mut self) -> bool {
        if self.retired {
            return false;
        }
        self.retired = true;
        true
    }
}

/// Applies `alpha` to a sprite hierarchy.
pub fn set_tree_alpha(
    root: Entity,
    alpha: f32,
    children: &Query<&Children>,
    sprites: &mut Query<&mut Sprite>,
) {
    if let Ok(mut sprite) = sprites.get_mut(root) {
        sprite.color.set_alpha(alpha);
    }
    if let Ok(kids) = children.get(root) {
        for &child in kids.iter() {
            set_tree_alpha(child, alpha, children, sprites);
        }
    }
}

fn play_deaths(
    mut commands: Commands,
    time: Res<Time>,
    mut roster: ResMut<ScreenRoster>,
    mut screen: ResMut<Screen>,
    mut dying: Query<(
        Entity,
        &mut Combatant,
        &mut Transform,
        Option<&Swordsman>,
    )>,
    children: Query<&Children>,
    mut sprites: Query<&mut Sprite>,
) {
    let now = time.elapsed_seconds();
    for (entity, mut combatant, mut transform, swordsman) in &mut dying {
        match combatant.death_stage(now) {
            DeathStage::Alive => {}
            DeathStage::Reeling { scale } => {
                transform.scale = scale.extend(1.0);
            }
            DeathStage::Fading { alpha } => {
                transform.scale = Vec3::ONE;
                set_tree_alpha(entity, alpha, &children, &mut sprites);
                if let Some(swordsman) = swordsman {
                    set_tree_alpha(swordsman.blade, alpha, &children, &mut sprites);
                }
            }
            DeathStage::Gone => {
                if !combatant.retire() {
                    continue;
                }
                debug!("{:?} {:?} finished dying.", combatant.kind, entity);
                if let Some(swordsman) = swordsman {
                    if let Some(blade) = commands.get_entity(swordsman.blade) {
                        blade.despawn_recursive();
                    }
                }
                commands.entity(entity).despawn_recursive();
                retire_enemy(entity, combatant.kind, &mut roster, &mut screen);
            }
        }
    }
}

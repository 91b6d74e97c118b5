//! Collision resolution: turns rapier's collision-start events into game effects.
//!
//! Each pair is classified by the `BodyRole` of its two entities, never by where they are. Only
//! pairs with an arrow in flight matter, and the first rule that matches wins:
//!
//! 1. enemy arrow hits the player: one damage, arrow removed
//! 2. any arrow hits the ground: it sticks
//! 3. player arrow hits a live enemy: score, arrow removed, enemy starts dying
//! 4. player arrow hits an uncollected bonus: triple shot banked, arrow removed
//!
//! Every effect is guarded by a one-shot transition on the arrow, so the same contact reported
//! twice (or an arrow touching two things in one step) resolves at most once.

use bevy::prelude::*;
use bevy_rapier2d::prelude::{CollisionEvent, CollisionGroups};

use crate::bonus::{BonusPickup, TripleShot};
use crate::combat::Combatant;
use crate::health::{DamagePlayer, Score};
use crate::level::Screen;
use crate::physics::{disable_contacts, Body, BodyRole, Velocity};
use crate::projectile::{halt, stick_arrow, Arrow, ArrowOwner};
use crate::state::GameSet;

pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, resolve_collisions.in_set(GameSet::Collision));
    }
}

const ARROW_DAMAGE: u32 = 1;

/// What an arrow ran into, from the arrow's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Impact {
    EnemyArrowOnPlayer,
    Ground,
    PlayerArrowOnEnemy,
    PlayerArrowOnBonus,
}

fn classify(owner: ArrowOwner, other: BodyRole) -> Option<Impact> {
    match (owner, other) {
        (ArrowOwner::Enemy, BodyRole::Player) => Some(Impact::EnemyArrowOnPlayer),
        (_, BodyRole::Ground) => Some(Impact::Ground),
        (ArrowOwner::Player, BodyRole::Enemy(_)) => Some(Impact::PlayerArrowOnEnemy),
        (ArrowOwner::Player, BodyRole::Bonus) => Some(Impact::PlayerArrowOnBonus),
        _ => None,
    }
}

/// Picks the arrow out of a pair. Arrow-on-arrow pairs are not interesting.
fn arrow_side(
    a: Entity,
    b: Entity,
    roles: &Query<&BodyRole>,
) -> Option<(Entity, ArrowOwner, Entity, BodyRole)> {
    let role_a = *roles.get(a).ok()?;
    let role_b = *roles.get(b).ok()?;
    match (role_a, role_b) {
        (BodyRole::Arrow { .. }, BodyRole::Arrow { .. }) => None,
        (BodyRole::Arrow { owner }, other) => Some((a, owner, b, other)),
        (other, BodyRole::Arrow { owner }) => Some((b, owner, a, other)),
        _ => None,
    }
}

fn remove_struck_arrow(commands: &mut Commands, entity: Entity) {
    if let Some(arrow) = commands.get_entity(entity) {
        arrow.despawn_recursive();
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_collisions(
    mut commands: Commands,
    time: Res<Time>,
    mut collisions: EventReader<CollisionEvent>,
    screen: Res<Screen>,
    mut score: ResMut<Score>,
    mut triple: ResMut<TripleShot>,
    mut damage: EventWriter<DamagePlayer>,
    roles: Query<&BodyRole>,
    mut arrows: Query<(&mut Arrow, &mut Body, &mut Velocity, &mut Transform)>,
    mut enemies: Query<&mut Combatant>,
    mut bonuses: Query<(&mut BonusPickup, &mut CollisionGroups), Without<Arrow>>,
) {
    let now = time.elapsed_seconds();

    for event in collisions.read() {
        let CollisionEvent::Started(a, b, _) = event else {
            continue;
        };
        let Some((arrow_entity, owner, other, other_role)) = arrow_side(*a, *b, &roles) else {
            continue;
        };
        let Some(impact) = classify(owner, other_role) else {
            continue;
        };
        let Ok((mut arrow, mut body, mut velocity, mut transform)) = arrows.get_mut(arrow_entity)
        else {
            continue;
        };
        if !arrow.is_flying() {
            continue;
        }

        match impact {
            Impact::EnemyArrowOnPlayer => {
                // The player is untouchable while sliding to the next screen.
                if !screen.is_populated() || !arrow.strike() {
                    continue;
                }
                halt(&mut body, &mut velocity);
                remove_struck_arrow(&mut commands, arrow_entity);
                damage.send(DamagePlayer {
                    amount: ARROW_DAMAGE,
                });
            }
            Impact::Ground => {
                if stick_arrow(&mut arrow, &mut body, &mut velocity, &mut transform, now) {
                    debug!("Arrow {:?} stuck in the ground.", arrow_entity);
                }
            }
            Impact::PlayerArrowOnEnemy => {
                let Ok(mut enemy) = enemies.get_mut(other) else {
                    continue;
                };
                if enemy.is_dying() || !arrow.strike() {
                    continue;
                }
                remove_struck_arrow(&mut commands, arrow_entity);
                if enemy.begin_dying(now) {
                    score.0 += 1;
                    debug!("{:?} {:?} hit, score {}.", enemy.kind, other, score.0);
                }
            }
            Impact::PlayerArrowOnBonus => {
                let Ok((mut pickup, mut groups)) = bonuses.get_mut(other) else {
                    continue;
                };
                if !pickup.is_active() || !arrow.strike() {
                    continue;
                }
                remove_struck_arrow(&mut commands, arrow_entity);
                pickup.collect(now);
                disable_contacts(&mut groups);
                triple.add();
                info!("Triple shot banked ({} pending).", triple.pending());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy::ecs::event::ManualEventReader;
    use bevy_rapier2d::rapier::geometry::CollisionEventFlags;

    use super::*;
    use crate::combat::CombatantKind;
    use crate::level::ScreenPhase;
    use crate::physics::{layers, BodyKind, PhysicsBody};
    use crate::projectile::{ArrowFlight, ARROW_SIZE};

    fn resolver_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<Screen>()
            .init_resource::<Score>()
            .init_resource::<TripleShot>()
            .add_event::<CollisionEvent>()
            .add_event::<DamagePlayer>()
            .add_systems(Update, resolve_collisions);
        app
    }

    fn spawn_arrow(app: &mut App, owner: ArrowOwner) -> Entity {
        app.world_mut()
            .spawn((
                Arrow::new(0.0),
                BodyRole::Arrow { owner },
                PhysicsBody::rect(BodyKind::Dynamic, ARROW_SIZE, layers::ARROW, layers::GROUND),
                Velocity(Vec2::new(400.0, 0.0)),
                Transform::default(),
            ))
            .id()
    }

    fn spawn_enemy(app: &mut App) -> Entity {
        app.world_mut()
            .spawn((
                Combatant::new(CombatantKind::Archer),
                BodyRole::Enemy(CombatantKind::Archer),
            ))
            .id()
    }

    fn report(app: &mut App, a: Entity, b: Entity) {
        app.world_mut()
            .send_event(CollisionEvent::Started(a, b, CollisionEventFlags::empty()));
    }

    fn damage_count(app: &App, reader: &mut ManualEventReader<DamagePlayer>) -> usize {
        reader
            .read(app.world().resource::<Events<DamagePlayer>>())
            .count()
    }

    #[test]
    fn duplicate_enemy_hits_score_once() {
        let mut app = resolver_app();
        let enemy = spawn_enemy(&mut app);
        let first = spawn_arrow(&mut app, ArrowOwner::Player);
        let second = spawn_arrow(&mut app, ArrowOwner::Player);

        report(&mut app, first, enemy);
        report(&mut app, first, enemy);
        report(&mut app, second, enemy);
        app.update();

        assert_eq!(app.world().resource::<Score>().0, 1);
        assert!(app.world().get_entity(first).is_none());
        // The second arrow found the enemy already dying and keeps flying.
        let arrow = app.world().get::<Arrow>(second).unwrap();
        assert!(arrow.is_flying());
        assert!(app.world().get::<Combatant>(enemy).unwrap().is_dying());
    }

    #[test]
    fn enemy_arrows_never_hurt_enemies() {
        let mut app = resolver_app();
        let enemy = spawn_enemy(&mut app);
        let arrow = spawn_arrow(&mut app, ArrowOwner::Enemy);

        report(&mut app, arrow, enemy);
        app.update();

        assert_eq!(app.world().resource::<Score>().0, 0);
        assert!(!app.world().get::<Combatant>(enemy).unwrap().is_dying());
        assert!(app.world().get::<Arrow>(arrow).unwrap().is_flying());
    }

    #[test]
    fn player_arrows_never_hurt_the_player() {
        let mut app = resolver_app();
        let player = app.world_mut().spawn(BodyRole::Player).id();
        let own = spawn_arrow(&mut app, ArrowOwner::Player);
        let hostile = spawn_arrow(&mut app, ArrowOwner::Enemy);
        let mut reader = ManualEventReader::<DamagePlayer>::default();

        report(&mut app, own, player);
        app.update();
        assert_eq!(damage_count(&app, &mut reader), 0);

        report(&mut app, hostile, player);
        report(&mut app, hostile, player);
        app.update();
        assert_eq!(damage_count(&app, &mut reader), 1);
        assert!(app.world().get_entity(hostile).is_none());
    }

    #[test]
    fn player_is_safe_while_sliding() {
        let mut app = resolver_app();
        app.world_mut().resource_mut::<Screen>().phase = ScreenPhase::Transitioning;
        let player = app.world_mut().spawn(BodyRole::Player).id();
        let hostile = spawn_arrow(&mut app, ArrowOwner::Enemy);
        let mut reader = ManualEventReader::<DamagePlayer>::default();

        report(&mut app, hostile, player);
        app.update();
        assert_eq!(damage_count(&app, &mut reader), 0);
    }

    #[test]
    fn ground_hit_sticks_then_blocks_other_rules() {
        let mut app = resolver_app();
        let ground = app.world_mut().spawn(BodyRole::Ground).id();
        let enemy = spawn_enemy(&mut app);
        let arrow = spawn_arrow(&mut app, ArrowOwner::Player);

        report(&mut app, arrow, ground);
        report(&mut app, arrow, enemy);
        app.update();

        let stuck = app.world().get::<Arrow>(arrow).unwrap();
        assert!(matches!(stuck.flight(), ArrowFlight::Stuck { .. }));
        assert_eq!(app.world().get::<Velocity>(arrow).unwrap().0, Vec2::ZERO);
        assert_eq!(app.world().resource::<Score>().0, 0);
        assert!(!app.world().get::<Combatant>(enemy).unwrap().is_dying());
    }

    #[test]
    fn bonus_is_collected_once() {
        let mut app = resolver_app();
        let bonus = app
            .world_mut()
            .spawn((
                BonusPickup::new(0.0, 0.0),
                BodyRole::Bonus,
                PhysicsBody::sensor(Vec2::splat(48.0), layers::BONUS, layers::ARROW),
            ))
            .id();
        let first = spawn_arrow(&mut app, ArrowOwner::Player);
        let second = spawn_arrow(&mut app, ArrowOwner::Player);

        report(&mut app, first, bonus);
        report(&mut app, second, bonus);
        app.update();

        assert_eq!(app.world().resource::<TripleShot>().pending(), 1);
        assert!(!app.world().get::<BonusPickup>(bonus).unwrap().is_active());
        assert_eq!(
            app.world().get::<CollisionGroups>(bonus).unwrap().filters,
            layers::NONE
        );
        assert!(app.world().get::<Arrow>(second).unwrap().is_flying());
    }
}

//! Screen progression: builds a fresh scene, tracks which enemies are still alive on the current
//! screen, and advances to the next screen once they are all gone.
//!
//! Progression state lives in two resources. `Screen` is the index plus the
//! `Populated → Transitioning → Populated` phase, `ScreenRoster` is the live enemy bookkeeping.
//! Every path that removes an enemy (killed, walked off) reports through [`retire_enemy`], so the
//! cleared check happens in exactly one place.

use std::collections::HashSet;

use bevy::prelude::*;
use rand::Rng;

use crate::bonus::{bonus_due, spawn_bonus, TripleShot};
use crate::camera::{screen_centre_x, CameraPan, MainCamera};
use crate::combat::archer::spawn_archer;
use crate::combat::swordsman::{spawn_swordsman, SWORDSMAN_SIZE};
use crate::combat::CombatantKind;
use crate::health::{PlayerHealth, Score};
use crate::player::{spawn_player, Player, PlayerBow, PlayerMotion, SlideFinished, PLAYER_SIZE};
use crate::scenery::{spawn_backdrop, spawn_clouds, spawn_ground, CloudSide};
use crate::settings::{GameRng, GameSettings};
use crate::state::{GameSet, GameState};
use crate::tower::{spawn_tower, tower_slots, ARCHER_PERCH};

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Screen>()
            .init_resource::<ScreenRoster>()
            .add_event::<ScreenAdvanced>()
            .add_systems(OnEnter(GameState::Loading), (teardown_scene, setup_scene).chain())
            .add_systems(OnEnter(GameState::GameOver), cancel_pending_swordsmen)
            .add_systems(
                Update,
                (
                    begin_transition,
                    populate_next_screen,
                    finish_transition,
                    release_pending_swordsmen,
                )
                    .chain()
                    .in_set(GameSet::Progression),
            );
    }
}

const SWORDSMEN_PER_SCREEN: (u32, u32) = (1, 3);
const FIRST_SWORDSMAN_DELAY: (f32, f32) = (0.8, 1.4);
const NEXT_SWORDSMAN_DELAY: (f32, f32) = (0.6, 1.4);
const SWORDSMAN_ENTRY: f32 = 60.0;
const SWORDSMAN_SPACING: f32 = 90.0;

/// Everything belonging to one run. Restarting despawns all of it.
#[derive(Component)]
pub struct SceneEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLayer {
    /// Ground and parallax: kept one screen behind so the pan never reveals a gap.
    Backdrop,
    /// Towers and bonus pickups: removed as soon as their screen is left.
    Fixtures,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenScoped {
    pub screen: u32,
    pub layer: ScopeLayer,
}

impl ScreenScoped {
    pub fn new(screen: u32, layer: ScopeLayer) -> Self {
        Self { screen, layer }
    }

    /// Whether this entity should go when the game moves on to `current`.
    pub fn is_stale(&self, current: u32) -> bool {
        match self.layer {
            ScopeLayer::Fixtures => self.screen < current,
            ScopeLayer::Backdrop => self.screen + 1 < current,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScreenPhase {
    #[default]
    Populated,
    /// Camera pan and player slide in progress. Player input and enemy damage are off.
    Transitioning,
}

#[derive(Resource, Debug, Default)]
pub struct Screen {
    pub index: u32,
    pub phase: ScreenPhase,
    advance_pending: bool,
}

impl Screen {
    pub fn is_populated(&self) -> bool {
        self.phase == ScreenPhase::Populated
    }

    /// Flags the advance if the screen is populated and nothing is left on it. Only the first
    /// call per screen succeeds.
    pub fn try_begin_transition(&mut self, roster: &ScreenRoster) -> bool {
        if !self.is_populated() || !roster.is_clear() {
            return false;
        }
        self.phase = ScreenPhase::Transitioning;
        self.advance_pending = true;
        true
    }

    fn take_advance(&mut self) -> bool {
        std::mem::take(&mut self.advance_pending)
    }

    pub fn left_x(&self, settings: &GameSettings) -> f32 {
        self.index as f32 * settings.screen_width
    }

    pub fn right_x(&self, settings: &GameSettings) -> f32 {
        self.left_x(settings) + settings.screen_width
    }
}

/// Enemies alive on the current screen. Swordsmen that are scheduled but not yet in are only
/// counted; they do not hold the screen, and advancing cancels them.
#[derive(Resource, Debug, Default)]
pub struct ScreenRoster {
    pub archers: HashSet<Entity>,
    pub swordsmen: HashSet<Entity>,
    pub pending_swordsmen: u32,
}

impl ScreenRoster {
    pub fn is_clear(&self) -> bool {
        self.archers.is_empty() && self.swordsmen.is_empty()
    }

    fn remove(&mut self, entity: Entity, kind: CombatantKind) -> bool {
        match kind {
            CombatantKind::Archer => self.archers.remove(&entity),
            CombatantKind::Swordsman => self.swordsmen.remove(&entity),
        }
    }
}

/// Drops an enemy from the roster and runs the cleared check. Unknown entities are ignored.
pub fn retire_enemy(
    entity: Entity,
    kind: CombatantKind,
    roster: &mut ScreenRoster,
    screen: &mut Screen,
) {
    if !roster.remove(entity, kind) {
        return;
    }
    if screen.try_begin_transition(roster) {
        info!("Screen {} cleared.", screen.index);
    }
}

/// Where the `slot`-th swordsman of a screen enters, pushed clear of the player if needed.
pub fn swordsman_spawn_x(right_edge: f32, slot: u32, player_x: f32, safety_margin: f32) -> f32 {
    let x = right_edge + SWORDSMAN_ENTRY + slot as f32 * SWORDSMAN_SPACING;
    let boundary = player_x + safety_margin;
    if x <= boundary {
        boundary + 1.0
    } else {
        x
    }
}

/// A swordsman waiting to walk in. Despawning the entity cancels it.
#[derive(Component, Debug)]
pub struct PendingSwordsman {
    pub due: f32,
    pub slot: u32,
}

fn schedule_swordsmen(
    commands: &mut Commands,
    rng: &mut GameRng,
    roster: &mut ScreenRoster,
    now: f32,
) {
    let count = rng
        .0
        .gen_range(SWORDSMEN_PER_SCREEN.0..=SWORDSMEN_PER_SCREEN.1);
    let mut due = now + rng.0.gen_range(FIRST_SWORDSMAN_DELAY.0..=FIRST_SWORDSMAN_DELAY.1);
    for slot in 0..count {
        commands.spawn((
            Name::new("PendingSwordsman"),
            SceneEntity,
            PendingSwordsman { due, slot },
        ));
        due += rng.0.gen_range(NEXT_SWORDSMAN_DELAY.0..=NEXT_SWORDSMAN_DELAY.1);
    }
    roster.pending_swordsmen += count;
    debug!("{} swordsmen scheduled.", count);
}

/// Ground, backdrop, towers with their archers and the bonus for one screen.
#[allow(clippy::too_many_arguments)]
fn populate_screen(
    commands: &mut Commands,
    asset_server: &AssetServer,
    settings: &GameSettings,
    rng: &mut GameRng,
    roster: &mut ScreenRoster,
    screen: u32,
    camera_x: f32,
    now: f32,
) {
    spawn_ground(commands, settings, screen);
    spawn_backdrop(commands, asset_server, settings, screen, camera_x);

    let left = screen as f32 * settings.screen_width;
    for x in tower_slots(screen, left, settings.screen_width) {
        let top = spawn_tower(commands, x, settings.ground_y, screen, rng);
        let archer = spawn_archer(commands, Vec2::new(x, top + ARCHER_PERCH), now, rng);
        roster.archers.insert(archer);
    }

    if bonus_due(screen) {
        spawn_bonus(commands, settings, screen, now);
    }
}

fn teardown_scene(mut commands: Commands, scene: Query<Entity, With<SceneEntity>>) {
    for entity in &scene {
        commands.entity(entity).despawn_recursive();
    }
}

#[allow(clippy::too_many_arguments)]
fn setup_scene(
    mut commands: Commands,
    time: Res<Time>,
    asset_server: Res<AssetServer>,
    settings: Res<GameSettings>,
    mut rng: ResMut<GameRng>,
    mut screen: ResMut<Screen>,
    mut roster: ResMut<ScreenRoster>,
    mut health: ResMut<PlayerHealth>,
    mut score: ResMut<Score>,
    mut triple: ResMut<TripleShot>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let now = time.elapsed_seconds();
    *screen = Screen::default();
    *roster = ScreenRoster::default();
    *health = PlayerHealth::new(settings.max_health);
    *score = Score::default();
    *triple = TripleShot::default();

    spawn_player(
        &mut commands,
        Vec2::new(
            screen.left_x(&settings) + settings.player_spawn_offset,
            settings.standing_y(PLAYER_SIZE.y),
        ),
    );

    let camera_x = screen_centre_x(&settings, 0);
    populate_screen(
        &mut commands,
        &asset_server,
        &settings,
        &mut rng,
        &mut roster,
        0,
        camera_x,
        now,
    );
    let camera_left = camera_x - settings.screen_width * 0.5;
    for side in [CloudSide::Left, CloudSide::Right] {
        spawn_clouds(&mut commands, &mut rng, &settings, camera_left, Some(side), now);
    }
    schedule_swordsmen(&mut commands, &mut rng, &mut roster, now);

    info!("Scene ready.");
    next_state.set(GameState::Playing);
}

/// Sent once per screen advance, after the old screen is torn down.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ScreenAdvanced {
    pub index: u32,
    /// Left edge of the view when the pan started; new clouds queue up behind it.
    pub camera_left: f32,
}

#[allow(clippy::too_many_arguments)]
fn begin_transition(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<GameSettings>,
    mut screen: ResMut<Screen>,
    mut roster: ResMut<ScreenRoster>,
    mut health: ResMut<PlayerHealth>,
    mut advanced: EventWriter<ScreenAdvanced>,
    camera: Query<(Entity, &Transform), With<MainCamera>>,
    mut player: Query<
        (&mut Transform, &mut PlayerBow, &mut PlayerMotion),
        (With<Player>, Without<MainCamera>),
    >,
    scoped: Query<(Entity, &ScreenScoped)>,
    pending: Query<Entity, With<PendingSwordsman>>,
) {
    if !screen.take_advance() {
        return;
    }
    let now = time.elapsed_seconds();
    screen.index += 1;
    let index = screen.index;
    info!("Advancing to screen {}.", index);

    if roster.pending_swordsmen > 0 {
        debug!("Cancelling {} scheduled swordsmen.", roster.pending_swordsmen);
    }
    for entity in &pending {
        commands.entity(entity).despawn_recursive();
    }
    roster.pending_swordsmen = 0;

    let target_camera_x = screen_centre_x(&settings, index);
    let mut camera_left = target_camera_x - settings.screen_width * 0.5;
    if let Ok((entity, transform)) = camera.get_single() {
        commands
            .entity(entity)
            .insert(CameraPan::new(transform.translation.x, target_camera_x, now));
        camera_left = transform.translation.x - settings.screen_width * 0.5;
    }

    if let Ok((mut transform, mut bow, mut motion)) = player.get_single_mut() {
        let standing_y = settings.standing_y(PLAYER_SIZE.y);
        transform.translation.y = standing_y;
        bow.reset();
        let destination = screen.left_x(&settings) + settings.player_spawn_offset;
        motion.slide_to(transform.translation.x, destination, standing_y, now);
    }

    if settings.heal_on_advance {
        let max = health.max();
        health.heal(max);
    }

    for (entity, scope) in &scoped {
        if scope.is_stale(index) {
            commands.entity(entity).despawn_recursive();
        }
    }

    advanced.send(ScreenAdvanced { index, camera_left });
}

fn populate_next_screen(
    mut commands: Commands,
    time: Res<Time>,
    asset_server: Res<AssetServer>,
    settings: Res<GameSettings>,
    mut rng: ResMut<GameRng>,
    mut roster: ResMut<ScreenRoster>,
    mut advanced: EventReader<ScreenAdvanced>,
) {
    let now = time.elapsed_seconds();
    for advance in advanced.read() {
        populate_screen(
            &mut commands,
            &asset_server,
            &settings,
            &mut rng,
            &mut roster,
            advance.index,
            screen_centre_x(&settings, advance.index),
            now,
        );
        spawn_clouds(&mut commands, &mut rng, &settings, advance.camera_left, None, now);
    }
}

fn finish_transition(
    mut commands: Commands,
    time: Res<Time>,
    mut arrivals: EventReader<SlideFinished>,
    mut rng: ResMut<GameRng>,
    mut screen: ResMut<Screen>,
    mut roster: ResMut<ScreenRoster>,
) {
    if arrivals.read().count() == 0 || screen.is_populated() {
        return;
    }
    screen.phase = ScreenPhase::Populated;
    schedule_swordsmen(&mut commands, &mut rng, &mut roster, time.elapsed_seconds());
}

#[allow(clippy::too_many_arguments)]
fn release_pending_swordsmen(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<GameSettings>,
    mut rng: ResMut<GameRng>,
    screen: Res<Screen>,
    mut roster: ResMut<ScreenRoster>,
    pending: Query<(Entity, &PendingSwordsman)>,
    player: Query<&Transform, With<Player>>,
) {
    let now = time.elapsed_seconds();
    let Ok(player) = player.get_single() else {
        return;
    };
    for (entity, spawn) in &pending {
        if now < spawn.due {
            continue;
        }
        commands.entity(entity).despawn();
        let x = swordsman_spawn_x(
            screen.right_x(&settings),
            spawn.slot,
            player.translation.x,
            settings.swordsman_safety_margin,
        );
        let y = settings.standing_y(SWORDSMAN_SIZE.y);
        let swordsman = spawn_swordsman(&mut commands, Vec2::new(x, y), now, &mut rng);
        roster.swordsmen.insert(swordsman);
        roster.pending_swordsmen = roster.pending_swordsmen.saturating_sub(1);
    }
}

fn cancel_pending_swordsmen(
    mut commands: Commands,
    mut roster: ResMut<ScreenRoster>,
    pending: Query<Entity, With<PendingSwordsman>>,
) {
    for entity in &pending {
        commands.entity(entity).despawn_recursive();
    }
    roster.pending_swordsmen = 0;
}

#[cfg(test)]
mod tests {
    use bevy::ecs::event::ManualEventReader;
    use bevy::state::app::StatesPlugin;

    use super::*;
    use crate::combat::swordsman::Swordsman;

    fn entity(n: u32) -> Entity {
        Entity::from_raw(n)
    }

    fn roster(archers: &[u32], swordsmen: &[u32]) -> ScreenRoster {
        ScreenRoster {
            archers: archers.iter().map(|&n| entity(n)).collect(),
            swordsmen: swordsmen.iter().map(|&n| entity(n)).collect(),
            pending_swordsmen: 0,
        }
    }

    #[test]
    fn clears_once_when_archers_go_last() {
        let mut screen = Screen::default();
        let mut roster = roster(&[1, 2], &[3]);

        retire_enemy(entity(3), CombatantKind::Swordsman, &mut roster, &mut screen);
        retire_enemy(entity(1), CombatantKind::Archer, &mut roster, &mut screen);
        assert!(screen.is_populated());
        retire_enemy(entity(2), CombatantKind::Archer, &mut roster, &mut screen);
        assert_eq!(screen.phase, ScreenPhase::Transitioning);
        assert!(screen.take_advance());

        // A late duplicate report must not queue a second advance.
        retire_enemy(entity(2), CombatantKind::Archer, &mut roster, &mut screen);
        assert!(!screen.take_advance());
    }

    #[test]
    fn clears_once_when_swordsmen_go_last() {
        let mut screen = Screen::default();
        let mut roster = roster(&[1], &[2, 3]);

        retire_enemy(entity(1), CombatantKind::Archer, &mut roster, &mut screen);
        retire_enemy(entity(2), CombatantKind::Swordsman, &mut roster, &mut screen);
        assert!(screen.is_populated());
        retire_enemy(entity(3), CombatantKind::Swordsman, &mut roster, &mut screen);
        assert!(screen.take_advance());
        assert!(!screen.try_begin_transition(&roster));
    }

    #[test]
    fn scheduled_swordsmen_do_not_hold_the_screen() {
        let mut screen = Screen::default();
        let mut roster = roster(&[1], &[]);
        roster.pending_swordsmen = 2;

        retire_enemy(entity(1), CombatantKind::Archer, &mut roster, &mut screen);
        assert_eq!(screen.phase, ScreenPhase::Transitioning);
        assert!(screen.take_advance());
    }

    #[test]
    fn nothing_clears_mid_transition() {
        let mut screen = Screen {
            phase: ScreenPhase::Transitioning,
            ..default()
        };
        let mut roster = roster(&[1], &[]);
        retire_enemy(entity(1), CombatantKind::Archer, &mut roster, &mut screen);
        assert!(!screen.take_advance());
    }

    #[test]
    fn swordsmen_never_spawn_on_top_of_the_player() {
        // Normal case: lined up past the right edge.
        assert_eq!(swordsman_spawn_x(1280.0, 0, 100.0, 400.0), 1340.0);
        assert_eq!(swordsman_spawn_x(1280.0, 2, 100.0, 400.0), 1520.0);
        // Player still sliding far right: pushed past the safety boundary.
        let x = swordsman_spawn_x(1280.0, 0, 1200.0, 400.0);
        assert!(x > 1600.0);
    }

    #[test]
    fn stale_scope_by_layer() {
        let tower = ScreenScoped::new(3, ScopeLayer::Fixtures);
        let ground = ScreenScoped::new(3, ScopeLayer::Backdrop);
        assert!(!tower.is_stale(3));
        assert!(tower.is_stale(4));
        assert!(!ground.is_stale(4));
        assert!(ground.is_stale(5));
    }

    fn progression_app() -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, StatesPlugin))
            .init_state::<GameState>()
            .init_resource::<GameSettings>()
            .insert_resource(GameRng::seeded(3))
            .init_resource::<Screen>()
            .init_resource::<ScreenRoster>()
            .init_resource::<PlayerHealth>()
            .add_event::<ScreenAdvanced>();
        app
    }

    fn spawn_test_player(app: &mut App, x: f32) -> Entity {
        app.world_mut()
            .spawn((
                Player,
                PlayerBow::default(),
                PlayerMotion::default(),
                Transform::from_xyz(x, 0.0, 0.0),
            ))
            .id()
    }

    fn schedule(app: &mut App, slots: u32, due: f32) -> Vec<Entity> {
        app.world_mut().resource_mut::<ScreenRoster>().pending_swordsmen += slots;
        (0..slots)
            .map(|slot| {
                app.world_mut()
                    .spawn((SceneEntity, PendingSwordsman { due, slot }))
                    .id()
            })
            .collect()
    }

    #[test]
    fn advancing_tears_down_the_old_screen() {
        let mut app = progression_app();
        app.add_systems(Update, begin_transition);

        let player = spawn_test_player(&mut app, 300.0);
        let camera = app
            .world_mut()
            .spawn((MainCamera, Transform::from_xyz(640.0, 0.0, 0.0)))
            .id();
        let tower = app
            .world_mut()
            .spawn(ScreenScoped::new(0, ScopeLayer::Fixtures))
            .id();
        let ground = app
            .world_mut()
            .spawn(ScreenScoped::new(0, ScopeLayer::Backdrop))
            .id();
        let pending = schedule(&mut app, 2, 99.0);

        app.world_mut().resource_mut::<PlayerHealth>().take_damage(2);
        {
            let world = app.world_mut();
            let roster = ScreenRoster::default();
            assert!(world.resource_mut::<Screen>().try_begin_transition(&roster));
        }

        app.update();

        let world = app.world();
        assert_eq!(world.resource::<Screen>().index, 1);
        assert!(pending.iter().all(|&e| world.get_entity(e).is_none()));
        assert_eq!(world.resource::<ScreenRoster>().pending_swordsmen, 0);
        assert!(world.get_entity(tower).is_none());
        assert!(world.get_entity(ground).is_some());
        let health = world.resource::<PlayerHealth>();
        assert_eq!(health.current(), health.max());
        assert!(world.get::<PlayerMotion>(player).unwrap().is_moving());
        assert!(world.get::<CameraPan>(camera).is_some());

        let mut reader = ManualEventReader::<ScreenAdvanced>::default();
        let sent: Vec<_> = reader
            .read(world.resource::<Events<ScreenAdvanced>>())
            .map(|advance| advance.index)
            .collect();
        assert_eq!(sent, vec![1]);

        // Nothing left to trigger a second advance.
        app.update();
        assert_eq!(app.world().resource::<Screen>().index, 1);
    }

    #[test]
    fn advancing_without_healing_keeps_damage() {
        let mut app = progression_app();
        app.world_mut().resource_mut::<GameSettings>().heal_on_advance = false;
        app.add_systems(Update, begin_transition);
        spawn_test_player(&mut app, 300.0);

        app.world_mut().resource_mut::<PlayerHealth>().take_damage(1);
        {
            let world = app.world_mut();
            let roster = ScreenRoster::default();
            world.resource_mut::<Screen>().try_begin_transition(&roster);
        }
        app.update();

        let health = app.world().resource::<PlayerHealth>();
        assert_eq!(health.current(), health.max() - 1);
    }

    #[test]
    fn game_over_cancels_scheduled_swordsmen() {
        let mut app = progression_app();
        app.add_systems(OnEnter(GameState::GameOver), cancel_pending_swordsmen);
        let pending = schedule(&mut app, 3, 99.0);

        app.world_mut()
            .resource_mut::<NextState<GameState>>()
            .set(GameState::GameOver);
        app.update();

        let world = app.world();
        assert!(pending.iter().all(|&e| world.get_entity(e).is_none()));
        assert_eq!(world.resource::<ScreenRoster>().pending_swordsmen, 0);
    }

    #[test]
    fn released_swordsman_keeps_clear_of_the_player() {
        let mut app = progression_app();
        app.add_systems(Update, release_pending_swordsmen);

        let settings = GameSettings::default();
        // Player still far right, as if mid-slide.
        let player_x = settings.screen_width - 50.0;
        spawn_test_player(&mut app, player_x);
        let pending = schedule(&mut app, 1, 0.0);

        app.update();

        assert!(app.world().get_entity(pending[0]).is_none());
        let roster = app.world().resource::<ScreenRoster>();
        assert_eq!(roster.pending_swordsmen, 0);
        assert_eq!(roster.swordsmen.len(), 1);

        let mut swordsmen = app
            .world_mut()
            .query_filtered::<&Transform, With<Swordsman>>();
        let xs: Vec<f32> = swordsmen
            .iter(app.world())
            .map(|transform| transform.translation.x)
            .collect();
        assert_eq!(xs.len(), 1);
        assert!(xs[0] > player_x + settings.swordsman_safety_margin);
    }

    #[test]
    fn swordsmen_not_yet_due_stay_scheduled() {
        let mut app = progression_app();
        app.add_systems(Update, release_pending_swordsmen);
        spawn_test_player(&mut app, 100.0);
        let pending = schedule(&mut app, 1, 50.0);

        app.update();

        assert!(app.world().get_entity(pending[0]).is_some());
        assert!(app.world().resource::<ScreenRoster>().swordsmen.is_empty());
    }
}

//! HUD and overlays: score, hearts, the pause menu and the game-over screen.
//!
//! The HUD is built once at startup and only its contents change. Overlays are spawned when
//! their state is entered and removed when it is left.

use bevy::prelude::*;

use crate::health::{PlayerHealth, Score};
use crate::state::GameState;

/// Registers HUD refresh plus the pause and game-over overlays.
pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_hud)
            .add_systems(Update, (refresh_score, refresh_hearts))
            .add_systems(OnEnter(GameState::Paused), spawn_pause_menu)
            .add_systems(OnExit(GameState::Paused), despawn_overlay::<PauseMenu>)
            .add_systems(OnEnter(GameState::GameOver), spawn_game_over)
            .add_systems(OnExit(GameState::GameOver), despawn_overlay::<GameOverScreen>);
    }
}

const HEART_FULL: Color = Color::srgb(0.86, 0.16, 0.2);
const HEART_LOST: Color = Color::srgba(0.3, 0.3, 0.3, 0.5);
const MUTED: Color = Color::srgb(0.8, 0.8, 0.8);

#[derive(Component)]
struct ScoreText;

#[derive(Component)]
struct HeartRow;

#[derive(Component)]
struct Heart(u32);

#[derive(Component)]
struct PauseMenu;

#[derive(Component)]
struct GameOverScreen;

fn spawn_hud(mut commands: Commands) {
    commands
        .spawn((
            Name::new("Hud"),
            NodeBundle {
                style: Style {
                    width: Val::Percent(100.0),
                    padding: UiRect::all(Val::Px(16.0)),
                    justify_content: JustifyContent::SpaceBetween,
                    ..default()
                },
                ..default()
            },
        ))
        .with_children(|hud| {
            hud.spawn((
                HeartRow,
                NodeBundle {
                    style: Style {
                        column_gap: Val::Px(6.0),
                        ..default()
                    },
                    ..default()
                },
            ));
            hud.spawn((
                ScoreText,
                TextBundle::from_section(
                    "Score: 0",
                    TextStyle {
                        font_size: 32.0,
                        color: Color::WHITE,
                        ..default()
                    },
                ),
            ));
            // Keeps the score centred against the hearts.
            hud.spawn(NodeBundle {
                style: Style {
                    width: Val::Px(26.0 * 3.0),
                    ..default()
                },
                ..default()
            });
        });
}

fn refresh_score(score: Res<Score>, mut text: Query<&mut Text, With<ScoreText>>) {
    if !score.is_changed() {
        return;
    }
    for mut text in &mut text {
        text.sections[0].value = format!("Score: {}", score.0);
    }
}

fn heart_color(slot: u32, health: &PlayerHealth) -> Color {
    if slot < health.current() {
        HEART_FULL
    } else {
        HEART_LOST
    }
}

fn heart(slot: u32, health: &PlayerHealth) -> impl Bundle {
    (
        Heart(slot),
        NodeBundle {
            style: Style {
                width: Val::Px(26.0),
                height: Val::Px(24.0),
                ..default()
            },
            background_color: BackgroundColor(heart_color(slot, health)),
            ..default()
        },
    )
}

/// Shows one heart per point of max health, dimming the lost ones. The row is rebuilt whenever
/// max health no longer matches the hearts on screen.
fn refresh_hearts(
    mut commands: Commands,
    health: Res<PlayerHealth>,
    rows: Query<(Entity, Option<&Children>), With<HeartRow>>,
    mut hearts: Query<(&Heart, &mut BackgroundColor)>,
) {
    if !health.is_changed() {
        return;
    }
    let Ok((row, children)) = rows.get_single() else {
        return;
    };

    let shown = children.map_or(0, |children| children.len());
    if shown != health.max() as usize {
        commands
            .entity(row)
            .despawn_descendants()
            .with_children(|row| {
                for slot in 0..health.max() {
                    row.spawn(heart(slot, &health));
                }
            });
        return;
    }

    for (heart, mut color) in &mut hearts {
        color.0 = heart_color(heart.0, &health);
    }
}

fn banner(font_size: f32, color: Color) -> TextStyle {
    TextStyle {
        font_size,
        color,
        ..default()
    }
}

fn overlay(alpha: f32) -> NodeBundle {
    NodeBundle {
        background_color: BackgroundColor(Color::srgba(0.0, 0.0, 0.0, alpha)),
        style: Style {
            position_type: PositionType::Absolute,
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            flex_direction: FlexDirection::Column,
            row_gap: Val::Px(12.0),
            align_items: AlignItems::Center,
            justify_content: JustifyContent::Center,
            ..default()
        },
        z_index: ZIndex::Global(10),
        ..default()
    }
}

fn spawn_pause_menu(mut commands: Commands) {
    commands
        .spawn((PauseMenu, Name::new("PauseMenu"), overlay(0.6)))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section("Paused", banner(48.0, Color::WHITE)));
            parent.spawn(TextBundle::from_section("ESC to resume", banner(26.0, MUTED)));
        });
}

fn spawn_game_over(mut commands: Commands, score: Res<Score>) {
    commands
        .spawn((GameOverScreen, Name::new("GameOverScreen"), overlay(0.75)))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                "Game Over",
                banner(64.0, Color::srgb(0.95, 0.3, 0.3)),
            ));
            parent.spawn(TextBundle::from_section(
                format!("Score: {}", score.0),
                banner(36.0, Color::WHITE),
            ));
            parent.spawn(TextBundle::from_section(
                "Press R to play again",
                banner(26.0, MUTED),
            ));
        });
}

fn despawn_overlay<T: Component>(mut commands: Commands, query: Query<Entity, With<T>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hud_app(max_health: u32) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(PlayerHealth::new(max_health))
            .add_systems(Update, refresh_hearts);
        app.world_mut().spawn((HeartRow, NodeBundle::default()));
        app
    }

    fn hearts(app: &mut App) -> Vec<(u32, Color)> {
        let mut hearts: Vec<_> = app
            .world_mut()
            .query::<(&Heart, &BackgroundColor)>()
            .iter(app.world())
            .map(|(heart, color)| (heart.0, color.0))
            .collect();
        hearts.sort_by_key(|(slot, _)| *slot);
        hearts
    }

    #[test]
    fn every_point_of_max_health_gets_a_heart() {
        let mut app = hud_app(14);
        app.update();
        assert_eq!(hearts(&mut app).len(), 14);

        app.world_mut().resource_mut::<PlayerHealth>().take_damage(5);
        app.update();
        let hearts = hearts(&mut app);
        assert_eq!(hearts.len(), 14);
        assert!(hearts[..9].iter().all(|(_, color)| *color == HEART_FULL));
        assert!(hearts[9..].iter().all(|(_, color)| *color == HEART_LOST));
    }

    #[test]
    fn row_is_rebuilt_when_max_health_changes() {
        let mut app = hud_app(3);
        app.update();
        assert_eq!(hearts(&mut app).len(), 3);

        app.insert_resource(PlayerHealth::new(5));
        app.update();
        assert_eq!(hearts(&mut app).len(), 5);
    }
}

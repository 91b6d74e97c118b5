//! Run states and the per-frame system ordering shared by every plugin.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum GameState {
    /// Tears down whatever scene exists and builds a fresh one, then hands off to `Playing`.
    #[default]
    Loading,
    Playing,
    Paused,
    /// Terminal until the host (or the player) asks to play again.
    GameOver,
}

/// Named system sets to structure the Update schedule. The order mirrors one frame of play:
/// the physics step first, then game logic, then purely cosmetic layers.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSet {
    Physics,
    Collision,
    Input,
    Ai,
    Lifecycle,
    Progression,
    Effects,
}

/// ESC pauses and resumes. Ignored while loading or after the game is over.
pub fn toggle_pause(
    keyboard: Res<ButtonInput<KeyCode>>,
    state: Res<State<GameState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !keyboard.just_pressed(KeyCode::Escape) {
        return;
    }

    match state.get() {
        GameState::Playing => next_state.set(GameState::Paused),
        GameState::Paused => next_state.set(GameState::Playing),
        GameState::Loading | GameState::GameOver => {}
    }
}

/// Freezes the virtual clock so cooldowns, fades and pending spawns resume exactly where they
/// stopped.
pub fn pause_clock(mut time: ResMut<Time<Virtual>>) {
    time.pause();
}

pub fn resume_clock(mut time: ResMut<Time<Virtual>>) {
    time.unpause();
}

//! Bridge to the embedding page. Outbound messages are serialised to JSON and logged where the
//! host picks them up; inbound "play again" requests restart the run.

use bevy::prelude::*;
use serde::Serialize;

use crate::state::GameState;

pub struct HostPlugin;

impl Plugin for HostPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<HostOutbound>()
            .add_event::<PlayAgain>()
            .add_systems(Update, publish_outbound)
            .add_systems(
                Update,
                (request_restart_from_keyboard, restart_on_request)
                    .chain()
                    .run_if(in_state(GameState::GameOver)),
            );
    }
}

#[derive(Event, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum HostOutbound {
    GameOver { score: u32 },
}

impl HostOutbound {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Sent by the host (or the R key) to start over from the game-over screen.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct PlayAgain;

fn publish_outbound(mut messages: EventReader<HostOutbound>) {
    for message in messages.read() {
        match message.to_json() {
            Ok(json) => info!("host <- {}", json),
            Err(err) => warn!("Dropping host message {:?}: {}", message, err),
        }
    }
}

fn request_restart_from_keyboard(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut requests: EventWriter<PlayAgain>,
) {
    if keyboard.just_pressed(KeyCode::KeyR) {
        requests.send(PlayAgain);
    }
}

fn restart_on_request(
    mut requests: EventReader<PlayAgain>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if requests.read().count() > 0 {
        info!("Restarting.");
        next_state.set(GameState::Loading);
    }
}

//! Player health, score and the one-way trip into `GameOver`.

use bevy::prelude::*;

use crate::host::HostOutbound;
use crate::state::{GameSet, GameState};

pub struct HealthPlugin;

impl Plugin for HealthPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayerHealth>()
            .init_resource::<Score>()
            .add_event::<DamagePlayer>()
            .add_systems(Update, apply_player_damage.in_set(GameSet::Lifecycle));
    }
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamagePlayer {
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Already depleted; nothing changed.
    Ignored,
    Wounded,
    /// This hit took the last point. Reported once per life.
    Depleted,
}

/// Always within `0..=max`.
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct PlayerHealth {
    current: u32,
    max: u32,
    depleted: bool,
}

impl Default for PlayerHealth {
    fn default() -> Self {
        Self::new(3)
    }
}

impl PlayerHealth {
    pub fn new(max: u32) -> Self {
        Self {
            current: max,
            max,
            depleted: false,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn take_damage(&mut self, amount: u32) -> DamageOutcome {
        if self.depleted {
            return DamageOutcome::Ignored;
        }
        self.current = self.current.saturating_sub(amount);
        if self.current == 0 {
            self.depleted = true;
            DamageOutcome::Depleted
        } else {
            DamageOutcome::Wounded
        }
    }

    /// No effect once depleted; a dead player stays dead until the scene restarts.
    pub fn heal(&mut self, amount: u32) {
        if self.depleted {
            return;
        }
        self.current = self.current.saturating_add(amount).min(self.max);
    }
}

#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq, Deref, DerefMut)]
pub struct Score(pub u32);

fn apply_player_damage(
    mut hits: EventReader<DamagePlayer>,
    mut health: ResMut<PlayerHealth>,
    score: Res<Score>,
    mut outbound: EventWriter<HostOutbound>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    for hit in hits.read() {
        match health.take_damage(hit.amount) {
            DamageOutcome::Ignored => {}
            DamageOutcome::Wounded => {
                debug!("Player hit, {} of {} left.", health.current(), health.max());
            }
            DamageOutcome::Depleted => {
                info!("Player defeated with a score of {}.", score.0);
                outbound.send(HostOutbound::GameOver { score: score.0 });
                next_state.set(GameState::GameOver);
            }
        }
    }
}

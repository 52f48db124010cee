use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// How a finished match was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// One or both agents reached zero health.
    Elimination,
    /// The match time limit elapsed with both agents alive.
    TimeLimit,
    /// A player-supplied behavior hook raised.
    Fault,
}

/// Per-player line of the terminal results notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub agent_id: EntityId,
    /// Name of the behavior the player submitted.
    pub name: String,
    pub winner: bool,
    pub faulted: bool,
    /// Simulated seconds survived, or `None` if the agent was alive at the end.
    pub survival_time: Option<f32>,
}

/// Terminal results of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResults {
    pub players: Vec<PlayerResult>,
    pub tie: bool,
    pub fault: bool,
    pub reason: EndReason,
}

impl MatchResults {
    /// The sole winner, if there is one.
    pub fn winner(&self) -> Option<&PlayerResult> {
        if self.tie {
            return None;
        }
        self.players.iter().find(|p| p.winner)
    }

    pub fn player(&self, agent_id: EntityId) -> Option<&PlayerResult> {
        self.players.iter().find(|p| p.agent_id == agent_id)
    }
}

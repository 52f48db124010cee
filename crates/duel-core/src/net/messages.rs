use serde::{Deserialize, Serialize};

use crate::entity::{AgentState, EntityId, EntityKind, Obstacle, ProjectileState};
use crate::outcome::MatchResults;

/// Wire message type discriminator (first byte of every frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Debug = 0x01,

    // Match lifecycle
    StartGame = 0x10,
    StartSimulation = 0x11,

    // Per-tick state
    AgentStates = 0x12,
    ProjectileStates = 0x13,
    Destroy = 0x14,

    // Terminal
    PlayerError = 0x15,
    Results = 0x16,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Debug),
            0x10 => Some(Self::StartGame),
            0x11 => Some(Self::StartSimulation),
            0x12 => Some(Self::AgentStates),
            0x13 => Some(Self::ProjectileStates),
            0x14 => Some(Self::Destroy),
            0x15 => Some(Self::PlayerError),
            0x16 => Some(Self::Results),
            _ => None,
        }
    }
}

/// An agent accepted into the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedAgent {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugMsg {
    pub text: String,
}

/// Matchmaking is over; these agents will fight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartGameMsg {
    /// Wire protocol version the host speaks.
    pub protocol_version: u8,
    pub agents: Vec<MatchedAgent>,
}

/// The simulation is about to run. Carries the static scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSimulationMsg {
    pub tick_rate: u32,
    pub arena_width: f32,
    pub arena_height: f32,
    pub obstacles: Vec<Obstacle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatesMsg {
    pub tick: u64,
    pub agents: Vec<AgentState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileStatesMsg {
    pub tick: u64,
    pub projectiles: Vec<ProjectileState>,
}

/// An agent or projectile left the world this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyMsg {
    pub id: EntityId,
    pub kind: EntityKind,
}

/// A player's behavior raised; the text is shown to that player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerErrorMsg {
    pub agent_id: EntityId,
    pub message: String,
}

/// Messages sent from the simulation host to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Debug(DebugMsg),
    StartGame(StartGameMsg),
    StartSimulation(StartSimulationMsg),
    AgentStates(AgentStatesMsg),
    ProjectileStates(ProjectileStatesMsg),
    Destroy(DestroyMsg),
    PlayerError(PlayerErrorMsg),
    Results(MatchResults),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Debug(_) => MessageType::Debug,
            Self::StartGame(_) => MessageType::StartGame,
            Self::StartSimulation(_) => MessageType::StartSimulation,
            Self::AgentStates(_) => MessageType::AgentStates,
            Self::ProjectileStates(_) => MessageType::ProjectileStates,
            Self::Destroy(_) => MessageType::Destroy,
            Self::PlayerError(_) => MessageType::PlayerError,
            Self::Results(_) => MessageType::Results,
        }
    }
}

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use duel_arena::{Game, MatchPhase, MatchSink};
use duel_core::constants::{arena, timing};
use duel_core::entity::{AgentState, EntityId, EntityKind, ProjectileState};
use duel_core::net::messages::{
    AgentStatesMsg, DestroyMsg, MatchedAgent, PlayerErrorMsg, ProjectileStatesMsg, ServerMessage,
    StartGameMsg, StartSimulationMsg,
};
use duel_core::net::protocol::{PROTOCOL_VERSION, encode_server_message};
use duel_core::outcome::MatchResults;

use crate::config::RealtimeConfig;

/// Commands sent from the host to a running match session.
#[derive(Debug)]
pub enum SessionCommand {
    Stop,
}

/// Output of a match session.
#[derive(Debug, Clone)]
pub enum SessionBroadcast {
    /// Serialized ServerMessage bytes ready to hand to a transport.
    EncodedMessage(Bytes),
    /// The session loop has exited. Always the last broadcast.
    SessionEnded,
}

/// Collects the notifications of one tick as encoded frames.
#[derive(Debug, Default)]
pub struct EncodingSink {
    frames: Vec<Bytes>,
}

impl EncodingSink {
    pub fn push(&mut self, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => self.frames.push(Bytes::from(data)),
            Err(e) => tracing::error!(
                message_type = ?msg.message_type(),
                error = %e,
                "Failed to encode server message"
            ),
        }
    }

    pub fn take_frames(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.frames)
    }
}

impl MatchSink for EncodingSink {
    fn send_states(&mut self, tick: u64, agents: &[AgentState], projectiles: &[ProjectileState]) {
        self.push(&ServerMessage::AgentStates(AgentStatesMsg {
            tick,
            agents: agents.to_vec(),
        }));
        self.push(&ServerMessage::ProjectileStates(ProjectileStatesMsg {
            tick,
            projectiles: projectiles.to_vec(),
        }));
    }

    fn send_destroy(&mut self, id: EntityId, kind: EntityKind) {
        self.push(&ServerMessage::Destroy(DestroyMsg { id, kind }));
    }

    fn send_player_error(&mut self, agent_id: EntityId, message: &str) {
        self.push(&ServerMessage::PlayerError(PlayerErrorMsg {
            agent_id,
            message: message.to_string(),
        }));
    }

    fn send_results(&mut self, results: &MatchResults) {
        self.push(&ServerMessage::Results(results.clone()));
    }
}

/// The lifecycle messages sent before the first tick.
pub fn lifecycle_messages(game: &Game) -> [ServerMessage; 2] {
    let agents = game
        .agents()
        .map(|a| MatchedAgent {
            id: a.state().id,
            name: a.name().to_string(),
        })
        .collect();
    [
        ServerMessage::StartGame(StartGameMsg {
            protocol_version: PROTOCOL_VERSION,
            agents,
        }),
        ServerMessage::StartSimulation(StartSimulationMsg {
            tick_rate: timing::TICKS_PER_SECOND,
            arena_width: arena::WIDTH,
            arena_height: arena::HEIGHT,
            obstacles: game.obstacles().cloned().collect(),
        }),
    ]
}

/// Run `game` on its own task. Returns the command sender, the broadcast
/// receiver and the task handle.
pub fn spawn_match_session(
    game: Game,
    config: &RealtimeConfig,
) -> (
    mpsc::UnboundedSender<SessionCommand>,
    mpsc::Receiver<SessionBroadcast>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::channel(config.channel_capacity());
    let pace = config.pace_ticks;

    let handle = tokio::spawn(async move {
        run_match_loop(game, pace, cmd_rx, broadcast_tx).await;
    });

    (cmd_tx, broadcast_rx, handle)
}

/// Send every buffered frame. False once the receiver is gone.
async fn flush(sink: &mut EncodingSink, tx: &mpsc::Sender<SessionBroadcast>) -> bool {
    for frame in sink.take_frames() {
        if tx.send(SessionBroadcast::EncodedMessage(frame)).await.is_err() {
            return false;
        }
    }
    true
}

async fn run_match_loop(
    mut game: Game,
    pace: bool,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    broadcast_tx: mpsc::Sender<SessionBroadcast>,
) {
    let mut sink = EncodingSink::default();
    for msg in &lifecycle_messages(&game) {
        sink.push(msg);
    }
    if !flush(&mut sink, &broadcast_tx).await {
        tracing::debug!("Session receiver dropped before start");
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs_f32(timing::TICK_DT));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if pace {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Stop) | None => break,
                },
                _ = interval.tick() => {},
            }
        } else {
            match cmd_rx.try_recv() {
                Ok(SessionCommand::Stop) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {},
            }
            tokio::task::yield_now().await;
        }

        if let Err(e) = game.tick(&mut sink) {
            tracing::error!(tick = game.tick_count(), error = %e, "Match tick failed");
            break;
        }
        if !flush(&mut sink, &broadcast_tx).await {
            tracing::debug!(tick = game.tick_count(), "Session receiver dropped");
            return;
        }
        if game.phase() == MatchPhase::Ended {
            break;
        }
    }

    tracing::info!(
        ticks = game.tick_count(),
        ended = game.phase() == MatchPhase::Ended,
        "Match session finished"
    );
    let _ = broadcast_tx.send(SessionBroadcast::SessionEnded).await;
}

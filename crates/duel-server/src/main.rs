use tracing_subscriber::EnvFilter;

use duel_arena::{Behavior, Game, MatchConfig};
use duel_core::net::messages::ServerMessage;
use duel_core::net::protocol::decode_server_message;
use duel_server::bots::{Circler, Wanderer};
use duel_server::config::RealtimeConfig;
use duel_server::game_loop::{SessionBroadcast, SessionCommand, spawn_match_session};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("Duel server starting");

    let match_config = MatchConfig::load();
    let realtime = RealtimeConfig::load();
    let seed = rand::random::<u64>();
    tracing::info!(seed, pace = realtime.pace_ticks, "Running demo match");

    let behaviors: Vec<Box<dyn Behavior>> =
        vec![Box::new(Circler::new(45.0)), Box::new(Wanderer::new(seed))];
    let game = match Game::new(match_config, behaviors) {
        Ok(game) => game,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up match");
            std::process::exit(1);
        },
    };

    let (cmd_tx, mut broadcast_rx, handle) = spawn_match_session(game, &realtime);

    let stop_tx = cmd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping match");
            let _ = stop_tx.send(SessionCommand::Stop);
        }
    });

    while let Some(broadcast) = broadcast_rx.recv().await {
        let data = match broadcast {
            SessionBroadcast::EncodedMessage(data) => data,
            SessionBroadcast::SessionEnded => break,
        };
        match decode_server_message(&data) {
            Ok(ServerMessage::PlayerError(msg)) => {
                tracing::warn!(agent = msg.agent_id, "Player error: {}", msg.message);
            },
            Ok(ServerMessage::Results(results)) => {
                for p in &results.players {
                    tracing::info!(
                        agent = p.agent_id,
                        name = %p.name,
                        winner = p.winner,
                        faulted = p.faulted,
                        survival_time = ?p.survival_time,
                        "Result"
                    );
                }
                tracing::info!(tie = results.tie, reason = ?results.reason, "Match over");
            },
            Ok(_) => {},
            Err(e) => tracing::error!(error = %e, "Failed to decode broadcast"),
        }
    }

    drop(cmd_tx);
    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Match session task failed");
    }
}

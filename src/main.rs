//! Matchlink demo binary.
//!
//! Drives two in-process sessions through a complete match over the
//! loopback relay: join-or-create, both roster paths, a scripted win or
//! draw, an authority-gated rematch, and optionally a mid-match
//! connection drop to exercise the recovery loop.

#![warn(missing_docs)]

use anyhow::Result;
use clap::Parser;
use matchlink::{
    join_or_create, MatchConfig, RelayHub, SessionCommand, SessionCoordinator, SessionExit,
    Tile, TracePresenter,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, Script};

/// One running demo session: its loop task and its command surface.
struct DemoSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: tokio::task::JoinHandle<SessionExit>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Demo {
            script,
            drop_midgame,
            config,
        } => run_demo(script, drop_midgame, config).await,
    }
}

async fn run_demo(
    script: Script,
    drop_midgame: bool,
    config_path: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => MatchConfig::from_file(path)?,
        None => MatchConfig::default(),
    };

    let hub = RelayHub::new();
    let alice = spawn_session(&hub, "alice", config.clone()).await?;
    let bob = spawn_session(&hub, "bob", config.clone()).await?;
    settle().await;

    if drop_midgame {
        play_moves(&alice, &bob, &script_moves(script)[..2]).await;

        let room = hub
            .active_rooms()
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no active room"))?;
        info!(room, "dropping bob's connection mid-match");
        hub.script_reconnect_failures("bob", 1);
        hub.drop_connection(&room, "bob");

        // One swallowed attempt, then the retry succeeds and the match
        // restarts fresh through the roster path.
        tokio::time::sleep(config.reconnect_policy().retry_interval * 2).await;
        settle().await;
    }

    play_moves(&alice, &bob, &script_moves(script)).await;

    info!("match over, authority requests a rematch");
    alice.commands.send(SessionCommand::RequestRestart)?;
    settle().await;

    // A couple of opening moves in the rematch, then both leave.
    play_moves(&alice, &bob, &script_moves(script)[..2]).await;

    alice.commands.send(SessionCommand::Leave)?;
    bob.commands.send(SessionCommand::Leave)?;

    let alice_exit = alice.task.await?;
    let bob_exit = bob.task.await?;
    info!(?alice_exit, ?bob_exit, "demo complete");
    Ok(())
}

async fn spawn_session(
    hub: &RelayHub,
    identity: &str,
    config: MatchConfig,
) -> Result<DemoSession> {
    let identity = identity.to_string();
    let link = join_or_create(hub, &identity, config.room_options()).await?;

    let coordinator = SessionCoordinator::new(
        identity.clone(),
        config,
        link.handle,
        TracePresenter::new(identity),
    );

    let (commands, command_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(coordinator.run(link.events, command_rx));
    Ok(DemoSession { commands, task })
}

/// The authority plays the even moves, the peer the odd ones.
fn script_moves(script: Script) -> Vec<Tile> {
    let indices: &[usize] = match script {
        Script::Win => &[0, 4, 1, 3, 2],
        Script::Draw => &[0, 1, 2, 3, 4, 5, 7, 6, 8],
    };
    indices
        .iter()
        .map(|&index| Tile::from_index(index).expect("scripted index in range"))
        .collect()
}

async fn play_moves(alice: &DemoSession, bob: &DemoSession, moves: &[Tile]) {
    for (turn, tile) in moves.iter().enumerate() {
        let mover = if turn % 2 == 0 { alice } else { bob };
        let _ = mover.commands.send(SessionCommand::SubmitMove(*tile));
        settle().await;
    }
}

/// Lets the event loops drain between scripted inputs.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

//! Session coordination: bridges room lifecycle, local intent and the
//! match machine.
//!
//! The core correctness decision lives here: a local move is never applied
//! directly. It is broadcast through the relay and applied on the delivery
//! path - for the sender exactly as for the peer - so both participants'
//! machines observe the same move sequence in the same order.
//!
//! All mutation of the machine and the roster goes through one
//! [`SessionCoordinator`], driven by a single event loop. Nothing else
//! writes to session state.

use crate::authority::{ParticipantId, Role, RoleAssignment};
use crate::config::MatchConfig;
use crate::game::{MatchMachine, Mark, Phase, Tile, TurnTransition};
use crate::presentation::MatchPresenter;
use crate::reconnect::{ReconnectionSupervisor, RecoveryReport};
use crate::transport::{Frame, RoomEvent, RoomHandle, TransportError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Connection state of a participant, as last reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Reachable through the relay.
    Connected,
    /// Connection lost; recovery may be in progress.
    Disconnected,
}

/// A participant admitted to the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Transport-reported identity.
    pub identity: ParticipantId,
    /// Role held for the duration of the match.
    pub role: Role,
    /// Mark this participant plays; fixed until restart.
    pub mark: Mark,
    /// Last known connection state.
    pub connection: ConnectionStatus,
}

/// Errors surfaced to the local caller before any network effect.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum SessionError {
    /// It is not the local participant's turn.
    ///
    /// A local short-circuit only: the delivery path re-validates every
    /// move with the same rule on every recipient.
    #[display("not your turn")]
    NotYourTurn,

    /// The target tile already holds a mark.
    #[display("tile {} is occupied", _0)]
    CellOccupied(Tile),

    /// No match is currently accepting moves.
    #[display("no active match")]
    MatchNotActive,

    /// Restart is an authority-only permission.
    #[display("only the match authority may restart")]
    NotAuthorized,

    /// The room link failed.
    #[display("{}", _0)]
    Transport(TransportError),
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Transport(err)
    }
}

/// Local intent fed into the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Place the local mark on a tile.
    SubmitMove(Tile),
    /// Ask for a rematch (authority only).
    RequestRestart,
    /// Leave the room and end the session.
    Leave,
}

/// Why the session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The local participant left.
    Left,
    /// Recovery gave up; the session was abandoned.
    Abandoned,
    /// The transport closed the event stream.
    Closed,
}

/// Owns one session: the match machine, the participant roster and the
/// recovery flag. Mediates every mutation.
pub struct SessionCoordinator<P: MatchPresenter> {
    local_identity: ParticipantId,
    config: MatchConfig,
    room: Arc<dyn RoomHandle>,
    presenter: P,
    machine: MatchMachine,
    roster: Vec<ParticipantId>,
    participants: Vec<Participant>,
    reconnecting: bool,
}

impl<P: MatchPresenter> SessionCoordinator<P> {
    /// Creates a coordinator for a freshly joined room.
    pub fn new(
        local_identity: ParticipantId,
        config: MatchConfig,
        room: Arc<dyn RoomHandle>,
        presenter: P,
    ) -> Self {
        Self {
            local_identity,
            config,
            room,
            presenter,
            machine: MatchMachine::new(),
            roster: Vec::new(),
            participants: Vec::new(),
            reconnecting: false,
        }
    }

    /// Returns the match machine.
    pub fn machine(&self) -> &MatchMachine {
        &self.machine
    }

    /// Returns the participants of the running (or ended) match.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Returns the local participant, once a match has formed.
    pub fn local_participant(&self) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.identity == self.local_identity)
    }

    /// Returns true while connection recovery is in progress.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    /// Returns true if the local participant holds authority.
    pub fn is_local_authority(&self) -> bool {
        self.current_roles()
            .map(|roles| roles.authority() == &self.local_identity)
            .unwrap_or(false)
    }

    fn current_roles(&self) -> Option<RoleAssignment> {
        RoleAssignment::derive(self.roster.get(..2)?)
    }

    // ─────────────────────────────────────────────────────────────
    //  Room lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Handles the local participant entering a room.
    ///
    /// This is also the re-entry point after a successful reconnect. A
    /// leftover active match is void here - the peer already tore its
    /// copy down when this side dropped - while an ended match keeps its
    /// outcome on both sides until the authority restarts it.
    #[instrument(skip(self), fields(who = %self.local_identity))]
    pub fn on_room_joined(&mut self, roster: Vec<ParticipantId>) {
        info!(count = roster.len(), "joined room");
        self.reconnecting = false;
        self.roster = roster;
        if self.machine.phase().is_active() {
            self.participants.clear();
            self.machine.reset();
        }
        self.try_begin_match();
    }

    /// Handles another participant entering the room.
    #[instrument(skip(self), fields(who = %self.local_identity))]
    pub fn on_participant_joined(&mut self, identity: ParticipantId) {
        info!(%identity, "participant joined");
        if !self.roster.contains(&identity) {
            self.roster.push(identity);
        }
        self.try_begin_match();
    }

    /// Handles a participant leaving the room.
    ///
    /// An interrupted match is torn down without an outcome - a disconnect
    /// is never scored as a win or loss. An already-ended match keeps its
    /// outcome so a rejoin cannot sidestep the authority-gated restart.
    #[instrument(skip(self), fields(who = %self.local_identity))]
    pub fn on_participant_left(&mut self, identity: &str) {
        let before = self.roster.len();
        self.roster.retain(|id| id != identity);
        if self.roster.len() == before {
            debug!(identity, "leave report for unknown participant");
            return;
        }

        info!(identity, "participant left");
        self.participants.clear();

        if self.machine.phase().is_active() {
            self.machine.reset();
        }
        self.presenter.on_opponent_left();
    }

    fn try_begin_match(&mut self) {
        if self.roster.len() < 2 {
            self.presenter.on_waiting_for_opponent();
            return;
        }
        // Only a pristine machine starts here. An ended match waits for
        // the authority's restart; an active one ignores roster chatter.
        if self.machine.phase() != Phase::NotStarted {
            debug!(phase = ?self.machine.phase(), "roster complete, match not startable");
            return;
        }
        self.begin_match();
    }

    #[instrument(skip(self), fields(who = %self.local_identity))]
    fn begin_match(&mut self) {
        let Some(roles) = self.current_roles() else {
            return;
        };

        self.participants = build_participants(&roles, *self.config.authority_mark());

        if let Err(err) = self.machine.start(*self.config.first_mover()) {
            // Guarded by the phase check above; reaching this is a bug.
            warn!(%err, "match start rejected");
            return;
        }

        let Some(local_mark) = self.local_participant().map(|p| p.mark) else {
            warn!("local identity missing from roster");
            return;
        };
        let is_local_turn = self.machine.turn_owner() == local_mark;
        info!(%local_mark, is_local_turn, "match started");
        self.presenter.on_match_started(local_mark, is_local_turn);
    }

    // ─────────────────────────────────────────────────────────────
    //  Moves: broadcast out, mutate on delivery
    // ─────────────────────────────────────────────────────────────

    /// Submits a local move.
    ///
    /// Validation here is a short-circuit to avoid a pointless round trip;
    /// the machine is only mutated when the frame comes back through
    /// [`on_frame`](Self::on_frame), for the sender like for the peer.
    #[instrument(skip(self), fields(who = %self.local_identity))]
    pub async fn submit_move(&mut self, tile: Tile) -> Result<(), SessionError> {
        let local_mark = self
            .local_participant()
            .map(|p| p.mark)
            .ok_or(SessionError::MatchNotActive)?;

        if !self.machine.phase().is_active() {
            return Err(SessionError::MatchNotActive);
        }
        if self.machine.turn_owner() != local_mark {
            return Err(SessionError::NotYourTurn);
        }
        if !self.machine.board().is_empty(tile) {
            return Err(SessionError::CellOccupied(tile));
        }

        self.room
            .broadcast(Frame::Move {
                tile,
                mark: local_mark,
            })
            .await?;
        Ok(())
    }

    /// Requests a rematch after a terminal outcome.
    ///
    /// Authority-gated: the peer gets a local error and nothing reaches
    /// the network. The reset itself happens on the delivery path, on both
    /// ends.
    #[instrument(skip(self), fields(who = %self.local_identity))]
    pub async fn request_restart(&mut self) -> Result<(), SessionError> {
        if !self.is_local_authority() {
            return Err(SessionError::NotAuthorized);
        }
        if !self.machine.phase().is_ended() {
            return Err(SessionError::MatchNotActive);
        }

        self.room.broadcast(Frame::Restart).await?;
        Ok(())
    }

    /// Applies a broadcast-delivered frame.
    ///
    /// Validation failures are swallowed and logged: with a transport that
    /// honors per-room ordering they can only be duplicates or stray late
    /// frames, an instrumentation signal rather than a user-facing error.
    #[instrument(skip(self), fields(who = %self.local_identity))]
    pub fn on_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Move { tile, mark } => self.apply_move(tile, mark),
            Frame::Restart => self.apply_restart(),
        }
    }

    fn apply_move(&mut self, tile: Tile, mark: Mark) {
        match self.machine.submit(tile, mark) {
            Ok(transition) => {
                self.presenter.on_tile_updated(tile, mark);
                self.report_transition(transition);
            }
            Err(err) => {
                warn!(%tile, %mark, %err, "discarding replayed move");
            }
        }
    }

    fn report_transition(&mut self, transition: TurnTransition) {
        let local_mark = self.local_participant().map(|p| p.mark);
        match transition {
            TurnTransition::NextTurn(next) => {
                self.presenter.on_turn_changed(Some(next) == local_mark);
            }
            TurnTransition::Ended(outcome) => {
                // Local derivation: "did I win" is computed from the local
                // mark, never negotiated over the wire.
                let is_local_winner =
                    outcome.winner().is_some() && outcome.winner() == local_mark;
                self.presenter.on_match_ended(outcome, is_local_winner);
            }
        }
    }

    fn apply_restart(&mut self) {
        let Some(roles) = self.current_roles() else {
            warn!("restart frame without a full roster");
            return;
        };

        if let Err(err) = self.machine.restart(*self.config.first_mover()) {
            warn!(%err, "discarding restart frame");
            return;
        }

        // Authority is re-derived verbatim, so roles are stable across
        // repeated matches in the same room.
        self.participants = build_participants(&roles, *self.config.authority_mark());

        let Some(local_mark) = self.local_participant().map(|p| p.mark) else {
            return;
        };
        let is_local_turn = self.machine.turn_owner() == local_mark;
        info!(%local_mark, is_local_turn, "match restarted");
        self.presenter.on_match_started(local_mark, is_local_turn);
    }

    // ─────────────────────────────────────────────────────────────
    //  Connection recovery
    // ─────────────────────────────────────────────────────────────

    /// Handles loss of the local connection.
    ///
    /// Returns true when a recovery loop should be armed; repeated
    /// disconnect reports while already recovering are no-ops.
    #[instrument(skip(self), fields(who = %self.local_identity))]
    pub fn on_disconnected(&mut self) -> bool {
        if self.reconnecting {
            debug!("already recovering");
            return false;
        }
        self.reconnecting = true;
        self.set_local_connection(ConnectionStatus::Disconnected);
        true
    }

    /// Handles the relay acknowledging a reconnect request.
    ///
    /// Deliberately does not resume the match: play state is restored only
    /// through the roster-driven join path.
    #[instrument(skip(self), fields(who = %self.local_identity))]
    pub fn on_reconnected(&mut self) {
        info!("connection restored");
        self.reconnecting = false;
        self.set_local_connection(ConnectionStatus::Connected);
    }

    fn set_local_connection(&mut self, status: ConnectionStatus) {
        let local_identity = self.local_identity.clone();
        if let Some(local) = self
            .participants
            .iter_mut()
            .find(|p| p.identity == local_identity)
        {
            local.connection = status;
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Event loop
    // ─────────────────────────────────────────────────────────────

    /// Drives the session to completion.
    ///
    /// The loop is the single writer: room events, recovery reports and
    /// local commands are serialized here, so no mutation of the machine
    /// ever races another.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<RoomEvent>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> SessionExit {
        let (report_tx, mut reports) = mpsc::unbounded_channel();
        let mut recovery: Option<RecoveryHandle> = None;

        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else {
                        return SessionExit::Closed;
                    };
                    match event {
                        RoomEvent::Joined { roster } => {
                            cancel_recovery(&mut recovery);
                            self.on_room_joined(roster);
                        }
                        RoomEvent::ParticipantJoined { identity } => {
                            self.on_participant_joined(identity);
                        }
                        RoomEvent::ParticipantLeft { identity } => {
                            self.on_participant_left(&identity);
                        }
                        RoomEvent::Delivery { frame } => self.on_frame(frame),
                        RoomEvent::Disconnected => {
                            if self.on_disconnected() {
                                recovery = Some(spawn_recovery(
                                    self.config.reconnect_policy(),
                                    self.room.clone(),
                                    report_tx.clone(),
                                ));
                            }
                        }
                        RoomEvent::Reconnected => {
                            cancel_recovery(&mut recovery);
                            self.on_reconnected();
                        }
                    }
                }
                Some(report) = reports.recv() => {
                    match report {
                        RecoveryReport::Attempting { attempt, max_attempts } => {
                            self.presenter.on_reconnecting(attempt, max_attempts);
                        }
                        RecoveryReport::Exhausted => {
                            self.presenter.on_reconnect_failed();
                        }
                        RecoveryReport::Abandon => {
                            self.room.leave().await;
                            return SessionExit::Abandoned;
                        }
                    }
                }
                maybe_command = commands.recv() => {
                    match maybe_command {
                        None | Some(SessionCommand::Leave) => {
                            cancel_recovery(&mut recovery);
                            self.room.leave().await;
                            return SessionExit::Left;
                        }
                        Some(SessionCommand::SubmitMove(tile)) => {
                            if let Err(err) = self.submit_move(tile).await {
                                debug!(%err, "move rejected locally");
                            }
                        }
                        Some(SessionCommand::RequestRestart) => {
                            if let Err(err) = self.request_restart().await {
                                debug!(%err, "restart rejected locally");
                            }
                        }
                    }
                }
            }
        }
    }
}

fn build_participants(roles: &RoleAssignment, authority_mark: Mark) -> Vec<Participant> {
    vec![
        Participant {
            identity: roles.authority().clone(),
            role: Role::Authority,
            mark: roles.mark_of(Role::Authority, authority_mark),
            connection: ConnectionStatus::Connected,
        },
        Participant {
            identity: roles.peer().clone(),
            role: Role::Peer,
            mark: roles.mark_of(Role::Peer, authority_mark),
            connection: ConnectionStatus::Connected,
        },
    ]
}

struct RecoveryHandle {
    cancel: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

fn spawn_recovery(
    policy: crate::reconnect::ReconnectPolicy,
    room: Arc<dyn RoomHandle>,
    reports: mpsc::UnboundedSender<RecoveryReport>,
) -> RecoveryHandle {
    let (cancel, cancel_rx) = watch::channel(false);
    let supervisor = ReconnectionSupervisor::new(policy);
    let task = tokio::spawn(supervisor.run(room, cancel_rx, reports));
    RecoveryHandle { cancel, task }
}

fn cancel_recovery(recovery: &mut Option<RecoveryHandle>) {
    if let Some(handle) = recovery.take() {
        // Graceful cancel; the task exits at its next await point.
        let _ = handle.cancel.send(true);
        drop(handle.task);
    }
}

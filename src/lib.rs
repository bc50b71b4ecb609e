//! Matchlink - authoritative session protocol for a relay-mediated,
//! two-participant turn-based match.
//!
//! # Architecture
//!
//! - **Game**: the board value type and the match state machine
//! - **Authority**: role derivation from room join order
//! - **Session**: the coordinator bridging transport events, local intent
//!   and the machine; the single writer for all match state
//! - **Reconnect**: bounded-retry recovery for dropped connections
//! - **Transport**: the contract required from the relay, plus an
//!   in-process loopback implementation for tests and the demo
//!
//! Moves are only ever applied on the broadcast-delivery path, for the
//! sender as for the peer, so both participants' machines replay the same
//! sequence in the same order.
//!
//! # Example
//!
//! ```no_run
//! use matchlink::{
//!     join_or_create, MatchConfig, RelayHub, RoomOptions, SessionCoordinator,
//!     TracePresenter,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let hub = RelayHub::new();
//! let config = MatchConfig::default();
//!
//! let identity = "alice".to_string();
//! let link = join_or_create(&hub, &identity, RoomOptions::default()).await?;
//!
//! let coordinator = SessionCoordinator::new(
//!     identity.clone(),
//!     config,
//!     link.handle,
//!     TracePresenter::new(identity),
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod authority;
mod config;
mod game;
mod presentation;
mod reconnect;
mod relay;
mod session;
mod transport;

// Crate-level exports - Game domain
pub use game::{
    Board, BoardError, Cell, Mark, MatchError, MatchMachine, Outcome, Phase, PlacedMove,
    Tile, TileOutOfRange, TurnTransition,
};

// Crate-level exports - Roles
pub use authority::{ParticipantId, Role, RoleAssignment};

// Crate-level exports - Session coordination
pub use session::{
    ConnectionStatus, Participant, SessionCommand, SessionCoordinator, SessionError,
    SessionExit,
};

// Crate-level exports - Reconnection
pub use reconnect::{
    ReconnectPolicy, ReconnectionSupervisor, RecoveryReport, RecoveryState, RetrySchedule,
};

// Crate-level exports - Transport contract
pub use transport::{
    join_or_create, Frame, JoinError, RoomEvent, RoomHandle, RoomLink, RoomOptions,
    RoomTransport, TransportError,
};

// Crate-level exports - Loopback relay
pub use relay::{RelayHub, RelayRoom, RoomName};

// Crate-level exports - Presentation
pub use presentation::{MatchPresenter, TracePresenter};

// Crate-level exports - Configuration
pub use config::{ConfigError, MatchConfig};

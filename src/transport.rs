//! The contract this core requires from its relay transport.
//!
//! The transport itself is an external collaborator: something that owns
//! room membership, delivers reliable broadcasts, and reports connection
//! state. The traits here pin down exactly what the session layer consumes
//! so any relay (or the in-process [`crate::relay`] loopback) can sit
//! behind them.
//!
//! Ordering requirement: `broadcast` must deliver frames to every room
//! member, including the sender, in one per-room total order. Terminal
//! detection relies on both participants applying the same move sequence.

use crate::authority::ParticipantId;
use crate::game::{Mark, Tile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// The logical broadcast payload - the entire transmitted state surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// A participant places a mark on a tile.
    Move {
        /// Target tile (0-8 on the wire).
        tile: Tile,
        /// Mark being placed.
        mark: Mark,
    },
    /// The authority resets an ended match for a rematch.
    Restart,
}

/// Room lifecycle and delivery events pushed to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The local participant entered the room; carries the join-ordered
    /// roster at that moment.
    Joined {
        /// Identities in join order, local participant included.
        roster: Vec<ParticipantId>,
    },
    /// Another participant entered the room.
    ParticipantJoined {
        /// The new participant.
        identity: ParticipantId,
    },
    /// Another participant left or lost its connection.
    ParticipantLeft {
        /// The departed participant.
        identity: ParticipantId,
    },
    /// A broadcast frame was delivered to this member.
    Delivery {
        /// The decoded payload.
        frame: Frame,
    },
    /// The local connection to the relay dropped.
    Disconnected,
    /// The relay acknowledged a reconnect request.
    Reconnected,
}

/// Failure to enter a room.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum JoinError {
    /// No open room matched the join criteria.
    #[display("no open room available")]
    NoOpenRoom,
    /// The target room is already at capacity.
    #[display("room is full")]
    RoomFull,
    /// The identity is already present in the room.
    #[display("identity already joined")]
    AlreadyJoined,
    /// The transport failed outright.
    #[display("transport failure: {}", _0)]
    Transport(String),
}

impl std::error::Error for JoinError {}

/// Failure on an established room link.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum TransportError {
    /// The link to the relay is gone.
    #[display("room link closed")]
    LinkClosed,
}

impl std::error::Error for TransportError {}

/// Options for creating a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct RoomOptions {
    /// Maximum number of participants admitted.
    pub capacity: usize,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self { capacity: 2 }
    }
}

/// A member's live link into a room.
///
/// Split from [`RoomTransport`] so the session layer holds only the
/// narrow per-room surface after admission.
#[async_trait]
pub trait RoomHandle: Send + Sync {
    /// Broadcasts a frame to every member, including the sender.
    async fn broadcast(&self, frame: Frame) -> Result<(), TransportError>;

    /// Requests a reconnect after [`RoomEvent::Disconnected`].
    ///
    /// Success is reported asynchronously as [`RoomEvent::Reconnected`];
    /// this call only issues the request.
    async fn request_reconnect(&self) -> Result<(), TransportError>;

    /// Leaves the room and tears down the link.
    async fn leave(&self);
}

/// A member's admission into a room: the command surface plus the event
/// stream the session loop drains.
pub struct RoomLink {
    /// Command surface for the joined room.
    pub handle: std::sync::Arc<dyn RoomHandle>,
    /// Lifecycle and delivery events, in arrival order.
    pub events: mpsc::UnboundedReceiver<RoomEvent>,
}

impl std::fmt::Debug for RoomLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomLink").finish_non_exhaustive()
    }
}

/// Entry point for joining or creating rooms.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Joins any open room with a free slot.
    async fn join_room(&self, identity: &ParticipantId) -> Result<RoomLink, JoinError>;

    /// Creates a fresh room and joins it.
    async fn create_room(
        &self,
        identity: &ParticipantId,
        options: RoomOptions,
    ) -> Result<RoomLink, JoinError>;
}

/// Joins an open room, falling back to creating one when none is available.
pub async fn join_or_create(
    transport: &dyn RoomTransport,
    identity: &ParticipantId,
    options: RoomOptions,
) -> Result<RoomLink, JoinError> {
    match transport.join_room(identity).await {
        Ok(link) => Ok(link),
        Err(JoinError::NoOpenRoom) => {
            tracing::info!(%identity, "no open room, creating one");
            transport.create_room(identity, options).await
        }
        Err(err) => Err(err),
    }
}

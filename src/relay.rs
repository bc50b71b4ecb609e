//! In-process relay: a loopback implementation of the transport contract.
//!
//! Rooms live in one shared registry; broadcast fan-out happens under a
//! single registry lock, which is what makes the per-room total order the
//! session layer assumes actually hold on this transport. Frames take a
//! real encode/decode round trip through the codec so the wire surface is
//! exercised even in loopback.
//!
//! The hub also models connection drops and scripted reconnect outcomes,
//! which is how the recovery path is driven in tests and the demo.

use crate::authority::ParticipantId;
use crate::transport::{
    Frame, JoinError, RoomEvent, RoomHandle, RoomLink, RoomOptions, RoomTransport,
    TransportError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Name assigned to a relay room.
pub type RoomName = String;

struct Member {
    identity: ParticipantId,
    sender: mpsc::UnboundedSender<RoomEvent>,
    connected: bool,
}

struct Room {
    capacity: usize,
    /// Join order; a reconnected member re-enters at the back.
    members: Vec<Member>,
}

impl Room {
    fn roster(&self) -> Vec<ParticipantId> {
        self.members
            .iter()
            .filter(|m| m.connected)
            .map(|m| m.identity.clone())
            .collect()
    }

    fn connected_count(&self) -> usize {
        self.members.iter().filter(|m| m.connected).count()
    }

    fn member(&self, identity: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.identity == identity)
    }
}

struct HubState {
    rooms: HashMap<RoomName, Room>,
    next_room: u64,
    /// Per-identity count of reconnect requests to swallow before one
    /// succeeds. Used to drive the recovery path deterministically.
    scripted_failures: HashMap<ParticipantId, u32>,
}

/// Registry of loopback rooms.
#[derive(Clone)]
pub struct RelayHub {
    state: Arc<Mutex<HubState>>,
}

impl RelayHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                rooms: HashMap::new(),
                next_room: 0,
                scripted_failures: HashMap::new(),
            })),
        }
    }

    /// Arranges for the next `count` reconnect requests from `identity`
    /// to go unanswered.
    pub fn script_reconnect_failures(&self, identity: &str, count: u32) {
        let mut state = self.state.lock().unwrap();
        state
            .scripted_failures
            .insert(identity.to_string(), count);
    }

    /// Severs a member's connection.
    ///
    /// The member observes [`RoomEvent::Disconnected`]; everyone else in
    /// the room observes [`RoomEvent::ParticipantLeft`]. The member keeps
    /// its slot so a later reconnect can re-admit it.
    #[instrument(skip(self))]
    pub fn drop_connection(&self, room_name: &str, identity: &str) {
        let mut state = self.state.lock().unwrap();
        let Some(room) = state.rooms.get_mut(room_name) else {
            return;
        };

        let Some(member) = room
            .members
            .iter_mut()
            .find(|m| m.identity == identity && m.connected)
        else {
            return;
        };
        member.connected = false;
        let _ = member.sender.send(RoomEvent::Disconnected);

        info!(room = room_name, identity, "connection dropped");
        for other in room.members.iter().filter(|m| m.connected) {
            let _ = other.sender.send(RoomEvent::ParticipantLeft {
                identity: identity.to_string(),
            });
        }
    }

    /// Returns the name of every room with at least one connected member.
    pub fn active_rooms(&self) -> Vec<RoomName> {
        let state = self.state.lock().unwrap();
        state
            .rooms
            .iter()
            .filter(|(_, room)| room.connected_count() > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn admit(
        state: &mut HubState,
        room_name: &str,
        identity: &ParticipantId,
    ) -> Result<mpsc::UnboundedReceiver<RoomEvent>, JoinError> {
        let room = state
            .rooms
            .get_mut(room_name)
            .ok_or(JoinError::NoOpenRoom)?;

        if room.member(identity).is_some() {
            return Err(JoinError::AlreadyJoined);
        }
        if room.connected_count() >= room.capacity {
            return Err(JoinError::RoomFull);
        }

        let (sender, events) = mpsc::unbounded_channel();
        room.members.push(Member {
            identity: identity.clone(),
            sender,
            connected: true,
        });

        let roster = room.roster();
        let joiner = room
            .members
            .last()
            .expect("member just pushed");
        let _ = joiner.sender.send(RoomEvent::Joined { roster });

        for other in room.members.iter().filter(|m| m.connected) {
            if other.identity != *identity {
                let _ = other.sender.send(RoomEvent::ParticipantJoined {
                    identity: identity.clone(),
                });
            }
        }

        Ok(events)
    }

    fn link(&self, room_name: RoomName, identity: ParticipantId) -> Arc<RelayRoom> {
        Arc::new(RelayRoom {
            state: self.state.clone(),
            room_name,
            identity,
        })
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomTransport for RelayHub {
    #[instrument(skip(self))]
    async fn join_room(&self, identity: &ParticipantId) -> Result<RoomLink, JoinError> {
        let mut state = self.state.lock().unwrap();

        let open = state
            .rooms
            .iter()
            .filter(|(_, room)| {
                room.connected_count() > 0 && room.connected_count() < room.capacity
            })
            .map(|(name, _)| name.clone())
            .min();
        let Some(room_name) = open else {
            debug!(%identity, "no open room");
            return Err(JoinError::NoOpenRoom);
        };

        let events = Self::admit(&mut state, &room_name, identity)?;
        info!(%identity, room = %room_name, "joined open room");
        drop(state);

        Ok(RoomLink {
            handle: self.link(room_name, identity.clone()),
            events,
        })
    }

    #[instrument(skip(self))]
    async fn create_room(
        &self,
        identity: &ParticipantId,
        options: RoomOptions,
    ) -> Result<RoomLink, JoinError> {
        let mut state = self.state.lock().unwrap();

        let room_name = format!("room-{}", state.next_room);
        state.next_room += 1;
        state.rooms.insert(
            room_name.clone(),
            Room {
                capacity: options.capacity,
                members: Vec::new(),
            },
        );

        let events = Self::admit(&mut state, &room_name, identity)?;
        info!(%identity, room = %room_name, "created room");
        drop(state);

        Ok(RoomLink {
            handle: self.link(room_name, identity.clone()),
            events,
        })
    }
}

/// One member's link into a relay room.
pub struct RelayRoom {
    state: Arc<Mutex<HubState>>,
    room_name: RoomName,
    identity: ParticipantId,
}

impl RelayRoom {
    /// The room this link belongs to.
    pub fn room_name(&self) -> &str {
        &self.room_name
    }
}

#[async_trait]
impl RoomHandle for RelayRoom {
    /// Encodes the frame, then delivers it to every connected member -
    /// sender included - under one registry lock, in join order.
    async fn broadcast(&self, frame: Frame) -> Result<(), TransportError> {
        let encoded =
            serde_json::to_string(&frame).map_err(|_| TransportError::LinkClosed)?;

        let state = self.state.lock().unwrap();
        let room = state
            .rooms
            .get(&self.room_name)
            .ok_or(TransportError::LinkClosed)?;

        let sender_connected = room
            .member(&self.identity)
            .map(|m| m.connected)
            .unwrap_or(false);
        if !sender_connected {
            return Err(TransportError::LinkClosed);
        }

        for member in room.members.iter().filter(|m| m.connected) {
            match serde_json::from_str::<Frame>(&encoded) {
                Ok(decoded) => {
                    let _ = member.sender.send(RoomEvent::Delivery { frame: decoded });
                }
                Err(err) => {
                    warn!(%err, "undecodable frame dropped");
                }
            }
        }
        Ok(())
    }

    async fn request_reconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();

        if let Some(remaining) = state.scripted_failures.get_mut(&self.identity) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!(identity = %self.identity, remaining, "reconnect request swallowed");
                return Ok(());
            }
        }

        let Some(room) = state.rooms.get_mut(&self.room_name) else {
            return Err(TransportError::LinkClosed);
        };
        let Some(position) = room
            .members
            .iter()
            .position(|m| m.identity == self.identity && !m.connected)
        else {
            // Already connected or long gone; nothing to do.
            return Ok(());
        };

        // Re-admit at the back: the rejoiner takes the junior slot in join
        // order, matching what the remaining member observed.
        let mut member = room.members.remove(position);
        member.connected = true;
        let sender = member.sender.clone();
        let identity = member.identity.clone();
        room.members.push(member);

        let roster = room.roster();
        let _ = sender.send(RoomEvent::Reconnected);
        let _ = sender.send(RoomEvent::Joined { roster });

        info!(%identity, room = %self.room_name, "reconnected");
        for other in room.members.iter().filter(|m| m.connected) {
            if other.identity != identity {
                let _ = other.sender.send(RoomEvent::ParticipantJoined {
                    identity: identity.clone(),
                });
            }
        }
        Ok(())
    }

    async fn leave(&self) {
        let mut state = self.state.lock().unwrap();
        let Some(room) = state.rooms.get_mut(&self.room_name) else {
            return;
        };

        room.members.retain(|m| m.identity != self.identity);
        info!(identity = %self.identity, room = %self.room_name, "left room");

        for other in room.members.iter().filter(|m| m.connected) {
            let _ = other.sender.send(RoomEvent::ParticipantLeft {
                identity: self.identity.clone(),
            });
        }

        if room.members.is_empty() {
            state.rooms.remove(&self.room_name);
            debug!(room = %self.room_name, "room torn down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Mark, Tile};
    use crate::transport::join_or_create;

    async fn drain_until<F>(events: &mut mpsc::UnboundedReceiver<RoomEvent>, pred: F) -> RoomEvent
    where
        F: Fn(&RoomEvent) -> bool,
    {
        loop {
            let event = events.recv().await.expect("event stream open");
            if pred(&event) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn join_falls_back_to_creating_a_room() {
        let hub = RelayHub::new();
        let link = join_or_create(&hub, &"alice".to_string(), RoomOptions::default())
            .await
            .expect("create fallback");

        assert_eq!(hub.active_rooms().len(), 1);
        drop(link);
    }

    #[tokio::test]
    async fn second_joiner_lands_in_the_open_room() {
        let hub = RelayHub::new();
        let mut alice = join_or_create(&hub, &"alice".to_string(), RoomOptions::default())
            .await
            .expect("create");
        let bob = join_or_create(&hub, &"bob".to_string(), RoomOptions::default())
            .await
            .expect("join open room");

        assert_eq!(hub.active_rooms().len(), 1);

        let event = drain_until(&mut alice.events, |e| {
            matches!(e, RoomEvent::ParticipantJoined { .. })
        })
        .await;
        assert_eq!(
            event,
            RoomEvent::ParticipantJoined {
                identity: "bob".to_string()
            }
        );
        drop(bob);
    }

    #[tokio::test]
    async fn room_at_capacity_is_not_joinable() {
        let hub = RelayHub::new();
        let _alice = join_or_create(&hub, &"alice".to_string(), RoomOptions::default())
            .await
            .expect("create");
        let _bob = join_or_create(&hub, &"bob".to_string(), RoomOptions::default())
            .await
            .expect("join");

        // Third participant finds no slot and falls back to a new room.
        let _carol = join_or_create(&hub, &"carol".to_string(), RoomOptions::default())
            .await
            .expect("fallback room");
        assert_eq!(hub.active_rooms().len(), 2);
    }

    #[tokio::test]
    async fn broadcast_reaches_sender_and_peer_in_order() {
        let hub = RelayHub::new();
        let mut alice = join_or_create(&hub, &"alice".to_string(), RoomOptions::default())
            .await
            .expect("create");
        let mut bob = join_or_create(&hub, &"bob".to_string(), RoomOptions::default())
            .await
            .expect("join");

        let first = Frame::Move {
            tile: Tile::Center,
            mark: Mark::X,
        };
        let second = Frame::Move {
            tile: Tile::TopLeft,
            mark: Mark::O,
        };
        alice.handle.broadcast(first).await.expect("broadcast");
        bob.handle.broadcast(second).await.expect("broadcast");

        for events in [&mut alice.events, &mut bob.events] {
            let a = drain_until(events, |e| matches!(e, RoomEvent::Delivery { .. })).await;
            let b = drain_until(events, |e| matches!(e, RoomEvent::Delivery { .. })).await;
            assert_eq!(a, RoomEvent::Delivery { frame: first });
            assert_eq!(b, RoomEvent::Delivery { frame: second });
        }
    }

    #[tokio::test]
    async fn dropped_member_appears_left_to_the_peer() {
        let hub = RelayHub::new();
        let mut alice = join_or_create(&hub, &"alice".to_string(), RoomOptions::default())
            .await
            .expect("create");
        let mut bob = join_or_create(&hub, &"bob".to_string(), RoomOptions::default())
            .await
            .expect("join");

        let room = hub.active_rooms().pop().expect("one room");
        hub.drop_connection(&room, "bob");

        let to_bob = drain_until(&mut bob.events, |e| {
            matches!(e, RoomEvent::Disconnected)
        })
        .await;
        assert_eq!(to_bob, RoomEvent::Disconnected);

        let to_alice = drain_until(&mut alice.events, |e| {
            matches!(e, RoomEvent::ParticipantLeft { .. })
        })
        .await;
        assert_eq!(
            to_alice,
            RoomEvent::ParticipantLeft {
                identity: "bob".to_string()
            }
        );
    }

    #[tokio::test]
    async fn reconnect_re_admits_at_the_back_of_join_order() {
        let hub = RelayHub::new();
        let _alice = join_or_create(&hub, &"alice".to_string(), RoomOptions::default())
            .await
            .expect("create");
        let mut bob = join_or_create(&hub, &"bob".to_string(), RoomOptions::default())
            .await
            .expect("join");

        let room = hub.active_rooms().pop().expect("one room");
        hub.drop_connection(&room, "alice");

        // Alice reconnects through her original handle.
        let alice_handle = hub.link(room.clone(), "alice".to_string());
        alice_handle
            .request_reconnect()
            .await
            .expect("reconnect succeeds");

        let event = drain_until(&mut bob.events, |e| {
            matches!(e, RoomEvent::ParticipantJoined { .. })
        })
        .await;
        assert_eq!(
            event,
            RoomEvent::ParticipantJoined {
                identity: "alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn scripted_failures_swallow_reconnect_requests() {
        let hub = RelayHub::new();
        let mut alice = join_or_create(&hub, &"alice".to_string(), RoomOptions::default())
            .await
            .expect("create");
        let room = hub.active_rooms().pop().expect("one room");

        hub.script_reconnect_failures("alice", 2);
        hub.drop_connection(&room, "alice");
        drain_until(&mut alice.events, |e| matches!(e, RoomEvent::Disconnected)).await;

        alice.handle.request_reconnect().await.expect("request ok");
        alice.handle.request_reconnect().await.expect("request ok");
        assert!(alice.events.try_recv().is_err(), "no ack while scripted");

        alice.handle.request_reconnect().await.expect("request ok");
        let event = drain_until(&mut alice.events, |e| {
            matches!(e, RoomEvent::Reconnected)
        })
        .await;
        assert_eq!(event, RoomEvent::Reconnected);
    }
}

use super::error::LobbyError;
use super::registry::{ConnectionId, ConnectionRegistry};
use super::room::{Room, Seat};
use super::room_code::RoomCode;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Result of seating a guest in an existing room
#[derive(Debug, PartialEq, Eq)]
pub struct JoinedRoom {
    pub code: RoomCode,
    pub seat: Seat,
    /// Occupant who was already waiting in the room.
    pub host: Option<ConnectionId>,
}

/// Result of a connection leaving its room
#[derive(Debug, PartialEq, Eq)]
pub struct DepartedRoom {
    pub code: RoomCode,
    /// The other occupant, who loses the room too.
    pub remaining: Option<ConnectionId>,
}

/// All open rooms, keyed by code.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomCode, Room>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn get(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &RoomCode) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Opens a room with the requester alone in seat 1.
    pub fn create_room(
        &mut self,
        registry: &mut ConnectionRegistry,
        requester: ConnectionId,
    ) -> (RoomCode, Seat) {
        let code = self.unused_code();
        let identity = registry.register(requester);
        let room = Room::new(code.clone(), requester, identity);

        registry.associate(requester, code.clone());
        self.rooms.insert(code.clone(), room);
        info!(%code, connection = %requester, "Room created");
        (code, Seat::One)
    }

    /// Opens a full room for two matched connections, mode preset.
    pub fn create_paired_room(
        &mut self,
        registry: &mut ConnectionRegistry,
        first: ConnectionId,
        second: ConnectionId,
        mode: &str,
    ) -> RoomCode {
        let code = self.unused_code();
        let host = (first, registry.register(first));
        let guest = (second, registry.register(second));
        let room = Room::paired(code.clone(), host, guest, mode);

        registry.associate(first, code.clone());
        registry.associate(second, code.clone());
        self.rooms.insert(code.clone(), room);
        info!(%code, %first, %second, "Paired room created");
        code
    }

    pub fn join_room(
        &mut self,
        registry: &mut ConnectionRegistry,
        code: &RoomCode,
        requester: ConnectionId,
    ) -> Result<JoinedRoom, LobbyError> {
        let room = self.rooms.get_mut(code).ok_or(LobbyError::RoomNotFound)?;
        if room.is_full() {
            return Err(LobbyError::RoomFull);
        }

        let identity = registry.register(requester);
        let seat = room.seat(requester, identity)?;
        let host = room.opponent_of(requester);
        registry.associate(requester, code.clone());

        info!(%code, connection = %requester, seat = seat.number(), "Room joined");
        Ok(JoinedRoom {
            code: code.clone(),
            seat,
            host,
        })
    }

    /// Deletes the connection's room outright. No-op when it has none.
    pub fn leave_room(
        &mut self,
        registry: &mut ConnectionRegistry,
        connection: ConnectionId,
    ) -> Option<DepartedRoom> {
        let code = registry.lookup_room(connection)?.clone();
        registry.disassociate(connection);

        let room = self.rooms.remove(&code)?;
        let remaining = room.opponent_of(connection);
        if let Some(other) = remaining {
            registry.disassociate(other);
        }

        info!(%code, connection = %connection, "Room closed");
        Some(DepartedRoom { code, remaining })
    }

    pub fn get_room_mut(
        &mut self,
        registry: &ConnectionRegistry,
        connection: ConnectionId,
    ) -> Option<&mut Room> {
        let code = registry.lookup_room(connection)?;
        self.rooms.get_mut(code)
    }

    /// Removes rooms with no activity for `max_idle`, disassociating their occupants.
    pub fn expire_idle(
        &mut self,
        registry: &mut ConnectionRegistry,
        now: Instant,
        max_idle: Duration,
    ) -> Vec<Room> {
        let stale: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|room| now.saturating_duration_since(room.last_activity()) >= max_idle)
            .map(|room| room.code().clone())
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for code in stale {
            let Some(room) = self.rooms.remove(&code) else {
                continue;
            };
            for connection in room.connections() {
                registry.disassociate(connection);
            }
            debug!(%code, "Room expired");
            expired.push(room);
        }
        expired
    }

    fn unused_code(&self) -> RoomCode {
        RoomCode::generate_unique(|code| self.contains(code))
    }
}

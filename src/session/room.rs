use super::error::LobbyError;
use super::registry::{ConnectionId, PlayerIdentity};
use super::room_code::RoomCode;
use std::collections::HashMap;
use std::time::Instant;

pub const MAX_OCCUPANTS: usize = 2;

/// Position of a participant within a room. Exposed to clients as `playerId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    pub fn number(self) -> u8 {
        match self {
            Seat::One => 1,
            Seat::Two => 2,
        }
    }

    pub fn other(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }
}

/// Session state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoomState {
    Uninitialized,
    Negotiating,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub connection: ConnectionId,
    pub identity: PlayerIdentity,
    pub seat: Seat,
}

/// Result of recording an ability pick
#[derive(Debug, PartialEq, Eq)]
pub struct AbilityOutcome {
    /// The other occupant, if seated, to be told a pick was made.
    pub opponent: Option<ConnectionId>,
    /// True only on the pick that completes both selections.
    pub ready: bool,
}

/// A two-seat session container (pure logic, no I/O)
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    occupants: Vec<Occupant>,
    mode: Option<String>,
    abilities: HashMap<PlayerIdentity, String>,
    state: RoomState,
    last_activity: Instant,
}

impl Room {
    /// New room with the host in seat 1.
    pub fn new(code: RoomCode, host: ConnectionId, identity: PlayerIdentity) -> Self {
        Self {
            code,
            occupants: vec![Occupant {
                connection: host,
                identity,
                seat: Seat::One,
            }],
            mode: None,
            abilities: HashMap::new(),
            state: RoomState::Uninitialized,
            last_activity: Instant::now(),
        }
    }

    /// Room for a matched pair: both seats taken, mode preset.
    pub fn paired(
        code: RoomCode,
        host: (ConnectionId, PlayerIdentity),
        guest: (ConnectionId, PlayerIdentity),
        mode: impl Into<String>,
    ) -> Self {
        let mut room = Self::new(code, host.0, host.1);
        room.occupants.push(Occupant {
            connection: guest.0,
            identity: guest.1,
            seat: Seat::Two,
        });
        room.mode = Some(mode.into());
        room.state = RoomState::Negotiating;
        room
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn connections(&self) -> Vec<ConnectionId> {
        self.occupants.iter().map(|o| o.connection).collect()
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= MAX_OCCUPANTS
    }

    pub fn occupant(&self, connection: ConnectionId) -> Option<&Occupant> {
        self.occupants.iter().find(|o| o.connection == connection)
    }

    pub fn opponent_of(&self, connection: ConnectionId) -> Option<ConnectionId> {
        self.occupants
            .iter()
            .find(|o| o.connection != connection)
            .map(|o| o.connection)
    }

    pub fn occupant_in(&self, seat: Seat) -> Option<&Occupant> {
        self.occupants.iter().find(|o| o.seat == seat)
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Seats a second participant. The first occupant always holds seat 1.
    pub fn seat(
        &mut self,
        connection: ConnectionId,
        identity: PlayerIdentity,
    ) -> Result<Seat, LobbyError> {
        if self.is_full() {
            return Err(LobbyError::RoomFull);
        }

        let seat = match self.occupants.first() {
            None => Seat::One,
            Some(first) => first.seat.other(),
        };
        self.occupants.push(Occupant {
            connection,
            identity,
            seat,
        });

        if self.is_full() {
            self.advance(RoomState::Negotiating);
        }
        self.touch();
        Ok(seat)
    }

    /// Sets the mode. Last write wins until the session starts.
    pub fn select_mode(&mut self, mode: impl Into<String>) -> Result<(), LobbyError> {
        if self.state == RoomState::Active {
            return Err(LobbyError::AlreadyStarted);
        }
        self.mode = Some(mode.into());
        self.touch();
        Ok(())
    }

    /// Records an ability pick for a seated participant.
    ///
    /// Returns `None` when the connection is not seated here.
    pub fn select_ability(
        &mut self,
        connection: ConnectionId,
        ability: impl Into<String>,
    ) -> Result<Option<AbilityOutcome>, LobbyError> {
        if self.state == RoomState::Active {
            return Err(LobbyError::AlreadyStarted);
        }
        let Some(occupant) = self.occupant(connection).copied() else {
            return Ok(None);
        };

        let before = self.abilities.len();
        self.abilities.insert(occupant.identity, ability.into());
        let after = self.abilities.len();
        self.touch();

        Ok(Some(AbilityOutcome {
            opponent: self.opponent_of(connection),
            ready: before < MAX_OCCUPANTS && after >= MAX_OCCUPANTS,
        }))
    }

    #[cfg(test)]
    fn ability_of(&self, identity: PlayerIdentity) -> Option<&str> {
        self.abilities.get(&identity).map(String::as_str)
    }

    /// Moves a negotiating room to active. Returns the mode the session runs in.
    pub fn start(&mut self) -> Result<String, LobbyError> {
        match self.state {
            RoomState::Active => return Err(LobbyError::AlreadyStarted),
            RoomState::Uninitialized => return Err(LobbyError::WaitingForOpponent),
            RoomState::Negotiating => {}
        }
        let mode = self.mode.clone().ok_or(LobbyError::ModeNotSelected)?;
        self.advance(RoomState::Active);
        self.touch();
        Ok(mode)
    }

    fn advance(&mut self, next: RoomState) {
        if next > self.state {
            self.state = next;
        }
    }
}

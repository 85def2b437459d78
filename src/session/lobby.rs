use super::directory::RoomDirectory;
use super::error::LobbyError;
use super::messages::ServerMessage;
use super::queue::MatchQueue;
use super::registry::{ConnectionId, ConnectionRegistry};
use super::room::{RoomState, Seat};
use super::room_code::RoomCode;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Mode quick-play rooms start with.
pub const DEFAULT_MODE: &str = "competitive";

/// An event addressed to one connection
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: ConnectionId,
    pub message: ServerMessage,
}

/// Everything a lobby operation wants the outside world to do.
#[derive(Debug, Default)]
pub struct Effects {
    pub outbound: Vec<Outbound>,
    /// Room that just became active.
    pub started: Option<RoomCode>,
    /// Rooms that no longer exist.
    pub closed: Vec<RoomCode>,
}

impl Effects {
    fn send(&mut self, to: ConnectionId, message: ServerMessage) {
        self.outbound.push(Outbound { to, message });
    }

    fn send_all(&mut self, to: &[ConnectionId], message: ServerMessage) {
        for conn in to {
            self.send(*conn, message.clone());
        }
    }

    fn fail(&mut self, to: ConnectionId, error: LobbyError) {
        if error.is_reported() {
            self.send(to, ServerMessage::error(error));
        } else {
            debug!(connection = %to, %error, "Ignoring request");
        }
    }

    /// Messages addressed to one connection, in delivery order.
    pub fn messages_for(&self, conn: ConnectionId) -> Vec<&ServerMessage> {
        self.outbound
            .iter()
            .filter(|o| o.to == conn)
            .map(|o| &o.message)
            .collect()
    }
}

/// A connection's place in a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSeat {
    pub code: RoomCode,
    pub seat: Seat,
    pub connections: Vec<ConnectionId>,
}

/// Names and mode of a finished session, as stored on the leaderboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub winner: String,
    pub loser: String,
    pub mode: String,
}

/// Limits applied by the sweeper. `None` disables a limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpiryLimits {
    pub room_idle: Option<Duration>,
    pub queue_wait: Option<Duration>,
}

/// Connection registry, room directory and quick-play queue as one unit.
///
/// Callers hold it behind a single lock; every method runs to completion and
/// reports what should be sent instead of sending it.
#[derive(Debug, Default)]
pub struct Lobby {
    registry: ConnectionRegistry,
    directory: RoomDirectory,
    queue: MatchQueue,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }

    pub fn connect(&mut self, conn: ConnectionId) {
        self.registry.connect(conn);
    }

    /// Leaves any room and the queue, then forgets the connection.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Effects {
        if !self.registry.is_live(conn) {
            return Effects::default();
        }
        let mut effects = self.leave_room(conn);
        self.queue.cancel(conn);
        self.registry.disconnect(conn);
        info!(connection = %conn, "Connection cleaned up");
        effects.outbound.retain(|o| o.to != conn);
        effects
    }

    pub fn set_display_name(&mut self, conn: ConnectionId, name: Option<String>) {
        if let Some(name) = name {
            self.registry.set_display_name(conn, name);
        }
    }

    pub fn create_room(&mut self, conn: ConnectionId) -> Effects {
        let mut effects = self.release(conn);

        let (code, seat) = self.directory.create_room(&mut self.registry, conn);
        effects.send(
            conn,
            ServerMessage::RoomCreated {
                code: code.to_string(),
                player_id: seat.number(),
            },
        );
        effects
    }

    pub fn join_room(&mut self, conn: ConnectionId, code: &str) -> Effects {
        let code = RoomCode::parse(code);
        if self.registry.lookup_room(conn) == Some(&code) {
            debug!(%code, connection = %conn, "Already in this room");
            return Effects::default();
        }

        // Validate first so a failed join keeps the current room
        let verdict = match self.directory.get(&code) {
            None => Err(LobbyError::RoomNotFound),
            Some(room) if room.is_full() => Err(LobbyError::RoomFull),
            Some(_) => Ok(()),
        };
        if let Err(error) = verdict {
            debug!(%code, connection = %conn, %error, "Join rejected");
            let mut effects = Effects::default();
            effects.fail(conn, error);
            return effects;
        }

        let mut effects = self.release(conn);
        match self.directory.join_room(&mut self.registry, &code, conn) {
            Ok(joined) => {
                effects.send(
                    conn,
                    ServerMessage::RoomJoined {
                        code: joined.code.to_string(),
                        player_id: joined.seat.number(),
                    },
                );
                if let Some(host) = joined.host {
                    effects.send(host, ServerMessage::OpponentJoined);
                }
            }
            Err(error) => effects.fail(conn, error),
        }
        effects
    }

    pub fn leave_room(&mut self, conn: ConnectionId) -> Effects {
        let mut effects = Effects::default();
        let Some(departed) = self.directory.leave_room(&mut self.registry, conn) else {
            return effects;
        };
        if let Some(remaining) = departed.remaining {
            effects.send(remaining, ServerMessage::OpponentLeft);
        }
        effects.closed.push(departed.code);
        effects
    }

    /// Queues the connection and pairs the two oldest waiters if possible.
    pub fn quick_play(&mut self, conn: ConnectionId) -> Effects {
        let mut effects = Effects::default();
        if let Some(code) = self.registry.lookup_room(conn) {
            debug!(%code, connection = %conn, "Already seated, ignoring quick play");
            return effects;
        }

        if !self.queue.enqueue(conn) {
            debug!(connection = %conn, "Already queued");
        }
        effects.send(conn, ServerMessage::QuickSearching);

        if let Some((first, second)) = self.queue.take_pair() {
            let code = self
                .directory
                .create_paired_room(&mut self.registry, first, second, DEFAULT_MODE);
            info!(%code, %first, %second, "Quick play matched");

            for (to, seat) in [(first, Seat::One), (second, Seat::Two)] {
                effects.send(
                    to,
                    ServerMessage::QuickMatched {
                        code: code.to_string(),
                        player_id: seat.number(),
                    },
                );
            }
        }
        effects
    }

    pub fn cancel_quick_play(&mut self, conn: ConnectionId) -> Effects {
        if self.queue.cancel(conn) {
            debug!(connection = %conn, "Left quick play queue");
        }
        Effects::default()
    }

    pub fn select_mode(&mut self, conn: ConnectionId, mode: String) -> Effects {
        let mut effects = Effects::default();
        let Some(room) = self.directory.get_room_mut(&self.registry, conn) else {
            return effects;
        };

        match room.select_mode(mode.clone()) {
            Ok(()) => effects.send_all(&room.connections(), ServerMessage::ModeSelected { mode }),
            Err(error) => effects.fail(conn, error),
        }
        effects
    }

    pub fn select_ability(&mut self, conn: ConnectionId, ability: String) -> Effects {
        let mut effects = Effects::default();
        let Some(room) = self.directory.get_room_mut(&self.registry, conn) else {
            return effects;
        };

        match room.select_ability(conn, ability) {
            Ok(Some(outcome)) => {
                if let Some(opponent) = outcome.opponent {
                    effects.send(opponent, ServerMessage::OpponentAbilitySelected);
                }
                if outcome.ready {
                    debug!(code = %room.code(), "Both abilities selected");
                    effects.send_all(&room.connections(), ServerMessage::AbilitiesReady);
                }
            }
            Ok(None) => {}
            Err(error) => effects.fail(conn, error),
        }
        effects
    }

    pub fn start_game(&mut self, conn: ConnectionId) -> Effects {
        let mut effects = Effects::default();
        let Some(room) = self.directory.get_room_mut(&self.registry, conn) else {
            return effects;
        };

        match room.start() {
            Ok(mode) => {
                info!(code = %room.code(), mode = %mode, "Session started");
                effects.send_all(&room.connections(), ServerMessage::GameStarted { mode });
                effects.started = Some(room.code().clone());
            }
            Err(error) => effects.fail(conn, error),
        }
        effects
    }

    /// The connection's seat if it is in an active room. Counts as room activity.
    pub fn active_seat(&mut self, conn: ConnectionId) -> Option<ActiveSeat> {
        let room = self.directory.get_room_mut(&self.registry, conn)?;
        if room.state() != RoomState::Active {
            return None;
        }
        room.touch();
        let seat = room.occupant(conn)?.seat;
        Some(ActiveSeat {
            code: room.code().clone(),
            seat,
            connections: room.connections(),
        })
    }

    /// Leaderboard entry for a room whose session was won by `winner`.
    pub fn match_record(&self, code: &RoomCode, winner: Seat) -> Option<MatchRecord> {
        let room = self.directory.get(code)?;
        let name_of = |seat: Seat| {
            let occupant = room.occupant_in(seat)?;
            self.registry
                .display_name(occupant.connection)
                .or_else(|| Some(occupant.identity.to_string()))
        };
        Some(MatchRecord {
            winner: name_of(winner)?,
            loser: name_of(winner.other())?,
            mode: room.mode().unwrap_or(DEFAULT_MODE).to_string(),
        })
    }

    /// Expires idle rooms and stale queue entries.
    pub fn sweep(&mut self, now: Instant, limits: ExpiryLimits) -> Effects {
        let mut effects = Effects::default();

        if let Some(max_idle) = limits.room_idle {
            for room in self.directory.expire_idle(&mut self.registry, now, max_idle) {
                info!(code = %room.code(), "Idle room expired");
                effects.send_all(&room.connections(), ServerMessage::error("Room expired"));
                effects.closed.push(room.code().clone());
            }
        }

        if let Some(max_wait) = limits.queue_wait {
            for conn in self.queue.expire(now, max_wait) {
                info!(connection = %conn, "Quick play wait expired");
                effects.send(conn, ServerMessage::error("No opponent found"));
            }
        }
        effects
    }

    /// Drops the connection's current room and queue slot before it takes a new seat.
    fn release(&mut self, conn: ConnectionId) -> Effects {
        self.queue.cancel(conn);
        self.leave_room(conn)
    }
}

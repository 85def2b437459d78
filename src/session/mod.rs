//! Rooms, quick-play matchmaking and session negotiation for two-player games.

mod directory;
mod error;
mod lobby;
pub mod messages;
mod queue;
mod registry;
mod room;
mod room_code;
mod router;
pub mod simulation;
mod sweeper;
mod ws;

pub use directory::{DepartedRoom, JoinedRoom, RoomDirectory};
pub use error::LobbyError;
pub use lobby::{ActiveSeat, DEFAULT_MODE, Effects, ExpiryLimits, Lobby, MatchRecord, Outbound};
pub use queue::MatchQueue;
pub use registry::{ConnectionId, ConnectionRegistry, PlayerIdentity};
pub use room::{AbilityOutcome, MAX_OCCUPANTS, Occupant, Room, RoomState, Seat};
pub use room_code::{CODE_LENGTH, RoomCode};
pub use router::SessionHub;
pub use sweeper::spawn_sweeper;
pub use ws::{ConnectionHandler, run_connection};

//! Seam between the session core and whatever runs the actual game.
//!
//! The core only relays: it hands player actions to a [`Simulation`] and
//! broadcasts whatever state the simulation returns.

use super::room::Seat;
use super::room_code::RoomCode;
use serde::Serialize;

/// A player action forwarded from the client
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    Input(serde_json::Value),
    Dash,
    Ability,
}

/// What the simulation wants broadcast after an action
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationUpdate {
    pub state: serde_json::Value,
    /// Set once the session has a winner.
    pub winner: Option<Seat>,
}

pub trait Simulation: Send + Sync + 'static {
    /// Called when a room becomes active. Returns the initial state to broadcast.
    fn start(&self, room: &RoomCode) -> Option<serde_json::Value>;

    /// Applies one action. `None` means nothing to broadcast.
    fn apply(&self, room: &RoomCode, seat: Seat, action: PlayerAction) -> Option<SimulationUpdate>;

    /// Called when a room is destroyed.
    fn end(&self, room: &RoomCode);
}

const ARENA_WIDTH: f32 = 800.0;
const ARENA_HEIGHT: f32 = 600.0;
const SPAWN_INSET: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Actor {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub score: u32,
}

impl Actor {
    fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            score: 0,
        }
    }
}

/// Starting layout: both actors at rest, facing each other across the arena
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialState {
    pub players: [Actor; 2],
}

impl Default for InitialState {
    fn default() -> Self {
        let mid = ARENA_HEIGHT / 2.0;
        Self {
            players: [
                Actor::at(SPAWN_INSET, mid),
                Actor::at(ARENA_WIDTH - SPAWN_INSET, mid),
            ],
        }
    }
}

/// Placeholder until a real engine is plugged in: announces the starting
/// layout and otherwise stays silent.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubSimulation;

impl Simulation for StubSimulation {
    fn start(&self, _room: &RoomCode) -> Option<serde_json::Value> {
        serde_json::to_value(InitialState::default()).ok()
    }

    fn apply(&self, _room: &RoomCode, _seat: Seat, _action: PlayerAction) -> Option<SimulationUpdate> {
        None
    }

    fn end(&self, _room: &RoomCode) {}
}

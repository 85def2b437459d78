/// Errors from room and negotiation operations.
///
/// The `Display` text is what the client sees in an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Select a mode first")]
    ModeNotSelected,

    #[error("Waiting for an opponent")]
    WaitingForOpponent,

    /// The room is already active; negotiation can no longer change it.
    #[error("Session already started")]
    AlreadyStarted,
}

impl LobbyError {
    /// Whether the requesting client should be told about this error.
    pub fn is_reported(&self) -> bool {
        !matches!(self, Self::AlreadyStarted)
    }
}

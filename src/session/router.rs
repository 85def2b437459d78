use super::lobby::{Effects, ExpiryLimits, Lobby};
use super::messages::{ClientMessage, ServerMessage};
use super::registry::ConnectionId;
use super::room_code::RoomCode;
use super::simulation::{PlayerAction, Simulation};
use super::ws::ConnectionHandler;
use crate::leaderboard::LeaderboardRepository;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Shared state behind every WebSocket: the lobby, outbound channels, and the
/// collaborators the lobby reports to.
pub struct SessionHub {
    lobby: Mutex<Lobby>,
    channels: DashMap<ConnectionId, broadcast::Sender<ServerMessage>>,
    simulation: Arc<dyn Simulation>,
    leaderboard: Option<LeaderboardRepository>,
}

impl SessionHub {
    pub fn new(simulation: Arc<dyn Simulation>, leaderboard: Option<LeaderboardRepository>) -> Self {
        Self {
            lobby: Mutex::new(Lobby::new()),
            channels: DashMap::new(),
            simulation,
            leaderboard,
        }
    }

    fn lobby(&self) -> MutexGuard<'_, Lobby> {
        self.lobby.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of open rooms
    pub fn room_count(&self) -> usize {
        self.lobby().directory().len()
    }

    /// Number of connections waiting for quick play
    pub fn queue_len(&self) -> usize {
        self.lobby().queue().len()
    }

    /// Runs one expiry pass and delivers the resulting notices.
    pub fn sweep(&self, limits: ExpiryLimits) {
        let mut lobby = self.lobby();
        let effects = lobby.sweep(Instant::now(), limits);
        self.commit(lobby, effects);
    }

    /// Best-effort delivery; a closed channel just means the peer is gone.
    fn deliver(&self, to: ConnectionId, message: ServerMessage) {
        let Some(tx) = self.channels.get(&to) else {
            debug!(connection = %to, "No channel for recipient");
            return;
        };
        let _ = tx.send(message);
    }

    fn broadcast(&self, to: &[ConnectionId], message: ServerMessage) {
        for conn in to {
            self.deliver(*conn, message.clone());
        }
    }

    /// Delivers outbound messages while the lobby is still locked, so clients
    /// see events in the order the lobby applied them. Simulation hooks run
    /// after the lock is released.
    fn commit(&self, lobby: MutexGuard<'_, Lobby>, effects: Effects) {
        for outbound in effects.outbound {
            self.deliver(outbound.to, outbound.message);
        }
        let started = effects
            .started
            .and_then(|code| lobby.directory().get(&code).map(|room| (code, room.connections())));
        drop(lobby);

        for code in &effects.closed {
            self.simulation.end(code);
        }
        if let Some((code, connections)) = started {
            self.start_simulation(&code, &connections);
        }
    }

    fn start_simulation(&self, code: &RoomCode, connections: &[ConnectionId]) {
        let Some(state) = self.simulation.start(code) else {
            return;
        };
        self.broadcast(connections, ServerMessage::StateUpdate { state });
    }

    fn dispatch(&self, conn: ConnectionId, msg: ClientMessage) {
        let mut lobby = self.lobby();
        let effects = match msg {
            ClientMessage::CreateRoom { name } => {
                lobby.set_display_name(conn, name);
                lobby.create_room(conn)
            }
            ClientMessage::JoinRoom { code, name } => {
                lobby.set_display_name(conn, name);
                lobby.join_room(conn, &code)
            }
            ClientMessage::LeaveRoom => lobby.leave_room(conn),
            ClientMessage::QuickPlay { name } => {
                lobby.set_display_name(conn, name);
                lobby.quick_play(conn)
            }
            ClientMessage::CancelQuickPlay => lobby.cancel_quick_play(conn),
            ClientMessage::SelectMode { mode } => lobby.select_mode(conn, mode),
            ClientMessage::SelectAbility { ability } => lobby.select_ability(conn, ability),
            ClientMessage::StartGame => lobby.start_game(conn),
            ClientMessage::Input { .. }
            | ClientMessage::Dash
            | ClientMessage::Ability
            | ClientMessage::Unknown => return,
        };
        self.commit(lobby, effects);
    }

    async fn forward_action(&self, conn: ConnectionId, action: PlayerAction) {
        let Some(seat) = self.lobby().active_seat(conn) else {
            debug!(connection = %conn, "Action outside an active session, ignoring");
            return;
        };
        let Some(update) = self.simulation.apply(&seat.code, seat.seat, action) else {
            return;
        };

        self.broadcast(&seat.connections, ServerMessage::StateUpdate { state: update.state });

        let Some(winner) = update.winner else {
            return;
        };
        info!(code = %seat.code, winner = winner.number(), "Session finished");

        let record = self.lobby().match_record(&seat.code, winner);
        if let (Some(record), Some(leaderboard)) = (record, &self.leaderboard)
            && let Err(err) = leaderboard
                .record_match(&record.winner, &record.loser, &record.mode)
                .await
        {
            error!(code = %seat.code, error = %err, "Failed to record match result");
        }

        self.broadcast(
            &seat.connections,
            ServerMessage::GameOver {
                winner: winner.number(),
            },
        );
    }
}

impl ConnectionHandler for SessionHub {
    fn handle_connect(&self, conn: ConnectionId, tx: broadcast::Sender<ServerMessage>) {
        self.channels.insert(conn, tx);
        self.lobby().connect(conn);
    }

    async fn handle_message(self: Arc<Self>, conn: ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::Input { keys } => {
                self.forward_action(conn, PlayerAction::Input(keys)).await;
            }
            ClientMessage::Dash => self.forward_action(conn, PlayerAction::Dash).await,
            ClientMessage::Ability => self.forward_action(conn, PlayerAction::Ability).await,
            ClientMessage::Unknown => {
                debug!(connection = %conn, "Unknown message type, ignoring");
            }
            other => self.dispatch(conn, other),
        }
    }

    fn handle_disconnect(&self, conn: ConnectionId) {
        let mut lobby = self.lobby();
        let effects = lobby.disconnect(conn);
        self.channels.remove(&conn);
        self.commit(lobby, effects);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::room::Seat;
    use crate::session::simulation::{SimulationUpdate, StubSimulation};
    use std::collections::HashMap;

    struct Client {
        conn: ConnectionId,
        rx: broadcast::Receiver<ServerMessage>,
    }

    impl Client {
        fn connect(hub: &SessionHub) -> Self {
            let conn = ConnectionId::new();
            let (tx, rx) = broadcast::channel(16);
            hub.handle_connect(conn, tx);
            Self { conn, rx }
        }

        fn drain(&mut self) -> Vec<ServerMessage> {
            std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
        }
    }

    /// Whoever dashes first wins
    struct FirstDashWins;

    impl Simulation for FirstDashWins {
        fn start(&self, _room: &RoomCode) -> Option<serde_json::Value> {
            None
        }

        fn apply(&self, _room: &RoomCode, seat: Seat, action: PlayerAction) -> Option<SimulationUpdate> {
            (action == PlayerAction::Dash).then(|| SimulationUpdate {
                state: serde_json::json!({ "dashed": seat.number() }),
                winner: Some(seat),
            })
        }

        fn end(&self, _room: &RoomCode) {}
    }

    fn hub() -> Arc<SessionHub> {
        Arc::new(SessionHub::new(Arc::new(StubSimulation), None))
    }

    async fn active_pair(hub: &Arc<SessionHub>) -> (Client, Client) {
        let mut x = Client::connect(hub);
        let mut y = Client::connect(hub);
        hub.clone().handle_message(x.conn, ClientMessage::QuickPlay { name: None }).await;
        hub.clone().handle_message(y.conn, ClientMessage::QuickPlay { name: None }).await;
        hub.clone().handle_message(x.conn, ClientMessage::StartGame).await;
        x.drain();
        y.drain();
        (x, y)
    }

    #[tokio::test]
    async fn start_broadcasts_initial_state_after_game_started() {
        let hub = hub();
        let mut x = Client::connect(&hub);
        let mut y = Client::connect(&hub);
        hub.clone().handle_message(x.conn, ClientMessage::QuickPlay { name: None }).await;
        hub.clone().handle_message(y.conn, ClientMessage::QuickPlay { name: None }).await;
        x.drain();
        y.drain();

        hub.clone().handle_message(y.conn, ClientMessage::StartGame).await;

        for client in [&mut x, &mut y] {
            let received = client.drain();
            assert_eq!(
                received[0],
                ServerMessage::GameStarted {
                    mode: "competitive".to_string()
                }
            );
            assert!(matches!(received[1], ServerMessage::StateUpdate { .. }));
        }
    }

    #[tokio::test]
    async fn unknown_messages_produce_nothing() {
        let hub = hub();
        let mut x = Client::connect(&hub);

        hub.clone().handle_message(x.conn, ClientMessage::Unknown).await;
        hub.clone().handle_message(x.conn, ClientMessage::Dash).await;

        assert!(x.drain().is_empty());
    }

    #[tokio::test]
    async fn stub_simulation_swallows_input() {
        let hub = hub();
        let (mut x, mut y) = active_pair(&hub).await;

        let keys = serde_json::json!({ "up": true });
        hub.clone().handle_message(x.conn, ClientMessage::Input { keys }).await;

        assert!(x.drain().is_empty());
        assert!(y.drain().is_empty());
    }

    #[tokio::test]
    async fn winning_action_broadcasts_state_then_game_over() {
        let hub = Arc::new(SessionHub::new(Arc::new(FirstDashWins), None));
        let (mut x, mut y) = active_pair(&hub).await;

        hub.clone().handle_message(y.conn, ClientMessage::Dash).await;

        for client in [&mut x, &mut y] {
            assert_eq!(
                client.drain(),
                vec![
                    ServerMessage::StateUpdate {
                        state: serde_json::json!({ "dashed": 2 })
                    },
                    ServerMessage::GameOver { winner: 2 },
                ]
            );
        }
    }

    fn created_code(client: &mut Client) -> String {
        match client.drain().as_slice() {
            [ServerMessage::RoomCreated { code, .. }] => code.clone(),
            other => panic!("Expected RoomCreated, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_quick_play_pairs_everyone_exactly_once() {
        const PLAYERS: usize = 16;
        let hub = hub();
        let mut clients: Vec<Client> = (0..PLAYERS).map(|_| Client::connect(&hub)).collect();

        let tasks: Vec<_> = clients
            .iter()
            .map(|client| {
                let hub = hub.clone();
                let conn = client.conn;
                tokio::spawn(async move {
                    hub.handle_message(conn, ClientMessage::QuickPlay { name: None }).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut seats: HashMap<String, Vec<u8>> = HashMap::new();
        for client in &mut clients {
            let matches: Vec<_> = client
                .drain()
                .into_iter()
                .filter_map(|msg| match msg {
                    ServerMessage::QuickMatched { code, player_id } => Some((code, player_id)),
                    _ => None,
                })
                .collect();
            assert_eq!(matches.len(), 1, "each player is matched exactly once");
            let (code, player_id) = matches[0].clone();
            seats.entry(code).or_default().push(player_id);
        }

        assert_eq!(seats.len(), PLAYERS / 2);
        for ids in seats.values_mut() {
            ids.sort();
            assert_eq!(ids.as_slice(), [1, 2]);
        }
        assert_eq!(hub.room_count(), PLAYERS / 2);
        assert_eq!(hub.queue_len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_seat_exactly_one_guest() {
        let hub = hub();
        let mut host = Client::connect(&hub);
        hub.clone().handle_message(host.conn, ClientMessage::CreateRoom { name: None }).await;
        let code = created_code(&mut host);

        let mut guests: Vec<Client> = (0..3).map(|_| Client::connect(&hub)).collect();
        let tasks: Vec<_> = guests
            .iter()
            .map(|guest| {
                let hub = hub.clone();
                let conn = guest.conn;
                let code = code.clone();
                tokio::spawn(async move {
                    hub.handle_message(conn, ClientMessage::JoinRoom { code, name: None }).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let replies: Vec<_> = guests.iter_mut().flat_map(|g| g.drain()).collect();
        let joined = replies
            .iter()
            .filter(|msg| matches!(msg, ServerMessage::RoomJoined { player_id: 2, .. }))
            .count();
        let full = replies
            .iter()
            .filter(|msg| **msg == ServerMessage::error("Room is full"))
            .count();
        assert_eq!((joined, full), (1, 2));
        assert_eq!(host.drain(), vec![ServerMessage::OpponentJoined]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_join_and_leave_deliver_in_lobby_order() {
        for _ in 0..200 {
            let hub = hub();
            let mut host = Client::connect(&hub);
            let mut guest = Client::connect(&hub);
            hub.clone().handle_message(host.conn, ClientMessage::CreateRoom { name: None }).await;
            let code = created_code(&mut host);

            let join = tokio::spawn({
                let hub = hub.clone();
                let conn = guest.conn;
                async move {
                    hub.handle_message(conn, ClientMessage::JoinRoom { code, name: None }).await;
                }
            });
            let leave = tokio::spawn({
                let hub = hub.clone();
                let conn = host.conn;
                async move {
                    hub.handle_message(conn, ClientMessage::LeaveRoom).await;
                }
            });
            join.await.unwrap();
            leave.await.unwrap();

            let received = guest.drain();
            match received.as_slice() {
                [ServerMessage::RoomJoined { .. }, ServerMessage::OpponentLeft] => {}
                [ServerMessage::Error { .. }] => {}
                other => panic!("Out of order delivery: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn disconnect_notifies_opponent_and_clears_state() {
        let hub = hub();
        let (x, mut y) = active_pair(&hub).await;

        hub.handle_disconnect(x.conn);

        assert_eq!(y.drain(), vec![ServerMessage::OpponentLeft]);
        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.queue_len(), 0);
    }
}

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tandem::config::Config;
use tandem::messages::{ClientMessage, ServerMessage};
use tandem::session::simulation::{Simulation, StubSimulation};
use tokio::net::TcpListener;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

pub struct TestServer {
    base_url: String,
}

impl TestServer {
    pub fn ws_url(&self) -> String {
        format!("{}/ws", self.base_url)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!(
            "http://{}{}",
            self.base_url.strip_prefix("ws://").unwrap(),
            path
        )
    }
}

pub async fn memory_pool() -> SqlitePool {
    // One connection, otherwise every pooled connection sees its own empty database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

pub async fn spawn_test_server() -> TestServer {
    spawn_test_server_with(Config::default(), Arc::new(StubSimulation)).await
}

pub async fn spawn_test_server_with(config: Config, simulation: Arc<dyn Simulation>) -> TestServer {
    let pool = memory_pool().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = tandem::app_with_simulation(pool, &config, simulation);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("ws://{}", addr),
    }
}

pub async fn connect(server: &TestServer) -> WsStream {
    let (ws, _) = connect_async(&server.ws_url()).await.expect("Failed to connect");
    ws
}

fn encode(msg: &ClientMessage) -> Message {
    let json = serde_json::to_string(msg).unwrap();
    Message::Text(json.into())
}

pub fn create_room_msg() -> Message {
    encode(&ClientMessage::CreateRoom { name: None })
}

pub fn join_room_msg(code: &str) -> Message {
    encode(&ClientMessage::JoinRoom {
        code: code.to_string(),
        name: None,
    })
}

pub fn leave_room_msg() -> Message {
    encode(&ClientMessage::LeaveRoom)
}

pub fn quick_play_msg() -> Message {
    encode(&ClientMessage::QuickPlay { name: None })
}

pub fn named_quick_play_msg(name: &str) -> Message {
    encode(&ClientMessage::QuickPlay {
        name: Some(name.to_string()),
    })
}

pub fn cancel_quick_play_msg() -> Message {
    encode(&ClientMessage::CancelQuickPlay)
}

pub fn select_mode_msg(mode: &str) -> Message {
    encode(&ClientMessage::SelectMode {
        mode: mode.to_string(),
    })
}

pub fn select_ability_msg(ability: &str) -> Message {
    encode(&ClientMessage::SelectAbility {
        ability: ability.to_string(),
    })
}

pub fn start_game_msg() -> Message {
    encode(&ClientMessage::StartGame)
}

pub fn dash_msg() -> Message {
    encode(&ClientMessage::Dash)
}

pub fn raw_msg(text: &str) -> Message {
    Message::Text(text.to_string().into())
}

pub async fn recv(ws: &mut WsStream) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("Timed out waiting for a server message")
            .expect("Connection closed")
            .unwrap();
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

/// Fails if the server sends anything within a short window.
pub async fn assert_silent(ws: &mut WsStream) {
    if let Ok(Some(Ok(msg))) = tokio::time::timeout(QUIET_PERIOD, ws.next()).await {
        panic!("Expected no message, got {:?}", msg);
    }
}

/// Creates a room from `host` and returns its code.
pub async fn create_room(host: &mut WsStream) -> String {
    host.send(create_room_msg()).await.unwrap();
    match recv(host).await {
        ServerMessage::RoomCreated { code, player_id: 1 } => code,
        other => panic!("Expected RoomCreated, got {:?}", other),
    }
}

/// Host creates a room, guest joins it. Returns the code with both sides drained.
pub async fn seat_pair(host: &mut WsStream, guest: &mut WsStream) -> String {
    let code = create_room(host).await;
    guest.send(join_room_msg(&code)).await.unwrap();
    assert!(matches!(recv(guest).await, ServerMessage::RoomJoined { player_id: 2, .. }));
    assert_eq!(recv(host).await, ServerMessage::OpponentJoined);
    code
}

/// Pairs two connections through quick play, returning the shared code.
pub async fn quick_pair(first: &mut WsStream, second: &mut WsStream) -> String {
    first.send(quick_play_msg()).await.unwrap();
    assert_eq!(recv(first).await, ServerMessage::QuickSearching);
    second.send(quick_play_msg()).await.unwrap();
    assert_eq!(recv(second).await, ServerMessage::QuickSearching);

    let ServerMessage::QuickMatched { code, player_id: 1 } = recv(first).await else {
        panic!("Expected QuickMatched for seat 1");
    };
    assert_eq!(
        recv(second).await,
        ServerMessage::QuickMatched {
            code: code.clone(),
            player_id: 2
        }
    );
    code
}

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use inkpad_server::{
    app, auth,
    config::Config,
    db::{MemoryStore, Store},
    AppState,
};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    addr: std::net::SocketAddr,
    state: AppState,
}

impl Server {
    async fn start() -> Self {
        let state = AppState::new(Arc::new(MemoryStore::new()), Config::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self { addr, state }
    }

    fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    /// Register and log in, returning the user id and bearer token
    async fn login(&self, name: &str) -> (String, String) {
        let email = format!("{}@example.com", name);
        let user = auth::register(self.store(), &email, name, "correct horse".into())
            .await
            .unwrap();
        let grant = auth::login(
            self.store(),
            &email,
            "correct horse".into(),
            chrono::Duration::hours(1),
        )
        .await
        .unwrap();
        (user.id.to_string(), grant.token)
    }

    async fn connect(&self, token: &str) -> Socket {
        let url = format!("ws://{}/ws?token={}", self.addr, token);
        connect_async(url).await.unwrap().0
    }
}

async fn send(socket: &mut Socket, frame: Value) {
    socket.send(Message::text(frame.to_string())).await.unwrap();
}

async fn recv(socket: &mut Socket) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("frame expected")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_upgrade_requires_token() {
    let server = Server::start().await;
    let url = format!("ws://{}/ws", server.addr);
    assert!(connect_async(url).await.is_err());
    let url = format!("ws://{}/ws?token=bogus", server.addr);
    assert!(connect_async(url).await.is_err());
}

#[tokio::test]
async fn test_relay_between_two_sockets() {
    let server = Server::start().await;
    let (alice_id, alice_token) = server.login("alice").await;
    let (_, bob_token) = server.login("bob").await;

    let alice = auth::authenticate(server.store(), &alice_token).await.unwrap().0;
    let bob = auth::authenticate(server.store(), &bob_token).await.unwrap().0;
    let nb = server
        .state
        .notebooks
        .create(&alice.identity(), "Ideas", None)
        .await
        .unwrap();
    server
        .state
        .notebooks
        .invite(nb.id, &alice.identity(), &bob.email, None)
        .await
        .unwrap();
    server.state.notebooks.accept(nb.id, &bob.identity()).await.unwrap();

    let mut a = server.connect(&alice_token).await;
    let mut b = server.connect(&bob_token).await;
    let join = json!({"event": "join-notebook", "notebookId": nb.id});
    send(&mut a, join.clone()).await;
    assert_eq!(recv(&mut a).await["event"], "joined");
    send(&mut b, join).await;
    assert_eq!(recv(&mut b).await["access"], "write");

    send(
        &mut a,
        json!({"event": "update-note", "notebookId": nb.id, "content": "hello"}),
    )
    .await;
    let got = recv(&mut b).await;
    assert_eq!(got["event"], "note-updated");
    assert_eq!(got["content"], "hello");
    assert_eq!(got["from"], alice_id);

    // malformed frames get an error reply on the same socket
    a.send(Message::text("{nope")).await.unwrap();
    assert_eq!(recv(&mut a).await["event"], "error");

    // closing a socket releases its room membership
    b.close(None).await.unwrap();
    drop(b);
    a.close(None).await.unwrap();
    drop(a);
    let mut rooms = usize::MAX;
    for _ in 0..50 {
        rooms = server.state.rooms.room_count().await;
        if rooms == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(rooms, 0);
}

#[tokio::test]
async fn test_stranger_join_is_refused_over_socket() {
    let server = Server::start().await;
    let (_, alice_token) = server.login("alice").await;
    let (_, eve_token) = server.login("eve").await;
    let alice = auth::authenticate(server.store(), &alice_token).await.unwrap().0;
    let nb = server
        .state
        .notebooks
        .create(&alice.identity(), "Ideas", None)
        .await
        .unwrap();

    let mut e = server.connect(&eve_token).await;
    send(&mut e, json!({"event": "join-notebook", "notebookId": nb.id})).await;
    assert_eq!(recv(&mut e).await["event"], "error");
    assert_eq!(server.state.rooms.room_count().await, 0);
}

//! End-to-end relay tests over real TCP sockets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use chat_relay::client::ClientOutcome;
use chat_relay::events::Notification;
use chat_relay::server::ConsoleOutcome;
use chat_relay::{
    ChatClient, ChatEvent, ChatServer, ClientConfig, ClientEvent, ConnectionRegistry, Error,
    EventSink, ServerConfig, ServerConsole, SessionProtocol,
};

const WAIT: Duration = Duration::from_secs(5);

struct Relay {
    server: Arc<ChatServer<SessionProtocol>>,
    console: ServerConsole<SessionProtocol>,
    events: mpsc::UnboundedReceiver<Notification>,
    addr: SocketAddr,
}

async fn relay() -> Relay {
    relay_with(ServerConfig::with_port(0).host("127.0.0.1")).await
}

async fn relay_with(config: ServerConfig) -> Relay {
    let sink = Arc::new(EventSink::new());
    let (_, events) = sink.subscribe_channel();
    let protocol = SessionProtocol::new(Arc::new(ConnectionRegistry::new()), sink);
    let router = protocol.router().clone();
    let server = Arc::new(ChatServer::new(config, protocol));

    server.start().await.unwrap();
    let addr = server.local_addr().await.unwrap();
    let console = ServerConsole::new(Arc::clone(&server), router);

    Relay {
        server,
        console,
        events,
        addr,
    }
}

struct Peer {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn connect(addr: SocketAddr) -> Self {
        let (read, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn login(addr: SocketAddr, login_id: &str) -> Self {
        let mut peer = Self::connect(addr).await;
        peer.send(&format!("#login {}", login_id)).await;
        assert_eq!(
            peer.recv().await.as_deref(),
            Some(format!("Login working! Welcome {}!", login_id).as_str())
        );
        peer
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Next line, or `None` once the server has closed the socket
    async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap_or(None)
    }
}

async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<Notification>,
    pred: impl Fn(&ChatEvent) -> bool,
) -> Notification {
    loop {
        let notification = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event sink dropped");
        if pred(&notification.event) {
            return notification;
        }
    }
}

#[tokio::test]
async fn test_chat_is_relayed_to_everyone() {
    let relay = relay().await;

    let mut alice = Peer::login(relay.addr, "alice").await;
    let mut bob = Peer::login(relay.addr, "bob").await;

    alice.send("hi bob").await;
    assert_eq!(alice.recv().await.as_deref(), Some("alice> hi bob"));
    assert_eq!(bob.recv().await.as_deref(), Some("alice> hi bob"));

    bob.send("").await;
    assert_eq!(alice.recv().await.as_deref(), Some("bob> "));
    assert_eq!(bob.recv().await.as_deref(), Some("bob> "));
}

#[tokio::test]
async fn test_chat_before_login_is_refused_and_closed() {
    let mut relay = relay().await;
    let mut watcher = Peer::login(relay.addr, "watcher").await;

    let mut anon = Peer::connect(relay.addr).await;
    anon.send("hello?").await;

    assert_eq!(
        anon.recv().await.as_deref(),
        Some("Error: Must login with first command which is #login <loginId>!!!")
    );
    assert_eq!(anon.recv().await, None);

    wait_for(&mut relay.events, |e| {
        matches!(e, ChatEvent::ClientDisconnected { login_id: None, .. })
    })
    .await;

    // Nothing reached the other participant
    watcher.send("still here").await;
    assert_eq!(watcher.recv().await.as_deref(), Some("watcher> still here"));
}

#[tokio::test]
async fn test_login_rules() {
    let relay = relay().await;

    let mut peer = Peer::connect(relay.addr).await;
    peer.send("#login").await;
    assert_eq!(
        peer.recv().await.as_deref(),
        Some("Error: CMD Usage is #login <loginId>")
    );

    peer.send("#login carol").await;
    assert_eq!(peer.recv().await.as_deref(), Some("Login working! Welcome carol!"));

    peer.send("#login mallory").await;
    assert_eq!(
        peer.recv().await.as_deref(),
        Some("Error: Already logged in as carol")
    );

    peer.send("ok").await;
    assert_eq!(peer.recv().await.as_deref(), Some("carol> ok"));
}

#[tokio::test]
async fn test_operator_broadcast_and_close() {
    let mut relay = relay().await;
    let mut alice = Peer::login(relay.addr, "alice").await;
    let mut anon = Peer::connect(relay.addr).await;

    wait_for(&mut relay.events, |e| {
        matches!(e, ChatEvent::ClientConnected { connection_id: 2, .. })
    })
    .await;

    assert_eq!(
        relay.console.handle_line("maintenance soon").await,
        ConsoleOutcome::Display("SERVER msg> maintenance soon".into())
    );
    assert_eq!(alice.recv().await.as_deref(), Some("SERVER msg> maintenance soon"));
    assert_eq!(anon.recv().await.as_deref(), Some("SERVER msg> maintenance soon"));

    assert_eq!(relay.console.handle_line("#close").await, ConsoleOutcome::Silent);
    assert!(!relay.server.is_listening().await);
    assert_eq!(alice.recv().await, None);
    assert_eq!(anon.recv().await, None);

    let closed = wait_for(&mut relay.events, |e| *e == ChatEvent::ServerClosed).await;
    assert_eq!(closed.line, "Server closed, all clients disconnected.");
}

#[tokio::test]
async fn test_stop_keeps_existing_clients() {
    let relay = relay().await;
    let mut alice = Peer::login(relay.addr, "alice").await;

    assert_eq!(relay.console.handle_line("#stop").await, ConsoleOutcome::Silent);
    assert!(TcpStream::connect(relay.addr).await.is_err());

    alice.send("anyone?").await;
    assert_eq!(alice.recv().await.as_deref(), Some("alice> anyone?"));

    assert_eq!(
        relay.console.handle_line("#stop").await,
        ConsoleOutcome::Display("Already stopped.".into())
    );
}

#[tokio::test]
async fn test_connection_limit() {
    let mut relay = relay_with(
        ServerConfig::with_port(0)
            .host("127.0.0.1")
            .max_connections(1),
    )
    .await;

    let alice = Peer::login(relay.addr, "alice").await;

    // Over the limit: closed at accept time, no events
    let mut refused = Peer::connect(relay.addr).await;
    assert_eq!(refused.recv().await, None);
    assert_eq!(relay.server.status().await.total_connections, 1);

    drop(alice);
    wait_for(&mut relay.events, |e| {
        matches!(e, ChatEvent::ClientDisconnected { connection_id: 1, .. })
    })
    .await;

    // The slot frees once the first connection's task has finished
    let mut admitted = None;
    for _ in 0..50 {
        let mut peer = Peer::connect(relay.addr).await;
        // A refused attempt may already be reset
        let _ = peer.writer.write_all(b"#login bob\n").await;
        if peer.recv().await.as_deref() == Some("Login working! Welcome bob!") {
            admitted = Some(peer);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(admitted.is_some());

    // The refused socket never got a connection id
    let connected = wait_for(&mut relay.events, |e| {
        matches!(e, ChatEvent::ClientConnected { .. })
    })
    .await;
    assert!(matches!(
        connected.event,
        ChatEvent::ClientConnected { connection_id: 2, .. }
    ));
}

#[tokio::test]
async fn test_chat_client_end_to_end() {
    let relay = relay().await;
    let mut bob = Peer::login(relay.addr, "bob").await;

    let config = ClientConfig::new("alice")
        .host("127.0.0.1")
        .port(relay.addr.port());
    let (mut client, mut events) = ChatClient::new(config);

    client.connect().await.unwrap();
    assert_eq!(events.recv().await, Some(ClientEvent::Connected));
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Message("Login working! Welcome alice!".into()))
    );

    assert_eq!(client.handle_input("hello").await, ClientOutcome::Silent);
    assert_eq!(bob.recv().await.as_deref(), Some("alice> hello"));
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Message("alice> hello".into()))
    );

    assert!(matches!(client.connect().await, Err(Error::AlreadyConnected)));
    assert_eq!(
        client.handle_input("#login").await,
        ClientOutcome::Display("Already connected.".into())
    );
    assert_eq!(
        client.handle_input("#sethost example.org").await,
        ClientOutcome::Display("Error: must log off first.".into())
    );

    assert_eq!(
        client.handle_input("#logoff").await,
        ClientOutcome::Display("Logged off.".into())
    );
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Disconnected)
    );
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_chat_client_sees_server_close() {
    let relay = relay().await;

    let config = ClientConfig::new("alice")
        .host("127.0.0.1")
        .port(relay.addr.port());
    let (mut client, mut events) = ChatClient::new(config);
    client.connect().await.unwrap();

    assert_eq!(events.recv().await, Some(ClientEvent::Connected));
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Message("Login working! Welcome alice!".into()))
    );

    relay.server.close().await.unwrap();
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap(),
        Some(ClientEvent::Closed)
    );

    // Lines typed after the server went away are not silently dropped
    assert!(!client.is_connected());
    assert_eq!(
        client.handle_input("hello").await,
        ClientOutcome::Terminate("Could not send message to server.  Terminating client.".into())
    );
    assert_eq!(
        client.handle_input("#logoff").await,
        ClientOutcome::Display("Already logged off.".into())
    );
}

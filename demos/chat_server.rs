//! Chat relay server with an operator console
//!
//! Run with: cargo run --example chat_server [PORT]
//!
//! Examples:
//!   cargo run --example chat_server          # listens on 0.0.0.0:5555
//!   cargo run --example chat_server 6000     # listens on 0.0.0.0:6000
//!
//! ## Operator console
//!
//! Type a line to broadcast it to every client as `SERVER msg> <text>`.
//!
//! Commands:
//!   #quit            close the server and exit
//!   #stop            stop accepting new clients
//!   #close           stop and disconnect every client
//!   #setport <port>  change the port (only while closed)
//!   #start           start listening again
//!   #getport         show the port
//!   #status          show connection and relay counters
//!
//! Connect with the bundled client or with any line-based tool:
//!   cargo run --example chat_client alice
//!   nc localhost 5555

use std::sync::Arc;

use tokio::io::BufReader;

use chat_relay::protocol::constants::DEFAULT_PORT;
use chat_relay::{
    ChatServer, ConnectionRegistry, EventSink, ServerConfig, ServerConsole, SessionProtocol,
};

/// Parse the port argument, falling back to the default.
fn parse_port(arg: Option<&String>) -> u16 {
    match arg.map(|a| a.parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(_)) => {
            eprintln!("Invalid port, using {}", DEFAULT_PORT);
            DEFAULT_PORT
        }
        None => DEFAULT_PORT,
    }
}

fn print_usage() {
    eprintln!("Usage: chat_server [PORT]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  PORT    Port to listen on (default: {})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let port = parse_port(args.get(1));

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=debug".parse()?)
                .add_directive("chat_server=debug".parse()?),
        )
        .init();

    let events = Arc::new(EventSink::new());
    // Operator display
    let (_, mut notifications) = events.subscribe_channel();
    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            println!("> {}", notification.line);
        }
    });

    let protocol = SessionProtocol::new(Arc::new(ConnectionRegistry::new()), Arc::clone(&events));
    let router = protocol.router().clone();
    let server = Arc::new(ChatServer::new(ServerConfig::with_port(port), protocol));

    if server.start().await.is_err() {
        println!("> ERROR - Could not listen for clients!");
    }

    let console = ServerConsole::new(Arc::clone(&server), router);
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = console.run(stdin, tokio::io::stdout()) => {
            if let Err(e) = result {
                eprintln!("Console error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            server.close().await?;
        }
    }

    Ok(())
}

//! Interactive chat client
//!
//! Run with: cargo run --example chat_client <LOGIN_ID> [HOST] [PORT]
//!
//! Examples:
//!   cargo run --example chat_client alice                  # localhost:5555
//!   cargo run --example chat_client bob 10.0.0.2 6000
//!
//! Lines typed are sent to the server. Commands:
//!   #quit             disconnect and exit
//!   #logoff           disconnect but keep the console open
//!   #sethost <host>   change the host (only while logged off)
//!   #setport <port>   change the port (only while logged off)
//!   #login            connect again
//!   #gethost          show the host
//!   #getport          show the port

use tokio::io::{AsyncBufReadExt, BufReader};

use chat_relay::client::ClientOutcome;
use chat_relay::{ChatClient, ClientConfig, ClientEvent};

fn print_usage() {
    eprintln!("Usage: chat_client <LOGIN_ID> [HOST] [PORT]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  LOGIN_ID    Identifier sent with #login");
    eprintln!("  HOST        Server host (default: localhost)");
    eprintln!("  PORT        Server port (default: 5555)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let Some(login_id) = args.get(1) else {
        eprintln!("ERROR - No login ID specified.  Connection aborted.");
        eprintln!();
        print_usage();
        std::process::exit(1);
    };

    let mut config = ClientConfig::new(login_id.as_str());
    if let Some(host) = args.get(2) {
        config = config.host(host.as_str());
    }
    if let Some(port) = args.get(3) {
        match port.parse::<u16>() {
            Ok(port) => config = config.port(port),
            Err(_) => eprintln!("Invalid port, using {}", config.port),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=info".parse()?)
                .add_directive("chat_client=debug".parse()?),
        )
        .init();

    let (mut client, mut events) = ChatClient::new(config);

    if let Err(e) = client.connect().await {
        println!("Error: Can't setup connection! Terminating client. ({})", e);
        std::process::exit(1);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::Message(line)) => println!("{}", line),
                Some(ClientEvent::Closed) => {
                    println!("Connection closed. Exiting client.");
                    break;
                }
                Some(ClientEvent::Error(e)) => {
                    println!("Connection error: {}. Exiting client.", e);
                    break;
                }
                Some(ClientEvent::Connected | ClientEvent::Disconnected) => {}
                None => break,
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                match client.handle_input(&line).await {
                    ClientOutcome::Display(text) => println!("> {}", text),
                    ClientOutcome::Silent => {}
                    ClientOutcome::Terminate(text) => {
                        println!("> {}", text);
                        break;
                    }
                    ClientOutcome::Quit => break,
                }
            }
        }
    }

    Ok(())
}

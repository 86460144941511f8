//! CLI for lastsub
//!
//! Subcommands:
//! - `server`: run the WebSocket backend (latest-value store plus announcements)
//! - `publish`: publish a timestamped message on a topic at a fixed interval
//! - `subscribe`: print every fresh value of a topic until interrupted

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lastsub::broker::{Engine, Message, PubSubEngine};
use lastsub::config::{Settings, load_config};
use lastsub::persistence::Store;
use lastsub::server::{ServerState, start_websocket_server};
use lastsub::transport::WsConnector;
use lastsub::utils::logging;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "lastsub")]
enum Command {
    /// Start the WebSocket backend
    Server,
    /// Publish `msg <n>` on a topic every interval
    Publish {
        #[arg(long, default_value = "my-channel")]
        topic: String,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many messages
        #[arg(long)]
        count: Option<u64>,
        /// Backend URL (defaults to engine.backend_url)
        #[arg(long, env = "LASTSUB_URL")]
        url: Option<String>,
    },
    /// Print the latest and all subsequent values of a topic
    Subscribe {
        #[arg(long, default_value = "my-channel")]
        topic: String,
        /// Backend URL (defaults to engine.backend_url)
        #[arg(long, env = "LASTSUB_URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Invalid configuration: {e}");
            return;
        }
    };
    logging::init(&settings.log.level);

    let result = match cmd {
        Command::Server => run_server(&settings).await,
        Command::Publish {
            topic,
            interval_ms,
            count,
            url,
        } => run_publisher(&settings, url, &topic, interval_ms, count).await,
        Command::Subscribe { topic, url } => run_subscriber(&settings, url, &topic).await,
    };

    if let Err(e) = result {
        error!("{e}");
    }
}

async fn run_server(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let store = Store::open(&settings.server.db_path)?;
    let state = Arc::new(ServerState::new(store.clone()));

    tokio::select! {
        res = start_websocket_server(&addr, state) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    store.flush()?;
    Ok(())
}

async fn connect(settings: &Settings, url: Option<String>) -> Result<Engine, Box<dyn std::error::Error>> {
    let url = url.unwrap_or_else(|| settings.engine.backend_url.clone());
    let engine = Engine::connect(&WsConnector::new(url), settings.engine.publish_mode).await?;
    Ok(engine)
}

async fn run_publisher(
    settings: &Settings,
    url: Option<String>,
    topic: &str,
    interval_ms: u64,
    count: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = connect(settings, url).await?;
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let mut n: u64 = 0;

    loop {
        if count.is_some_and(|limit| n >= limit) {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        n += 1;
        let message = Message::now(format!("msg {n}"));
        let timestamp = message.timestamp;
        match engine.publish(topic, message).await {
            Ok(()) => info!("Published msg {n} on '{topic}' at {timestamp}"),
            Err(e) => warn!("Publish on '{topic}' failed: {e}"),
        }
    }

    Ok(())
}

async fn run_subscriber(
    settings: &Settings,
    url: Option<String>,
    topic: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = connect(settings, url).await?;
    let mut stream = engine.stream(topic);
    info!("Subscribed to '{topic}'");

    loop {
        tokio::select! {
            next = stream.recv() => match next {
                Some(message) => println!("{} {}", message.timestamp, display_payload(&message)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn display_payload(message: &Message) -> String {
    match &message.payload {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

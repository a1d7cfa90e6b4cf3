use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::BridgeManager;
use infrastructure::messaging::offline_will;
use infrastructure::{BridgeConfig, MqttClient};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override MQTT Host
    #[arg(long)]
    mqtt_host: Option<String>,

    /// Override MQTT Port
    #[arg(long)]
    mqtt_port: Option<u16>,
}

impl Args {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.mqtt_host {
            config.mqtt.host = host.clone();
        }
        if let Some(port) = self.mqtt_port {
            config.mqtt.port = port;
        }
    }
}

async fn run() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,projector_bridge=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("📽️ Epson projector bridge starting...");
    info!("🆔 Process ID: {}", std::process::id());

    let args = Args::parse();

    // 1. Load Configuration
    info!(config_dir = %args.config_dir, "Loading configuration...");
    let mut config = BridgeConfig::load(&args.config_dir)
        .with_context(|| format!("Failed to load configuration from {}", args.config_dir))?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        projectors = config.projectors.len(),
        base_topic = %config.mqtt.base_topic,
        discovery = config.mqtt.discovery_prefix.is_some(),
        "✅ Configuration loaded"
    );

    // 2. Connect MQTT with a retained `offline` last will
    let status_topic = config.mqtt.status_topic();
    info!(host = %config.mqtt.host, port = %config.mqtt.port, "Connecting to MQTT Broker...");
    let mqtt_client = MqttClient::new(&config.mqtt, Some(offline_will(&status_topic))).await?;

    // 3. Start one bridge per projector plus the command listener
    let manager = Arc::new(BridgeManager::new(
        config.mqtt.clone(),
        Arc::new(mqtt_client.clone()),
        Arc::new(mqtt_client.clone()),
    ));
    let started = manager.start_all(config.projectors.clone()).await?;
    if started < config.projectors.len() {
        warn!(
            started,
            configured = config.projectors.len(),
            "Some projectors failed to start"
        );
    }

    // 4. Publish ONLINE status, and again after every broker reconnect
    if let Err(e) = manager.publish_online().await {
        warn!("Failed to publish ONLINE status: {}", e);
    }
    let watch_cancel = CancellationToken::new();
    let broker_watch = tokio::spawn({
        let manager = manager.clone();
        let connections = mqtt_client.connections();
        let cancel = watch_cancel.clone();
        async move { manager.watch_broker(connections, cancel).await }
    });
    info!(running = ?manager.running().await, "✅ Bridge running");

    // 5. Shutdown Signal
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutting down..."),
        Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
    }

    watch_cancel.cancel();
    let _ = broker_watch.await;
    manager.stop_all().await;

    // Best effort; the last will covers an unclean exit
    let _ = mqtt_client.publish(&status_topic, "offline", true).await;
    let _ = mqtt_client.disconnect().await;

    info!("👋 Good bye!");
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Failed to start the async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run()) {
        eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
        eprintln!("--------------------------------------------------");
        eprintln!("The bridge stopped because of a fatal error.");
        std::process::exit(1);
    }
}

use std::sync::Arc;

use jellypanel_daemon::core::{PanelCore, PanelEvent};
use jellypanel_daemon::jellyfin::JellyfinSource;
use jellypanel_daemon::{http, socket, BroadcastMessage};
use jellypanel_proto::config::Config;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Forwards WARN and ERROR events to socket clients as `Log` broadcasts.
/// Events from the socket module itself are not forwarded; they would be
/// written back into the channel they describe.
struct BroadcastLayer {
    sender: broadcast::Sender<BroadcastMessage>,
}

impl BroadcastLayer {
    fn new(sender: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        if !forwards(metadata.level(), metadata.target()) {
            return;
        }
        let level = metadata.level();

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // No receivers is fine
        let _ = self.sender.send(BroadcastMessage::Log(message));
    }
}

fn forwards(level: &tracing::Level, target: &str) -> bool {
    matches!(*level, tracing::Level::WARN | tracing::Level::ERROR)
        && !target.starts_with("jellypanel_daemon::socket")
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Broadcast channel first so the log layer can use it
    let (broadcast_tx, _) = broadcast::channel::<BroadcastMessage>(100);

    let data_dir = jellypanel_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BroadcastLayer::new(broadcast_tx.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,jellypanel_daemon=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let source = Arc::new(JellyfinSource::new(&config.jellyfin)?);
    info!("Media server: {}", config.jellyfin.base_url());

    // Every timer, fetch result and client command funnels into PanelCore
    let (event_tx, event_rx) = mpsc::channel::<PanelEvent>(256);

    let panel_core = match PanelCore::new(&config, source, broadcast_tx.clone(), event_tx.clone()) {
        Ok(core) => core,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return Err(e);
        }
    };
    let snapshots = panel_core.snapshot_store();

    let _socket_handle = socket::start_server(
        config.http.bind_address.clone(),
        config.daemon.socket_port,
        snapshots.clone(),
        event_tx.clone(),
        broadcast_tx.clone(),
    );

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            snapshots.clone(),
            event_tx.clone(),
            config.panel.title.clone(),
        );
    }

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Ctrl-C received");
        let _ = shutdown_tx.send(PanelEvent::Shutdown).await;
    });

    info!("Daemon initialised, running event loop");
    panel_core.run(event_rx).await?;

    Ok(())
}

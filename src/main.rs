use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use open_music_dispatcher::{
    audio::{lifecycle::spawn_lifecycle_listener, EventBus, SessionRegistry},
    config::Config,
    node::LavalinkNode,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_music_dispatcher=debug".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Music Dispatcher v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let node = LavalinkNode::new(&config)?;

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&node).await;
    }

    let registry = Arc::new(SessionRegistry::new());
    let events = EventBus::new(config.event_bus_capacity);
    let listener = spawn_lifecycle_listener(&events, Arc::clone(&registry));

    info!("🚀 Dispatcher listo, esperando sesiones");

    // Manejar shutdown graceful
    tokio::signal::ctrl_c().await?;
    info!("⚠️ Señal de shutdown recibida, cerrando {} sesiones...", registry.len());

    for guild_id in registry.guild_ids() {
        if let Some(dispatcher) = registry.get(guild_id) {
            if let Err(e) = dispatcher.destroy().await {
                error!("Error al cerrar sesión en guild {}: {:?}", guild_id, e);
            }
        }
    }
    listener.abort();

    Ok(())
}

async fn health_check(node: &LavalinkNode) -> Result<()> {
    match node.version().await {
        Ok(version) => {
            info!("✅ Lavalink {}", version);
            println!("OK");
            Ok(())
        }
        Err(e) => anyhow::bail!("Lavalink no disponible: {}", e),
    }
}

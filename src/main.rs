use std::sync::Arc;

use tracing::info;
use ytaudio::{
    common::{
        banner::{BannerInfo, print_banner},
        logger,
        types::AnyResult,
    },
    configs::{Config, DeliveryMode},
    server::AppState,
    transport,
};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(config.logging.as_ref());

    let resolver = if config.ytdlp.enabled {
        config.ytdlp.program.clone()
    } else {
        format!("innertube ({})", config.youtube.clients.join(", "))
    };
    let transcoder = match config.delivery.mode {
        DeliveryMode::Transcode => format!(
            "{} (mp3 @ {})",
            config.transcoder.program, config.transcoder.bitrate
        ),
        DeliveryMode::Passthrough => "disabled (passthrough)".to_string(),
    };
    print_banner(&BannerInfo::default(), &transcoder, &resolver);

    let listen = config.server.listen;
    let (host, port) = (config.server.host.clone(), config.server.port);

    let state = Arc::new(AppState::from_config(config)?);
    let app = transport::http_server::router(state.clone());

    if !listen {
        info!("server.listen is false; router built, exiting");
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("ytaudio listening on {}", listener.local_addr()?);

    let sessions = state.sessions.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            sessions.shutdown();
        })
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

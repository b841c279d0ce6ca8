//! wagate: HTTP gateway for WhatsApp Web automation sessions.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    clap::Parser,
    tracing::{debug, error, info, warn},
    tracing_subscriber::EnvFilter,
};

use {
    wagate_config::Config,
    wagate_cron::{BirthdayScheduler, TomlFileSource},
    wagate_gateway::{AppState, PngRenderer, build_router, serve},
    wagate_sessions::SessionRegistry,
    wagate_sidecar::{
        MessageCallback, SharedHandle, SidecarClientFactory, SidecarMessage, connect_with_retry,
    },
};

#[derive(Parser, Debug)]
#[command(name = "wagate", about = "HTTP gateway for WhatsApp Web sessions", version)]
struct Args {
    /// Path to the config file.
    #[arg(long, env = "WAGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(long, env = "WAGATE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Background tasks must never take the process down; a panicking task
    // is logged and the rest keeps serving.
    std::panic::set_hook(Box::new(|info| {
        error!(panic = %info, "task panicked");
    }));

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    let bind = args.bind.unwrap_or_else(|| config.http.bind.clone());

    // Sidecar link: shared handle, populated by the maintenance task.
    let sidecar: SharedHandle = Arc::new(tokio::sync::RwLock::new(None));

    let mut factory = SidecarClientFactory::new(Arc::clone(&sidecar))
        .with_request_timeout(Duration::from_secs(config.sidecar.request_timeout_secs));
    if let Some(dir) = &config.sidecar.auth_base_dir {
        factory = factory.with_auth_base_dir(dir.clone());
    }

    let registry = Arc::new(SessionRegistry::new(
        Arc::new(factory),
        Arc::new(PngRenderer::new()),
        config.send.default_country_code.clone(),
    ));

    tokio::spawn(maintain_sidecar_link(
        Arc::clone(&sidecar),
        Arc::clone(&registry),
        config.sidecar.port,
        config.sidecar.connect_retries,
    ));

    if config.birthdays.enabled {
        let scheduler = BirthdayScheduler::new(
            Arc::clone(&registry),
            Arc::new(TomlFileSource::new(config.birthdays.path.clone())),
            &config.birthdays.schedule,
            config.birthdays.timezone,
            config.birthdays.template.clone(),
        )
        .context("invalid birthday schedule")?;
        tokio::spawn(scheduler.run());
    } else {
        info!("birthday scheduler disabled");
    }

    let router = build_router(
        AppState {
            registry: Arc::clone(&registry),
        },
        &config.http.allowed_origins,
    );
    serve(router, &bind).await
}

/// Keep the sidecar link alive for the process lifetime.
///
/// On every (re)connect, existing sessions are re-initialized so they walk
/// the QR/ready cycle again from persisted auth material. Connection loss
/// is logged and retried forever; the HTTP surface stays up throughout.
async fn maintain_sidecar_link(
    sidecar: SharedHandle,
    registry: Arc<SessionRegistry>,
    port: u16,
    connect_retries: u32,
) {
    let callback = lifecycle_callback(Arc::clone(&registry));

    loop {
        match connect_with_retry(port, Arc::clone(&callback), connect_retries).await {
            Ok((handle, disconnect_rx)) => {
                *sidecar.write().await = Some(handle);
                registry.reinitialize_all().await;

                let _ = disconnect_rx.await;
                *sidecar.write().await = None;
                warn!("sidecar link lost, reconnecting");
            },
            Err(e) => {
                error!(error = %e, "sidecar unreachable, retrying in 30s");
                tokio::time::sleep(Duration::from_secs(30)).await;
            },
        }
    }
}

/// Route sidecar lifecycle messages into the registry.
fn lifecycle_callback(registry: Arc<SessionRegistry>) -> MessageCallback {
    Arc::new(move |msg| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            match msg {
                SidecarMessage::Qr { user_id, qr } => {
                    registry.handle_qr(&user_id, &qr).await;
                },
                SidecarMessage::Ready { user_id } => {
                    registry.handle_ready(&user_id).await;
                },
                SidecarMessage::Disconnected { user_id, reason } => {
                    if let Some(reason) = reason {
                        debug!(user_id, reason, "disconnect reason");
                    }
                    registry.handle_disconnected(&user_id).await;
                },
                SidecarMessage::Error { user_id, error } => {
                    warn!(?user_id, error, "sidecar error");
                },
                // Replies are correlated inside the connection layer.
                SidecarMessage::SendResult { .. } | SidecarMessage::ResolveResult { .. } => {},
            }
        });
    })
}

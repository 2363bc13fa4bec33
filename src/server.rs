use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::web::{AppState, ManagementAccess, create_router};
use crate::{AppConfig, ClientRegistry, KindeAuth, KindeAuthConfig, KindeError};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub async fn serve(config: AppConfig) -> Result<(), KindeError> {
    let auth = KindeAuth::new(
        KindeAuthConfig::from_app_config(&config).with_timeout(Duration::from_secs(30)),
    )?;
    let management = ManagementAccess::from_config(&config);
    let state = AppState::new(&config, Arc::new(auth), management);
    let purge = spawn_purge(state.registry().clone());
    let app = create_router(state);

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        address = %listener.local_addr()?,
        site = %config.site_url,
        "kinde starter kit listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge.abort();
    info!("server shutdown complete");
    Ok(())
}

fn spawn_purge(registry: Arc<ClientRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = registry.purge_expired();
            if purged > 0 {
                debug!(purged, remaining = registry.len(), "purged idle clients");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not listen for sigterm");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}

use std::{net::SocketAddr, sync::Arc};

use dispatch::{AuthorizationFlag, Dispatcher, HandlerRegistry, HttpBus};
use server::{build_router, config::load_settings, AppState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();

    let authorization = AuthorizationFlag::global();
    authorization.set(settings.verify_authorized);

    let mut dispatcher = Dispatcher::new(HandlerRegistry::new(), authorization);
    match settings.bus_url()? {
        Some(url) => {
            let bus = HttpBus::new(url, settings.secret.clone(), settings.bus_timeout())?;
            info!(url = %bus.url(), "bus client configured");
            dispatcher = dispatcher.with_bus(Arc::new(bus));
        }
        None => warn!("no bus url configured; send-back is disabled"),
    }

    let state = AppState::new(dispatcher, settings.secret.clone());
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, verify_authorized = settings.verify_authorized, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

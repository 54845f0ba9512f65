//! HTTP endpoint used by the browser extension
//!
//! - `POST /api/asian-media/add`: run the add form and store the entry
//! - `POST /api/asian-media/check`: look a page's titles up in the catalog
//!
//! The endpoint binds to localhost and has no authentication.

pub mod api;
pub mod routes;

pub use api::{AddRequest, AddResponse, CheckRequest, CheckResponse};
pub use routes::{create_router, ADD_PATH, CHECK_PATH};

use crate::context::AppContext;
use std::future::Future;
use tokio::net::TcpListener;

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "extension API listening");
    }
    axum::serve(listener, create_router(ctx))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("extension API stopped");
    Ok(())
}

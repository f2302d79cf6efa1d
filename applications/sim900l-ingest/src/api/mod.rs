pub mod handlers;
pub mod models;
pub mod routes;

use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;

pub use handlers::AppState;
pub use routes::create_router;

/// Serve until `shutdown` resolves. Requests already in flight run to
/// completion before this returns.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

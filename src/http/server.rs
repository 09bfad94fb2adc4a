//! HTTP server setup.
//!
//! # Responsibilities
//! - Serve static files from `<root>/wwwroot`
//! - Put the validation middleware in front of every request
//! - Assign and propagate `x-request-id`, trace each request
//! - Stop accepting on the shared shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::ConfigStore;
use crate::http::middleware::validation_middleware;
use crate::lifecycle::Shutdown;

/// Static site server gated by the live configuration.
pub struct HttpServer {
    router: Router,
    store: Arc<ConfigStore>,
}

impl HttpServer {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let router = Self::build_router(store.clone());
        Self { router, store }
    }

    /// The fully layered router, for embedding or tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    fn build_router(store: Arc<ConfigStore>) -> Router {
        let public = ServeDir::new(&store.layout().public_dir);
        Router::new()
            .fallback_service(public)
            .layer(middleware::from_fn_with_state(store, validation_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Accepts connections until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            public_dir = %self.store.layout().public_dir.display(),
            "HTTP server starting"
        );

        let mut stop = shutdown.listen();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

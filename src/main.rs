// Comment Counter Server

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use comment_counter::{app_state::AppState, config::Config, http_interface::create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    // Build main application router
    let app = Router::new()
        .nest("/api/v1", create_router(app_state))
        .layer(CorsLayer::permissive());

    // Start server
    let addr = config.server_address();
    tracing::info!("Comment counter server starting on http://{}", addr);
    tracing::info!("  POST   /api/v1/comments                     - Create comment (recounts its post)");
    tracing::info!("  DELETE /api/v1/comments                     - Delete comment batch (recounts affected posts)");
    tracing::info!("  DELETE /api/v1/posts/{{id}}                   - Delete post and its comments");
    tracing::info!("  POST   /api/v1/maintenance/recompute-all    - Recount every post");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

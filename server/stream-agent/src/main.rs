//! Binary entrypoint for the stream agent.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use correlation_engine::{Pipeline, PipelineConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_agent::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stream_agent=info,correlation_engine=info,tower_http=info".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let port: u16 = std::env::var("PORT")
    .unwrap_or_else(|_| "8080".into())
    .parse()?;

  let pipeline = Arc::new(Pipeline::new(PipelineConfig::from_env()));
  let http = reqwest::Client::builder()
    .timeout(Duration::from_secs(10))
    .build()?;
  let shutdown = CancellationToken::new();
  let state = Arc::new(AppState::new(Arc::clone(&pipeline), http, shutdown.clone()));

  let checker = {
    let pipeline = Arc::clone(&pipeline);
    let cancel = shutdown.clone();
    tokio::spawn(async move { pipeline.run_flush_checker(cancel).await })
  };

  let app = stream_agent::router(state);
  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  info!(%addr, "stream-agent listening");

  let listener = tokio::net::TcpListener::bind(addr).await?;
  let signal_token = shutdown.clone();
  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      let _ = tokio::signal::ctrl_c().await;
      info!("shutdown requested");
      // Ends tails, the flush checker and every live stream.
      signal_token.cancel();
      pipeline.shutdown();
    })
    .await?;

  checker.await?;
  Ok(())
}

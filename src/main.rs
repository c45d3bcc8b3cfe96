use anyhow::Context;
use asyncurl::config::Config;
use asyncurl::engine::{Engine, PendingTransfer};
use asyncurl::http::request::RequestBuilder;
use asyncurl::multi::CurlMultiplexer;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_level(true)
        .init();

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        anyhow::bail!("usage: asyncurl URL [URL...]");
    }

    let cfg = Config::load().context("Failed to load configuration")?;
    tracing::info!(version = %asyncurl::version(), "Starting");

    LocalSet::new().run_until(run(cfg, urls)).await
}

async fn run(cfg: Config, urls: Vec<String>) -> anyhow::Result<()> {
    let engine = Engine::new(&cfg.engine, CurlMultiplexer::new(&cfg.transfer))
        .context("Failed to start engine")?;

    let mut pending = Vec::with_capacity(urls.len());
    for url in &urls {
        let request = RequestBuilder::from_defaults(&cfg.transfer)
            .url(url.as_str())
            .build()
            .with_context(|| format!("Invalid request for {}", url))?;
        pending.push(engine.submit(request)?);
    }

    tokio::select! {
        _ = report(pending) => {}

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let stats = engine.stats();
    engine.shutdown().await;
    tracing::info!(
        completed = stats.completed,
        failed = stats.failed,
        dropped_events = stats.dropped_events,
        "Done"
    );

    Ok(())
}

async fn report(pending: Vec<PendingTransfer>) {
    for transfer in pending {
        let completion = transfer.await;
        match &completion.outcome {
            Ok(response) => println!(
                "{} {} {} ({} bytes)",
                completion.id,
                completion.url,
                response.status,
                response.downloaded
            ),
            Err(_) => {
                let (_, message) = completion.summary();
                println!("{} {} failed: {}", completion.id, completion.url, message);
            }
        }
    }
}

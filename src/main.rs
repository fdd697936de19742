use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use research_assist::config::{RetryPolicy, ServiceConfig};
use research_assist::error::ProviderError;
use research_assist::job::ResearchOutput;
use research_assist::limiter::RateLimiter;
use research_assist::notifier::LogNotifier;
use research_assist::pipeline::ResearchPipeline;
use research_assist::queue::persist::JsonSnapshotStore;
use research_assist::service::ResearchService;

/// Stand-in backend for local smoke runs. Real deployments register their
/// pipeline implementations here instead.
struct EchoPipeline;

#[async_trait]
impl ResearchPipeline for EchoPipeline {
    fn name(&self) -> &str {
        "echo"
    }

    fn operation(&self) -> &str {
        "echo"
    }

    async fn process(&self, query: &str) -> Result<ResearchOutput, ProviderError> {
        // Simulate a slow pipeline so queue positions are observable.
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(ResearchOutput {
            topic: query.chars().take(60).collect(),
            summary: format!("(echo) You asked: {query}"),
            tools_used: vec!["echo".to_string()],
            sources_used: vec![],
            pdf_links: vec![],
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env();
    let snapshot_path = std::env::var("RESEARCH_SNAPSHOT_PATH")
        .unwrap_or_else(|_| "./data/queue_state.json".to_string());

    eprintln!("🔎 Research Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Queue capacity: {}", config.queue_capacity);
    eprintln!("   Snapshot: {}", snapshot_path);
    eprintln!("   Type a query and press Enter. /status, /pos, /quit\n");

    let limiter = Arc::new(RateLimiter::new(
        [("echo".to_string(), Duration::from_secs(1))],
        Duration::from_secs(2),
    ));

    let service = ResearchService::start(
        config,
        RetryPolicy::default(),
        limiter,
        vec![Arc::new(EchoPipeline)],
        Arc::new(LogNotifier),
        Arc::new(JsonSnapshotStore::new(snapshot_path)),
    )
    .await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/status" => {
                let status = service.status_snapshot().await;
                eprintln!(
                    "depth={} processing={} current={:?} capacity={} tracked={}",
                    status.depth,
                    status.is_processing,
                    status.current_job_id,
                    status.capacity,
                    status.tracked_jobs
                );
            }
            "/pos" => match service.position_of("cli").await {
                Some(p) => eprintln!("next job at position {p}"),
                None => eprintln!("no queued jobs"),
            },
            query => match service.enqueue("cli", "stdin", query).await {
                Ok(job) => eprintln!("queued {} at position {}", job.id, job.position),
                Err(e) => eprintln!("rejected: {e}"),
            },
        }
    }

    service.shutdown().await;
    Ok(())
}

//! Command-line front end: submit a generation job and follow it live.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tempest_api::ResearchApi;
use tempest_channel::{ChannelConfig, ChannelManager};
use tempest_core::{ArtifactSource, GenerationRequest};
use tempest_session::{JobRun, RunEvent};

use crate::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let topic = args.next().context("Usage: tempest <topic> [directions]")?;
    let directions = args
        .next()
        .unwrap_or_else(|| "Give a comprehensive overview of the topic".to_string());

    let config = ClientConfig::from_env();
    let api = Arc::new(ResearchApi::new(config.api_url.clone()));

    let request = GenerationRequest::new(topic, directions);
    let accepted = api
        .submit(&request)
        .await
        .context("Failed to submit generation job")?;
    println!("Job {} queued ({})", accepted.job_id, accepted.initial_status);

    let manager = Arc::new(ChannelManager::new(ChannelConfig {
        ws_url: config.ws_url.clone(),
        backoff: config.backoff.clone(),
    }));

    let (run, mut events) = JobRun::start(
        accepted.job_id.clone(),
        manager,
        Arc::clone(&api) as Arc<dyn ArtifactSource>,
        config.run.clone(),
    )
    .await;

    let outcome = follow(&run, &mut events).await;
    run.shutdown().await;
    outcome
}

/// How long to wait before the single automatic artifact re-check.
const RECHECK_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

/// Print run events until the job reaches an outcome.
async fn follow(
    run: &JobRun,
    events: &mut tokio::sync::broadcast::Receiver<RunEvent>,
) -> anyhow::Result<()> {
    let mut rechecked = false;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Display loop lagged behind run events");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                anyhow::bail!("Run ended without a terminal outcome");
            }
        };

        match event {
            RunEvent::Progress(progress) => {
                println!(
                    "[{:>3}%] {} - {}",
                    progress.percent, progress.status, progress.current_step
                );
                for (agent, activity) in &progress.agent_activity {
                    println!("       {agent}: {activity}");
                }
            }
            RunEvent::LiveUpdatesUnavailable => {
                eprintln!("Live updates unavailable; checking status once over HTTP");
            }
            RunEvent::AwaitingArtifact => {
                if rechecked {
                    eprintln!("Result still not queryable; try again later");
                    return Ok(());
                }
                rechecked = true;
                eprintln!("Job completed; result not queryable yet, re-checking shortly");
                tokio::time::sleep(RECHECK_DELAY).await;
                run.recheck_artifact()
                    .await
                    .context("Artifact re-check failed")?;
            }
            RunEvent::Stalled => {
                eprintln!("No progress for a while; the job may be stuck");
            }
            RunEvent::Completed(artifact) => {
                println!("\n# {}\n", artifact.title);
                println!("{}", artifact.content);
                if !artifact.sources.is_empty() {
                    println!("\nSources:");
                    for source in &artifact.sources {
                        println!("  - {source}");
                    }
                }
                return Ok(());
            }
            RunEvent::Failed { message } => {
                anyhow::bail!("Generation failed: {message}");
            }
            RunEvent::FetchError { message } => {
                anyhow::bail!("Job completed but fetching the result failed: {message}");
            }
        }
    }
}

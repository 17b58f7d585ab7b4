//! Promote command - reconcile one Promotion with progress output

use crate::cli::build_reconciler;
use crate::cli::progress::CliProgress;
use crate::cli::style::{Stream, Stylize, check, request, request_link};
use anstream::println;
use gitops_promoter::config::Settings;
use gitops_promoter::error::Result;
use gitops_promoter::promote::PromotionOutcome;
use std::path::Path;

/// Run the promote command
pub async fn run_promote(
    store: &Path,
    settings: &Settings,
    namespace: &str,
    name: &str,
) -> Result<()> {
    let reconciler = build_reconciler(store, settings)?;

    println!("Promoting {}", format!("{namespace}/{name}").emphasis());
    let progress = CliProgress::new();
    let report = reconciler
        .reconcile_promotion(namespace, name, &progress)
        .await;
    progress.finish();
    let report = report?;

    let Some(outcome) = report.outcome else {
        println!("{}", format!("Promotion {namespace}/{name} not found").muted());
        return Ok(());
    };

    match &outcome {
        PromotionOutcome::AwaitingEnvironments { .. } => {
            println!("{} {}", "-".muted(), outcome.message().warn().for_stdout());
        }
        PromotionOutcome::InSync => println!("{} {}", check(), outcome.message()),
        PromotionOutcome::OpenForReview { request: pr }
        | PromotionOutcome::RequestCreated { request: pr, .. }
        | PromotionOutcome::RequestUpdated { request: pr, .. } => {
            println!("{} {}", check(), outcome.message());
            println!(
                "  {} {}",
                request(pr.number),
                request_link(Stream::Stdout, &pr.html_url)
            );
        }
    }
    Ok(())
}

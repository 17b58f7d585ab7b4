//! Status command - list Environments and Promotions with readiness

use crate::cli::style::{Stylize, arrow, readiness, request};
use anstream::println;
use gitops_promoter::error::Result;
use gitops_promoter::store::{FileStore, ResourceStore};
use gitops_promoter::types::{Condition, ConditionStatus, READY_CONDITION, find_condition};
use std::path::Path;

fn describe(condition: Option<&Condition>) -> String {
    condition.map_or_else(
        || "not reconciled yet".to_string(),
        |c| {
            if c.status == ConditionStatus::True {
                c.message.clone()
            } else {
                format!("{}: {}", c.reason, c.message)
            }
        },
    )
}

/// Run the status command
pub async fn run_status(store: &Path, namespace: Option<&str>) -> Result<()> {
    let files = FileStore::new(store);
    let environments = files.list_environments(namespace).await?;
    let promotions = files.list_promotions(namespace).await?;

    if environments.is_empty() && promotions.is_empty() {
        println!("{}", "No environments or promotions found".muted());
        return Ok(());
    }

    println!("{}", "Environments".emphasis());
    for env in &environments {
        let ready = find_condition(&env.status.conditions, READY_CONDITION);
        println!(
            "  {} {}/{} {} {}",
            readiness(ready),
            env.metadata.namespace,
            env.name().accent(),
            env.branch().muted(),
            describe(ready).muted()
        );
    }

    println!();
    println!("{}", "Promotions".emphasis());
    for promotion in &promotions {
        let ready = find_condition(&promotion.status.conditions, READY_CONDITION);
        println!(
            "  {} {}/{} {} {} {}",
            readiness(ready),
            promotion.metadata.namespace,
            promotion.name().accent(),
            promotion.spec.source_environment_ref.name,
            arrow(),
            promotion.spec.target_environment_ref.name
        );
        println!("      {}", describe(ready).muted());
        if promotion.status.last_pull_request_number != 0 {
            println!(
                "      {} {}",
                request(promotion.status.last_pull_request_number),
                promotion.status.last_pull_request_url.muted()
            );
        }
    }
    Ok(())
}

//! Check command - verify one Environment can be cloned

use crate::cli::build_reconciler;
use crate::cli::style::{Stylize, check, commit};
use anstream::println;
use gitops_promoter::config::Settings;
use gitops_promoter::error::Result;
use std::path::Path;

/// Run the check command
pub async fn run_check(store: &Path, settings: &Settings, namespace: &str, name: &str) -> Result<()> {
    let reconciler = build_reconciler(store, settings)?;
    reconciler.reconcile_environment(namespace, name).await?;

    let env = reconciler.resources().get_environment(namespace, name).await;
    match env {
        Ok(env) => println!(
            "{} {} at {}",
            check(),
            format!("{namespace}/{name}").emphasis(),
            commit(&env.status.observed_commit_hash)
        ),
        Err(e) if e.is_not_found() => {
            println!("{}", format!("Environment {namespace}/{name} not found").muted());
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

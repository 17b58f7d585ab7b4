//! Run command - reconcile everything in the store

use crate::cli::build_reconciler;
use crate::cli::style::{Stylize, check, cross};
use anstream::{eprintln, println};
use gitops_promoter::config::Settings;
use gitops_promoter::controller::{Controller, ctrl_c};
use gitops_promoter::error::{Error, Result};
use std::path::Path;

/// Run the controller loop, or a single pass with `once`
pub async fn run_controller(
    store: &Path,
    settings: &Settings,
    namespace: Option<&str>,
    once: bool,
) -> Result<()> {
    let reconciler = build_reconciler(store, settings)?;
    let controller = Controller::new(reconciler, settings.controller.clone())
        .with_namespace(namespace.map(ToString::to_string));

    if !once {
        println!(
            "Watching {} (Ctrl-C to stop)",
            store.display().to_string().accent()
        );
        return controller.run(ctrl_c()).await;
    }

    let summary = controller.run_once().await?;
    if summary.failed == 0 {
        println!(
            "{} Reconciled {} object{}",
            check(),
            summary.succeeded.success(),
            if summary.succeeded == 1 { "" } else { "s" }
        );
        Ok(())
    } else {
        eprintln!(
            "{} {}",
            cross(),
            format!(
                "{} of {} reconciles failed",
                summary.failed,
                summary.failed + summary.succeeded
            )
            .error()
        );
        Err(Error::Internal(format!("{} reconciles failed", summary.failed)))
    }
}

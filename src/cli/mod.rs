//! CLI commands
//!
//! Command implementations for the `promoter` binary.

mod check;
mod progress;
mod promote;
mod run;
mod status;
pub mod style;

pub use check::run_check;
pub use promote::run_promote;
pub use run::run_controller;
pub use status::run_status;

use gitops_promoter::config::Settings;
use gitops_promoter::controller::Reconciler;
use gitops_promoter::error::Result;
use gitops_promoter::platform::ProviderRegistry;
use gitops_promoter::store::FileStore;
use std::path::Path;
use std::sync::Arc;

/// Build a reconciler over the file store rooted at `store`
fn build_reconciler(store: &Path, settings: &Settings) -> Result<Arc<Reconciler>> {
    let files = Arc::new(FileStore::new(store));
    let reconciler = Reconciler::new(
        files.clone(),
        files,
        Arc::new(ProviderRegistry),
        settings,
    )?;
    Ok(Arc::new(reconciler))
}

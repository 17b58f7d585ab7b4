//! Shared CLI progress callback with styled output and a spinner

use crate::cli::style::{
    Stream, Stylize, arrow, check, commit, operation, request, request_link, spinner_style,
};
use anstream::println;
use async_trait::async_trait;
use gitops_promoter::promote::{OperationStatus, Phase, ProgressCallback};
use gitops_promoter::types::PullRequest;
use indicatif::ProgressBar;
use std::time::Duration;

/// CLI progress callback that prints promotion steps to stdout
///
/// A spinner shows the current phase; step lines are printed above it.
pub struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    /// Create progress output with a running spinner
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn line(&self, text: &str) {
        self.spinner.suspend(|| println!("{text}"));
    }

    /// Stop and clear the spinner
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_phase(&self, phase: Phase) {
        match phase {
            Phase::Complete => self.finish(),
            _ => self.spinner.set_message(format!("{phase}...")),
        }
    }

    async fn on_branch(&self, branch: &str, resumed: bool) {
        let verb = if resumed { "Resuming" } else { "Created" };
        self.line(&format!("{} {verb} branch {}", arrow(), branch.accent()));
    }

    async fn on_operation(&self, name: &str, status: OperationStatus) {
        let mark = operation(&status);
        match &status {
            OperationStatus::Unchanged => {
                self.line(&format!("  {mark} {name} {}", "unchanged".muted()));
            }
            OperationStatus::Pushed { commit: hash } => {
                self.line(&format!(
                    "  {mark} {} {} {}",
                    name.emphasis(),
                    "pushed".muted(),
                    commit(hash)
                ));
            }
        }
    }

    async fn on_pr_created(&self, pr: &PullRequest) {
        self.line(&format!("  {} Created PR {}", check(), request(pr.number)));
        self.line(&format!("    {}", request_link(Stream::Stdout, &pr.html_url)));
    }

    async fn on_pr_updated(&self, pr: &PullRequest) {
        self.line(&format!("  {} Updated PR {}", check(), request(pr.number)));
    }

    async fn on_message(&self, message: &str) {
        self.line(message);
    }
}

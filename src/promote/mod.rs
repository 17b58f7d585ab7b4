//! Promotion of paths from a source to a target environment
//!
//! The [`PromotionEngine`] orchestrates the pieces in this module:
//! - [`branch`]: resume the open request's branch or start a fresh one
//! - [`plan`]: resolve copy paths, confined to each environment root
//! - [`copy`]: apply one resolved copy to the target tree
//! - [`ladder`]: commit and push after every copy that changed the tree

pub mod branch;
pub mod copy;
pub mod engine;
pub mod ladder;
pub mod plan;
pub mod progress;
pub mod template;

pub use branch::{AcquiredBranch, acquire_branch, is_request_open};
pub use engine::{PromotionEngine, PromotionOutcome, TargetLocks};
pub use plan::{CopyPlan, CopyStep, secure_join};
pub use progress::{NoopProgress, OperationStatus, Phase, ProgressCallback};
pub use template::{Template, TemplateField, TemplateValues};

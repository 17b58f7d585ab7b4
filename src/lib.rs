//! gitops-promoter - promote configuration between git-backed environments
//!
//! A Promotion copies declared paths from a source Environment's repository
//! into a target Environment's repository, commits and pushes each copy that
//! changed something, and opens (or updates) a pull request against the
//! target branch. Every reconcile is idempotent: re-running with nothing new
//! to copy yields no commits and no duplicate request.
//!
//! # Layout
//!
//! - [`store`]: Environment/Promotion records and secrets
//! - [`auth`]: clone URL and transport credential resolution
//! - [`repo`]: ephemeral git workspaces
//! - [`platform`]: GitHub and GitLab pull request gateways
//! - [`promote`]: the promotion engine
//! - [`controller`]: reconcilers and the scheduling loop

pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod platform;
pub mod promote;
pub mod repo;
pub mod store;
pub mod types;

pub use error::{Error, Result};

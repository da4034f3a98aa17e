//! Agent Warden
//!
//! Access-pattern and permission evaluation for multi-agent tooling.
//!
//! ## Features
//!
//! - **Access patterns** over files, tables and endpoints, matched with globs
//! - **Composition** of patterns with AND/OR, hour windows and custom async predicates
//! - **Administrative rules** that override pattern decisions by priority
//! - **Bounded audit log** of every decision
//! - **Flexible configuration** via TOML files and environment variables
//!
//! ## Decision Model
//!
//! ```text
//! rules (override) → agent patterns (baseline) → default (deny)
//! ```
//!
//! Requests without a resource reduce to a capability check over the
//! agent's tools.
//!
//! ## Example
//!
//! ```no_run
//! use agent_warden::access_control::{OperationKind, PermissionEvaluator};
//! use agent_warden::config::load_config;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = load_config(Some("agent-warden.toml"))?;
//! let evaluator = PermissionEvaluator::from_config(&config)?;
//! let decision = evaluator
//!     .evaluate("react-agent", OperationKind::Edit, Some("src/App.tsx"))
//!     .await;
//! println!("{}: {}", decision.allowed, decision.reason);
//! # Ok(())
//! # }
//! ```

pub mod access_control;
pub mod agents;
pub mod config;
pub mod error;

// Re-export main types
pub use access_control::{AccessDecision, PermissionEvaluator};
pub use agents::{Agent, Tool};
pub use config::{AppConfig, load_config};
pub use error::{AccessDeniedError, ConfigError};

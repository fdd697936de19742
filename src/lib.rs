//! Research Assist — background job-processing core.
//!
//! Users submit free-text research queries; each query drives a slow,
//! multi-step pipeline backed by rate-limited third-party providers. This
//! crate owns the two hard parts of that service:
//!
//! - a single-consumer [`queue::JobQueue`] that serializes, positions, and
//!   durably persists jobs across restarts, and
//! - an [`executor::FallbackExecutor`] that runs one task against an ordered
//!   list of interchangeable providers, retrying transient failures with
//!   backoff and failing over on permanent ones.
//!
//! The pipeline content itself (prompts, scraping, ranking) and the chat
//! presentation layer are external collaborators behind the
//! [`pipeline::ResearchPipeline`] and [`notifier::Notifier`] traits.

pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod limiter;
pub mod notifier;
pub mod pipeline;
pub mod processor;
pub mod provider;
pub mod queue;
pub mod service;

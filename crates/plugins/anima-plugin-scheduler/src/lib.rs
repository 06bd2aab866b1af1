//! Anima Scheduler
//!
//! Planned actions: one-shot reminders, cron-driven habits and multi-step
//! ReWOO plans whose steps feed each other through `#name` references.
//!
//! - **CronExpression**: five-field cron parsing and next-occurrence search.
//! - **PlanExecutor**: ordered step execution, first failure aborts, optional
//!   handlebars-rendered synthesis of the final answer.
//! - **ScheduledActionEngine**: trigger evaluation, run bookkeeping with
//!   bounded history, pause/resume/cancel, timed-out persistence.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use anima_plugin_scheduler::ScheduledActionEngine;
//! use anima_core::{PlannedActionEntry, SchedulerConfig};
//!
//! let engine = ScheduledActionEngine::new(tools, notifier, SchedulerConfig::default());
//! engine.schedule(PlannedActionEntry::habit("stretch", "0 * * * *")).await?;
//! tokio::spawn(async move { engine.run_periodically(tick, shutdown_rx).await });
//! ```

#![warn(clippy::all)]

pub mod context;
pub mod cron;
pub mod engine;
pub mod executor;

pub use context::StepContext;
pub use cron::CronExpression;
pub use engine::{ScheduledActionEngine, SCHEDULER_SOURCE};
pub use executor::{PlanExecutor, PlanRun};

//! Configuration management and environment variable loading
//!
//! Every tunable of the pipeline lives in [`AnimaConfig`]. Values default to
//! the constants the components were designed around and can be overridden
//! through `ANIMA_*` environment variables (optionally from a `.env` file).

use crate::{AnimaError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Load environment variables from a .env file
///
/// Missing files are not an error; the system environment is used as-is.
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::info!("Loaded environment from: {}", path.display());
            Ok(())
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(AnimaError::config(format!(
            "Failed to parse .env file at line {}, position {}",
            line, pos
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::debug!("No .env file found - using system environment variables only");
            Ok(())
        }
        Err(e) => Err(AnimaError::config(format!("Failed to load .env file: {}", e))),
    }
}

/// Get optional environment variable with default
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable as boolean
pub fn get_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Get environment variable as integer
pub fn get_env_int<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Get environment variable as float
pub fn get_env_float(key: &str, default: f32) -> f32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(default)
}

/// Volatile event queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of pending events
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Durable event queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableQueueConfig {
    /// Back the consumer pool with the durable queue instead of the
    /// in-memory one
    #[serde(default)]
    pub enabled: bool,
    /// SQLite connection URL
    pub database_url: String,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DurableQueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_url: "sqlite://anima_events.db".to_string(),
            max_connections: 4,
        }
    }
}

/// Memory → opinion → desire pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Attempts per retried stage (memory, opinion)
    pub retry_budget: u32,
    /// Pause between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// How strongly a memory's satisfaction moves session pleasure
    pub affect_appraisal_gain: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            retry_delay_ms: 0,
            affect_appraisal_gain: 0.4,
        }
    }
}

impl PipelineConfig {
    /// Delay between attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Desire creation and reinforcement settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesireConfig {
    /// Candidacy score a desire-less opinion must reach to spawn a desire
    pub creation_threshold: f32,
    /// Fraction of the gap to the new score applied when reinforcing an
    /// existing desire
    pub reinforcement_rate: f32,
}

impl Default for DesireConfig {
    fn default() -> Self {
        Self {
            creation_threshold: 0.5,
            reinforcement_rate: 0.3,
        }
    }
}

/// Initiative promotion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiativeConfig {
    /// Minimum intensity for a pending desire to become an initiative
    pub trigger_threshold: f32,
    /// Seconds between promotion runs
    pub interval_secs: u64,
}

impl Default for InitiativeConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: 0.75,
            interval_secs: 60,
        }
    }
}

impl InitiativeConfig {
    /// Interval between promotion runs
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Planned action engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between trigger evaluations
    pub tick_secs: u64,
    /// Execution records retained per action
    pub history_limit: usize,
    /// Upper bound on a run-result persistence call
    pub persist_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            history_limit: 20,
            persist_timeout_secs: 5,
        }
    }
}

impl SchedulerConfig {
    /// Interval between trigger evaluations
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    /// Timeout applied to run-result persistence
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }
}

/// Event consumer pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Number of consumer tasks draining the queue
    pub consumer_count: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self { consumer_count: 2 }
    }
}

/// Complete configuration for an Anima runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimaConfig {
    /// Volatile queue
    pub queue: QueueConfig,
    /// Durable queue
    pub durable: DurableQueueConfig,
    /// Formation pipeline
    pub pipeline: PipelineConfig,
    /// Desire engine
    pub desire: DesireConfig,
    /// Initiative promoter
    pub initiative: InitiativeConfig,
    /// Planned action engine
    pub scheduler: SchedulerConfig,
    /// Consumer pool
    pub consumers: ConsumerConfig,
}

impl AnimaConfig {
    /// Build a configuration from `ANIMA_*` environment variables, falling
    /// back to defaults for anything unset or unparseable
    pub fn from_env() -> Result<Self> {
        load_env()?;

        let defaults = Self::default();
        let config = Self {
            queue: QueueConfig {
                capacity: get_env_int("ANIMA_QUEUE_CAPACITY", defaults.queue.capacity),
            },
            durable: DurableQueueConfig {
                enabled: get_env_bool("ANIMA_DURABLE_ENABLED", defaults.durable.enabled),
                database_url: get_env_or(
                    "ANIMA_DURABLE_DATABASE_URL",
                    &defaults.durable.database_url,
                ),
                max_connections: get_env_int(
                    "ANIMA_DURABLE_MAX_CONNECTIONS",
                    defaults.durable.max_connections,
                ),
            },
            pipeline: PipelineConfig {
                retry_budget: get_env_int(
                    "ANIMA_PIPELINE_RETRY_BUDGET",
                    defaults.pipeline.retry_budget,
                ),
                retry_delay_ms: get_env_int(
                    "ANIMA_PIPELINE_RETRY_DELAY_MS",
                    defaults.pipeline.retry_delay_ms,
                ),
                affect_appraisal_gain: get_env_float(
                    "ANIMA_AFFECT_APPRAISAL_GAIN",
                    defaults.pipeline.affect_appraisal_gain,
                ),
            },
            desire: DesireConfig {
                creation_threshold: get_env_float(
                    "ANIMA_DESIRE_CREATION_THRESHOLD",
                    defaults.desire.creation_threshold,
                ),
                reinforcement_rate: get_env_float(
                    "ANIMA_DESIRE_REINFORCEMENT_RATE",
                    defaults.desire.reinforcement_rate,
                ),
            },
            initiative: InitiativeConfig {
                trigger_threshold: get_env_float(
                    "ANIMA_INITIATIVE_THRESHOLD",
                    defaults.initiative.trigger_threshold,
                ),
                interval_secs: get_env_int(
                    "ANIMA_INITIATIVE_INTERVAL_SECS",
                    defaults.initiative.interval_secs,
                ),
            },
            scheduler: SchedulerConfig {
                tick_secs: get_env_int("ANIMA_SCHEDULER_TICK_SECS", defaults.scheduler.tick_secs),
                history_limit: get_env_int(
                    "ANIMA_SCHEDULER_HISTORY_LIMIT",
                    defaults.scheduler.history_limit,
                ),
                persist_timeout_secs: get_env_int(
                    "ANIMA_SCHEDULER_PERSIST_TIMEOUT_SECS",
                    defaults.scheduler.persist_timeout_secs,
                ),
            },
            consumers: ConsumerConfig {
                consumer_count: get_env_int(
                    "ANIMA_CONSUMER_COUNT",
                    defaults.consumers.consumer_count,
                ),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the components cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.queue.capacity == 0 {
            return Err(AnimaError::config("queue capacity must be at least 1"));
        }
        if self.durable.max_connections == 0 {
            return Err(AnimaError::config(
                "durable queue needs at least one connection",
            ));
        }
        if self.pipeline.retry_budget == 0 {
            return Err(AnimaError::config("pipeline retry budget must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.initiative.trigger_threshold) {
            return Err(AnimaError::config(format!(
                "initiative threshold {} outside [0, 1]",
                self.initiative.trigger_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.desire.reinforcement_rate) {
            return Err(AnimaError::config(format!(
                "desire reinforcement rate {} outside [0, 1]",
                self.desire.reinforcement_rate
            )));
        }
        if self.initiative.interval_secs == 0 {
            return Err(AnimaError::config("initiative interval must be at least 1 second"));
        }
        if self.scheduler.tick_secs == 0 {
            return Err(AnimaError::config("scheduler tick must be at least 1 second"));
        }
        if self.scheduler.history_limit == 0 {
            return Err(AnimaError::config("scheduler history limit must be at least 1"));
        }
        if self.consumers.consumer_count == 0 {
            return Err(AnimaError::config("consumer pool needs at least one consumer"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_bool() {
        env::set_var("ANIMA_TEST_BOOL_TRUE", "yes");
        env::set_var("ANIMA_TEST_BOOL_FALSE", "off");

        assert!(get_env_bool("ANIMA_TEST_BOOL_TRUE", false));
        assert!(!get_env_bool("ANIMA_TEST_BOOL_FALSE", true));
        assert!(get_env_bool("ANIMA_TEST_NONEXISTENT", true));

        env::remove_var("ANIMA_TEST_BOOL_TRUE");
        env::remove_var("ANIMA_TEST_BOOL_FALSE");
    }

    #[test]
    fn test_get_env_int_and_float() {
        env::set_var("ANIMA_TEST_INT", "42");
        env::set_var("ANIMA_TEST_FLOAT", "0.7");
        env::set_var("ANIMA_TEST_GARBAGE", "many");

        assert_eq!(get_env_int("ANIMA_TEST_INT", 0u32), 42);
        assert_eq!(get_env_int("ANIMA_TEST_GARBAGE", 9usize), 9);
        assert_eq!(get_env_float("ANIMA_TEST_FLOAT", 0.0), 0.7);

        env::remove_var("ANIMA_TEST_INT");
        env::remove_var("ANIMA_TEST_FLOAT");
        env::remove_var("ANIMA_TEST_GARBAGE");
    }

    #[test]
    fn test_defaults_validate() {
        let config = AnimaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.capacity, 10_000);
        assert_eq!(config.pipeline.retry_budget, 3);
        assert_eq!(config.desire.creation_threshold, 0.5);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = AnimaConfig::default();
        config.queue.capacity = 0;
        assert!(matches!(config.validate(), Err(AnimaError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = AnimaConfig::default();
        config.initiative.trigger_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = AnimaConfig::default();
        config.scheduler.tick_secs = 0;
        assert!(matches!(config.validate(), Err(AnimaError::Config(ref m)) if m.contains("tick")));

        let mut config = AnimaConfig::default();
        config.initiative.interval_secs = 0;
        assert!(
            matches!(config.validate(), Err(AnimaError::Config(ref m)) if m.contains("interval"))
        );
    }

    #[test]
    fn test_from_env_overrides() {
        env::set_var("ANIMA_INITIATIVE_THRESHOLD", "0.8");
        env::set_var("ANIMA_CONSUMER_COUNT", "4");
        env::set_var("ANIMA_DURABLE_ENABLED", "on");

        let config = AnimaConfig::from_env().unwrap();
        assert_eq!(config.initiative.trigger_threshold, 0.8);
        assert_eq!(config.consumers.consumer_count, 4);
        assert!(config.durable.enabled);

        env::remove_var("ANIMA_INITIATIVE_THRESHOLD");
        env::remove_var("ANIMA_CONSUMER_COUNT");
        env::remove_var("ANIMA_DURABLE_ENABLED");
    }
}

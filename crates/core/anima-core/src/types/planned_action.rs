//! Planned actions: reminders, habits and multi-step ReWOO plans

use crate::{AnimaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

/// How an action recurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Fires once, then is done
    OneShot,
    /// Fires on every cron match
    Habit,
}

/// Planned action lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// Eligible to fire
    Active,
    /// Temporarily disabled
    Paused,
    /// One-shot that already fired
    Done,
    /// Withdrawn
    Cancelled,
}

/// When an action fires; exactly one of a datetime or a cron expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTrigger {
    /// Fire at (or after) this instant
    At(DateTime<Utc>),
    /// Fire whenever the 5-field cron expression matches
    Cron(String),
}

/// One tool call in a ReWOO plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReWooStep {
    /// Position in the plan
    pub step_id: u32,
    /// Tool to invoke
    pub tool_name: String,
    /// Tool arguments; string values may reference `#var` outputs of
    /// earlier steps
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Name under which this step's output is recorded
    pub output_variable: String,
    /// Human description
    #[serde(default)]
    pub description: String,
}

impl ReWooStep {
    /// Create a step without parameters
    pub fn new(step_id: u32, tool_name: impl Into<String>, output_variable: impl Into<String>) -> Self {
        Self {
            step_id,
            tool_name: tool_name.into(),
            parameters: BTreeMap::new(),
            output_variable: output_variable.into(),
            description: String::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// An ordered plan of tool calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReWooPlan {
    /// Steps in declared order
    pub steps: Vec<ReWooStep>,
}

impl ReWooPlan {
    /// Create a plan from steps
    pub fn new(steps: Vec<ReWooStep>) -> Self {
        Self { steps }
    }

    /// Whether the plan has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps sorted by ascending step id; equal ids keep declared order
    pub fn ordered_steps(&self) -> Vec<&ReWooStep> {
        let mut steps: Vec<&ReWooStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.step_id);
        steps
    }
}

/// What happened during one triggered run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A simple reminder was delivered (or attempted)
    Reminded {
        /// Delivery error, if the notifier failed
        #[serde(default)]
        error: Option<String>,
    },
    /// Every step succeeded
    Completed {
        /// Final output (synthesized answer or last step output)
        output: serde_json::Value,
    },
    /// A step failed and the remaining steps were skipped
    Failed {
        /// Failing step
        step_id: u32,
        /// Tool that failed
        tool_name: String,
        /// Failure summary
        error: String,
    },
    /// Every step succeeded but the final answer could not be synthesized
    SynthesisFailed {
        /// Failure summary
        error: String,
    },
}

impl RunOutcome {
    /// Whether the run counts as a success
    pub fn is_success(&self) -> bool {
        match self {
            RunOutcome::Reminded { error } => error.is_none(),
            RunOutcome::Completed { .. } => true,
            RunOutcome::Failed { .. } | RunOutcome::SynthesisFailed { .. } => false,
        }
    }
}

/// Immutable record of one triggered run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Run id
    pub run_id: Uuid,
    /// Action that ran
    pub action_id: Uuid,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
    /// Result
    pub outcome: RunOutcome,
    /// Raw output of every step that ran, keyed by output variable
    #[serde(default)]
    pub step_outputs: BTreeMap<String, serde_json::Value>,
}

impl ExecutionRecord {
    /// One-line summary of the run
    pub fn summary(&self) -> String {
        match &self.outcome {
            RunOutcome::Reminded { error: None } => "reminder delivered".to_string(),
            RunOutcome::Reminded { error: Some(e) } => format!("reminder failed: {}", e),
            RunOutcome::Completed { .. } => {
                format!("completed {} step(s)", self.step_outputs.len())
            }
            RunOutcome::Failed {
                step_id,
                tool_name,
                error,
            } => format!("step {} ({}) failed: {}", step_id, tool_name, error),
            RunOutcome::SynthesisFailed { error } => format!("synthesis failed: {}", error),
        }
    }
}

/// A planned action held by the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedActionEntry {
    /// Action id
    pub id: Uuid,
    /// Human label, also the reminder text
    pub label: String,
    /// Recurrence
    pub action_type: ActionType,
    /// Lifecycle status
    pub status: ActionStatus,
    /// Trigger
    pub trigger: ActionTrigger,
    /// Steps to execute; absent or empty means a simple reminder
    #[serde(default)]
    pub execution_plan: Option<ReWooPlan>,
    /// Handlebars template used to synthesize the final answer
    #[serde(default)]
    pub synthesis_prompt_template: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last run time
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
    /// Number of triggered runs
    #[serde(default)]
    pub execution_count: u64,
    /// Next cron occurrence (habits only)
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
    /// Recent runs, oldest first
    #[serde(default)]
    pub history: VecDeque<ExecutionRecord>,
}

impl PlannedActionEntry {
    /// One-shot action firing at `at`
    pub fn one_shot(label: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(label, ActionType::OneShot, ActionTrigger::At(at))
    }

    /// Recurring action on a cron expression
    pub fn habit(label: impl Into<String>, cron: impl Into<String>) -> Self {
        Self::new(label, ActionType::Habit, ActionTrigger::Cron(cron.into()))
    }

    fn new(label: impl Into<String>, action_type: ActionType, trigger: ActionTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            action_type,
            status: ActionStatus::Active,
            trigger,
            execution_plan: None,
            synthesis_prompt_template: None,
            created_at: Utc::now(),
            last_executed_at: None,
            execution_count: 0,
            next_run: None,
            history: VecDeque::new(),
        }
    }

    /// Attach a multi-step plan
    pub fn with_plan(mut self, plan: ReWooPlan) -> Self {
        self.execution_plan = Some(plan);
        self
    }

    /// Attach a synthesis template
    pub fn with_synthesis_template(mut self, template: impl Into<String>) -> Self {
        self.synthesis_prompt_template = Some(template.into());
        self
    }

    /// Whether firing only delivers a reminder
    pub fn is_simple_reminder(&self) -> bool {
        self.execution_plan
            .as_ref()
            .map(ReWooPlan::is_empty)
            .unwrap_or(true)
    }

    /// Latest run record
    pub fn last_execution_result(&self) -> Option<&ExecutionRecord> {
        self.history.back()
    }

    /// Count a triggered run and keep its record, trimming history to
    /// `history_limit`
    pub fn record_run(&mut self, record: ExecutionRecord, history_limit: usize) {
        self.execution_count += 1;
        self.last_executed_at = Some(record.finished_at);
        self.history.push_back(record);
        while self.history.len() > history_limit.max(1) {
            self.history.pop_front();
        }
    }
}

/// Flat persisted shape of a planned action
///
/// Storage keeps the trigger as two optional columns; exactly one must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedActionRecord {
    /// Action id
    pub id: Uuid,
    /// Label
    pub label: String,
    /// Recurrence
    pub action_type: ActionType,
    /// Status
    pub status: ActionStatus,
    /// One-shot trigger time
    pub trigger_datetime: Option<DateTime<Utc>>,
    /// Recurring trigger
    pub cron_expression: Option<String>,
    /// Plan
    pub execution_plan: Option<ReWooPlan>,
    /// Synthesis template
    pub synthesis_prompt_template: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last run time
    pub last_executed_at: Option<DateTime<Utc>>,
    /// Run count
    pub execution_count: u64,
    /// Summary of the last run
    pub last_execution_result: Option<String>,
}

impl From<&PlannedActionEntry> for PlannedActionRecord {
    fn from(entry: &PlannedActionEntry) -> Self {
        let (trigger_datetime, cron_expression) = match &entry.trigger {
            ActionTrigger::At(at) => (Some(*at), None),
            ActionTrigger::Cron(expr) => (None, Some(expr.clone())),
        };
        Self {
            id: entry.id,
            label: entry.label.clone(),
            action_type: entry.action_type,
            status: entry.status,
            trigger_datetime,
            cron_expression,
            execution_plan: entry.execution_plan.clone(),
            synthesis_prompt_template: entry.synthesis_prompt_template.clone(),
            created_at: entry.created_at,
            last_executed_at: entry.last_executed_at,
            execution_count: entry.execution_count,
            last_execution_result: entry.last_execution_result().map(ExecutionRecord::summary),
        }
    }
}

impl TryFrom<PlannedActionRecord> for PlannedActionEntry {
    type Error = AnimaError;

    fn try_from(record: PlannedActionRecord) -> Result<Self> {
        let trigger = match (record.trigger_datetime, record.cron_expression) {
            (Some(at), None) => ActionTrigger::At(at),
            (None, Some(expr)) => ActionTrigger::Cron(expr),
            (None, None) => {
                return Err(AnimaError::validation(format!(
                    "planned action {} has neither trigger_datetime nor cron_expression",
                    record.id
                )))
            }
            (Some(_), Some(_)) => {
                return Err(AnimaError::validation(format!(
                    "planned action {} sets both trigger_datetime and cron_expression",
                    record.id
                )))
            }
        };
        Ok(Self {
            id: record.id,
            label: record.label,
            action_type: record.action_type,
            status: record.status,
            trigger,
            execution_plan: record.execution_plan,
            synthesis_prompt_template: record.synthesis_prompt_template,
            created_at: record.created_at,
            last_executed_at: record.last_executed_at,
            execution_count: record.execution_count,
            next_run: None,
            history: VecDeque::new(),
        })
    }
}

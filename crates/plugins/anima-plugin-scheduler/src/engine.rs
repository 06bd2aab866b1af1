//! Scheduled Action Engine
//!
//! Holds planned actions in memory, evaluates their triggers on a tick and
//! runs the ones that are due: a simple reminder goes straight to the
//! notifier, a multi-step plan runs through the [`PlanExecutor`] between
//! `LONGTASK_START`/`LONGTASK_END` feedback.
//!
//! Run results are persisted with a bounded wait; a slow store never holds
//! up the scheduler.

use crate::cron::CronExpression;
use crate::executor::PlanExecutor;
use anima_core::{
    wait_for_shutdown, ActionStatus, ActionTrigger, ActionType, AnimaError, Event, EventPayload,
    EventQueue, EventType, ExecutionRecord, FeedbackDispatcher, FeedbackEvent, FeedbackKind,
    PlannedActionEntry, PlannedActionStore, ReminderNotifier, Result, ResultSynthesizer,
    RunOutcome, SchedulerConfig, ShutdownReceiver, ToolExecutor,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Event source name used for fired actions
pub const SCHEDULER_SOURCE: &str = "scheduled_action_engine";

/// Planned action scheduler
pub struct ScheduledActionEngine {
    actions: RwLock<HashMap<Uuid, PlannedActionEntry>>,
    executor: PlanExecutor,
    notifier: Arc<dyn ReminderNotifier>,
    store: Option<Arc<dyn PlannedActionStore>>,
    feedback: FeedbackDispatcher,
    queue: Option<Arc<EventQueue>>,
    config: SchedulerConfig,
    persist_timeout: Duration,
    // Serializes evaluation passes so an action cannot fire twice.
    evaluating: Mutex<()>,
}

impl ScheduledActionEngine {
    /// Create an engine running plan steps on `tools` and delivering
    /// reminders through `notifier`
    pub fn new(
        tools: Arc<dyn ToolExecutor>,
        notifier: Arc<dyn ReminderNotifier>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
            executor: PlanExecutor::new(tools),
            notifier,
            store: None,
            feedback: FeedbackDispatcher::disabled(),
            queue: None,
            persist_timeout: config.persist_timeout(),
            config,
            evaluating: Mutex::new(()),
        }
    }

    /// Synthesize plan answers with `synthesizer`
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn ResultSynthesizer>) -> Self {
        self.executor = self.executor.with_synthesizer(synthesizer);
        self
    }

    /// Persist actions and run results to `store`
    pub fn with_store(mut self, store: Arc<dyn PlannedActionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Send UX feedback through `feedback`
    pub fn with_feedback(mut self, feedback: FeedbackDispatcher) -> Self {
        self.feedback = feedback;
        self
    }

    /// Announce fired actions as `SCHEDULED_ACTION` events on `queue`
    pub fn with_queue(mut self, queue: Arc<EventQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Add an action; habits get their first occurrence computed here
    pub async fn schedule(&self, mut action: PlannedActionEntry) -> Result<Uuid> {
        if action.label.trim().is_empty() {
            return Err(AnimaError::validation("planned action label is empty"));
        }

        match (&action.action_type, &action.trigger) {
            (ActionType::OneShot, ActionTrigger::At(_)) => action.next_run = None,
            (ActionType::Habit, ActionTrigger::Cron(expr)) => {
                let cron = CronExpression::parse(expr)?;
                let next = cron.next_after(Utc::now()).ok_or_else(|| {
                    AnimaError::validation(format!("cron expression '{}' never fires", expr))
                })?;
                action.next_run = Some(next);
            }
            (ActionType::OneShot, ActionTrigger::Cron(_)) => {
                return Err(AnimaError::validation(
                    "one-shot actions need a trigger datetime",
                ))
            }
            (ActionType::Habit, ActionTrigger::At(_)) => {
                return Err(AnimaError::validation("habits need a cron expression"))
            }
        }

        let id = action.id;
        {
            let mut actions = self.actions.write().await;
            if actions.contains_key(&id) {
                return Err(AnimaError::validation(format!(
                    "planned action {} already scheduled",
                    id
                )));
            }
            actions.insert(id, action.clone());
        }

        info!(
            action_id = %id,
            label = %action.label,
            action_type = ?action.action_type,
            next_run = ?action.next_run,
            "planned action scheduled"
        );
        self.persist(&action).await;
        Ok(id)
    }

    /// Snapshot of one action
    pub async fn get(&self, id: Uuid) -> Option<PlannedActionEntry> {
        self.actions.read().await.get(&id).cloned()
    }

    /// Snapshot of every action, oldest first
    pub async fn list(&self) -> Vec<PlannedActionEntry> {
        let mut actions: Vec<_> = self.actions.read().await.values().cloned().collect();
        actions.sort_by_key(|a| a.created_at);
        actions
    }

    /// Stop an active action from firing
    pub async fn pause(&self, id: Uuid) -> Result<()> {
        self.update_status(id, |action| match action.status {
            ActionStatus::Active | ActionStatus::Paused => {
                action.status = ActionStatus::Paused;
                Ok(())
            }
            other => Err(AnimaError::validation(format!(
                "cannot pause a {:?} action",
                other
            ))),
        })
        .await
    }

    /// Re-enable a paused action; habits resume from the next occurrence
    /// after now
    pub async fn resume(&self, id: Uuid) -> Result<()> {
        self.update_status(id, |action| {
            if action.status != ActionStatus::Paused {
                return Err(AnimaError::validation(format!(
                    "cannot resume a {:?} action",
                    action.status
                )));
            }
            if let ActionTrigger::Cron(expr) = &action.trigger {
                let next = CronExpression::parse(expr)?
                    .next_after(Utc::now())
                    .ok_or_else(|| {
                        AnimaError::validation(format!("cron expression '{}' never fires", expr))
                    })?;
                action.next_run = Some(next);
            }
            action.status = ActionStatus::Active;
            Ok(())
        })
        .await
    }

    /// Withdraw an action for good
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        self.update_status(id, |action| {
            action.status = ActionStatus::Cancelled;
            action.next_run = None;
            Ok(())
        })
        .await
    }

    async fn update_status<F>(&self, id: Uuid, apply: F) -> Result<()>
    where
        F: FnOnce(&mut PlannedActionEntry) -> Result<()>,
    {
        let snapshot = {
            let mut actions = self.actions.write().await;
            let action = actions
                .get_mut(&id)
                .ok_or_else(|| AnimaError::not_found(format!("planned action {}", id)))?;
            apply(action)?;
            action.clone()
        };
        info!(action_id = %id, status = ?snapshot.status, "planned action status changed");
        self.persist(&snapshot).await;
        Ok(())
    }

    /// Fire every action due at `now` and return their run records
    pub async fn evaluate(&self, now: DateTime<Utc>) -> Vec<ExecutionRecord> {
        let _pass = self.evaluating.lock().await;

        let mut due: Vec<PlannedActionEntry> = self
            .actions
            .read()
            .await
            .values()
            .filter(|action| is_due(action, now))
            .cloned()
            .collect();
        due.sort_by_key(|a| (due_time(a), a.created_at));

        if !due.is_empty() {
            debug!(count = due.len(), "planned actions due");
        }

        let mut records = Vec::with_capacity(due.len());
        for action in due {
            records.push(self.fire(action, now).await);
        }
        records
    }

    async fn fire(&self, action: PlannedActionEntry, now: DateTime<Utc>) -> ExecutionRecord {
        let started_at = Utc::now();
        info!(action_id = %action.id, label = %action.label, "planned action fired");

        if let Some(queue) = &self.queue {
            let event = Event::new(
                EventType::ScheduledAction,
                EventPayload::PlannedAction {
                    action_id: action.id,
                    label: action.label.clone(),
                },
                SCHEDULER_SOURCE,
            );
            if !queue.offer(event) {
                warn!(action_id = %action.id, "event queue full, scheduled action not announced");
            }
        }

        let (outcome, step_outputs) = if action.is_simple_reminder() {
            let error = self
                .notifier
                .notify(&action, &action.label)
                .await
                .err()
                .map(|e| {
                    warn!(action_id = %action.id, error = %e, "reminder delivery failed");
                    e.to_string()
                });
            (RunOutcome::Reminded { error }, BTreeMap::new())
        } else {
            self.run_plan(&action).await
        };

        let record = ExecutionRecord {
            run_id: Uuid::new_v4(),
            action_id: action.id,
            started_at,
            finished_at: Utc::now(),
            outcome,
            step_outputs,
        };

        let snapshot = {
            let mut actions = self.actions.write().await;
            actions.get_mut(&action.id).map(|entry| {
                entry.record_run(record.clone(), self.config.history_limit);
                // Pause or cancel issued during the run wins.
                if entry.status == ActionStatus::Active {
                    match &entry.trigger {
                        ActionTrigger::At(_) => entry.status = ActionStatus::Done,
                        ActionTrigger::Cron(expr) => {
                            let next = CronExpression::parse(expr)
                                .ok()
                                .and_then(|cron| cron.next_after(now));
                            if next.is_none() {
                                warn!(
                                    action_id = %entry.id,
                                    expression = %expr,
                                    "habit has no further occurrence, marking done"
                                );
                                entry.status = ActionStatus::Done;
                            }
                            entry.next_run = next;
                        }
                    }
                }
                entry.clone()
            })
        };

        match snapshot {
            Some(entry) => {
                debug!(
                    action_id = %entry.id,
                    status = ?entry.status,
                    next_run = ?entry.next_run,
                    summary = %record.summary(),
                    "run recorded"
                );
                self.persist(&entry).await;
            }
            None => warn!(action_id = %action.id, "action vanished while running"),
        }
        record
    }

    async fn run_plan(
        &self,
        action: &PlannedActionEntry,
    ) -> (RunOutcome, BTreeMap<String, serde_json::Value>) {
        self.feedback
            .emit(FeedbackEvent::new(FeedbackKind::LongtaskStart).with_detail(action.label.clone()));

        let run = self.executor.execute(action).await;

        if !run.outcome.is_success() {
            self.feedback
                .emit(FeedbackEvent::new(FeedbackKind::Failure).with_detail(action.label.clone()));
        }
        self.feedback
            .emit(FeedbackEvent::new(FeedbackKind::LongtaskEnd).with_detail(action.label.clone()));

        if let RunOutcome::Completed { output } = &run.outcome {
            let message = match output {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => action.label.clone(),
                other => other.to_string(),
            };
            if let Err(e) = self.notifier.notify(action, &message).await {
                warn!(action_id = %action.id, error = %e, "plan result delivery failed");
            }
        }

        (run.outcome, run.step_outputs)
    }

    async fn persist(&self, action: &PlannedActionEntry) {
        let Some(store) = &self.store else {
            return;
        };
        match tokio::time::timeout(self.persist_timeout, store.save(action)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(action_id = %action.id, error = %e, "failed to persist planned action"),
            Err(_) => warn!(
                action_id = %action.id,
                timeout_ms = self.persist_timeout.as_millis() as u64,
                "persisting planned action timed out"
            ),
        }
    }

    /// Evaluate triggers every `tick` until shutdown
    pub async fn run_periodically(&self, tick: Duration, mut shutdown: ShutdownReceiver) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(tick_ms = tick.as_millis() as u64, "scheduled action engine started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.evaluate(Utc::now()).await;
                }
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
        info!("scheduled action engine stopped");
    }
}

fn due_time(action: &PlannedActionEntry) -> Option<DateTime<Utc>> {
    match &action.trigger {
        ActionTrigger::At(at) => Some(*at),
        ActionTrigger::Cron(_) => action.next_run,
    }
}

fn is_due(action: &PlannedActionEntry, now: DateTime<Utc>) -> bool {
    action.status == ActionStatus::Active && due_time(action).map_or(false, |t| t <= now)
}

impl std::fmt::Debug for ScheduledActionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledActionEngine")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .field("store", &self.store.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tests::RecordingTools;
    use anima_core::{shutdown_channel, FeedbackHandler, ReWooPlan, ReWooStep, ShutdownSignal};
    use async_trait::async_trait;
    use chrono::{Datelike, Duration as ChronoDuration};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingNotifier {
        messages: std::sync::Mutex<Vec<(Uuid, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReminderNotifier for RecordingNotifier {
        async fn notify(&self, action: &PlannedActionEntry, message: &str) -> Result<()> {
            self.messages
                .lock()
                .unwrap()
                .push((action.id, message.to_string()));
            if self.fail {
                return Err(AnimaError::other("speaker offline"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingFeedback {
        kinds: std::sync::Mutex<Vec<FeedbackKind>>,
    }

    impl FeedbackHandler for RecordingFeedback {
        fn handle_feedback(&self, event: FeedbackEvent) -> Result<()> {
            self.kinds.lock().unwrap().push(event.kind);
            Ok(())
        }
    }

    struct SlowStore {
        delay: Duration,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl PlannedActionStore for SlowStore {
        async fn save(&self, _action: &PlannedActionEntry) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    struct Harness {
        engine: ScheduledActionEngine,
        tools: Arc<RecordingTools>,
        notifier: Arc<RecordingNotifier>,
        feedback: Arc<RecordingFeedback>,
    }

    fn harness() -> Harness {
        let tools = Arc::new(RecordingTools::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let feedback = Arc::new(RecordingFeedback::default());
        let engine = ScheduledActionEngine::new(
            tools.clone(),
            notifier.clone(),
            SchedulerConfig::default(),
        )
        .with_feedback(FeedbackDispatcher::new(feedback.clone()));
        Harness {
            engine,
            tools,
            notifier,
            feedback,
        }
    }

    #[tokio::test]
    async fn test_one_shot_reminder_fires_once() {
        let h = harness();
        let at = Utc::now();
        let id = h
            .engine
            .schedule(PlannedActionEntry::one_shot("drink water", at))
            .await
            .unwrap();

        assert!(h.engine.evaluate(at - ChronoDuration::minutes(1)).await.is_empty());

        let records = h.engine.evaluate(at).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, RunOutcome::Reminded { error: None });

        let action = h.engine.get(id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Done);
        assert_eq!(action.execution_count, 1);
        assert_eq!(
            *h.notifier.messages.lock().unwrap(),
            vec![(id, "drink water".to_string())]
        );

        assert!(h.engine.evaluate(at + ChronoDuration::hours(1)).await.is_empty());
        // Simple reminders run no tools and send no long-task feedback.
        assert!(h.tools.tool_names().is_empty());
        assert!(h.feedback.kinds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_recorded() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let engine = ScheduledActionEngine::new(
            Arc::new(RecordingTools::default()),
            notifier,
            SchedulerConfig::default(),
        );
        let at = Utc::now();
        let id = engine
            .schedule(PlannedActionEntry::one_shot("stand up", at))
            .await
            .unwrap();

        let records = engine.evaluate(at).await;
        assert!(matches!(
            records[0].outcome,
            RunOutcome::Reminded { error: Some(_) }
        ));
        assert_eq!(engine.get(id).await.unwrap().status, ActionStatus::Done);
    }

    #[tokio::test]
    async fn test_habit_rearms_and_history_is_bounded() {
        let h = harness();
        let id = h
            .engine
            .schedule(PlannedActionEntry::habit("stretch", "* * * * *"))
            .await
            .unwrap();

        for _ in 0..25 {
            let next = h.engine.get(id).await.unwrap().next_run.unwrap();
            assert_eq!(h.engine.evaluate(next).await.len(), 1);
            let after = h.engine.get(id).await.unwrap().next_run.unwrap();
            assert_eq!(after, next + ChronoDuration::minutes(1));
        }

        let action = h.engine.get(id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Active);
        assert_eq!(action.execution_count, 25);
        assert_eq!(action.history.len(), 20);
    }

    #[tokio::test]
    async fn test_plan_passes_variables_and_notifies_result() {
        let h = harness();
        let at = Utc::now();
        let plan = ReWooPlan::new(vec![
            ReWooStep::new(1, "weather", "E1").with_param("city", "Porto"),
            ReWooStep::new(2, "compose", "E2").with_param("forecast", "#E1"),
        ]);
        let id = h
            .engine
            .schedule(PlannedActionEntry::one_shot("forecast", at).with_plan(plan))
            .await
            .unwrap();

        let records = h.engine.evaluate(at).await;
        assert!(records[0].outcome.is_success());
        assert_eq!(records[0].step_outputs.len(), 2);

        let calls = h.tools.calls.lock().unwrap().clone();
        assert_eq!(calls[1].1["forecast"], json!({"sky": "clear", "temp": 21}));

        assert_eq!(
            *h.feedback.kinds.lock().unwrap(),
            vec![FeedbackKind::LongtaskStart, FeedbackKind::LongtaskEnd]
        );
        let messages = h.notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, id);
        assert_eq!(
            messages[0].1,
            json!({"forecast": {"sky": "clear", "temp": 21}}).to_string()
        );
    }

    #[tokio::test]
    async fn test_plan_failure_aborts_and_signals_failure() {
        let h = harness();
        let at = Utc::now();
        let plan = ReWooPlan::new(vec![
            ReWooStep::new(1, "weather", "E1"),
            ReWooStep::new(2, "broken", "E2"),
            ReWooStep::new(3, "compose", "E3"),
        ]);
        let id = h
            .engine
            .schedule(PlannedActionEntry::one_shot("brief", at).with_plan(plan))
            .await
            .unwrap();

        let records = h.engine.evaluate(at).await;
        assert!(matches!(
            records[0].outcome,
            RunOutcome::Failed { step_id: 2, .. }
        ));
        assert_eq!(h.tools.tool_names(), vec!["weather", "broken"]);
        assert_eq!(
            *h.feedback.kinds.lock().unwrap(),
            vec![
                FeedbackKind::LongtaskStart,
                FeedbackKind::Failure,
                FeedbackKind::LongtaskEnd
            ]
        );
        assert!(h.notifier.messages.lock().unwrap().is_empty());

        let action = h.engine.get(id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Done);
        assert_eq!(
            action.last_execution_result().unwrap().summary(),
            "step 2 (broken) failed: Tool error: service unavailable"
        );
    }

    #[tokio::test]
    async fn test_pause_resume_cancel() {
        let h = harness();
        let id = h
            .engine
            .schedule(PlannedActionEntry::habit("journal", "*/5 * * * *"))
            .await
            .unwrap();
        let next = h.engine.get(id).await.unwrap().next_run.unwrap();

        h.engine.pause(id).await.unwrap();
        assert!(h.engine.evaluate(next).await.is_empty());

        h.engine.resume(id).await.unwrap();
        let resumed = h.engine.get(id).await.unwrap();
        assert_eq!(resumed.status, ActionStatus::Active);
        assert!(resumed.next_run.unwrap() > Utc::now());

        assert!(matches!(
            h.engine.resume(id).await,
            Err(AnimaError::Validation(_))
        ));

        h.engine.cancel(id).await.unwrap();
        let cancelled = h.engine.get(id).await.unwrap();
        assert_eq!(cancelled.status, ActionStatus::Cancelled);
        assert!(h.engine.evaluate(next + ChronoDuration::days(1)).await.is_empty());
        assert!(matches!(
            h.engine.pause(id).await,
            Err(AnimaError::Validation(_))
        ));

        assert!(matches!(
            h.engine.cancel(Uuid::new_v4()).await,
            Err(AnimaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_schedule_validation() {
        let h = harness();
        let now = Utc::now();

        for bad in [
            PlannedActionEntry::one_shot("  ", now),
            PlannedActionEntry::habit("bad cron", "61 * * * *"),
            PlannedActionEntry::habit("never", "0 0 31 2 *"),
        ] {
            assert!(matches!(
                h.engine.schedule(bad).await,
                Err(AnimaError::Validation(_))
            ));
        }

        let leap = h
            .engine
            .schedule(PlannedActionEntry::habit("leap day", "0 9 29 2 *"))
            .await
            .unwrap();
        let next = h.engine.get(leap).await.unwrap().next_run.unwrap();
        assert_eq!((next.month(), next.day()), (2, 29));
        h.engine.cancel(leap).await.unwrap();

        let mut mismatched = PlannedActionEntry::habit("mixed", "0 9 * * *");
        mismatched.action_type = ActionType::OneShot;
        assert!(h.engine.schedule(mismatched).await.is_err());

        let action = PlannedActionEntry::one_shot("once", now);
        h.engine.schedule(action.clone()).await.unwrap();
        assert!(h.engine.schedule(action).await.is_err());
        assert_eq!(h.engine.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_habit_without_further_occurrence_is_done() {
        let h = harness();
        let id = h
            .engine
            .schedule(PlannedActionEntry::habit("stretch", "0 9 * * *"))
            .await
            .unwrap();
        let due = h.engine.get(id).await.unwrap().next_run.unwrap();

        // Trigger rewritten behind the engine's back to a date that never comes.
        h.engine
            .actions
            .write()
            .await
            .get_mut(&id)
            .unwrap()
            .trigger = ActionTrigger::Cron("0 0 31 2 *".to_string());

        assert_eq!(h.engine.evaluate(due).await.len(), 1);
        let action = h.engine.get(id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Done);
        assert_eq!(action.next_run, None);
        assert_eq!(action.execution_count, 1);
        assert!(h.engine.evaluate(due + ChronoDuration::days(400)).await.is_empty());
    }

    #[tokio::test]
    async fn test_fired_action_is_announced_on_queue() {
        let queue = Arc::new(EventQueue::new(8));
        let engine = ScheduledActionEngine::new(
            Arc::new(RecordingTools::default()),
            Arc::new(RecordingNotifier::default()),
            SchedulerConfig::default(),
        )
        .with_queue(queue.clone());
        let at = Utc::now();
        let id = engine
            .schedule(PlannedActionEntry::one_shot("call mom", at))
            .await
            .unwrap();

        engine.evaluate(at).await;

        let event = queue.try_take().unwrap();
        assert_eq!(event.event_type(), EventType::ScheduledAction);
        assert_eq!(event.source(), SCHEDULER_SOURCE);
        assert_eq!(
            *event.payload(),
            EventPayload::PlannedAction {
                action_id: id,
                label: "call mom".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_slow_store_does_not_block_evaluation() {
        let store = Arc::new(SlowStore {
            delay: Duration::from_secs(30),
            saves: AtomicUsize::new(0),
        });
        let mut engine = ScheduledActionEngine::new(
            Arc::new(RecordingTools::default()),
            Arc::new(RecordingNotifier::default()),
            SchedulerConfig::default(),
        )
        .with_store(store.clone());
        engine.persist_timeout = Duration::from_millis(20);

        let at = Utc::now();
        engine
            .schedule(PlannedActionEntry::one_shot("water plants", at))
            .await
            .unwrap();

        let records = tokio::time::timeout(Duration::from_secs(5), engine.evaluate(at))
            .await
            .expect("evaluation stalled on persistence");
        assert_eq!(records.len(), 1);
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_periodic_driver_stops_on_shutdown() {
        let engine = Arc::new(harness().engine);
        let (tx, rx) = shutdown_channel();

        let driver = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .run_periodically(Duration::from_millis(10), rx)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(ShutdownSignal::Graceful).unwrap();
        tokio::time::timeout(Duration::from_secs(1), driver)
            .await
            .unwrap()
            .unwrap();
    }
}

//! Composition root
//!
//! [`AnimaRuntime`] builds every component from an [`AnimaConfig`] and the
//! collaborators handed to it, and owns the background tasks: the consumer
//! pool, the initiative promoter and the scheduled action engine. All of
//! them stop on one shutdown broadcast.
//!
//! Producers always offer to the in-memory [`EventQueue`]. With
//! `durable.enabled` the runtime is built through [`AnimaRuntime::connect`]:
//! a forwarder moves every offered event into the [`DurableEventQueue`] and
//! the consumers drain that instead. `stop` persists whatever is still in
//! memory, so undelivered events outlive the process.

use anima_core::{
    shutdown_channel, AnimaConfig, AnimaError, ConsumerPool, ConsumerStats, ConversationTurn,
    DesireFormation, DesireStore, DurableEventQueue, Event, EventHandler, EventPayload, EventQueue,
    EventSource, EventType, FeedbackDispatcher,
    FeedbackEvent, FeedbackHandler, FeedbackKind, MemoryFormation, MoodPayload, OpinionFormation,
    PlannedActionStore, ReminderNotifier, Result, ResultSynthesizer, Service, ShutdownReceiver,
    ShutdownSender, ShutdownSignal, ToolExecutor, ValueProfile,
};
use anima_plugin_lifeengine::{
    DesireThresholdEngine, InitiativePromoter, PipelineOrchestrator, SessionState, TurnReport,
};
use anima_plugin_scheduler::ScheduledActionEngine;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Event source name used by the runtime itself
pub const RUNTIME_SOURCE: &str = "anima_runtime";

/// Everything the runtime drives but does not own
pub struct RuntimeOpts {
    /// Settings for every component
    pub config: AnimaConfig,
    /// Memory formation
    pub memory: Arc<dyn MemoryFormation>,
    /// Opinion formation
    pub opinions: Arc<dyn OpinionFormation>,
    /// Desire text formation
    pub desire_formation: Arc<dyn DesireFormation>,
    /// Value-system weights
    pub values: Arc<dyn ValueProfile>,
    /// Desire persistence
    pub desires: Arc<dyn DesireStore>,
    /// Plan step tools
    pub tools: Arc<dyn ToolExecutor>,
    /// Reminder and plan result delivery
    pub notifier: Arc<dyn ReminderNotifier>,
    /// Output side; feedback is dropped without one
    pub feedback: Option<Arc<dyn FeedbackHandler>>,
    /// Final answers for plans with a synthesis template
    pub synthesizer: Option<Arc<dyn ResultSynthesizer>>,
    /// Planned action persistence
    pub action_store: Option<Arc<dyn PlannedActionStore>>,
    /// Receives every event the consumers take off the queue
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

/// Handler the consumer pool dispatches to
///
/// Initiatives are bracketed by `INITIATIVE_START`/`INITIATIVE_END`
/// feedback; everything else goes straight to the downstream handler.
struct RuntimeEventHandler {
    feedback: FeedbackDispatcher,
    downstream: Option<Arc<dyn EventHandler>>,
}

impl RuntimeEventHandler {
    async fn forward(&self, event: Event) -> Result<()> {
        match &self.downstream {
            Some(handler) => handler.handle(event).await,
            None => {
                debug!(event_id = %event.id(), event_type = %event.event_type(), "no handler for event");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventHandler for RuntimeEventHandler {
    async fn handle(&self, event: Event) -> Result<()> {
        if event.event_type() != EventType::Initiative {
            return self.forward(event).await;
        }

        let label = match event.payload() {
            EventPayload::Desire(desire) => desire.label.clone(),
            _ => String::new(),
        };
        self.feedback
            .emit(FeedbackEvent::new(FeedbackKind::InitiativeStart).with_detail(label.clone()));
        let result = self.forward(event).await;
        if result.is_err() {
            self.feedback
                .emit(FeedbackEvent::new(FeedbackKind::Failure).with_detail(label.clone()));
        }
        self.feedback
            .emit(FeedbackEvent::new(FeedbackKind::InitiativeEnd).with_detail(label));
        result
    }
}

/// The assembled cognition pipeline
pub struct AnimaRuntime {
    config: AnimaConfig,
    queue: Arc<EventQueue>,
    durable: Option<Arc<DurableEventQueue>>,
    orchestrator: PipelineOrchestrator,
    desire_engine: Arc<DesireThresholdEngine>,
    promoter: InitiativePromoter,
    scheduler: Arc<ScheduledActionEngine>,
    consumers: ConsumerPool,
    feedback: FeedbackDispatcher,
    shutdown: ShutdownSender,
    drivers: Vec<JoinHandle<()>>,
}

impl AnimaRuntime {
    /// Validate the configuration and wire every component around the
    /// in-memory queue
    ///
    /// A configuration with `durable.enabled` is rejected; use
    /// [`connect`](Self::connect) for it.
    pub fn new(opts: RuntimeOpts) -> Result<Self> {
        opts.config.validate()?;
        if opts.config.durable.enabled {
            return Err(AnimaError::config(
                "durable queue enabled, build the runtime with AnimaRuntime::connect",
            ));
        }
        Self::assemble(opts, None)
    }

    /// Like [`new`](Self::new), but opens the durable queue first when the
    /// configuration enables it
    pub async fn connect(opts: RuntimeOpts) -> Result<Self> {
        opts.config.validate()?;
        let durable = if opts.config.durable.enabled {
            Some(Arc::new(DurableEventQueue::connect(&opts.config.durable).await?))
        } else {
            None
        };
        Self::assemble(opts, durable)
    }

    fn assemble(opts: RuntimeOpts, durable: Option<Arc<DurableEventQueue>>) -> Result<Self> {
        let config = opts.config;

        let feedback = opts
            .feedback
            .map(FeedbackDispatcher::new)
            .unwrap_or_else(FeedbackDispatcher::disabled);
        let queue = Arc::new(EventQueue::new(config.queue.capacity));
        let (shutdown, _) = shutdown_channel();

        let desire_engine = Arc::new(DesireThresholdEngine::new(
            opts.desire_formation,
            opts.values,
            opts.desires.clone(),
            config.desire.clone(),
        ));
        let orchestrator = PipelineOrchestrator::new(
            opts.memory,
            opts.opinions,
            desire_engine.clone(),
            config.pipeline.clone(),
        );
        let promoter =
            InitiativePromoter::new(opts.desires, queue.clone(), config.initiative.clone());

        let mut scheduler =
            ScheduledActionEngine::new(opts.tools, opts.notifier, config.scheduler.clone())
                .with_feedback(feedback.clone())
                .with_queue(queue.clone());
        if let Some(synthesizer) = opts.synthesizer {
            scheduler = scheduler.with_synthesizer(synthesizer);
        }
        if let Some(store) = opts.action_store {
            scheduler = scheduler.with_store(store);
        }

        let handler = Arc::new(RuntimeEventHandler {
            feedback: feedback.clone(),
            downstream: opts.event_handler,
        });
        let source: Arc<dyn EventSource> = match &durable {
            Some(durable) => durable.clone(),
            None => queue.clone(),
        };
        let consumers = ConsumerPool::new(source, handler, config.consumers.consumer_count)
            .with_shutdown(shutdown.clone());

        info!(
            queue_capacity = config.queue.capacity,
            consumers = config.consumers.consumer_count,
            durable = durable.is_some(),
            "anima runtime assembled"
        );

        Ok(Self {
            config,
            queue,
            durable,
            orchestrator,
            desire_engine,
            promoter,
            scheduler: Arc::new(scheduler),
            consumers,
            feedback,
            shutdown,
            drivers: Vec::new(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &AnimaConfig {
        &self.config
    }

    /// Queue every producer offers to
    pub fn queue(&self) -> Arc<EventQueue> {
        self.queue.clone()
    }

    /// Durable queue the consumers drain, when enabled
    pub fn durable_queue(&self) -> Option<Arc<DurableEventQueue>> {
        self.durable.clone()
    }

    /// Turn orchestrator
    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.orchestrator
    }

    /// Desire threshold engine
    pub fn desire_engine(&self) -> Arc<DesireThresholdEngine> {
        self.desire_engine.clone()
    }

    /// Initiative promoter
    pub fn promoter(&self) -> &InitiativePromoter {
        &self.promoter
    }

    /// Planned action scheduler
    pub fn scheduler(&self) -> Arc<ScheduledActionEngine> {
        self.scheduler.clone()
    }

    /// Consumer pool counters
    pub fn consumer_stats(&self) -> Arc<ConsumerStats> {
        self.consumers.stats()
    }

    /// Run one turn and announce a mood change on the queue
    pub async fn process_turn(
        &self,
        session: &mut SessionState,
        turn: ConversationTurn,
    ) -> Result<TurnReport> {
        self.feedback.emit_kind(FeedbackKind::Start);
        let report = self.orchestrator.run_turn(session, turn).await?;

        if report.mood_changed() {
            let event = Event::new(
                EventType::MoodChanged,
                EventPayload::Mood(MoodPayload {
                    session_id: report.session_id,
                    previous: report.mood_before.name().to_string(),
                    current: report.mood_after.name().to_string(),
                }),
                RUNTIME_SOURCE,
            );
            if !self.queue.offer(event) {
                warn!(session_id = %report.session_id, "event queue full, mood change not announced");
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl Service for AnimaRuntime {
    fn service_type(&self) -> &str {
        "anima_runtime"
    }

    async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.consumers.start().await?;

        if let Some(durable) = &self.durable {
            let queue = self.queue.clone();
            let durable = durable.clone();
            let rx = self.shutdown.subscribe();
            self.drivers.push(tokio::spawn(forward_to_durable(queue, durable, rx)));
        }

        let promoter = self.promoter.clone();
        let interval = self.config.initiative.interval();
        let rx = self.shutdown.subscribe();
        self.drivers.push(tokio::spawn(async move {
            promoter.run_periodically(interval, rx).await
        }));

        let scheduler = self.scheduler.clone();
        let tick = self.config.scheduler.tick();
        let rx = self.shutdown.subscribe();
        self.drivers.push(tokio::spawn(async move {
            scheduler.run_periodically(tick, rx).await
        }));

        info!("anima runtime started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let _ = self.shutdown.send(ShutdownSignal::Graceful);
        for handle in self.drivers.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "periodic driver ended abnormally");
            }
        }
        self.consumers.stop().await?;
        if let Some(durable) = &self.durable {
            let flushed = flush(&self.queue, durable).await;
            if flushed > 0 {
                info!(flushed, "pending events persisted to durable queue");
            }
        }
        info!("anima runtime stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.consumers.is_running() || self.drivers.iter().any(|h| !h.is_finished())
    }
}

/// Move offered events into the durable queue until shutdown, then flush
/// what is left
async fn forward_to_durable(
    queue: Arc<EventQueue>,
    durable: Arc<DurableEventQueue>,
    mut shutdown: ShutdownReceiver,
) {
    debug!("durable forwarder started");
    while let Ok(event) = queue.take_until(&mut shutdown).await {
        persist(&durable, &event).await;
    }
    let flushed = flush(&queue, &durable).await;
    debug!(flushed, "durable forwarder stopped");
}

/// Persist everything currently in the in-memory queue
async fn flush(queue: &EventQueue, durable: &DurableEventQueue) -> usize {
    let mut flushed = 0;
    while let Some(event) = queue.try_take() {
        persist(durable, &event).await;
        flushed += 1;
    }
    flushed
}

async fn persist(durable: &DurableEventQueue, event: &Event) {
    if let Err(e) = durable.offer(event).await {
        error!(event_id = %event.id(), event_type = %event.event_type(), error = %e, "failed to persist event");
    }
}

impl std::fmt::Debug for AnimaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimaRuntime")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .field("durable", &self.durable.is_some())
            .field("drivers", &self.drivers.len())
            .finish()
    }
}

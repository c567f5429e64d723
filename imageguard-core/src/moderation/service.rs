//! Concurrent event dispatch.
//!
//! Events arrive on a bounded channel. Each one is handled on its own task,
//! with at most `workers` in flight. Closing the channel drains in-flight
//! work before the service reports its totals.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use super::chat::{ChatEvent, ChatMessage};
use super::context::GuardContext;
use super::curation::{is_block_command, CurationHandler, CurationOutcome};
use super::pipeline::{ModerationDecision, ModerationPipeline};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Sizing for [`ModerationService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Authored by the bot itself.
    Ignored,
    Moderated(ModerationDecision),
    Curated(Vec<CurationOutcome>),
}

/// Routes a message to the curation command or the moderation pipeline.
#[derive(Clone)]
pub struct EventRouter {
    bot_user_id: Option<String>,
    pipeline: ModerationPipeline,
    curation: CurationHandler,
}

impl EventRouter {
    pub fn new(ctx: GuardContext) -> Self {
        Self {
            bot_user_id: ctx.bot_user_id.clone(),
            curation: CurationHandler::new(ctx.clone()),
            pipeline: ModerationPipeline::new(ctx),
        }
    }

    pub async fn handle(&self, event: ChatEvent) -> EventOutcome {
        match event {
            ChatEvent::MessageCreated(message) => self.handle_message(&message).await,
        }
    }

    pub async fn handle_message(&self, message: &ChatMessage) -> EventOutcome {
        if self.bot_user_id.as_deref() == Some(message.author_id.as_str()) {
            debug!(message_id = %message.id, "Ignoring own message");
            return EventOutcome::Ignored;
        }

        if is_block_command(&message.content) {
            EventOutcome::Curated(self.curation.handle(message).await)
        } else {
            EventOutcome::Moderated(self.pipeline.process(message).await)
        }
    }
}

/// Totals reported when the service stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub processed: u64,
    pub blocked: u64,
    pub curated: u64,
    pub ignored: u64,
    /// Handler tasks that panicked.
    pub failed: u64,
}

impl ServiceStats {
    fn record(&mut self, outcome: &EventOutcome) {
        self.processed += 1;
        match outcome {
            EventOutcome::Ignored => self.ignored += 1,
            EventOutcome::Moderated(decision) if decision.is_blocked() => self.blocked += 1,
            EventOutcome::Moderated(_) => {}
            EventOutcome::Curated(_) => self.curated += 1,
        }
    }
}

/// Bounded worker pool over an [`EventRouter`].
pub struct ModerationService;

impl ModerationService {
    /// Start the dispatcher. Drop every sender to shut it down.
    pub fn spawn(
        ctx: GuardContext,
        config: ServiceConfig,
    ) -> (mpsc::Sender<ChatEvent>, JoinHandle<ServiceStats>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let router = EventRouter::new(ctx);
        let handle = tokio::spawn(dispatch(router, rx, config.workers.max(1)));
        (tx, handle)
    }
}

async fn dispatch(
    router: EventRouter,
    mut rx: mpsc::Receiver<ChatEvent>,
    workers: usize,
) -> ServiceStats {
    info!(workers, "Moderation service started");
    let permits = Arc::new(Semaphore::new(workers));
    let mut tasks: JoinSet<EventOutcome> = JoinSet::new();
    let mut stats = ServiceStats::default();

    while let Some(event) = rx.recv().await {
        while let Some(joined) = tasks.try_join_next() {
            reap(&mut stats, joined);
        }

        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let router = router.clone();
        tasks.spawn(async move {
            let _permit = permit;
            router.handle(event).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        reap(&mut stats, joined);
    }

    info!(
        processed = stats.processed,
        blocked = stats.blocked,
        curated = stats.curated,
        ignored = stats.ignored,
        failed = stats.failed,
        "Moderation service stopped"
    );
    stats
}

fn reap(stats: &mut ServiceStats, joined: Result<EventOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => stats.record(&outcome),
        Err(e) => {
            error!(error = %e, "Event handler task failed");
            stats.failed += 1;
        }
    }
}

//! The claim → execute → complete loop.

use super::hooks::{StopHandle, WorkerHooks};
use super::source::{ClaimedTask, WorkSource};
use crate::context::WorkDir;
use crate::error::{QueueError, Result, TaskError};
use crate::events::{self, Event, EventAction};
use crate::identity::{WorkerId, WorkerIdentity};
use crate::starvation::StarvationMonitor;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

/// Counters for one [`Coordinator::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks executed and marked complete.
    pub completed: usize,
    /// Tasks taken over from dead workers.
    pub stolen: usize,
    /// Backoff episodes.
    pub waits: usize,
}

/// One worker: an identity plus the settings of its claim loop.
#[derive(Debug)]
pub struct Coordinator {
    work: WorkDir,
    identity: WorkerIdentity,
    batch_size: usize,
    backoff: Duration,
    starvation_timeout: Duration,
    stop: StopHandle,
}

impl Coordinator {
    /// Obtain a fresh worker identity in `work` and take its lock file.
    ///
    /// Batch size, backoff and starvation timeout come from the work
    /// directory's config.
    pub fn start(work: &WorkDir) -> Result<Self> {
        let identity = WorkerIdentity::acquire(&work.id_path(), &work.locks_dir(), work.format)?;
        let id = identity.id();

        tracing::info!(worker = %id, root = %work.root.display(), "worker started");
        events::record(work, Event::new(EventAction::WorkerStart).with_worker(id));

        Ok(Self {
            work: work.clone(),
            identity,
            batch_size: work.config.num_tasks,
            backoff: work.config.wait(),
            starvation_timeout: work.config.starvation_timeout(),
            stop: StopHandle::new(),
        })
    }

    pub fn id(&self) -> WorkerId {
        self.identity.id()
    }

    /// Tasks claimed per round (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_starvation_timeout(mut self, timeout: Duration) -> Self {
        self.starvation_timeout = timeout;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Give up the identity, as a crashed worker would: the lock is released
    /// but the lock file stays behind.
    pub fn abandon(self) {
        self.identity.abandon();
    }

    /// Run until `source` is exhausted, the stop handle fires, or an error
    /// occurs.
    ///
    /// `task` runs once per claimed task, in claim order. If it fails the
    /// task stays claimed by this worker and the error is returned as
    /// [`QueueError::TaskFailed`]. Tasks run during this call are never run
    /// again by it.
    pub fn run<S, H, F>(&mut self, source: &mut S, hooks: &mut H, mut task: F) -> Result<RunSummary>
    where
        S: WorkSource,
        H: WorkerHooks,
        F: FnMut(&ClaimedTask<S::Key, S::Payload>) -> std::result::Result<(), TaskError>,
    {
        let id = self.id();
        hooks.begin(id);

        let monitor = StarvationMonitor::spawn(self.starvation_timeout, {
            let work = self.work.clone();
            move |amount| {
                tracing::warn!(worker = %id, amount, "worker starved waiting for busy peers");
                events::record(
                    &work,
                    Event::new(EventAction::Starved)
                        .with_worker(id)
                        .with_details(json!({ "amount": amount })),
                );
            }
        })?;

        let mut summary = RunSummary::default();
        let result = self.drive(source, hooks, &monitor, &mut task, &mut summary);
        monitor.end();

        let outcome = match &result {
            Ok(()) => {
                hooks.end(id);
                "exhausted".to_string()
            }
            Err(e) => e.to_string(),
        };
        tracing::info!(
            worker = %id,
            completed = summary.completed,
            stolen = summary.stolen,
            outcome = %outcome,
            "worker exiting"
        );
        events::record(
            &self.work,
            Event::new(EventAction::WorkerExit)
                .with_worker(id)
                .with_details(json!({
                    "completed": summary.completed,
                    "stolen": summary.stolen,
                    "waits": summary.waits,
                    "outcome": outcome,
                })),
        );

        result.map(|()| summary)
    }

    fn drive<S, H, F>(
        &self,
        source: &mut S,
        hooks: &mut H,
        monitor: &StarvationMonitor,
        task: &mut F,
        summary: &mut RunSummary,
    ) -> Result<()>
    where
        S: WorkSource,
        H: WorkerHooks,
        F: FnMut(&ClaimedTask<S::Key, S::Payload>) -> std::result::Result<(), TaskError>,
    {
        let id = self.id();
        let mut seen: HashSet<S::Key> = HashSet::new();

        loop {
            self.check_stop()?;

            let batch = source.claim(id, self.batch_size, &seen)?;
            if batch.is_exhausted() {
                return Ok(());
            }

            if batch.must_wait() {
                let busy: Vec<WorkerId> = batch.busy.iter().copied().collect();
                tracing::debug!(worker = %id, ?busy, "all remaining work is held by live peers");
                events::record(
                    &self.work,
                    Event::new(EventAction::Wait)
                        .with_worker(id)
                        .with_details(json!({ "busy": busy })),
                );
                summary.waits += 1;

                let _watch = monitor.watch();
                hooks.wait(id, self.backoff, &self.stop);
                continue;
            }

            self.journal_claims(&batch.tasks);
            summary.stolen += batch.stolen();

            for claimed in &batch.tasks {
                self.check_stop()?;
                seen.insert(claimed.key);

                tracing::debug!(worker = %id, task = %claimed.key, "running task");
                task(claimed).map_err(|err| QueueError::TaskFailed {
                    task: claimed.key.to_string(),
                    source: err,
                })?;

                source.complete(id, claimed.key)?;
                summary.completed += 1;
                events::record(
                    &self.work,
                    Event::new(EventAction::Complete)
                        .with_worker(id)
                        .with_details(json!({ "task": claimed.key.to_string() })),
                );
            }
        }
    }

    fn journal_claims<K: std::fmt::Display, P>(&self, tasks: &[ClaimedTask<K, P>]) {
        let id = self.id();
        let claimed: Vec<String> = tasks
            .iter()
            .filter(|t| t.stolen_from.is_none())
            .map(|t| t.key.to_string())
            .collect();
        if !claimed.is_empty() {
            tracing::info!(worker = %id, tasks = ?claimed, "claimed tasks");
            events::record(
                &self.work,
                Event::new(EventAction::Claim)
                    .with_worker(id)
                    .with_details(json!({ "tasks": claimed })),
            );
        }

        for stolen in tasks.iter() {
            let Some(owner) = stolen.stolen_from else {
                continue;
            };
            tracing::info!(worker = %id, task = %stolen.key, owner = %owner, "stole task from dead worker");
            events::record(
                &self.work,
                Event::new(EventAction::Steal)
                    .with_worker(id)
                    .with_details(json!({ "task": stolen.key.to_string(), "from": owner })),
            );
        }
    }

    fn check_stop(&self) -> Result<()> {
        if self.stop.is_stopped() {
            return Err(QueueError::Interrupted);
        }
        Ok(())
    }
}

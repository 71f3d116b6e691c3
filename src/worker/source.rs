//! Work sources: where a coordinator claims tasks from.

use crate::context::WorkDir;
use crate::error::{QueueError, Result};
use crate::identity::{Liveness, WorkerId, probe_liveness, worker_lock_path};
use crate::record_log;
use crate::status::{ScanKind, SlotState, StatusTable};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// A task this worker now owns.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedTask<K, P> {
    pub key: K,
    pub payload: P,
    /// Previous owner, when the task was taken over from a dead worker.
    pub stolen_from: Option<WorkerId>,
}

/// Result of one claim round.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimBatch<K, P> {
    pub tasks: Vec<ClaimedTask<K, P>>,
    /// Live peers holding tasks this worker could not take.
    pub busy: BTreeSet<WorkerId>,
}

impl<K, P> Default for ClaimBatch<K, P> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            busy: BTreeSet::new(),
        }
    }
}

impl<K, P> ClaimBatch<K, P> {
    /// Nothing claimed and nobody else holds anything: the queue is done.
    pub fn is_exhausted(&self) -> bool {
        self.tasks.is_empty() && self.busy.is_empty()
    }

    /// Nothing claimed, but live peers still hold work.
    pub fn must_wait(&self) -> bool {
        self.tasks.is_empty() && !self.busy.is_empty()
    }

    pub fn stolen(&self) -> usize {
        self.tasks.iter().filter(|t| t.stolen_from.is_some()).count()
    }
}

/// Storage substrate a coordinator claims from and completes into.
pub trait WorkSource {
    /// Stable task identifier, tracked in the coordinator's seen-set.
    type Key: Copy + Eq + Hash + fmt::Debug + fmt::Display;
    type Payload;

    /// Claim up to `limit` tasks for `worker`.
    ///
    /// Free tasks come first. If that is not enough, claimed tasks are
    /// walked: tasks already owned by `worker` are handed back unless their
    /// key is in `seen`; tasks of a dead owner are stolen; tasks of a live
    /// owner mark that owner busy.
    fn claim(
        &mut self,
        worker: WorkerId,
        limit: usize,
        seen: &HashSet<Self::Key>,
    ) -> Result<ClaimBatch<Self::Key, Self::Payload>>;

    /// Record that `worker` finished the task with `key`.
    fn complete(&mut self, worker: WorkerId, key: Self::Key) -> Result<()>;
}

/// Liveness probes for one claim round; each owner is probed at most once.
#[derive(Debug)]
pub(crate) struct Prober<'a> {
    locks_dir: &'a Path,
    known: HashMap<WorkerId, Liveness>,
}

impl<'a> Prober<'a> {
    pub(crate) fn new(locks_dir: &'a Path) -> Self {
        Self {
            locks_dir,
            known: HashMap::new(),
        }
    }

    pub(crate) fn probe(&mut self, owner: WorkerId) -> Result<Liveness> {
        if let Some(&liveness) = self.known.get(&owner) {
            return Ok(liveness);
        }
        let liveness = probe_liveness(&worker_lock_path(self.locks_dir, owner))?;
        tracing::debug!(owner = %owner, ?liveness, "probed worker");
        self.known.insert(owner, liveness);
        Ok(liveness)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: u128,
    len: u64,
}

/// Cached copy of the task list, re-read only when its modification time
/// or length changes.
#[derive(Debug)]
struct TaskCache<P> {
    path: PathBuf,
    tasks: Vec<P>,
    stamp: Option<Stamp>,
}

impl<P: DeserializeOwned> TaskCache<P> {
    fn refresh(&mut self) -> Result<()> {
        let stamp = match std::fs::metadata(&self.path) {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_nanos());
                Some(Stamp {
                    modified,
                    len: meta.len(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(QueueError::io("failed to stat task list", &self.path, e)),
        };

        if stamp.is_some() && stamp == self.stamp {
            return Ok(());
        }

        self.tasks = record_log::read_all(&self.path)?;
        self.stamp = stamp;
        tracing::debug!(tasks = self.tasks.len(), "task list reloaded");
        Ok(())
    }
}

/// Positional substrate: the status table plus the task list.
///
/// A task's key is its position in the task list. The list is re-read under
/// the status table lock, so a task appended by `add_tasks` is always seen
/// together with the slot it grew.
#[derive(Debug)]
pub struct StatusSource<P> {
    table: StatusTable,
    locks_dir: PathBuf,
    cache: TaskCache<P>,
}

impl<P: DeserializeOwned + Clone> StatusSource<P> {
    pub fn open(work: &WorkDir) -> Result<Self> {
        Ok(Self {
            table: StatusTable::open(work.status_path(), work.format)?,
            locks_dir: work.locks_dir(),
            cache: TaskCache {
                path: work.queue_path(),
                tasks: Vec::new(),
                stamp: None,
            },
        })
    }

    /// Number of tasks in the cached task list.
    pub fn task_count(&self) -> usize {
        self.cache.tasks.len()
    }
}

impl<P: DeserializeOwned + Clone> WorkSource for StatusSource<P> {
    type Key = usize;
    type Payload = P;

    fn claim(
        &mut self,
        worker: WorkerId,
        limit: usize,
        seen: &HashSet<usize>,
    ) -> Result<ClaimBatch<usize, P>> {
        let mut prober = Prober::new(&self.locks_dir);

        let mut picked: Vec<(usize, Option<WorkerId>)> = Vec::new();
        let mut busy = BTreeSet::new();
        {
            let mut view = self.table.view()?;
            self.cache.refresh()?;
            let known = self.cache.tasks.len();
            view.grow_to(known)?;

            let free: Vec<usize> = view.scan_free(limit).map(|s| s.position).collect();
            if let Some(&position) = free.iter().find(|&&p| p >= known) {
                return Err(QueueError::MissingTask(position));
            }
            for position in free {
                view.claim(position, worker)?;
                picked.push((position, None));
            }

            let mut taken: HashSet<usize> = picked.iter().map(|(p, _)| *p).collect();
            let mut next = 0;
            while picked.len() < limit {
                let Some(slot) = view.scan(ScanKind::Claimed, next, Some(1)).next() else {
                    break;
                };
                next = slot.position + 1;
                let Some(SlotState::Claimed(owner)) = view.state(slot.position) else {
                    continue;
                };

                if owner == worker {
                    if seen.contains(&slot.position) || !taken.insert(slot.position) {
                        continue;
                    }
                    picked.push((slot.position, None));
                } else if prober.probe(owner)? == Liveness::Dead {
                    if slot.position >= known {
                        return Err(QueueError::MissingTask(slot.position));
                    }
                    view.claim(slot.position, worker)?;
                    taken.insert(slot.position);
                    picked.push((slot.position, Some(owner)));
                } else {
                    busy.insert(owner);
                }
            }

            view.flush()?;
        }

        let tasks = picked
            .into_iter()
            .map(|(position, stolen_from)| {
                let payload = self
                    .cache
                    .tasks
                    .get(position)
                    .cloned()
                    .ok_or(QueueError::MissingTask(position))?;
                Ok(ClaimedTask {
                    key: position,
                    payload,
                    stolen_from,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ClaimBatch { tasks, busy })
    }

    fn complete(&mut self, _worker: WorkerId, key: usize) -> Result<()> {
        self.table.mark_done(key)
    }
}

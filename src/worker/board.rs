//! Id-tagged substrate: a task board kept in an [`AtomicDeque`].
//!
//! Each entry carries its owner, a stable task id and the payload. Claiming
//! removes the entry and pushes it back tagged with the new owner, so the
//! deque id changes while the task id does not. Completion removes the
//! entry. Every claim round and completion is one deque transaction.

use super::source::{ClaimBatch, ClaimedTask, Prober, WorkSource};
use crate::deque::AtomicDeque;
use crate::error::Result;
use crate::identity::{Liveness, WorkerId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
enum Pick {
    Free,
    Own,
    Stolen(WorkerId),
}

/// One task on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardEntry<P> {
    /// Current claimant; `None` while the task is free.
    #[serde(default)]
    pub owner: Option<WorkerId>,
    pub task_id: u64,
    pub payload: P,
}

/// A named task board in a directory.
#[derive(Debug)]
pub struct TaskBoard<P> {
    deque: AtomicDeque<BoardEntry<P>>,
    locks_dir: PathBuf,
}

impl<P: Serialize + DeserializeOwned + Clone> TaskBoard<P> {
    /// Open (or create) board `name` in `dir`; owners are probed in `locks_dir`.
    pub fn open(dir: impl AsRef<Path>, name: &str, locks_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            deque: AtomicDeque::open(dir, name)?,
            locks_dir: locks_dir.into(),
        })
    }

    pub fn path(&self) -> &Path {
        self.deque.path()
    }

    /// Add free tasks, returning their task ids.
    pub fn push(&mut self, payloads: &[P]) -> Result<Vec<u64>> {
        self.deque.atomic(true, |txn| {
            let entries: Vec<BoardEntry<P>> = payloads
                .iter()
                .map(|payload| BoardEntry {
                    owner: None,
                    task_id: 0,
                    payload: payload.clone(),
                })
                .collect();
            let ids = txn.push(&entries)?;

            // A task id is the deque id of its first entry.
            let tagged: Vec<(u64, BoardEntry<P>)> = ids
                .iter()
                .zip(entries)
                .map(|(&id, entry)| (id, BoardEntry { task_id: id, ..entry }))
                .collect();
            txn.replace(&tagged)?;
            Ok(ids)
        })
    }

    /// Every entry, oldest first, with its current deque id.
    pub fn entries(&mut self) -> Result<Vec<(u64, BoardEntry<P>)>> {
        self.deque.entries(true)
    }

    pub fn len(&mut self) -> Result<usize> {
        self.deque.len(true)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        self.deque.is_empty(true)
    }

    /// Drop every entry. Task ids are not reused afterwards.
    pub fn clear(&mut self) -> Result<()> {
        self.deque.clear(true)
    }
}

impl<P: Serialize + DeserializeOwned + Clone> WorkSource for TaskBoard<P> {
    type Key = u64;
    type Payload = P;

    fn claim(
        &mut self,
        worker: WorkerId,
        limit: usize,
        seen: &HashSet<u64>,
    ) -> Result<ClaimBatch<u64, P>> {
        let mut prober = Prober::new(&self.locks_dir);

        self.deque.atomic(true, |txn| {
            let entries = txn.entries()?;
            let mut picked: Vec<(u64, &BoardEntry<P>, Pick)> = Vec::new();
            let mut busy = BTreeSet::new();

            for (id, entry) in entries.iter().filter(|(_, e)| e.owner.is_none()) {
                if picked.len() >= limit {
                    break;
                }
                picked.push((*id, entry, Pick::Free));
            }

            for (id, entry) in entries.iter() {
                if picked.len() >= limit {
                    break;
                }
                let Some(owner) = entry.owner else {
                    continue;
                };

                if owner == worker {
                    if !seen.contains(&entry.task_id) {
                        picked.push((*id, entry, Pick::Own));
                    }
                } else if prober.probe(owner)? == Liveness::Dead {
                    picked.push((*id, entry, Pick::Stolen(owner)));
                } else {
                    busy.insert(owner);
                }
            }

            let mut tasks = Vec::with_capacity(picked.len());
            for (id, entry, pick) in picked {
                if !matches!(pick, Pick::Own) {
                    txn.remove(&[id])?;
                    let claimed = BoardEntry {
                        owner: Some(worker),
                        ..entry.clone()
                    };
                    txn.push(std::slice::from_ref(&claimed))?;
                }
                let stolen_from = match pick {
                    Pick::Stolen(owner) => Some(owner),
                    Pick::Free | Pick::Own => None,
                };
                tasks.push(ClaimedTask {
                    key: entry.task_id,
                    payload: entry.payload.clone(),
                    stolen_from,
                });
            }

            Ok(ClaimBatch { tasks, busy })
        })
    }

    fn complete(&mut self, worker: WorkerId, key: u64) -> Result<()> {
        self.deque.atomic(true, |txn| {
            let entries = txn.entries()?;
            match entries.iter().find(|(_, e)| e.task_id == key) {
                Some((id, entry)) => {
                    if entry.owner != Some(worker) {
                        tracing::warn!(
                            worker = %worker,
                            task = key,
                            owner = ?entry.owner,
                            "completing a task owned by another worker"
                        );
                    }
                    txn.remove(&[*id])?;
                }
                None => {
                    tracing::warn!(worker = %worker, task = key, "completed task is no longer on the board");
                }
            }
            Ok(())
        })
    }
}


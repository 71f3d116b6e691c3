//! Starvation monitor.
//!
//! A background thread that fires an escalating callback while a worker is
//! stuck waiting on peers. The thread is created once per worker and reused
//! across wait episodes:
//!
//! - `start` begins watching. Every `timeout` without a `stop`, the callback
//!   runs with `0, 1, 2, ...`.
//! - `stop` ends the episode and resets the counter.
//! - `end` (or dropping the monitor) terminates the thread.
//!
//! Commands travel over a single-slot channel; the callback is the only
//! state the thread owns.

use crate::error::{QueueError, Result};
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    End,
}

/// Handle on the monitor thread.
#[derive(Debug)]
pub struct StarvationMonitor {
    tx: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl StarvationMonitor {
    /// Spawn the monitor thread. `callback` receives the escalation count.
    pub fn spawn<F>(timeout: Duration, callback: F) -> Result<Self>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("starvation-monitor".to_string())
            .spawn(move || {
                let mut callback = callback;
                while let Ok(command) = rx.recv() {
                    match command {
                        Command::End => return,
                        Command::Stop => continue,
                        Command::Start => {}
                    }

                    let mut amount = 0;
                    loop {
                        match rx.recv_timeout(timeout) {
                            Err(RecvTimeoutError::Timeout) => {
                                callback(amount);
                                amount += 1;
                            }
                            Ok(Command::Start) => continue,
                            Ok(Command::Stop) => break,
                            Ok(Command::End) | Err(RecvTimeoutError::Disconnected) => return,
                        }
                    }
                }
            })
            .map_err(|e| {
                QueueError::UserError(format!("failed to spawn starvation monitor: {}", e))
            })?;

        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Begin a wait episode.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// End the current wait episode and reset the counter.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Start watching; the returned guard stops on drop.
    pub fn watch(&self) -> WatchGuard<'_> {
        self.start();
        WatchGuard { monitor: self }
    }

    /// Terminate the thread and wait for it.
    pub fn end(mut self) {
        self.shutdown();
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!(?command, "starvation monitor is no longer running");
        }
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // A dead thread has dropped its receiver; the join reports why.
        let _ = self.tx.send(Command::End);
        if handle.join().is_err() {
            tracing::warn!("starvation monitor callback panicked");
        }
    }
}

impl Drop for StarvationMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Scope of one wait episode; sends `stop` when dropped.
#[derive(Debug)]
pub struct WatchGuard<'a> {
    monitor: &'a StarvationMonitor,
}

impl Drop for WatchGuard<'_> {
    fn drop(&mut self) {
        self.monitor.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    fn recording() -> (Arc<Mutex<Vec<u64>>>, impl FnMut(u64) + Send + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |amount| sink.lock().unwrap().push(amount))
    }

    fn wait_for_calls(calls: &Arc<Mutex<Vec<u64>>>, n: usize, deadline: Duration) -> Vec<u64> {
        let until = Instant::now() + deadline;
        loop {
            let seen = calls.lock().unwrap().clone();
            if seen.len() >= n || Instant::now() >= until {
                return seen;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_fires_escalating_counts_while_watching() {
        let (calls, callback) = recording();
        let monitor = StarvationMonitor::spawn(Duration::from_millis(10), callback).unwrap();

        monitor.start();
        thread::sleep(Duration::from_millis(35));
        let seen = wait_for_calls(&calls, 3, Duration::from_secs(2));
        monitor.stop();

        assert!(seen.len() >= 3, "only {} calls", seen.len());
        assert_eq!(&seen[..3], &[0, 1, 2]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_stop_before_timeout_never_fires() {
        let (calls, callback) = recording();
        let monitor = StarvationMonitor::spawn(Duration::from_millis(200), callback).unwrap();

        {
            let _watch = monitor.watch();
        }
        thread::sleep(Duration::from_millis(300));

        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_counter_resets_between_episodes() {
        let (calls, callback) = recording();
        let monitor = StarvationMonitor::spawn(Duration::from_millis(10), callback).unwrap();

        monitor.start();
        let first = wait_for_calls(&calls, 2, Duration::from_secs(2));
        monitor.stop();
        assert!(first.len() >= 2);

        // Let any in-flight callback land before clearing.
        thread::sleep(Duration::from_millis(30));
        calls.lock().unwrap().clear();

        monitor.start();
        let second = wait_for_calls(&calls, 1, Duration::from_secs(2));
        monitor.stop();

        assert_eq!(second.first(), Some(&0));
    }

    #[test]
    fn test_idle_monitor_never_fires() {
        let (calls, callback) = recording();
        let monitor = StarvationMonitor::spawn(Duration::from_millis(5), callback).unwrap();

        thread::sleep(Duration::from_millis(40));
        monitor.end();

        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_drop_terminates_thread_while_watching() {
        let (calls, callback) = recording();
        let monitor = StarvationMonitor::spawn(Duration::from_millis(5), callback).unwrap();
        monitor.start();
        drop(monitor);

        let after_drop = calls.lock().unwrap().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.lock().unwrap().len(), after_drop);
    }
}

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lwotg_utils::task::Task;
use tokio::sync::watch;
use tracing::{Instrument, debug, debug_span, warn};

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::sink::UpdateSink;

// Delay before a failed task is started again.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// A unit of telemetry collection.
#[async_trait]
pub trait TelemetryTask: Send + Sync {
    fn name(&self) -> &str;

    /// Collects telemetry until the context is stopped, in which case it
    /// returns `Ok`, or until it hits an error it cannot recover from.
    async fn run(&self, ctx: &TaskContext) -> Result<()>;

    /// Called after every return from [`TelemetryTask::run`].
    async fn cleanup(&self) {}
}

/// Everything a running task needs from the runtime.
#[derive(Clone, Debug)]
pub struct TaskContext {
    pub target: String,
    pub sink: UpdateSink,
    stop: watch::Receiver<bool>,
}

#[derive(Clone, Copy, Debug)]
pub struct SupervisorConfig {
    pub restart_failed_tasks: bool,
    pub max_restarts: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskState {
    Running,
    Stopped,
    Failed(String),
}

/// Registry and supervisor of telemetry tasks.
#[derive(Debug)]
pub struct Collector {
    target: String,
    cache: Arc<Cache>,
    config: SupervisorConfig,
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

#[derive(Debug)]
struct TaskEntry {
    stop: watch::Sender<bool>,
    state: Arc<Mutex<TaskState>>,
    handle: Option<Task<()>>,
}

// ===== impl TaskContext =====

impl TaskContext {
    /// Resolves once the task is asked to stop.
    pub async fn stopped(&self) {
        let mut stop = self.stop.clone();
        let _ = stop.wait_for(|stop| *stop).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}

// ===== impl SupervisorConfig =====

impl Default for SupervisorConfig {
    fn default() -> SupervisorConfig {
        SupervisorConfig {
            restart_failed_tasks: true,
            max_restarts: 5,
        }
    }
}

// ===== impl Collector =====

impl Collector {
    pub fn new(
        target: impl Into<String>,
        config: SupervisorConfig,
    ) -> Collector {
        Collector {
            target: target.into(),
            cache: Arc::new(Cache::new()),
            config,
            tasks: Default::default(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn sink(&self) -> UpdateSink {
        UpdateSink::new(self.target.clone(), self.cache.clone())
    }

    /// Starts a supervised task. A stopped or failed task with the same name
    /// is replaced.
    pub fn add_task(&self, task: Arc<dyn TelemetryTask>) -> Result<()> {
        let name = task.name().to_owned();
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(entry) = tasks.get(&name)
            && *entry.state.lock().unwrap() == TaskState::Running
        {
            return Err(Error::DuplicateTask(name));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let ctx = TaskContext {
            target: self.target.clone(),
            sink: self.sink(),
            stop: stop_rx,
        };
        let state = Arc::new(Mutex::new(TaskState::Running));
        let span = debug_span!("telemetry", task = %name);
        let handle = Task::spawn(
            supervise(task, ctx, state.clone(), self.config).instrument(span),
        );

        tasks.insert(
            name,
            TaskEntry {
                stop: stop_tx,
                state,
                handle: Some(handle),
            },
        );

        Ok(())
    }

    /// Stops a task and waits for it to finish.
    pub async fn stop_task(&self, name: &str) -> Result<()> {
        let handle = {
            let mut tasks = self.tasks.lock().unwrap();
            let entry = tasks
                .get_mut(name)
                .ok_or_else(|| Error::UnknownTask(name.to_owned()))?;
            let _ = entry.stop.send(true);
            entry.handle.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        Ok(())
    }

    pub fn task_states(&self) -> BTreeMap<String, TaskState> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .iter()
            .map(|(name, entry)| {
                (name.clone(), entry.state.lock().unwrap().clone())
            })
            .collect()
    }

    /// Stops every task and closes the cache to further updates.
    pub async fn shutdown(&self) {
        let handles = {
            let mut tasks = self.tasks.lock().unwrap();
            tasks
                .values_mut()
                .filter_map(|entry| {
                    let _ = entry.stop.send(true);
                    entry.handle.take()
                })
                .collect::<Vec<_>>()
        };
        for handle in handles {
            let _ = handle.await;
        }
        self.cache.close();
    }
}

// ===== helper functions =====

async fn supervise(
    task: Arc<dyn TelemetryTask>,
    ctx: TaskContext,
    state: Arc<Mutex<TaskState>>,
    config: SupervisorConfig,
) {
    let set_state = |new: TaskState| *state.lock().unwrap() = new;
    let mut restarts = 0;

    loop {
        debug!("starting");
        let result = task.run(&ctx).await;
        task.cleanup().await;

        let error = match result {
            Err(error) if !ctx.is_stopped() => error,
            _ => {
                debug!("stopped");
                set_state(TaskState::Stopped);
                return;
            }
        };
        error.log();

        if !config.restart_failed_tasks || restarts >= config.max_restarts {
            warn!(%restarts, "task failed");
            set_state(TaskState::Failed(error.to_string()));
            return;
        }
        restarts += 1;

        tokio::select! {
            _ = ctx.stopped() => {
                set_state(TaskState::Stopped);
                return;
            }
            _ = tokio::time::sleep(RESTART_DELAY) => {}
        }
        debug!(attempt = %restarts, "restarting");
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::model::{Device, System};

    // Fails a fixed number of times, then publishes once and waits for
    // the stop request.
    #[derive(Default)]
    struct FlakyTask {
        failures: AtomicU32,
        runs: AtomicU32,
        cleanups: AtomicU32,
    }

    #[async_trait]
    impl TelemetryTask for FlakyTask {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn run(&self, ctx: &TaskContext) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::Interface(
                    lwotg_interface::Error::SubscriptionClosed,
                ));
            }
            ctx.sink.update(&Device {
                system: Some(System {
                    current_datetime: "now".to_owned(),
                }),
                ..Default::default()
            })?;
            ctx.stopped().await;
            Ok(())
        }

        async fn cleanup(&self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flaky(failures: u32) -> Arc<FlakyTask> {
        Arc::new(FlakyTask {
            failures: AtomicU32::new(failures),
            ..Default::default()
        })
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_failed_task() {
        let collector = Collector::new("ate", SupervisorConfig::default());
        let task = flaky(2);
        collector.add_task(task.clone()).unwrap();
        settle().await;

        assert_eq!(task.runs.load(Ordering::SeqCst), 3);
        assert_eq!(task.cleanups.load(Ordering::SeqCst), 2);
        assert_eq!(collector.task_states()["flaky"], TaskState::Running);
        assert_eq!(collector.cache().snapshot(&[]).len(), 1);

        collector.stop_task("flaky").await.unwrap();
        assert_eq!(task.cleanups.load(Ordering::SeqCst), 3);
        assert_eq!(collector.task_states()["flaky"], TaskState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_restarts() {
        let config = SupervisorConfig {
            restart_failed_tasks: true,
            max_restarts: 1,
        };
        let collector = Collector::new("ate", config);
        let task = flaky(5);
        collector.add_task(task.clone()).unwrap();
        settle().await;

        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
        assert!(matches!(
            collector.task_states()["flaky"],
            TaskState::Failed(..)
        ));

        // A failed task can be registered again.
        collector.add_task(flaky(0)).unwrap();
        settle().await;
        assert_eq!(collector.task_states()["flaky"], TaskState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn task_registration_errors() {
        let collector = Collector::new("ate", SupervisorConfig::default());
        collector.add_task(flaky(0)).unwrap();
        assert!(matches!(
            collector.add_task(flaky(0)),
            Err(Error::DuplicateTask(name)) if name == "flaky"
        ));
        assert!(matches!(
            collector.stop_task("missing").await,
            Err(Error::UnknownTask(..))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_everything() {
        let collector = Collector::new("ate", SupervisorConfig::default());
        let task = flaky(0);
        collector.add_task(task.clone()).unwrap();
        settle().await;

        collector.shutdown().await;
        assert_eq!(collector.task_states()["flaky"], TaskState::Stopped);
        assert_eq!(task.cleanups.load(Ordering::SeqCst), 1);
        assert!(collector.cache().is_closed());
        assert!(matches!(
            collector.sink().update(&Device {
                system: Some(System {
                    current_datetime: "later".to_owned(),
                }),
                ..Default::default()
            }),
            Err(Error::SinkClosed)
        ));
    }
}

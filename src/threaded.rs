//! Threaded commands
//!
//! A threaded command is polled on its own cadence by a tokio task instead of
//! by the host loop. The host-side wrapper ([`Threaded`]) only spawns the task,
//! reports whether the inner command is still running, and cancels the task
//! when its group ends.
//!
//! # Cancellation
//!
//! [`TaskHandle::cancel`] raises a flag, takes the inner command's lock and
//! aborts it. Because the task polls under that same lock, the inner command's
//! end hook runs exactly once: either the task completed it, or cancel did.
//! Dropping a handle cancels it, so a task can never outlive its group.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::command::{Command, CommandState};
use crate::context::Context;
use crate::error::RoutineError;

const MIN_CADENCE: Duration = Duration::from_millis(1);

/// Owns the worker threads that run threaded commands.
///
/// Keep it alive for as long as any [`Context`] built from its spawner is in
/// use.
pub struct TaskRuntime {
    runtime: Runtime,
}

impl TaskRuntime {
    pub fn new() -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("autoscript-task")
            .enable_time()
            .build()?;
        Ok(Self { runtime })
    }

    pub fn spawner(&self) -> TaskSpawner {
        TaskSpawner {
            handle: self.runtime.handle().clone(),
        }
    }
}

/// Cloneable handle used by commands to start threaded tasks.
#[derive(Debug, Clone)]
pub struct TaskSpawner {
    handle: Handle,
}

impl TaskSpawner {
    /// Poll `command` every `cadence` on a worker thread until it completes,
    /// faults, or the returned handle is cancelled.
    pub fn spawn(
        &self,
        command: Arc<Mutex<Command>>,
        cadence: Duration,
        context: Context,
    ) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let fault = Arc::new(Mutex::new(None));

        let join = self.handle.spawn(run_task(
            Arc::clone(&command),
            cadence.max(MIN_CADENCE),
            context.clone(),
            Arc::clone(&cancelled),
            Arc::clone(&fault),
        ));

        TaskHandle {
            command,
            context,
            cancelled,
            fault,
            join,
        }
    }
}

async fn run_task(
    command: Arc<Mutex<Command>>,
    cadence: Duration,
    context: Context,
    cancelled: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<RoutineError>>>,
) {
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if cancelled.load(Ordering::SeqCst) {
            break;
        }

        // The fault is stored before the lock is released, so anyone who sees
        // the command completed also sees its fault.
        let Ok(mut cmd) = command.lock() else {
            break;
        };
        match cmd.poll(&context) {
            Ok(CommandState::Completed) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "threaded command faulted");
                if let Ok(mut slot) = fault.lock() {
                    *slot = Some(err);
                }
                break;
            }
        }
    }
}

/// Cancellation and status handle for one threaded task.
pub struct TaskHandle {
    command: Arc<Mutex<Command>>,
    context: Context,
    cancelled: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<RoutineError>>>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Stop the task and run the inner command's end hook if it is still
    /// running. Idempotent.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // A panic inside a poll poisons the lock; the end hook must still run
        // so the actuators are released.
        let mut cmd = self.command.lock().unwrap_or_else(PoisonError::into_inner);
        cmd.abort(&self.context);
        drop(cmd);
        self.join.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Take the fault the task stopped on, if any
    pub fn take_fault(&self) -> Option<RoutineError> {
        self.fault.lock().ok().and_then(|mut f| f.take())
    }

    pub fn inner_state(&self) -> CommandState {
        lock(&self.command)
            .map(|cmd| cmd.state())
            .unwrap_or(CommandState::Completed)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(command: &Mutex<Command>) -> Option<MutexGuard<'_, Command>> {
    command.lock().ok()
}

/// Host-side half of a threaded command.
pub struct Threaded {
    command: Arc<Mutex<Command>>,
    cadence: Duration,
    task: Option<TaskHandle>,
}

impl Threaded {
    pub fn new(inner: Command, cadence: Duration) -> Self {
        Self {
            command: Arc::new(Mutex::new(inner)),
            cadence,
            task: None,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn inner_state(&self) -> CommandState {
        match &self.task {
            Some(task) => task.inner_state(),
            None => lock(&self.command)
                .map(|cmd| cmd.state())
                .unwrap_or(CommandState::Completed),
        }
    }

    pub(crate) fn start(&mut self, name: &str, ctx: &Context) -> Result<(), RoutineError> {
        if self.task.is_some() {
            return Err(RoutineError::TaskFailed {
                command: name.to_string(),
                reason: "task already started".to_string(),
            });
        }
        debug!(command = name, cadence_ms = self.cadence.as_millis() as u64, "spawning threaded task");
        self.task = Some(ctx.tasks.spawn(
            Arc::clone(&self.command),
            self.cadence,
            ctx.clone(),
        ));
        Ok(())
    }

    /// Running while the inner command is; surfaces a stored task fault.
    pub(crate) fn should_continue(&mut self) -> Result<bool, RoutineError> {
        let state = self.inner_state();
        if let Some(err) = self.task.as_ref().and_then(TaskHandle::take_fault) {
            return Err(err);
        }
        Ok(state != CommandState::Completed)
    }

    pub(crate) fn end(&mut self) {
        if let Some(task) = &self.task {
            task.cancel();
        }
    }

    pub(crate) fn describe_inner(&self, out: &mut String, depth: usize) {
        if let Some(cmd) = lock(&self.command) {
            cmd.describe_into(out, depth);
        }
    }
}

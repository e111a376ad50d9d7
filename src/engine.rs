//! Execution engine
//!
//! The [`Engine`] owns the compiled routine and polls its root exactly once per
//! [`Engine::tick`]. It never sleeps and never decides when to tick; that is the
//! host's job. [`HostLoop`] plays the host role for the CLI and for tests:
//! a fixed period and a wall-clock budget for the autonomous phase.
//!
//! # Safety Guarantees
//!
//! - **Fault Abort**: a fault from any command aborts the whole tree before the
//!   error reaches the caller
//! - **RAII Cleanup**: dropping an engine with a routine in flight aborts it, so
//!   every running command's end hook fires even on early return or panic unwind
//! - **Stop Requests**: SIGINT/SIGTERM/SIGHUP raise a flag the host loop checks
//!   each tick

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandState};
use crate::context::Context;
use crate::error::RoutineError;

/// Outcome of one engine tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RoutineStatus {
    Running,
    Completed,
    Aborted,
}

/// Drives one compiled routine.
pub struct Engine {
    root: Command,
    context: Context,
    ticks: u64,
    aborted: bool,
}

impl Engine {
    pub fn new(root: Command, context: Context) -> Self {
        Self {
            root,
            context,
            ticks: 0,
            aborted: false,
        }
    }

    /// Poll the root exactly once.
    pub fn tick(&mut self) -> Result<RoutineStatus, RoutineError> {
        match self.status() {
            RoutineStatus::Running => {}
            done => return Ok(done),
        }

        self.ticks += 1;
        match self.root.poll(&self.context) {
            Ok(CommandState::Completed) => {
                info!(ticks = self.ticks, "routine completed");
                Ok(RoutineStatus::Completed)
            }
            Ok(_) => Ok(RoutineStatus::Running),
            Err(err) => {
                error!(error = %err, tick = self.ticks, "routine faulted, aborting");
                self.abort();
                Err(err)
            }
        }
    }

    /// Stop the routine, running the end hook of every running command,
    /// threaded ones included. Idempotent.
    pub fn abort(&mut self) {
        if self.aborted {
            return;
        }
        if self.root.state() == CommandState::Running {
            warn!(tick = self.ticks, "aborting routine");
        }
        self.root.abort(&self.context);
        self.aborted = true;
    }

    pub fn status(&self) -> RoutineStatus {
        if self.aborted {
            RoutineStatus::Aborted
        } else if self.root.is_completed() {
            RoutineStatus::Completed
        } else {
            RoutineStatus::Running
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn root(&self) -> &Command {
        &self.root
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.status() == RoutineStatus::Running {
            debug!("engine dropped with routine in flight, aborting");
            self.abort();
        }
    }
}

/// Why a host loop run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunOutcome {
    #[strum(serialize = "completed")]
    Completed,
    #[strum(serialize = "budget expired")]
    BudgetExpired,
    #[strum(serialize = "interrupted")]
    Interrupted,
}

/// Summary of one autonomous phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub ticks: u64,
    /// Time on the routine's clock from first to last tick
    pub elapsed: Duration,
}

/// Fixed-period host that ticks an engine under a time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostLoop {
    pub period: Duration,
    pub budget: Duration,
}

impl HostLoop {
    pub fn new(period: Duration, budget: Duration) -> Self {
        Self { period, budget }
    }

    /// Tick `engine` until it completes, the budget runs out, or `stop` is
    /// raised.
    ///
    /// `between_ticks` is called with the period after every running tick; it
    /// must advance the routine's clock (sleep, or step a simulated one).
    pub fn run<F>(
        &self,
        engine: &mut Engine,
        stop: &AtomicBool,
        mut between_ticks: F,
    ) -> Result<RunSummary, RoutineError>
    where
        F: FnMut(Duration),
    {
        let clock = Arc::clone(&engine.context().hardware.clock);
        let started = clock.now();
        let elapsed = || clock.now().saturating_sub(started);

        let outcome = loop {
            if stop.load(Ordering::SeqCst) {
                info!("stop requested");
                engine.abort();
                break RunOutcome::Interrupted;
            }
            if elapsed() >= self.budget {
                info!(budget_ms = self.budget.as_millis() as u64, "autonomous budget expired");
                engine.abort();
                break RunOutcome::BudgetExpired;
            }

            match engine.tick()? {
                RoutineStatus::Completed => break RunOutcome::Completed,
                RoutineStatus::Aborted => break RunOutcome::Interrupted,
                RoutineStatus::Running => between_ticks(self.period),
            }
        };

        Ok(RunSummary {
            outcome,
            ticks: engine.ticks(),
            elapsed: elapsed(),
        })
    }
}

/// Raise the returned flag on SIGINT, SIGTERM or SIGHUP.
///
/// The host loop aborts the routine on its next check instead of the process
/// exiting with actuators live.
pub fn stop_flag_on_signals() -> std::io::Result<Arc<AtomicBool>> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let flag = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    let raised = Arc::clone(&flag);

    std::thread::spawn(move || {
        for sig in signals.forever() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };
            warn!("Received {}, stopping routine", signal_name);
            raised.store(true, Ordering::SeqCst);
        }
    });

    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ActionEffect, TimedOutput};
    use crate::context::test_support::TestRig;
    use crate::group::CommandGroup;

    fn driving_routine(ms: u64) -> Command {
        let mut group = CommandGroup::new();
        group.append_sequential(Command::timed(
            "drive",
            Duration::from_millis(ms),
            TimedOutput::Tank {
                left: 0.5,
                right: 0.5,
            },
        ));
        Command::group("routine", group)
    }

    // =========================================================================
    // Engine Tests
    // =========================================================================

    #[test]
    fn test_tick_polls_once() {
        let rig = TestRig::new();
        let mut engine = Engine::new(driving_routine(100), rig.ctx.clone());

        assert_eq!(engine.tick().unwrap(), RoutineStatus::Running);
        assert_eq!(engine.ticks(), 1);
        assert_eq!(rig.sim.drivetrain.write_count(), 1);
    }

    #[test]
    fn test_tick_after_completion_is_noop() {
        let rig = TestRig::new();
        let mut engine = Engine::new(driving_routine(0), rig.ctx.clone());

        assert_eq!(engine.tick().unwrap(), RoutineStatus::Completed);
        let writes = rig.sim.actuator_writes();
        assert_eq!(engine.tick().unwrap(), RoutineStatus::Completed);
        assert_eq!(engine.ticks(), 1);
        assert_eq!(rig.sim.actuator_writes(), writes);
    }

    #[test]
    fn test_abort_zeroes_drive_and_is_idempotent() {
        let rig = TestRig::new();
        let mut engine = Engine::new(driving_routine(1000), rig.ctx.clone());
        engine.tick().unwrap();
        assert_eq!(rig.sim.drivetrain.output(), (0.5, 0.5));

        engine.abort();
        assert_eq!(engine.status(), RoutineStatus::Aborted);
        assert_eq!(rig.sim.drivetrain.output(), (0.0, 0.0));

        let writes = rig.sim.actuator_writes();
        engine.abort();
        assert_eq!(engine.tick().unwrap(), RoutineStatus::Aborted);
        assert_eq!(rig.sim.actuator_writes(), writes);
    }

    #[test]
    fn test_drop_aborts_running_routine() {
        let rig = TestRig::new();
        {
            let mut engine = Engine::new(driving_routine(1000), rig.ctx.clone());
            engine.tick().unwrap();
        }
        assert_eq!(rig.sim.drivetrain.output(), (0.0, 0.0));
    }

    #[test]
    fn test_fault_aborts_tree() {
        let rig = TestRig::new();
        let mut group = CommandGroup::new();
        group.append_sequential(Command::convergence(
            "drivedistance",
            crate::command::ConvergenceMode::Distance,
            100.0,
            10.0,
            10,
        ));
        group.append_concurrent(Command::timed(
            "drive",
            Duration::from_secs(10),
            TimedOutput::Tank {
                left: 0.3,
                right: 0.3,
            },
        ));
        let mut engine = Engine::new(Command::group("routine", group), rig.ctx.clone());

        engine.tick().unwrap();
        rig.sim.encoder.inject_fault("encoder unplugged");

        assert!(engine.tick().is_err());
        assert_eq!(engine.status(), RoutineStatus::Aborted);
        assert_eq!(rig.sim.drivetrain.output(), (0.0, 0.0));
    }

    // =========================================================================
    // Host Loop Tests
    // =========================================================================

    #[test]
    fn test_host_loop_runs_to_completion() {
        let rig = TestRig::new();
        let mut engine = Engine::new(driving_routine(100), rig.ctx.clone());
        let host = HostLoop::new(Duration::from_millis(20), Duration::from_secs(15));
        let stop = AtomicBool::new(false);

        let summary = host.run(&mut engine, &stop, |dt| rig.sim.advance(dt)).unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.ticks, 6);
        assert_eq!(summary.elapsed, Duration::from_millis(100));
    }

    #[test]
    fn test_host_loop_budget_expiry_aborts() {
        let rig = TestRig::new();
        let mut engine = Engine::new(driving_routine(60_000), rig.ctx.clone());
        let host = HostLoop::new(Duration::from_millis(20), Duration::from_secs(1));
        let stop = AtomicBool::new(false);

        let summary = host.run(&mut engine, &stop, |dt| rig.sim.advance(dt)).unwrap();
        assert_eq!(summary.outcome, RunOutcome::BudgetExpired);
        assert_eq!(summary.elapsed, Duration::from_secs(1));
        assert_eq!(engine.status(), RoutineStatus::Aborted);
        assert_eq!(rig.sim.drivetrain.output(), (0.0, 0.0));
    }

    #[test]
    fn test_host_loop_honours_stop_flag() {
        let rig = TestRig::new();
        let mut engine = Engine::new(driving_routine(60_000), rig.ctx.clone());
        let host = HostLoop::new(Duration::from_millis(20), Duration::from_secs(15));
        let stop = AtomicBool::new(false);

        let mut periods = 0;
        let summary = host
            .run(&mut engine, &stop, |dt| {
                rig.sim.advance(dt);
                periods += 1;
                if periods == 5 {
                    stop.store(true, Ordering::SeqCst);
                }
            })
            .unwrap();
        assert_eq!(summary.outcome, RunOutcome::Interrupted);
        assert_eq!(summary.ticks, 5);
        assert_eq!(rig.sim.drivetrain.output(), (0.0, 0.0));
    }

    #[test]
    fn test_routine_with_no_drive_leaves_no_writes() {
        let rig = TestRig::new();
        let mut group = CommandGroup::new();
        group.append_sequential(Command::action("print", ActionEffect::Print(vec![])));
        let mut engine = Engine::new(Command::group("routine", group), rig.ctx.clone());

        assert_eq!(engine.tick().unwrap(), RoutineStatus::Completed);
        assert_eq!(rig.sim.actuator_writes(), 0);
    }
}

//! Command Lifecycle State Machine
//!
//! Every unit of work in a routine is a [`Command`]: one struct with an explicit
//! [`CommandState`] and a [`CommandKind`] tag, driven through a single
//! [`Command::poll`] function.
//!
//! # State Flow
//!
//! ```text
//! NotStarted
//!     ↓   first poll: start hook
//! Running  ←─┐
//!     │      │ run hook, continue predicate true
//!     ├──────┘
//!     ↓   continue predicate false, fault, or abort: end hook (exactly once)
//! Completed
//! ```
//!
//! Completed is terminal. Polling a completed command does nothing, so
//! convergence can never be "lost" once declared.

use std::fmt;
use std::time::Duration;

use strum::Display;
use tracing::debug;

use crate::context::Context;
use crate::error::{HardwareFault, RoutineError};
use crate::group::CommandGroup;
use crate::threaded::Threaded;
use crate::types::{MechanismId, MechanismPosition};

/// Lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CommandState {
    #[strum(serialize = "not started")]
    NotStarted,
    #[strum(serialize = "running")]
    Running,
    #[strum(serialize = "completed")]
    Completed,
}

impl CommandState {
    /// Returns true for the terminal state
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Consecutive-poll convergence counter.
///
/// A poll is "in tolerance" when `|error| < tolerance`. The counter resets on
/// any out-of-tolerance poll, and the goal is reached once `required`
/// consecutive in-tolerance polls have been seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Debounce {
    tolerance: f64,
    required: u32,
    streak: u32,
}

impl Debounce {
    pub fn new(tolerance: f64, required: u32) -> Self {
        Self {
            tolerance,
            required,
            streak: 0,
        }
    }

    /// Feed one measurement error; returns true once settled.
    pub fn update(&mut self, error: f64) -> bool {
        if error.abs() < self.tolerance {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.streak = 0;
        }
        self.is_settled()
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.streak >= self.required
    }

    #[inline]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[inline]
    pub fn required(&self) -> u32 {
        self.required
    }
}

/// One-shot side effect of an [`Action`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEffect {
    /// Emit the arguments to the diagnostic sink
    Print(Vec<String>),
    /// Zero drive output
    StopDrive,
    /// Move a mechanism to a terminal position
    SetMechanism {
        mechanism: MechanismId,
        position: MechanismPosition,
    },
}

/// Runs its effect on the first poll, then completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub effect: ActionEffect,
}

impl Action {
    fn run(&self, ctx: &Context) {
        let hw = &ctx.hardware;
        match &self.effect {
            ActionEffect::Print(args) => hw.sink.emit(&format!("[{}]", args.join(", "))),
            ActionEffect::StopDrive => hw.drivetrain.stop(),
            ActionEffect::SetMechanism {
                mechanism,
                position,
            } => hw.mechanism(*mechanism).set(*position),
        }
    }
}

/// What a [`TimedLoop`] does while it runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimedOutput {
    /// Nothing; the loop only measures time
    Idle,
    /// Tank drive at fixed power
    Tank { left: f64, right: f64 },
}

/// Polled until the elapsed time reaches `duration`.
///
/// A zero duration still gets one full poll (start, run, check).
#[derive(Debug, Clone, PartialEq)]
pub struct TimedLoop {
    pub duration: Duration,
    pub output: TimedOutput,
    started_at: Option<Duration>,
}

impl TimedLoop {
    pub fn new(duration: Duration, output: TimedOutput) -> Self {
        Self {
            duration,
            output,
            started_at: None,
        }
    }

    fn start(&mut self, ctx: &Context) {
        self.started_at = Some(ctx.hardware.clock.now());
    }

    fn run(&self, ctx: &Context) {
        if let TimedOutput::Tank { left, right } = self.output {
            ctx.hardware.drivetrain.tank_drive(left, right);
        }
    }

    fn should_continue(&self, ctx: &Context) -> bool {
        let now = ctx.hardware.clock.now();
        let elapsed = now.saturating_sub(self.started_at.unwrap_or(now));
        elapsed < self.duration
    }

    fn end(&self, ctx: &Context) {
        if matches!(self.output, TimedOutput::Tank { .. }) {
            ctx.hardware.drivetrain.stop();
        }
    }
}

/// Which feedback loop a [`ConvergenceLoop`] closes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceMode {
    /// Distance controller only, tank drive at its output
    Distance,
    /// Distance controller plus heading hold at 0
    Straight,
    /// Heading controller only, output scaled by `coefficient`
    Turn { coefficient: f64 },
}

/// Polled until the measured value has settled around `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceLoop {
    pub mode: ConvergenceMode,
    pub target: f64,
    debounce: Debounce,
    measured: f64,
}

impl ConvergenceLoop {
    pub fn new(mode: ConvergenceMode, target: f64, tolerance: f64, required: u32) -> Self {
        Self {
            mode,
            target,
            debounce: Debounce::new(tolerance, required),
            measured: 0.0,
        }
    }

    pub fn debounce(&self) -> &Debounce {
        &self.debounce
    }

    pub fn measured(&self) -> f64 {
        self.measured
    }

    fn start(&mut self, ctx: &Context) {
        let hw = &ctx.hardware;
        match self.mode {
            ConvergenceMode::Distance => {
                hw.distance_controller.enable();
                hw.distance_controller.set_setpoint(self.target);
            }
            ConvergenceMode::Straight => {
                hw.distance_controller.enable();
                hw.distance_controller.set_setpoint(self.target);
                hw.heading_controller.enable();
                hw.heading_controller.set_setpoint(0.0);
            }
            ConvergenceMode::Turn { .. } => {
                hw.heading_controller.enable();
                hw.heading_controller.set_setpoint(self.target);
            }
        }
    }

    fn run(&mut self, ctx: &Context) -> Result<(), HardwareFault> {
        let hw = &ctx.hardware;
        match self.mode {
            ConvergenceMode::Distance => {
                self.measured = hw.encoder.read()?;
                let output = hw.distance_controller.output();
                hw.drivetrain.tank_drive(output, output);
            }
            ConvergenceMode::Straight => {
                self.measured = hw.encoder.read()?;
                hw.drivetrain.arcade_drive(
                    hw.distance_controller.output(),
                    hw.heading_controller.output(),
                );
            }
            ConvergenceMode::Turn { coefficient } => {
                self.measured = hw.gyro.read()?;
                hw.drivetrain
                    .arcade_drive(0.0, hw.heading_controller.output() * coefficient);
            }
        }
        Ok(())
    }

    fn should_continue(&mut self) -> bool {
        !self.debounce.update(self.measured - self.target)
    }

    fn end(&self, ctx: &Context) {
        let hw = &ctx.hardware;
        match self.mode {
            ConvergenceMode::Distance => hw.distance_controller.disable(),
            ConvergenceMode::Straight => {
                hw.distance_controller.disable();
                hw.heading_controller.disable();
            }
            ConvergenceMode::Turn { .. } => hw.heading_controller.disable(),
        }
        hw.drivetrain.stop();
    }
}

/// Holds the drive stopped until the match clock reaches `until`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitUntil {
    pub until: Duration,
}

impl WaitUntil {
    fn should_continue(&self, ctx: &Context) -> bool {
        ctx.hardware.match_clock.match_time() < self.until
    }
}

/// The kind-specific half of a command.
pub enum CommandKind {
    Action(Action),
    TimedLoop(TimedLoop),
    ConvergenceLoop(ConvergenceLoop),
    WaitUntil(WaitUntil),
    Threaded(Threaded),
    Group(CommandGroup),
}

fn fault(name: &str, fault: HardwareFault) -> RoutineError {
    RoutineError::Fault {
        command: name.to_string(),
        fault,
    }
}

impl CommandKind {
    /// Short tag used in logs and tree listings
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Action(_) => "action",
            Self::TimedLoop(_) => "timed",
            Self::ConvergenceLoop(_) => "convergence",
            Self::WaitUntil(_) => "wait-until",
            Self::Threaded(_) => "threaded",
            Self::Group(_) => "group",
        }
    }

    fn start(&mut self, name: &str, ctx: &Context) -> Result<(), RoutineError> {
        match self {
            Self::TimedLoop(l) => l.start(ctx),
            Self::ConvergenceLoop(l) => l.start(ctx),
            Self::Threaded(t) => t.start(name, ctx)?,
            Self::Action(_) | Self::WaitUntil(_) | Self::Group(_) => {}
        }
        Ok(())
    }

    fn run(&mut self, name: &str, ctx: &Context) -> Result<(), RoutineError> {
        match self {
            Self::Action(a) => a.run(ctx),
            Self::TimedLoop(l) => l.run(ctx),
            Self::ConvergenceLoop(l) => l.run(ctx).map_err(|f| fault(name, f))?,
            Self::WaitUntil(_) => ctx.hardware.drivetrain.stop(),
            Self::Group(g) => g.run(ctx)?,
            Self::Threaded(_) => {}
        }
        Ok(())
    }

    fn should_continue(&mut self, ctx: &Context) -> Result<bool, RoutineError> {
        Ok(match self {
            Self::Action(_) => false,
            Self::TimedLoop(l) => l.should_continue(ctx),
            Self::ConvergenceLoop(l) => l.should_continue(),
            Self::WaitUntil(w) => w.should_continue(ctx),
            Self::Threaded(t) => t.should_continue()?,
            Self::Group(g) => g.should_continue(),
        })
    }

    fn end(&mut self, ctx: &Context) {
        match self {
            Self::TimedLoop(l) => l.end(ctx),
            Self::ConvergenceLoop(l) => l.end(ctx),
            Self::Threaded(t) => t.end(),
            Self::Group(g) => g.end(ctx),
            Self::Action(_) | Self::WaitUntil(_) => {}
        }
    }

    fn summary(&self) -> String {
        match self {
            Self::Action(a) => match &a.effect {
                ActionEffect::Print(args) => format!("print [{}]", args.join(", ")),
                ActionEffect::StopDrive => "stop drive".to_string(),
                ActionEffect::SetMechanism {
                    mechanism,
                    position,
                } => format!("{} -> {}", mechanism, position),
            },
            Self::TimedLoop(l) => match l.output {
                TimedOutput::Idle => format!("idle for {}ms", l.duration.as_millis()),
                TimedOutput::Tank { left, right } => format!(
                    "tank {:.2}/{:.2} for {}ms",
                    left,
                    right,
                    l.duration.as_millis()
                ),
            },
            Self::ConvergenceLoop(l) => format!(
                "{:?} to {} (±{} for {} polls)",
                l.mode,
                l.target,
                l.debounce.tolerance(),
                l.debounce.required()
            ),
            Self::WaitUntil(w) => format!("until match time {:.2}s", w.until.as_secs_f64()),
            Self::Threaded(t) => format!("every {}ms", t.cadence().as_millis()),
            Self::Group(g) => format!("{} step(s)", g.len()),
        }
    }
}

/// A schedulable unit with a start/poll/end lifecycle.
pub struct Command {
    name: String,
    state: CommandState,
    kind: CommandKind,
}

impl Command {
    pub fn new(name: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            name: name.into(),
            state: CommandState::NotStarted,
            kind,
        }
    }

    pub fn action(name: impl Into<String>, effect: ActionEffect) -> Self {
        Self::new(name, CommandKind::Action(Action { effect }))
    }

    pub fn timed(name: impl Into<String>, duration: Duration, output: TimedOutput) -> Self {
        Self::new(name, CommandKind::TimedLoop(TimedLoop::new(duration, output)))
    }

    pub fn convergence(
        name: impl Into<String>,
        mode: ConvergenceMode,
        target: f64,
        tolerance: f64,
        required: u32,
    ) -> Self {
        Self::new(
            name,
            CommandKind::ConvergenceLoop(ConvergenceLoop::new(mode, target, tolerance, required)),
        )
    }

    pub fn wait_until(name: impl Into<String>, until: Duration) -> Self {
        Self::new(name, CommandKind::WaitUntil(WaitUntil { until }))
    }

    /// Wrap `inner` so it is polled on its own cadence, off the host cycle.
    pub fn threaded(inner: Command, cadence: Duration) -> Self {
        let name = inner.name.clone();
        Self::new(name, CommandKind::Threaded(Threaded::new(inner, cadence)))
    }

    pub fn group(name: impl Into<String>, group: CommandGroup) -> Self {
        Self::new(name, CommandKind::Group(group))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn state(&self) -> CommandState {
        self.state
    }

    #[inline]
    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.state.is_terminal()
    }

    #[inline]
    pub fn is_threaded(&self) -> bool {
        matches!(self.kind, CommandKind::Threaded(_))
    }

    /// Advance the command by one tick.
    ///
    /// Never blocks. On a fault the end hook runs before the error is returned,
    /// so actuators are already safe when the caller sees it.
    pub fn poll(&mut self, ctx: &Context) -> Result<CommandState, RoutineError> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        if let Err(err) = self.step(ctx) {
            self.finish(ctx);
            return Err(err);
        }

        Ok(self.state)
    }

    fn step(&mut self, ctx: &Context) -> Result<(), RoutineError> {
        if self.state == CommandState::NotStarted {
            self.transition(CommandState::Running);
            self.kind.start(&self.name, ctx)?;
        }

        self.kind.run(&self.name, ctx)?;

        if !self.kind.should_continue(ctx)? {
            self.finish(ctx);
        }
        Ok(())
    }

    /// Stop a running command, running its end hook. Idempotent.
    ///
    /// Commands that never started are left untouched: they have nothing to
    /// clean up.
    pub fn abort(&mut self, ctx: &Context) {
        if self.state == CommandState::Running {
            debug!(command = %self.name, "aborting");
            self.finish(ctx);
        }
    }

    fn finish(&mut self, ctx: &Context) {
        if self.state == CommandState::Running {
            self.kind.end(ctx);
            self.transition(CommandState::Completed);
        }
    }

    fn transition(&mut self, to: CommandState) {
        debug!(command = %self.name, kind = self.kind.tag(), from = %self.state, to = %to, "transition");
        self.state = to;
    }

    /// Human-readable tree of this command and its children
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, 0);
        out
    }

    pub(crate) fn describe_into(&self, out: &mut String, depth: usize) {
        out.push_str(&format!(
            "{}{} [{}] {}\n",
            "  ".repeat(depth),
            self.name,
            self.kind.tag(),
            self.kind.summary()
        ));
        match &self.kind {
            CommandKind::Group(g) => g.describe_into(out, depth + 1),
            CommandKind::Threaded(t) => t.describe_inner(out, depth + 1),
            _ => {}
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("kind", &self.kind.tag())
            .field("state", &self.state)
            .finish()
    }
}

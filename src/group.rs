//! Sequential/concurrent command groups
//!
//! A group is an ordered list of steps. Each step has one primary command,
//! any number of concurrent companions, and any number of threaded companions.
//! A step is complete once its primary and every ordinary companion are
//! complete; threaded companions do not hold a step open, they run until they
//! finish on their own or the group ends.
//!
//! ```text
//! a          step 1: a
//! !b         step 1: a + b
//! &t         step 1: a + b, t threaded
//! c          step 2: c
//! ```

use std::time::Duration;

use tracing::{debug, warn};

use crate::command::Command;
use crate::context::Context;
use crate::error::RoutineError;

/// One scheduling step.
pub struct Step {
    primary: Command,
    companions: Vec<Command>,
    threaded: Vec<Command>,
}

impl Step {
    fn new(primary: Command) -> Self {
        Self {
            primary,
            companions: Vec::new(),
            threaded: Vec::new(),
        }
    }

    pub fn primary(&self) -> &Command {
        &self.primary
    }

    pub fn companions(&self) -> &[Command] {
        &self.companions
    }

    pub fn threaded(&self) -> &[Command] {
        &self.threaded
    }

    fn poll(&mut self, ctx: &Context) -> Result<(), RoutineError> {
        self.primary.poll(ctx)?;
        for companion in &mut self.companions {
            companion.poll(ctx)?;
        }
        self.poll_threaded(ctx)
    }

    fn poll_threaded(&mut self, ctx: &Context) -> Result<(), RoutineError> {
        for task in &mut self.threaded {
            task.poll(ctx)?;
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.primary.is_completed() && self.companions.iter().all(Command::is_completed)
    }

    fn abort(&mut self, ctx: &Context) {
        self.primary.abort(ctx);
        for cmd in self.companions.iter_mut().chain(self.threaded.iter_mut()) {
            cmd.abort(ctx);
        }
    }
}

/// Ordered steps, run one at a time.
#[derive(Default)]
pub struct CommandGroup {
    steps: Vec<Step>,
    current: usize,
}

impl CommandGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new step whose primary is `cmd`.
    pub fn append_sequential(&mut self, cmd: Command) {
        self.steps.push(Step::new(cmd));
    }

    /// Add `cmd` to the most recent step.
    ///
    /// Threaded commands become threaded companions. With no step yet, `cmd`
    /// opens the first one as its primary.
    pub fn append_concurrent(&mut self, cmd: Command) {
        match self.steps.last_mut() {
            Some(step) if cmd.is_threaded() => step.threaded.push(cmd),
            Some(step) => step.companions.push(cmd),
            None => {
                warn!(command = cmd.name(), "concurrent command with no preceding step; running it as a step");
                self.append_sequential(cmd);
            }
        }
    }

    /// Wrap `cmd` as a threaded command and add it to the most recent step.
    pub fn append_threaded(&mut self, cmd: Command, cadence: Duration) {
        self.append_concurrent(Command::threaded(cmd, cadence));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Index of the step currently running, `len()` once all are done
    pub fn current_step(&self) -> usize {
        self.current
    }

    /// Poll the current step; on completion advance and poll the next one in
    /// the same call. Each step is polled at most once per call.
    pub(crate) fn run(&mut self, ctx: &Context) -> Result<(), RoutineError> {
        // Threaded companions of finished steps keep running; poll them to
        // surface faults and notice completion.
        for step in &mut self.steps[..self.current] {
            step.poll_threaded(ctx)?;
        }

        while let Some(step) = self.steps.get_mut(self.current) {
            step.poll(ctx)?;
            if !step.is_complete() {
                break;
            }
            self.current += 1;
            debug!(step = self.current, total = self.steps.len(), "step complete");
        }
        Ok(())
    }

    pub(crate) fn should_continue(&self) -> bool {
        self.current < self.steps.len()
    }

    /// Abort everything still running, including threaded companions.
    pub(crate) fn end(&mut self, ctx: &Context) {
        for step in &mut self.steps {
            step.abort(ctx);
        }
    }

    pub(crate) fn describe_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{}step {}:\n", indent, i + 1));
            step.primary.describe_into(out, depth + 1);
            for cmd in step.companions.iter().chain(step.threaded.iter()) {
                cmd.describe_into(out, depth + 1);
            }
        }
    }
}

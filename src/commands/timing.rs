//! Time-gated commands.

use std::time::Duration;

use super::args::{self, Arity, CommandArgs};
use super::CommandSpec;
use crate::command::{Command, TimedOutput};
use crate::context::Context;
use crate::error::ScriptError;

const WAIT: &str = "wait";
const WAIT_UNTIL: &str = "waitUntil";

/// Arguments for `wait(seconds)` and `waitUntil(seconds)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitArgs {
    pub duration: Duration,
}

impl CommandArgs for WaitArgs {
    fn parse(command: &str, args: &[String]) -> Result<Self, ScriptError> {
        Ok(Self {
            duration: args::seconds(command, "seconds", &args[0])?,
        })
    }
}

fn wait(args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    let WaitArgs { duration } = WaitArgs::parse(WAIT, args)?;
    Ok(Command::timed(WAIT, duration, TimedOutput::Idle))
}

fn wait_until(args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    let WaitArgs { duration } = WaitArgs::parse(WAIT_UNTIL, args)?;
    Ok(Command::wait_until(WAIT_UNTIL, duration))
}

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: WAIT,
            description: "Do nothing for a number of seconds",
            usage: "wait(seconds)",
            arity: Arity::exactly(1),
            factory: wait,
        },
        CommandSpec {
            name: WAIT_UNTIL,
            description: "Hold the drive stopped until the match clock reaches a time",
            usage: "waitUntil(seconds)",
            arity: Arity::exactly(1),
            factory: wait_until,
        },
    ]
}

//! Drivetrain commands.

use std::time::Duration;

use super::args::{self, Arity, CommandArgs};
use super::CommandSpec;
use crate::command::{ActionEffect, Command, ConvergenceMode, TimedOutput};
use crate::config::Tuning;
use crate::context::Context;
use crate::error::ScriptError;

const DRIVE: &str = "drive";
const DRIVE_DISTANCE: &str = "driveDistance";
const DRIVE_STRAIGHT: &str = "driveStraight";
const TURN: &str = "turn";
const STOP: &str = "stop";

// ============================================================================
// Timed Drive
// ============================================================================

/// Arguments for `drive(left, right, durationMs)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveArgs {
    pub left: f64,
    pub right: f64,
    pub duration: Duration,
}

impl CommandArgs for DriveArgs {
    fn parse(command: &str, args: &[String]) -> Result<Self, ScriptError> {
        Ok(Self {
            left: args::power(command, "left", &args[0])?,
            right: args::power(command, "right", &args[1])?,
            duration: args::millis(command, "duration", &args[2])?,
        })
    }
}

fn drive(args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    let DriveArgs {
        left,
        right,
        duration,
    } = DriveArgs::parse(DRIVE, args)?;
    Ok(Command::timed(
        DRIVE,
        duration,
        TimedOutput::Tank { left, right },
    ))
}

// ============================================================================
// Closed-Loop Moves
// ============================================================================

/// Arguments for `driveDistance`, `driveStraight` and `turn`:
/// `(target, [threshold])`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetArgs {
    pub target: i64,
    pub threshold: Option<u32>,
}

impl TargetArgs {
    /// The script's threshold, or the tuned default
    pub fn threshold_or_default(&self, tuning: &Tuning) -> u32 {
        self.threshold.unwrap_or(tuning.default_threshold)
    }
}

impl CommandArgs for TargetArgs {
    fn parse(command: &str, args: &[String]) -> Result<Self, ScriptError> {
        let target = args::integer(command, "target", &args[0])?;
        let threshold = match args.get(1) {
            None => None,
            Some(raw) => {
                let value = args::integer(command, "threshold", raw)?;
                match u32::try_from(value) {
                    Ok(t) if t >= 1 => Some(t),
                    _ => {
                        return Err(ScriptError::argument(
                            command,
                            "a positive 'threshold'",
                            format!("got {}", value),
                        ))
                    }
                }
            }
        };
        Ok(Self { target, threshold })
    }
}

fn convergence(
    name: &'static str,
    mode: ConvergenceMode,
    args: &[String],
    ctx: &Context,
) -> Result<Command, ScriptError> {
    let parsed = TargetArgs::parse(name, args)?;
    let threshold = parsed.threshold_or_default(&ctx.tuning);
    // The threshold is both the tolerance band and the consecutive-poll count
    Ok(Command::convergence(
        name,
        mode,
        parsed.target as f64,
        f64::from(threshold),
        threshold,
    ))
}

fn drive_distance(args: &[String], ctx: &Context) -> Result<Command, ScriptError> {
    convergence(DRIVE_DISTANCE, ConvergenceMode::Distance, args, ctx)
}

fn drive_straight(args: &[String], ctx: &Context) -> Result<Command, ScriptError> {
    convergence(DRIVE_STRAIGHT, ConvergenceMode::Straight, args, ctx)
}

fn turn(args: &[String], ctx: &Context) -> Result<Command, ScriptError> {
    let mode = ConvergenceMode::Turn {
        coefficient: ctx.tuning.turn_speed_coefficient,
    };
    convergence(TURN, mode, args, ctx)
}

// ============================================================================
// Stop
// ============================================================================

fn stop(_args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    Ok(Command::action(STOP, ActionEffect::StopDrive))
}

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: DRIVE,
            description: "Tank drive at fixed power for a time",
            usage: "drive(left, right, durationMs)",
            arity: Arity::exactly(3),
            factory: drive,
        },
        CommandSpec {
            name: DRIVE_DISTANCE,
            description: "Drive until the encoder settles on a distance",
            usage: "driveDistance(distance, [threshold])",
            arity: Arity::between(1, 2),
            factory: drive_distance,
        },
        CommandSpec {
            name: DRIVE_STRAIGHT,
            description: "Drive a distance while holding heading",
            usage: "driveStraight(distance, [threshold])",
            arity: Arity::between(1, 2),
            factory: drive_straight,
        },
        CommandSpec {
            name: TURN,
            description: "Turn in place until the gyro settles on an angle",
            usage: "turn(angle, [threshold])",
            arity: Arity::between(1, 2),
            factory: turn,
        },
        CommandSpec {
            name: STOP,
            description: "Zero drive output",
            usage: "stop()",
            arity: Arity::exactly(0),
            factory: stop,
        },
    ]
}

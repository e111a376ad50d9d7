//! Two-position mechanism commands.

use super::args::Arity;
use super::CommandSpec;
use crate::command::{ActionEffect, Command};
use crate::context::Context;
use crate::error::ScriptError;
use crate::types::{MechanismId, MechanismPosition};

fn actuate(
    name: &'static str,
    mechanism: MechanismId,
    position: MechanismPosition,
) -> Result<Command, ScriptError> {
    Ok(Command::action(
        name,
        ActionEffect::SetMechanism {
            mechanism,
            position,
        },
    ))
}

fn deploy_bucket(_args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    actuate("deployBucket", MechanismId::Bucket, MechanismPosition::Extended)
}

fn retract_bucket(_args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    actuate("retractBucket", MechanismId::Bucket, MechanismPosition::Retracted)
}

fn close_guard(_args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    actuate("closeGuard", MechanismId::GearGuard, MechanismPosition::Extended)
}

fn open_guard(_args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    actuate("openGuard", MechanismId::GearGuard, MechanismPosition::Retracted)
}

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "deployBucket",
            description: "Extend the bucket",
            usage: "deployBucket()",
            arity: Arity::exactly(0),
            factory: deploy_bucket,
        },
        CommandSpec {
            name: "retractBucket",
            description: "Retract the bucket",
            usage: "retractBucket()",
            arity: Arity::exactly(0),
            factory: retract_bucket,
        },
        CommandSpec {
            name: "closeGuard",
            description: "Close the gear guard",
            usage: "closeGuard()",
            arity: Arity::exactly(0),
            factory: close_guard,
        },
        CommandSpec {
            name: "openGuard",
            description: "Open the gear guard",
            usage: "openGuard()",
            arity: Arity::exactly(0),
            factory: open_guard,
        },
    ]
}

//! Diagnostic output.

use super::args::{Arity, CommandArgs};
use super::CommandSpec;
use crate::command::{ActionEffect, Command};
use crate::context::Context;
use crate::error::ScriptError;

const PRINT: &str = "print";

/// Arguments for `print(...)`: passed through verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintArgs {
    pub message: Vec<String>,
}

impl CommandArgs for PrintArgs {
    fn parse(_command: &str, args: &[String]) -> Result<Self, ScriptError> {
        Ok(Self {
            message: args.to_vec(),
        })
    }
}

fn print(args: &[String], _ctx: &Context) -> Result<Command, ScriptError> {
    let PrintArgs { message } = PrintArgs::parse(PRINT, args)?;
    Ok(Command::action(PRINT, ActionEffect::Print(message)))
}

pub(super) fn specs() -> Vec<CommandSpec> {
    vec![CommandSpec {
        name: PRINT,
        description: "Write the arguments to the diagnostic log",
        usage: "print(args...)",
        arity: Arity::any(),
        factory: print,
    }]
}

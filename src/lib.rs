//! autoscript library
//!
//! Compiles a small line-oriented robot scripting language into a tree of
//! cooperatively scheduled commands and executes it one host tick at a time.

pub mod cli;
pub mod command;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod group;
pub mod hardware;
pub mod parser;
pub mod sim;
pub mod threaded;
pub mod types;

// Re-export main types for convenience
pub use command::{
    Action, ActionEffect, Command, CommandKind, CommandState, ConvergenceLoop, ConvergenceMode,
    Debounce, TimedLoop, TimedOutput, WaitUntil,
};
pub use commands::{Arity, CommandArgs, CommandRegistry, CommandSpec};
pub use compiler::{compile, load, ScriptSource};
pub use config::{RobotConfig, Tuning};
pub use context::Context;
pub use engine::{Engine, HostLoop, RoutineStatus, RunOutcome, RunSummary};
pub use error::{HardwareFault, RoutineError, ScriptError};
pub use group::{CommandGroup, Step};
pub use hardware::Hardware;
pub use parser::{parse, substitute, Entry, EntryKind, Placement, ScriptCommand};
pub use threaded::{TaskHandle, TaskRuntime, TaskSpawner};
pub use types::{Alliance, MechanismId, MechanismPosition};

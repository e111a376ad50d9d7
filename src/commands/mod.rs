//! Command registry
//!
//! A closed, name-keyed table of [`CommandSpec`]s. Each spec declares its
//! arity and a factory that turns validated arguments into a [`Command`].
//! Lookup is case-insensitive, matching the parser, which lower-cases every
//! name.
//!
//! One submodule per command family, each with its own typed argument struct:
//!
//! | Module | Commands |
//! |---|---|
//! | [`drive`] | `drive`, `driveDistance`, `driveStraight`, `turn`, `stop` |
//! | [`timing`] | `wait`, `waitUntil` |
//! | [`mechanism`] | `deployBucket`, `retractBucket`, `closeGuard`, `openGuard` |
//! | [`diagnostics`] | `print` |

pub mod args;
pub mod diagnostics;
pub mod drive;
pub mod mechanism;
pub mod timing;

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::command::Command;
use crate::context::Context;
use crate::error::ScriptError;
use crate::parser::ScriptCommand;

pub use args::{Arity, CommandArgs};

/// Builds a command from arguments already checked against [`CommandSpec::arity`].
pub type Factory = fn(&[String], &Context) -> Result<Command, ScriptError>;

/// Registry entry for one command name.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    /// Canonical spelling, used for display and error messages
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub arity: Arity,
    pub factory: Factory,
}

impl CommandSpec {
    /// Check arity, then run the factory.
    pub fn build(&self, args: &[String], ctx: &Context) -> Result<Command, ScriptError> {
        self.arity.check(self.name, args.len())?;
        (self.factory)(args, ctx)
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Name-keyed table of command specs.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    specs: BTreeMap<String, CommandSpec>,
}

impl CommandRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in drive::specs()
            .into_iter()
            .chain(timing::specs())
            .chain(mechanism::specs())
            .chain(diagnostics::specs())
        {
            registry.register(spec);
        }
        registry
    }

    /// Add a spec, replacing any existing one with the same name.
    pub fn register(&mut self, spec: CommandSpec) -> Option<CommandSpec> {
        let replaced = self.specs.insert(spec.name.to_lowercase(), spec);
        if replaced.is_some() {
            warn!(command = spec.name, "replacing registered command");
        }
        replaced
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.specs.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Canonical names, sorted case-insensitively
    pub fn names(&self) -> Vec<&'static str> {
        self.specs.values().map(|s| s.name).collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &CommandSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve and build one script command.
    pub fn build(&self, cmd: &ScriptCommand, ctx: &Context) -> Result<Command, ScriptError> {
        let spec = self
            .get(&cmd.name)
            .ok_or_else(|| ScriptError::unknown_command(&cmd.name))?;
        spec.build(&cmd.arguments, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandKind, CommandState};
    use crate::context::test_support::TestRig;
    use crate::hardware::FeedbackController;
    use crate::parser::Placement;

    fn script(name: &str, args: &[&str]) -> ScriptCommand {
        ScriptCommand {
            placement: Placement::Sequential,
            name: name.to_string(),
            arguments: args.iter().map(|a| a.to_string()).collect(),
            line_number: 1,
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = CommandRegistry::with_builtins();
        for name in [
            "print",
            "drive",
            "driveDistance",
            "driveStraight",
            "turn",
            "stop",
            "wait",
            "waitUntil",
            "deployBucket",
            "retractBucket",
            "closeGuard",
            "openGuard",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert_eq!(registry.len(), 12);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = CommandRegistry::with_builtins();
        let spec = registry.get("drivedistance").unwrap();
        assert_eq!(spec.name, "driveDistance");
        assert!(registry.get("DRIVESTRAIGHT").is_some());
    }

    #[test]
    fn test_unknown_command() {
        let rig = TestRig::new();
        let registry = CommandRegistry::with_builtins();
        let err = registry.build(&script("frobnicate", &[]), &rig.ctx).unwrap_err();
        assert_eq!(err, ScriptError::unknown_command("frobnicate"));
    }

    #[test]
    fn test_arity_checked_before_factory() {
        let rig = TestRig::new();
        let registry = CommandRegistry::with_builtins();
        let err = registry.build(&script("drive", &["0.2", "0.2"]), &rig.ctx).unwrap_err();
        assert!(matches!(err, ScriptError::Argument { ref command, ref expected, .. }
            if command == "drive" && expected == "3 arguments"));
    }

    fn sample_args(name: &str) -> &'static [&'static str] {
        match name {
            "drive" => &["0.2", "0.2", "1000"],
            "driveDistance" | "driveStraight" => &["100"],
            "turn" => &["90", "5"],
            "wait" | "waitUntil" => &["1"],
            "print" => &["hello"],
            _ => &[],
        }
    }

    #[test]
    fn test_built_commands_start_not_started() {
        let rig = TestRig::new();
        let registry = CommandRegistry::with_builtins();
        for spec in registry.specs() {
            let cmd = registry
                .build(&script(spec.name, sample_args(spec.name)), &rig.ctx)
                .unwrap_or_else(|e| panic!("{} failed to build: {}", spec.name, e));
            assert_eq!(cmd.state(), CommandState::NotStarted, "{}", spec.name);
        }
        assert_eq!(rig.sim.actuator_writes(), 0);
        assert!(!rig.sim.distance_controller.is_enabled());
        assert!(!rig.sim.heading_controller.is_enabled());
    }

    #[test]
    fn test_drive_builds_timed_loop() {
        let rig = TestRig::new();
        let registry = CommandRegistry::with_builtins();
        let cmd = registry
            .build(&script("drive", &["0.2", "0.2", "1000"]), &rig.ctx)
            .unwrap();
        assert!(matches!(cmd.kind(), CommandKind::TimedLoop(_)));
    }

    #[test]
    fn test_register_replaces() {
        fn noop(_: &[String], _: &Context) -> Result<Command, ScriptError> {
            Ok(Command::action("stop", crate::command::ActionEffect::StopDrive))
        }
        let mut registry = CommandRegistry::with_builtins();
        let replaced = registry.register(CommandSpec {
            name: "Stop",
            description: "custom stop",
            usage: "stop()",
            arity: Arity::exactly(0),
            factory: noop,
        });
        assert!(replaced.is_some());
        assert_eq!(registry.get("stop").unwrap().description, "custom stop");
        assert_eq!(registry.len(), 12);
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = CommandRegistry::with_builtins();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort_by_key(|n| n.to_lowercase());
        assert_eq!(names, sorted);
    }
}

//! Error handling module for autoscript
//!
//! Compile-time failures (`ScriptError`) are kept apart from run-time failures
//! (`RoutineError`) so that nothing discovered while compiling can ever surface
//! after a command has started moving the robot.

use thiserror::Error;

/// Failures raised while loading and compiling a script.
///
/// Every variant is produced strictly before execution begins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// A line that is neither an assignment nor a well-formed invocation
    #[error("Parse error on line {line_number}: '{line}'")]
    Parse { line_number: usize, line: String },

    /// Wrong argument count or an argument that does not parse
    #[error("Invalid arguments to '{command}': expected {expected} ({reason})")]
    Argument {
        command: String,
        expected: String,
        reason: String,
    },

    /// Name not present in the command registry
    #[error("Unknown command: '{name}'")]
    UnknownCommand { name: String },

    /// Script file unreadable, after the fallback attempt
    #[error("Unable to read script (tried {tried}): {reason}")]
    Io { tried: String, reason: String },
}

impl ScriptError {
    /// Create an argument error for `command`
    pub fn argument(
        command: impl Into<String>,
        expected: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Argument {
            command: command.into(),
            expected: expected.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown command error
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }
}

/// A collaborator failed while a command was being polled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Hardware fault in {device}: {reason}")]
pub struct HardwareFault {
    pub device: String,
    pub reason: String,
}

impl HardwareFault {
    pub fn new(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            reason: reason.into(),
        }
    }
}

/// Failures raised while a routine is executing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutineError {
    /// A sensor or actuator failed during a poll
    #[error("Command '{command}' faulted: {fault}")]
    Fault {
        command: String,
        #[source]
        fault: HardwareFault,
    },

    /// A threaded task could not be spawned or died unexpectedly
    #[error("Threaded command '{command}' failed: {reason}")]
    TaskFailed { command: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScriptError::unknown_command("frobnicate");
        assert_eq!(err.to_string(), "Unknown command: 'frobnicate'");
    }

    #[test]
    fn test_parse_error_carries_line() {
        let err = ScriptError::Parse {
            line_number: 3,
            line: "drive 0.2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("drive 0.2"));
    }

    #[test]
    fn test_argument_error_names_command_and_arity() {
        let err = ScriptError::argument("drive", "3 arguments", "got 2");
        let msg = err.to_string();
        assert!(msg.contains("drive"));
        assert!(msg.contains("3 arguments"));
    }
}

//! Execution context handed to every command hook.

use crate::config::Tuning;
use crate::hardware::Hardware;
use crate::threaded::TaskSpawner;

/// Hardware handles, tuning constants and the threaded-task spawner.
///
/// Built once per autonomous phase. Cloning is cheap: threaded tasks each keep
/// their own copy.
#[derive(Debug, Clone)]
pub struct Context {
    pub hardware: Hardware,
    pub tuning: Tuning,
    pub tasks: TaskSpawner,
}

impl Context {
    pub fn new(hardware: Hardware, tuning: Tuning, tasks: TaskSpawner) -> Self {
        Self {
            hardware,
            tuning,
            tasks,
        }
    }
}

//! Script loading and compilation
//!
//! Compilation is all-or-nothing: every command is validated and built before
//! the group is assembled, so a bad line anywhere leaves no partial routine and
//! touches no actuator.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::commands::CommandRegistry;
use crate::context::Context;
use crate::error::ScriptError;
use crate::group::CommandGroup;
use crate::parser::{self, Placement};
use crate::types::Alliance;

/// Name given to the root group of every compiled routine
pub const ROOT_NAME: &str = "routine";

/// Where a script is read from: a primary path and an optional fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    primary: PathBuf,
    fallback: Option<PathBuf>,
}

impl ScriptSource {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<PathBuf>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// `<dir>/<routine>_<alliance>.txt`, falling back to `<dir>/<routine>.txt`
    pub fn for_routine(dir: &Path, routine: &str, alliance: Alliance) -> Self {
        Self::new(dir.join(format!("{}_{}.txt", routine, alliance)))
            .with_fallback(dir.join(format!("{}.txt", routine)))
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&Path> {
        self.fallback.as_deref()
    }

    /// Read the script text, trying the fallback if the primary is unreadable.
    ///
    /// Returns the path that was actually read alongside its contents.
    pub fn read(&self) -> Result<(PathBuf, String), ScriptError> {
        let primary_err = match std::fs::read_to_string(&self.primary) {
            Ok(text) => return Ok((self.primary.clone(), text)),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(ScriptError::Io {
                tried: self.primary.display().to_string(),
                reason: primary_err.to_string(),
            });
        };

        warn!(
            primary = %self.primary.display(),
            fallback = %fallback.display(),
            error = %primary_err,
            "primary script unreadable, using fallback"
        );
        std::fs::read_to_string(fallback)
            .map(|text| (fallback.clone(), text))
            .map_err(|e| ScriptError::Io {
                tried: format!("{}, {}", self.primary.display(), fallback.display()),
                reason: e.to_string(),
            })
    }
}

/// Compile script text into a routine.
pub fn compile(
    text: &str,
    registry: &CommandRegistry,
    ctx: &Context,
) -> Result<Command, ScriptError> {
    let entries = parser::parse(text)?;
    let script = parser::substitute(&entries);

    let built = script
        .iter()
        .map(|sc| {
            let cmd = registry.build(sc, ctx).inspect_err(|err| {
                debug!(line = sc.line_number, error = %err, "command rejected");
            })?;
            Ok((sc.placement, cmd))
        })
        .collect::<Result<Vec<_>, ScriptError>>()?;

    let mut group = CommandGroup::new();
    let cadence = ctx.tuning.threaded_cadence();
    for (placement, cmd) in built {
        match placement {
            Placement::Sequential => group.append_sequential(cmd),
            Placement::Concurrent => group.append_concurrent(cmd),
            Placement::Threaded => group.append_threaded(cmd, cadence),
        }
    }

    info!(
        entries = entries.len(),
        commands = script.len(),
        steps = group.len(),
        "script compiled"
    );
    Ok(Command::group(ROOT_NAME, group))
}

/// Read `source` and compile it.
pub fn load(
    source: &ScriptSource,
    registry: &CommandRegistry,
    ctx: &Context,
) -> Result<Command, ScriptError> {
    let (path, text) = source.read()?;
    info!(path = %path.display(), "loading script");
    compile(&text, registry, ctx)
}

//! Script parser
//!
//! Turns script text into an ordered list of [`Entry`] values, then into
//! [`ScriptCommand`]s with variables substituted into their arguments.
//!
//! # Grammar
//!
//! One entry per line; blank lines are skipped and everything is
//! case-insensitive.
//!
//! ```text
//! speed = 0.4                      assignment
//! drive(speed, speed, 1000)        sequential invocation
//! !deployBucket()                  concurrent with the previous step
//! &turn(90)                        threaded companion of the previous step
//! ```
//!
//! A line is an assignment when its first `=` comes before any `(`.

use tracing::trace;

use crate::error::ScriptError;

/// Whether an entry defines a variable or invokes a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Assignment,
    Invocation,
}

/// One parsed line. `key` and `value` are trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Variable name, or command name including any placement prefix
    pub key: String,
    /// Assigned value, or the raw argument body
    pub value: String,
    pub kind: EntryKind,
    /// 1-based line in the source text
    pub line_number: usize,
}

/// `[A-Za-z_][A-Za-z0-9_]*`. A leading digit would let an assignment rewrite
/// numeric literals during substitution.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse script text into entries, in file order.
///
/// Stops at the first malformed line.
pub fn parse(text: &str) -> Result<Vec<Entry>, ScriptError> {
    let mut entries = Vec::new();

    for (index, raw) in text.split('\n').enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let line_number = index + 1;
        let entry = parse_line(line, line_number).ok_or_else(|| ScriptError::Parse {
            line_number,
            line: line.to_string(),
        })?;
        trace!(line = line_number, key = %entry.key, value = %entry.value, "parsed entry");
        entries.push(entry);
    }

    Ok(entries)
}

fn parse_line(line: &str, line_number: usize) -> Option<Entry> {
    let open = line.find('(');
    let equals = line.find('=');

    let is_assignment = match (equals, open) {
        (Some(eq), Some(op)) => eq < op,
        (Some(_), None) => true,
        _ => false,
    };

    if is_assignment {
        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if !is_identifier(key) {
            return None;
        }
        return Some(Entry {
            key: key.to_lowercase(),
            value: value.trim().to_lowercase(),
            kind: EntryKind::Assignment,
            line_number,
        });
    }

    let open = open?;
    let close = line.rfind(')')?;
    if close < open || !line[close + 1..].trim().is_empty() {
        return None;
    }

    let head = line[..open].trim();
    let name = head.strip_prefix(['!', '&']).unwrap_or(head).trim();
    if !is_identifier(name) {
        return None;
    }
    let key = match head.chars().next() {
        Some(prefix @ ('!' | '&')) => format!("{}{}", prefix, name),
        _ => name.to_string(),
    };

    let mut body = line[open + 1..close].trim();
    body = body.strip_prefix('(').unwrap_or(body);
    body = body.strip_suffix(')').unwrap_or(body);

    Some(Entry {
        key: key.to_lowercase(),
        value: body.trim().to_lowercase(),
        kind: EntryKind::Invocation,
        line_number,
    })
}

/// How a command is attached to the routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Starts a new step
    Sequential,
    /// `!` prefix: runs alongside the previous step's primary
    Concurrent,
    /// `&` prefix: runs alongside the previous step on its own cadence
    Threaded,
}

/// A command invocation ready for the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCommand {
    pub placement: Placement,
    pub name: String,
    pub arguments: Vec<String>,
    pub line_number: usize,
}

impl ScriptCommand {
    /// Derive a command from an invocation entry. Returns `None` for
    /// assignments.
    pub fn from_entry(entry: &Entry) -> Option<Self> {
        if entry.kind != EntryKind::Invocation {
            return None;
        }

        let (placement, name) = if let Some(name) = entry.key.strip_prefix('!') {
            (Placement::Concurrent, name)
        } else if let Some(name) = entry.key.strip_prefix('&') {
            (Placement::Threaded, name)
        } else {
            (Placement::Sequential, entry.key.as_str())
        };

        let arguments = if entry.value.is_empty() {
            Vec::new()
        } else {
            entry.value.split(',').map(|a| a.trim().to_string()).collect()
        };

        Some(Self {
            placement,
            name: name.to_string(),
            arguments,
            line_number: entry.line_number,
        })
    }

    pub fn is_concurrent(&self) -> bool {
        self.placement != Placement::Sequential
    }
}

/// Build the command list, substituting variables into arguments.
///
/// Variables come from assignment entries only, applied in the order they were
/// first defined; a redefinition keeps that position but replaces the value.
/// Every occurrence of a variable name inside an argument is replaced.
pub fn substitute(entries: &[Entry]) -> Vec<ScriptCommand> {
    let mut variables: Vec<(&str, &str)> = Vec::new();
    for entry in entries.iter().filter(|e| e.kind == EntryKind::Assignment) {
        match variables.iter_mut().find(|(k, _)| *k == entry.key) {
            Some(slot) => slot.1 = entry.value.as_str(),
            None => variables.push((entry.key.as_str(), entry.value.as_str())),
        }
    }

    entries
        .iter()
        .filter_map(ScriptCommand::from_entry)
        .map(|mut cmd| {
            for arg in &mut cmd.arguments {
                for &(key, value) in &variables {
                    if arg.contains(key) {
                        *arg = arg.replace(key, value);
                    }
                }
            }
            cmd
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(key: &str, value: &str) -> (String, String, EntryKind) {
        (key.to_string(), value.to_string(), EntryKind::Invocation)
    }

    fn shape(entries: &[Entry]) -> Vec<(String, String, EntryKind)> {
        entries
            .iter()
            .map(|e| (e.key.clone(), e.value.clone(), e.kind))
            .collect()
    }

    // =========================================================================
    // Line Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_mixed_script() {
        let text = "speed = 0.4\ndrive(speed, speed, 1000)\n\n!deployBucket()\n";
        let entries = parse(text).unwrap();

        assert_eq!(
            shape(&entries),
            vec![
                ("speed".to_string(), "0.4".to_string(), EntryKind::Assignment),
                invocation("drive", "speed, speed, 1000"),
                invocation("!deploybucket", ""),
            ]
        );
        assert_eq!(entries[2].line_number, 4);
    }

    #[test]
    fn test_parse_lowercases_and_trims() {
        let entries = parse("   DriveDistance( 120 , 5 )   ").unwrap();
        assert_eq!(shape(&entries), vec![invocation("drivedistance", "120 , 5")]);
    }

    #[test]
    fn test_parse_strips_one_nesting_layer() {
        let entries = parse("turn((90))").unwrap();
        assert_eq!(entries[0].value, "90");

        let entries = parse("print(((x)))").unwrap();
        assert_eq!(entries[0].value, "(x)");
    }

    #[test]
    fn test_parse_handles_crlf() {
        let entries = parse("stop()\r\nwait(1)\r\n").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].value, "1");
    }

    #[test]
    fn test_parse_equals_inside_arguments_is_invocation() {
        let entries = parse("print(a=b)").unwrap();
        assert_eq!(shape(&entries), vec![invocation("print", "a=b")]);
    }

    #[test]
    fn test_parse_threaded_prefix() {
        let entries = parse("& turn(90)").unwrap();
        assert_eq!(entries[0].key, "&turn");
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for bad in [
            "drive 0.2",
            "drive(0.2",
            "drive)0.2(",
            "(0.2)",
            "dr ive(1)",
            "drive(1) extra",
            "= 5",
            "two words = 5",
            "0 = 5",
            "2x = 1",
            "9lives(1)",
        ] {
            let err = parse(bad).unwrap_err();
            assert!(
                matches!(err, ScriptError::Parse { line_number: 1, .. }),
                "expected parse error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_parse_error_reports_line_number() {
        let err = parse("stop()\n\nwait(1)\nnonsense\n").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Parse {
                line_number: 4,
                line: "nonsense".to_string()
            }
        );
    }

    #[test]
    fn test_numeric_key_is_rejected() {
        let err = parse("0 = 5\nwait(10)").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Parse {
                line_number: 1,
                line: "0 = 5".to_string()
            }
        );
        // Underscore and trailing digits are still fine
        assert_eq!(parse("_speed2 = 0.5").unwrap()[0].key, "_speed2");
    }

    #[test]
    fn test_parse_empty_text() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n  \n\t\n").unwrap().is_empty());
    }

    // =========================================================================
    // Command Derivation Tests
    // =========================================================================

    #[test]
    fn test_placement_from_prefix() {
        let entries = parse("a()\n!b()\n&c()").unwrap();
        let cmds = substitute(&entries);
        let placements: Vec<_> = cmds.iter().map(|c| c.placement).collect();
        assert_eq!(
            placements,
            vec![Placement::Sequential, Placement::Concurrent, Placement::Threaded]
        );
        assert!(!cmds[0].is_concurrent());
        assert!(cmds[1].is_concurrent());
        assert_eq!(cmds[1].name, "b");
    }

    #[test]
    fn test_empty_body_has_no_arguments() {
        let cmds = substitute(&parse("stop()").unwrap());
        assert!(cmds[0].arguments.is_empty());
    }

    #[test]
    fn test_assignments_never_become_commands() {
        let cmds = substitute(&parse("x = 1\ny = 2").unwrap());
        assert!(cmds.is_empty());
    }

    // =========================================================================
    // Substitution Tests
    // =========================================================================

    #[test]
    fn test_substitution_replaces_variables() {
        let cmds = substitute(&parse("speed = 0.4\ndrive(speed, -speed, 1000)").unwrap());
        assert_eq!(cmds[0].arguments, vec!["0.4", "-0.4", "1000"]);
    }

    #[test]
    fn test_substitution_last_value_wins() {
        let cmds = substitute(&parse("t = 1\nwait(t)\nt = 2").unwrap());
        assert_eq!(cmds[0].arguments, vec!["2"]);
    }

    #[test]
    fn test_substitution_applies_in_definition_order() {
        // `ab` is defined first, so it is replaced before `a` can split it
        let cmds = substitute(&parse("ab = 7\na = 3\nprint(ab, a)").unwrap());
        assert_eq!(cmds[0].arguments, vec!["7", "3"]);
    }

    #[test]
    fn test_substitution_never_touches_names() {
        let cmds = substitute(&parse("wait = 5\nwait(1)").unwrap());
        assert_eq!(cmds[0].name, "wait");
        assert_eq!(cmds[0].arguments, vec!["1"]);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "a = 1\nprint(a)\n!wait(0.5)\n&turn(a)";
        assert_eq!(parse(text).unwrap(), parse(text).unwrap());
    }
}

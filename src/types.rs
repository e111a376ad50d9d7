//! Shared enums for the robot routine
//!
//! Stringly-typed settings are replaced with proper enums so that config files
//! and CLI flags are validated at load time.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Which side of the field the robot starts on.
///
/// Selects the alliance-specific script; the alliance-independent script is the
/// fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Alliance {
    #[default]
    Red,
    Blue,
}

/// The two terminal positions of a double-acting mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MechanismPosition {
    Extended,
    Retracted,
}

/// Which mechanism an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MechanismId {
    Bucket,
    GearGuard,
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored or user-supplied string does not name a known variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// How a run was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Manual,
    Scheduled,
}

string_enum!(RunType, "run type", {
    Manual => "manual",
    Scheduled => "scheduled",
});

/// Lifecycle state of a run. A run starts `running` and ends in exactly one
/// of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

string_enum!(RunStatus, "run status", {
    Running => "running",
    Success => "success",
    Failed => "failed",
});

/// Classification bucket assigned to a score within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Top,
    Hot,
    Watch,
    Normal,
}

string_enum!(Tier, "tier", {
    Top => "top",
    Hot => "hot",
    Watch => "watch",
    Normal => "normal",
});

/// Scoring strategy for a run.
///
/// `Smart` screens every snapshot and scores survivors one LLM call each.
/// `Aggregated` sends up to ten snapshots in a single request and asks for a
/// ranked top-3 instead of individual scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Smart,
    Aggregated,
}

string_enum!(AnalysisMode, "analysis mode", {
    Smart => "smart",
    Aggregated => "aggregated",
});

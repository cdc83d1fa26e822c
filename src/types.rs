//! Core types and events

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::progress::ProgressReport;

/// An independently versioned, installable unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    /// The launcher itself
    Launcher,
    /// The game distribution
    Game,
}

impl Module {
    /// All modules, launcher first
    pub const ALL: [Module; 2] = [Module::Launcher, Module::Game];

    /// Lowercase name used in logs and serialized events
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Launcher => "launcher",
            Module::Game => "game",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "launcher" => Ok(Module::Launcher),
            "game" => Ok(Module::Game),
            _ => Err(Error::InvalidModule(s.to_string())),
        }
    }
}

/// Dotted numeric version (`major.minor[.build[.revision]]`)
///
/// Missing trailing components compare as zero, so `1.2` equals `1.2.0`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModuleVersion {
    components: Vec<u32>,
}

impl ModuleVersion {
    /// The lowest possible version, `0.0.0`
    pub fn zero() -> Self {
        Self {
            components: vec![0, 0, 0],
        }
    }

    /// Parse a version string, tolerating a leading `v` and surrounding whitespace
    ///
    /// Returns `None` unless the text holds two to four dot-separated unsigned integers.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim().trim_start_matches(['v', 'V']);
        let components = trimmed
            .split('.')
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;

        if !(2..=4).contains(&components.len()) {
            return None;
        }

        Some(Self { components })
    }

    /// Parse a version string, falling back to `0.0.0` with a warning
    pub fn parse_or_zero(text: &str, source: &str) -> Self {
        Self::parse(text).unwrap_or_else(|| {
            tracing::warn!(
                source = source,
                value = %text.trim(),
                "Failed to parse version, using 0.0.0 instead"
            );
            Self::zero()
        })
    }

    /// The numeric components
    pub fn components(&self) -> &[u32] {
        &self.components
    }

    fn component(&self, index: usize) -> u32 {
        self.components.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for ModuleVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::Other(format!("invalid version string {s:?}")))
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl Ord for ModuleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ModuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ModuleVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ModuleVersion {}

/// Module-level operation kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Full installation (download then verify)
    Install,
    /// Download of every manifest entry, resuming from the install cookie
    Download,
    /// Update against the refreshed manifest
    Update,
    /// Integrity scan and repair
    Verify,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Install => "install",
            Operation::Download => "download",
            Operation::Update => "update",
            Operation::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// An entry that could not be brought to a correct state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    /// Module-relative path of the entry
    pub relative_path: String,
    /// Why the entry is still broken
    pub reason: String,
}

/// Final state of a module-level operation
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatchOutcome {
    /// Every entry was processed and is in the expected state
    Completed {
        /// Number of entries processed
        processed: usize,
    },
    /// The pass ran to the end but some entries are still broken
    Partial {
        /// Number of entries processed
        processed: usize,
        /// Entries that are still broken
        failed: Vec<FailedEntry>,
    },
    /// The pass stopped early; files already written stay in place
    Failed {
        /// Number of entries processed before the failure
        processed: usize,
        /// Why the pass stopped
        reason: String,
    },
}

impl PatchOutcome {
    /// Whether the operation finished with every entry intact
    pub fn is_success(&self) -> bool {
        matches!(self, PatchOutcome::Completed { .. })
    }

    /// Number of entries processed
    pub fn processed(&self) -> usize {
        match self {
            PatchOutcome::Completed { processed }
            | PatchOutcome::Partial { processed, .. }
            | PatchOutcome::Failed { processed, .. } => *processed,
        }
    }
}

/// Event emitted while the engine works on a module
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A module-level operation started
    OperationStarted {
        /// Module being worked on
        module: Module,
        /// Operation kind
        operation: Operation,
    },

    /// Operation-level progress (entries completed out of total)
    Progress {
        /// Module being worked on
        module: Module,
        /// Operation kind
        operation: Operation,
        /// Progress snapshot
        report: ProgressReport,
    },

    /// Byte-level progress for the file currently being transferred
    Transfer {
        /// Module being worked on
        module: Module,
        /// Progress snapshot
        report: ProgressReport,
    },

    /// Verification found an entry failing its integrity check
    EntryQueued {
        /// Module being worked on
        module: Module,
        /// Module-relative path of the entry
        relative_path: String,
    },

    /// An entry could not be processed
    EntryFailed {
        /// Module being worked on
        module: Module,
        /// Module-relative path of the entry
        relative_path: String,
        /// Error message
        error: String,
    },

    /// A module-level operation finished
    OperationFinished {
        /// Module being worked on
        module: Module,
        /// Operation kind
        operation: Operation,
        /// Final state
        outcome: PatchOutcome,
    },
}

//! Progress snapshots emitted during long-running operations
//!
//! A [`ProgressReport`] is an immutable value. It is assembled by
//! [`ProgressReportBuilder`], which accumulates inputs and only derives the fraction
//! and the progress bar message when [`build`](ProgressReportBuilder::build) is called.

use serde::{Deserialize, Serialize};

/// Immutable progress snapshot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Completion in the range 0.0 to 1.0
    pub fraction: f64,
    /// Short description of the item in progress, e.g. `data/a.pak - (512/1024)`
    pub progress_bar_message: String,
    /// Free-text status line
    pub indicator_message: Option<String>,
}

impl ProgressReport {
    /// Start building a report
    pub fn builder() -> ProgressReportBuilder {
        ProgressReportBuilder::default()
    }
}

/// Accumulating builder for [`ProgressReport`]
#[derive(Clone, Debug, Default)]
pub struct ProgressReportBuilder {
    filename: Option<String>,
    path: Option<String>,
    current: Option<f64>,
    target: Option<f64>,
    fraction: Option<f64>,
    indicator_message: Option<String>,
}

impl ProgressReportBuilder {
    /// Name of the item in progress; takes precedence over [`path`](Self::path)
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Path of the item in progress
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Current value (bytes written, entries done)
    pub fn current(mut self, value: f64) -> Self {
        self.current = Some(value);
        self
    }

    /// Target value (bytes expected, entries total)
    pub fn target(mut self, value: f64) -> Self {
        self.target = Some(value);
        self
    }

    /// Explicit fraction; overrides the current/target ratio
    pub fn fraction(mut self, fraction: f64) -> Self {
        self.fraction = Some(fraction);
        self
    }

    /// Free-text status line
    pub fn indicator_message(mut self, message: impl Into<String>) -> Self {
        self.indicator_message = Some(message.into());
        self
    }

    /// Derive the fraction and progress bar message and produce the report
    pub fn build(self) -> ProgressReport {
        let ratio = match (self.current, self.target) {
            (Some(current), Some(target)) if target > 0.0 => Some(current / target),
            // An empty target is complete as soon as it is reported on
            (Some(_), Some(_)) => Some(1.0),
            _ => None,
        };
        let fraction = self.fraction.or(ratio).unwrap_or(0.0);
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut progress_bar_message = self.filename.or(self.path).unwrap_or_default();
        if let (Some(current), Some(target)) = (self.current, self.target) {
            if !progress_bar_message.is_empty() {
                progress_bar_message.push(' ');
            }
            progress_bar_message.push_str(&format!("- ({current}/{target})"));
        }

        ProgressReport {
            fraction,
            progress_bar_message,
            indicator_message: self.indicator_message,
        }
    }
}

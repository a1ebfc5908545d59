//! Per-operation status: counters, warnings, and row errors catalogued instead of raised.
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use crate::{error::AssetTreeError, properties::ItemCategory};

/// Whether row-level failures abort the operation or are recorded on the [Status].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    Raise,
    #[default]
    Catalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    Inserted,
    Updated,
    Removed,
    Unchanged,
    Pushed,
    Pulled,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let s = match self {
            Action::Inserted => "Inserted",
            Action::Updated => "Updated",
            Action::Removed => "Removed",
            Action::Unchanged => "Unchanged",
            Action::Pushed => "Pushed",
            Action::Pulled => "Pulled",
        };
        write!(f, "{s}")
    }
}

/// A failure tied to one row of the input or of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    /// Full path (or row number for raw input) of the offending row.
    pub row: String,
    pub error: AssetTreeError,
}

impl Display for RowError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.row, self.error)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub mode: ErrorMode,
    /// Labelled counters such as `Signals Inserted` or `Total Items Pushed`.
    pub counts: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
    pub errors: Vec<RowError>,
}

impl Status {
    pub fn new(mode: ErrorMode) -> Status {
        Status {
            mode,
            ..Default::default()
        }
    }

    pub fn warn<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    /// Record a row failure. In [ErrorMode::Raise] the error is handed back instead, so the
    /// caller can abort with `?`.
    pub fn catalog<R: Display>(&mut self, row: R, error: AssetTreeError) -> Result<(), AssetTreeError> {
        if self.mode == ErrorMode::Raise {
            return Err(error);
        }
        tracing::warn!("[status] {}: {}", row, error);
        self.errors.push(RowError {
            row: row.to_string(),
            error,
        });
        Ok(())
    }

    pub fn record(&mut self, category: Option<ItemCategory>, action: Action) {
        self.record_n(category, action, 1);
    }

    pub fn record_n(&mut self, category: Option<ItemCategory>, action: Action, n: usize) {
        if n == 0 {
            return;
        }
        if let Some(category) = category {
            *self.counts.entry(format!("{category} {action}")).or_default() += n;
        }
        *self.counts.entry(format!("Total Items {action}")).or_default() += n;
    }

    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self, action: Action) -> usize {
        self.count(&format!("Total Items {action}"))
    }

    pub fn errors_encountered(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Fold another status into this one. The receiving status keeps its own mode.
    pub fn absorb(&mut self, other: Status) {
        for (label, n) in other.counts {
            *self.counts.entry(label).or_default() += n;
        }
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for (label, n) in self.counts.iter() {
            writeln!(f, "{label}: {n}")?;
        }
        writeln!(f, "Errors Encountered: {}", self.errors.len())?;
        for warning in self.warnings.iter() {
            writeln!(f, "warning: {warning}")?;
        }
        for error in self.errors.iter() {
            writeln!(f, "error: {error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_mode_hands_errors_back() {
        let mut status = Status::new(ErrorMode::Raise);
        let err = AssetTreeError::Validation("bad row".to_string());
        assert_eq!(status.catalog("row 1", err.clone()), Err(err));
        assert!(status.errors.is_empty());

        let mut status = Status::default();
        assert!(status
            .catalog("row 1", AssetTreeError::Validation("bad row".to_string()))
            .is_ok());
        assert_eq!(status.errors_encountered(), 1);
    }

    #[test]
    fn counters_track_categories_and_totals() {
        let mut status = Status::default();
        status.record(Some(ItemCategory::Signal), Action::Inserted);
        status.record_n(Some(ItemCategory::Asset), Action::Inserted, 2);
        status.record(None, Action::Inserted);
        assert_eq!(status.count("Signals Inserted"), 1);
        assert_eq!(status.count("Assets Inserted"), 2);
        assert_eq!(status.total(Action::Inserted), 4);
        assert_eq!(status.total(Action::Removed), 0);
    }
}

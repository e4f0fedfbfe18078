//! Per-class record of what a transform did.

use crate::Result;
use crate::edit::EditKind;
use crate::identifier::Identifier;
use serde::Serialize;

/// Result of applying one edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    pub kind: EditKind,
    pub target: Identifier,
    /// Sites changed; 0 for a needle that matched nowhere.
    pub sites: usize,
}

/// Everything applied to one class during one transform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    /// Dotted class name.
    pub class: String,
    /// Methods whose locals were renumbered, as `name` + descriptor.
    pub renumbered: Vec<String>,
    /// Outcomes in application order.
    pub edits: Vec<EditOutcome>,
}

impl TransformReport {
    pub fn total_sites(&self) -> usize {
        self.edits.iter().map(|outcome| outcome.sites).sum()
    }

    /// Edits whose needle matched nowhere.
    pub fn unmatched(&self) -> impl Iterator<Item = &EditOutcome> {
        self.edits.iter().filter(|outcome| outcome.sites == 0)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

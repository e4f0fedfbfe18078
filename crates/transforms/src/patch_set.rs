//! Edits targeting one class.

use crate::edit::CodeEdit;
use crate::identifier::Identifier;
use crate::report::{EditOutcome, TransformReport};
use crate::{Error, Result};
use graft_core::{ClassNode, locals};
use std::collections::BTreeSet;

/// Ordered edits for one class plus the methods whose locals must be renumbered first.
#[derive(Debug, Clone, Default)]
pub struct ClassPatchSet {
    /// Dotted class name.
    class: String,
    edits: Vec<CodeEdit>,
    /// `(name, descriptor)` of every method targeted by an Inject or Replace.
    renumber: BTreeSet<(String, String)>,
}

impl ClassPatchSet {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            ..Self::default()
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn edits(&self) -> &[CodeEdit] {
        &self.edits
    }

    pub fn renumber_set(&self) -> &BTreeSet<(String, String)> {
        &self.renumber
    }

    /// Appends `edit`; its target joins the renumber set if it splices code into a method.
    pub fn add(&mut self, edit: CodeEdit) {
        if edit.needs_renumbering() {
            let id = edit.target().identifier();
            self.renumber
                .insert((id.member.clone(), id.signature.clone()));
        }
        self.edits.push(edit);
    }

    /// Renumbers the marked methods and applies every edit in registration order.
    ///
    /// Methods of the renumber set that are absent or bodiless are skipped here; the edit that
    /// targets them reports the problem.
    pub fn apply(&self, class: &mut ClassNode) -> Result<TransformReport> {
        let mut report = TransformReport {
            class: self.class.clone(),
            ..TransformReport::default()
        };

        for (name, desc) in &self.renumber {
            let Some(method) = class.find_method_mut(name, desc) else {
                continue;
            };
            if method.instructions.is_empty() {
                continue;
            }
            locals::renumber(method).map_err(|e| Error::EditApplicationFailure {
                target: Identifier::new(class_owner(&self.class), name.clone(), desc.clone()),
                reason: format!("slot renumbering failed: {e}"),
            })?;
            report.renumbered.push(format!("{name}{desc}"));
        }

        for edit in &self.edits {
            let sites = edit.apply(class)?;
            if sites == 0 {
                tracing::debug!("{} {}: needle matched nowhere", edit.kind(), edit.target());
            }
            report.edits.push(EditOutcome {
                kind: edit.kind(),
                target: edit.target().identifier().clone(),
                sites,
            });
        }
        Ok(report)
    }
}

fn class_owner(dotted: &str) -> String {
    dotted.replace('.', "/")
}

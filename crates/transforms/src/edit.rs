//! Declarative edits to one member of one class.

use crate::identifier::{Identifier, ResolvedIdentifier};
use crate::{Error, Result};
use graft_core::{ClassNode, Constant, FieldNode, InsnList, MethodNode, access, descriptor, matcher};
use serde::Serialize;
use std::fmt;

/// Kind of a [`CodeEdit`], for logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EditKind {
    Write,
    Inject,
    Replace,
    AddField,
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditKind::Write => "write",
            EditKind::Inject => "inject",
            EditKind::Replace => "replace",
            EditKind::AddField => "add-field",
        })
    }
}

/// One change to one member.
///
/// Fragments (`body`, `needle`, `injection`, `replacement`) are templates: every application
/// works on a fresh copy, so one edit can be applied to any number of independent parses.
#[derive(Debug, Clone)]
pub enum CodeEdit {
    /// Defines a method, or clears and redefines an existing one.
    Write {
        access: u16,
        target: ResolvedIdentifier,
        /// Declared exceptions of a newly created method.
        exceptions: Vec<String>,
        body: Option<InsnList>,
    },
    /// Inserts code at the method boundaries or around every needle occurrence.
    Inject {
        target: ResolvedIdentifier,
        /// `None` inserts at the first instruction (`before`) or after the last one.
        needle: Option<InsnList>,
        injection: InsnList,
        before: bool,
    },
    /// Substitutes every needle occurrence.
    Replace {
        target: ResolvedIdentifier,
        needle: InsnList,
        replacement: InsnList,
    },
    /// Declares a new field.
    AddField {
        access: u16,
        target: ResolvedIdentifier,
        value: Option<Constant>,
    },
}

impl CodeEdit {
    pub fn write(
        access: u16,
        target: ResolvedIdentifier,
        exceptions: Vec<String>,
        body: Option<InsnList>,
    ) -> Self {
        CodeEdit::Write {
            access,
            target,
            exceptions,
            body,
        }
    }

    /// Inserts `injection` at the start of the method.
    pub fn inject_at_start(target: ResolvedIdentifier, injection: InsnList) -> Self {
        CodeEdit::Inject {
            target,
            needle: None,
            injection,
            before: true,
        }
    }

    /// Appends `injection` after the last node of the method.
    pub fn inject_at_end(target: ResolvedIdentifier, injection: InsnList) -> Self {
        CodeEdit::Inject {
            target,
            needle: None,
            injection,
            before: false,
        }
    }

    /// Inserts `injection` in front of every occurrence of `needle`.
    pub fn inject_before(target: ResolvedIdentifier, needle: InsnList, injection: InsnList) -> Self {
        CodeEdit::Inject {
            target,
            needle: Some(needle),
            injection,
            before: true,
        }
    }

    /// Inserts `injection` behind every occurrence of `needle`.
    pub fn inject_after(target: ResolvedIdentifier, needle: InsnList, injection: InsnList) -> Self {
        CodeEdit::Inject {
            target,
            needle: Some(needle),
            injection,
            before: false,
        }
    }

    pub fn replace(target: ResolvedIdentifier, needle: InsnList, replacement: InsnList) -> Self {
        CodeEdit::Replace {
            target,
            needle,
            replacement,
        }
    }

    pub fn add_field(access: u16, target: ResolvedIdentifier, value: Option<Constant>) -> Self {
        CodeEdit::AddField {
            access,
            target,
            value,
        }
    }

    pub fn kind(&self) -> EditKind {
        match self {
            CodeEdit::Write { .. } => EditKind::Write,
            CodeEdit::Inject { .. } => EditKind::Inject,
            CodeEdit::Replace { .. } => EditKind::Replace,
            CodeEdit::AddField { .. } => EditKind::AddField,
        }
    }

    pub fn target(&self) -> &ResolvedIdentifier {
        match self {
            CodeEdit::Write { target, .. }
            | CodeEdit::Inject { target, .. }
            | CodeEdit::Replace { target, .. }
            | CodeEdit::AddField { target, .. } => target,
        }
    }

    /// Returns true if the target method's locals must be renumbered before edits run.
    pub fn needs_renumbering(&self) -> bool {
        matches!(self, CodeEdit::Inject { .. } | CodeEdit::Replace { .. })
    }

    /// Applies the edit, returning the number of sites changed.
    ///
    /// Inject and Replace report the number of needle occurrences; zero is a valid outcome.
    pub fn apply(&self, class: &mut ClassNode) -> Result<usize> {
        match self {
            CodeEdit::Write {
                access,
                target,
                exceptions,
                body,
            } => write(class, *access, target, exceptions, body.as_ref()),
            CodeEdit::Inject {
                target,
                needle,
                injection,
                before,
            } => {
                let method = find_method(class, target)?;
                match needle {
                    None => {
                        if *before {
                            method.prepend(injection.copy());
                        } else {
                            method.append(injection.copy());
                        }
                        tracing::debug!(
                            "Injected {} nodes at {} of {}",
                            injection.len(),
                            if *before { "start" } else { "end" },
                            target.identifier()
                        );
                        Ok(1)
                    }
                    Some(needle) => Ok(inject(method, needle, injection, *before)),
                }
            }
            CodeEdit::Replace {
                target,
                needle,
                replacement,
            } => {
                let method = find_method(class, target)?;
                Ok(replace(method, needle, replacement))
            }
            CodeEdit::AddField {
                access,
                target,
                value,
            } => {
                let id = target.identifier();
                if id.is_method() {
                    return Err(failure(id, "field target carries a method descriptor"));
                }
                descriptor::field_width(&id.signature).map_err(|e| failure(id, e.to_string()))?;
                tracing::debug!("Adding field {}", id);
                class.fields.push(FieldNode {
                    access: *access,
                    name: id.member.clone(),
                    desc: id.signature.clone(),
                    value: value.clone(),
                });
                Ok(1)
            }
        }
    }
}

fn failure(target: &Identifier, reason: impl Into<String>) -> Error {
    Error::EditApplicationFailure {
        target: target.clone(),
        reason: reason.into(),
    }
}

fn find_method<'a>(class: &'a mut ClassNode, target: &ResolvedIdentifier) -> Result<&'a mut MethodNode> {
    let id = target.identifier();
    class
        .find_method_mut(&id.member, &id.signature)
        .ok_or_else(|| Error::MemberNotFound { target: id.clone() })
}

fn write(
    class: &mut ClassNode,
    access: u16,
    target: &ResolvedIdentifier,
    exceptions: &[String],
    body: Option<&InsnList>,
) -> Result<usize> {
    let id = target.identifier();
    if !id.is_method() {
        return Err(failure(id, "write target is not a method"));
    }
    if access & (access::ABSTRACT | access::NATIVE) != 0 && body.is_some() {
        return Err(failure(id, "abstract or native method cannot carry a body"));
    }
    tracing::debug!("Writing method {}", id);

    let index = match class
        .methods
        .iter()
        .position(|m| m.name == id.member && m.desc == id.signature)
    {
        Some(index) => {
            let method = &mut class.methods[index];
            method.access = access;
            method.clear_body().map_err(|e| failure(id, e.to_string()))?;
            index
        }
        None => {
            let mut method = MethodNode::new(access, id.member.clone(), id.signature.clone());
            method.exceptions = exceptions.to_vec();
            class.methods.push(method);
            class.methods.len() - 1
        }
    };
    if let Some(body) = body {
        class.methods[index].insert_at(0, body.copy());
    }
    Ok(1)
}

fn inject(method: &mut MethodNode, needle: &InsnList, injection: &InsnList, before: bool) -> usize {
    let regions = matcher::find_all(&method.instructions, needle);
    let mut shift = 0isize;
    for region in &regions {
        let region = region.shifted(shift);
        let fragment = injection.copy().merge_labels(&needle.apply_labels(&region));
        let inserted = if before {
            method.insert_before(&region, fragment)
        } else {
            method.insert(&region, fragment)
        };
        tracing::debug!(
            "Injected {} nodes {} [{}, {}) in {}{}",
            inserted,
            if before { "before" } else { "after" },
            region.start,
            region.end,
            method.name,
            method.desc
        );
        shift += inserted as isize;
    }
    regions.len()
}

fn replace(method: &mut MethodNode, needle: &InsnList, replacement: &InsnList) -> usize {
    let regions = matcher::find_all(&method.instructions, needle);
    let mut shift = 0isize;
    for region in &regions {
        let region = region.shifted(shift);
        let fragment = replacement.copy().pull_labels(&needle.apply_labels(&region));
        let inserted = method.replace(&region, fragment);
        tracing::debug!(
            "Replaced [{}, {}) with {} nodes in {}{}",
            region.start,
            region.end,
            inserted,
            method.name,
            method.desc
        );
        shift += inserted as isize - region.len() as isize;
    }
    regions.len()
}

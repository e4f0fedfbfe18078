//! Member identifiers and their resolution to runtime names.
//!
//! Edits are written against *symbolic* names that stay stable across builds. A [`Resolver`]
//! turns them into the names valid for the build being patched, once, when the edit is built.
//! Edits only accept the resolved form, so resolution can never happen during a transform.

use crate::Result;
use graft_core::descriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;

/// Class member named by owner, name and descriptor.
///
/// A class-level identifier uses an empty `member` and `signature`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    /// Internal (slash-separated) owner class name.
    pub owner: String,
    pub member: String,
    /// Field type or method descriptor.
    pub signature: String,
}

impl Identifier {
    pub fn new(
        owner: impl Into<String>,
        member: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
            signature: signature.into(),
        }
    }

    /// Returns true if the signature is a method descriptor.
    pub fn is_method(&self) -> bool {
        descriptor::is_method(&self.signature)
    }

    /// Dotted owner name, as used by the host loader to name classes.
    pub fn java_class(&self) -> String {
        self.owner.replace('/', ".")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.member.is_empty() {
            write!(f, "{}", self.owner)
        } else if self.is_method() {
            write!(f, "{}.{}{}", self.owner, self.member, self.signature)
        } else {
            write!(f, "{}.{}:{}", self.owner, self.member, self.signature)
        }
    }
}

/// Identifier already expressed in runtime names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedIdentifier(Identifier);

impl ResolvedIdentifier {
    /// Wraps an identifier known to use runtime names already, bypassing any resolver.
    pub fn assume_runtime(identifier: Identifier) -> Self {
        Self(identifier)
    }

    pub fn identifier(&self) -> &Identifier {
        &self.0
    }

    pub fn into_inner(self) -> Identifier {
        self.0
    }
}

impl Deref for ResolvedIdentifier {
    type Target = Identifier;

    fn deref(&self) -> &Identifier {
        &self.0
    }
}

impl fmt::Display for ResolvedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Maps symbolic identifiers to runtime identifiers.
pub trait Resolver {
    fn resolve(&self, identifier: &Identifier) -> ResolvedIdentifier;
}

/// Resolver for builds where symbolic and runtime names coincide.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl Resolver for IdentityResolver {
    fn resolve(&self, identifier: &Identifier) -> ResolvedIdentifier {
        ResolvedIdentifier(identifier.clone())
    }
}

/// Renamed member entry of a [`MappingTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberMapping {
    /// Symbolic owner class.
    pub owner: String,
    /// Symbolic member name.
    pub name: String,
    /// Symbolic descriptor.
    pub signature: String,
    /// Runtime member name.
    pub mapped: String,
}

/// Name table loaded from JSON.
///
/// ```json
/// {
///   "classes": { "net/Game": "a/b" },
///   "members": [
///     { "owner": "net/Game", "name": "tick", "signature": "(I)V", "mapped": "c" }
///   ]
/// }
/// ```
///
/// Class names inside descriptors are renamed through `classes`; unknown names pass through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingTable {
    pub classes: HashMap<String, String>,
    pub members: Vec<MemberMapping>,
    #[serde(skip)]
    index: HashMap<(String, String, String), usize>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a table from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut table: MappingTable = serde_json::from_str(json)?;
        table.reindex();
        Ok(table)
    }

    pub fn with_class(mut self, symbolic: &str, runtime: &str) -> Self {
        self.classes.insert(symbolic.to_string(), runtime.to_string());
        self
    }

    pub fn with_member(mut self, owner: &str, name: &str, signature: &str, mapped: &str) -> Self {
        self.members.push(MemberMapping {
            owner: owner.to_string(),
            name: name.to_string(),
            signature: signature.to_string(),
            mapped: mapped.to_string(),
        });
        self.reindex();
        self
    }

    fn reindex(&mut self) {
        self.index = self
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| ((m.owner.clone(), m.name.clone(), m.signature.clone()), i))
            .collect();
    }

    fn class(&self, name: &str) -> String {
        self.classes
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

impl Resolver for MappingTable {
    fn resolve(&self, identifier: &Identifier) -> ResolvedIdentifier {
        let key = (
            identifier.owner.clone(),
            identifier.member.clone(),
            identifier.signature.clone(),
        );
        let member = match self.index.get(&key) {
            Some(&i) => self.members[i].mapped.clone(),
            None => identifier.member.clone(),
        };
        let signature =
            descriptor::map_classes(&identifier.signature, |name| self.classes.get(name).cloned());
        let resolved = Identifier::new(self.class(&identifier.owner), member, signature);
        tracing::debug!("Resolved {} -> {}", identifier, resolved);
        ResolvedIdentifier(resolved)
    }
}

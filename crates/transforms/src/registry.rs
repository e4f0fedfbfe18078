//! Class name → patch set registry and the per-class transform entry point.
//!
//! Registration happens on a [`PatchRegistryBuilder`]; [`PatchRegistryBuilder::build`] freezes it
//! into a [`PatchRegistry`] that only offers `&self` methods and can be shared between threads.

use crate::config::{DumpMode, TransformerConfig};
use crate::dump::{Dump, DumpSink, FileDumpSink, NullDumpSink};
use crate::edit::CodeEdit;
use crate::patch_set::ClassPatchSet;
use crate::report::TransformReport;
use crate::{Error, Result};
use graft_core::{decoder, encoder};
use std::collections::HashMap;
use std::fmt;
use tracing::info;

/// Collects edits before the registry is frozen.
#[derive(Default)]
pub struct PatchRegistryBuilder {
    sets: HashMap<String, ClassPatchSet>,
    config: TransformerConfig,
    sink: Option<Box<dyn DumpSink>>,
}

impl PatchRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config` for dump behaviour. Unless a sink is set explicitly, dumps go to a
    /// [`FileDumpSink`] in `config.dump_dir`.
    pub fn with_config(mut self, config: TransformerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dump_sink(mut self, sink: impl DumpSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Adds `edit` to the patch set of its target's class.
    pub fn register(&mut self, edit: CodeEdit) -> &mut Self {
        let class = edit.target().java_class();
        tracing::debug!("Registering {} edit for {}", edit.kind(), edit.target());
        self.sets
            .entry(class.clone())
            .or_insert_with(|| ClassPatchSet::new(class))
            .add(edit);
        self
    }

    pub fn build(self) -> PatchRegistry {
        let sink = match self.sink {
            Some(sink) => sink,
            None if self.config.dump == DumpMode::Off => Box::new(NullDumpSink),
            None => Box::new(FileDumpSink::new(self.config.dump_dir.clone())),
        };
        info!(
            "Patch registry built: {} classes, {} edits",
            self.sets.len(),
            self.sets.values().map(|set| set.edits().len()).sum::<usize>()
        );
        PatchRegistry {
            sets: self.sets,
            config: self.config,
            sink,
        }
    }
}

/// Frozen registry consulted once per loaded class.
pub struct PatchRegistry {
    sets: HashMap<String, ClassPatchSet>,
    config: TransformerConfig,
    sink: Box<dyn DumpSink>,
}

impl fmt::Debug for PatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&String> = self.sets.keys().collect();
        classes.sort();
        f.debug_struct("PatchRegistry")
            .field("classes", &classes)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PatchRegistry {
    pub fn builder() -> PatchRegistryBuilder {
        PatchRegistryBuilder::new()
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    /// Patch set registered for `class`, in dotted or slash-separated form.
    pub fn patch_set(&self, class: &str) -> Option<&ClassPatchSet> {
        self.sets.get(&class.replace('/', "."))
    }

    /// Dotted names of every registered class, sorted.
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.sets.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    /// Host loader entry point.
    ///
    /// `None` passes through as `None`; an unregistered class gets its bytes back unchanged.
    /// Any failure fails the whole class after a best-effort dump.
    pub fn transform(&self, class: &str, bytes: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        match self.transform_with_report(class, &bytes)? {
            Some((patched, _)) => Ok(Some(patched)),
            None => Ok(Some(bytes)),
        }
    }

    /// Like [`transform`](Self::transform) but also returns what was applied. Returns `None`
    /// for unregistered classes.
    pub fn transform_with_report(
        &self,
        class: &str,
        bytes: &[u8],
    ) -> Result<Option<(Vec<u8>, TransformReport)>> {
        let Some(set) = self.patch_set(class) else {
            return Ok(None);
        };

        let mut node = match decoder::decode_class(bytes) {
            Ok(node) => node,
            Err(source) => {
                self.dump_failure(class, &Dump::Bytes(bytes));
                return Err(Error::MalformedInput {
                    class: class.to_string(),
                    source,
                });
            }
        };

        let report = match set.apply(&mut node) {
            Ok(report) => report,
            Err(err) => {
                self.dump_failure(class, &Dump::Text(node.to_string()));
                return Err(err);
            }
        };

        let patched = match encoder::encode_class(&node) {
            Ok(patched) => patched,
            Err(source) => {
                self.dump_failure(class, &Dump::Text(node.to_string()));
                return Err(Error::SerializationFailure {
                    class: class.to_string(),
                    source,
                });
            }
        };

        info!(
            "Patched {}: {} edits, {} sites, {} -> {} bytes",
            class,
            report.edits.len(),
            report.total_sites(),
            bytes.len(),
            patched.len()
        );
        if self.config.dump == DumpMode::Always {
            let dump = if self.config.raw {
                Dump::Bytes(&patched)
            } else {
                Dump::Text(node.to_string())
            };
            self.write_dump(class, &dump);
        }
        Ok(Some((patched, report)))
    }

    fn dump_failure(&self, class: &str, dump: &Dump<'_>) {
        if self.config.dump != DumpMode::Off {
            self.write_dump(class, dump);
        }
    }

    fn write_dump(&self, class: &str, dump: &Dump<'_>) {
        if let Err(err) = self.sink.dump(class, dump) {
            tracing::warn!("Failed to dump {}: {}", class, err);
        }
    }
}

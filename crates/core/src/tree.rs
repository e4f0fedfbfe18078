//! Class, field and method nodes.

use crate::descriptor;
use crate::insn::{Constant, Label};
use crate::insn_list::{InsnList, MatchRegion};
use crate::result::Result;
use std::collections::BTreeMap;

/// Member and class access flags.
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SYNCHRONIZED: u16 = 0x0020;
    pub const VOLATILE: u16 = 0x0040;
    pub const TRANSIENT: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
}

/// Highest container major version understood by this crate.
pub const FORMAT_MAJOR: u16 = 1;

/// Decoded class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    pub major: u16,
    pub minor: u16,
    pub access: u16,
    /// Internal (slash-separated) class name.
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,
}

impl ClassNode {
    pub fn new(name: impl Into<String>, super_name: Option<&str>) -> Self {
        Self {
            major: FORMAT_MAJOR,
            minor: 0,
            access: access::PUBLIC,
            name: name.into(),
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn find_method(&self, name: &str, desc: &str) -> Option<&MethodNode> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.desc == desc)
    }

    pub fn find_method_mut(&mut self, name: &str, desc: &str) -> Option<&mut MethodNode> {
        self.methods
            .iter_mut()
            .find(|method| method.name == name && method.desc == desc)
    }

    pub fn find_field(&self, name: &str, desc: &str) -> Option<&FieldNode> {
        self.fields
            .iter()
            .find(|field| field.name == name && field.desc == desc)
    }
}

/// Field declaration with an optional constant value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub access: u16,
    pub name: String,
    pub desc: String,
    pub value: Option<Constant>,
}

impl FieldNode {
    pub fn new(access: u16, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            access,
            name: name.into(),
            desc: desc.into(),
            value: None,
        }
    }
}

/// Debug entry naming a local over a label range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
    pub name: String,
    pub desc: String,
    pub start: Label,
    pub end: Label,
    pub slot: u16,
}

/// Method declaration and, unless abstract or native, its body.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub access: u16,
    pub name: String,
    pub desc: String,
    pub exceptions: Vec<String>,
    /// Stored operand stack limit; recomputed on encode.
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: InsnList,
    pub local_vars: Vec<LocalVar>,
}

impl MethodNode {
    pub fn new(access: u16, name: impl Into<String>, desc: impl Into<String>) -> Self {
        let mut method = Self {
            access,
            name: name.into(),
            desc: desc.into(),
            exceptions: Vec::new(),
            max_stack: 0,
            max_locals: 0,
            instructions: InsnList::new(),
            local_vars: Vec::new(),
        };
        method.max_locals = method.param_slots().unwrap_or(0);
        method
    }

    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    /// Returns true if the method cannot carry a body.
    pub fn is_bodiless(&self) -> bool {
        self.access & (access::ABSTRACT | access::NATIVE) != 0
    }

    /// Slots taken by the receiver and the declared parameters.
    pub fn param_slots(&self) -> Result<u16> {
        let shape = descriptor::method_shape(&self.desc)?;
        Ok(shape.arg_slots + u16::from(!self.is_static()))
    }

    /// Drops the body, the exception table and the debug tables.
    pub fn clear_body(&mut self) -> Result<()> {
        self.instructions.clear();
        self.local_vars.clear();
        self.max_stack = 0;
        self.max_locals = self.param_slots()?;
        Ok(())
    }

    /// Replaces `remove` nodes at `at` with `fragment`, assigning slots to its temps.
    ///
    /// Temps captured by a needle match reuse the captured slot; every other temp gets a fresh
    /// slot past the current `max_locals` (two slots for `long`/`double` accesses). Returns the
    /// number of nodes inserted.
    pub fn splice(&mut self, at: usize, remove: usize, mut fragment: InsnList) -> usize {
        let captured = fragment.captured_slots().clone();
        let mut slots = BTreeMap::new();
        let mut next = self.max_locals.max(self.instructions.slot_frontier());
        for (temp, width) in fragment.temps() {
            match captured.get(&temp) {
                Some(&slot) => {
                    slots.insert(temp, slot);
                }
                None => {
                    slots.insert(temp, next);
                    next = next.saturating_add(width);
                }
            }
        }
        if !slots.is_empty() {
            tracing::debug!("{}{}: binding temps {:?}", self.name, self.desc, slots);
            fragment.bind_temps(&slots);
        }
        self.max_locals = self.max_locals.max(next).max(fragment.slot_frontier());
        self.instructions.splice(at, remove, fragment)
    }

    /// Inserts `fragment` so that its first node lands at `index`.
    pub fn insert_at(&mut self, index: usize, fragment: InsnList) -> usize {
        self.splice(index, 0, fragment)
    }

    pub fn prepend(&mut self, fragment: InsnList) -> usize {
        self.splice(0, 0, fragment)
    }

    /// Inserts `fragment` after the last node.
    pub fn append(&mut self, fragment: InsnList) -> usize {
        let len = self.instructions.len();
        self.splice(len, 0, fragment)
    }

    /// Inserts `fragment` immediately before `region`.
    pub fn insert_before(&mut self, region: &MatchRegion, fragment: InsnList) -> usize {
        self.splice(region.start, 0, fragment)
    }

    /// Inserts `fragment` immediately after `region`.
    pub fn insert(&mut self, region: &MatchRegion, fragment: InsnList) -> usize {
        self.splice(region.end, 0, fragment)
    }

    /// Substitutes the nodes of `region` with `fragment`.
    pub fn replace(&mut self, region: &MatchRegion, fragment: InsnList) -> usize {
        self.splice(region.start, region.len(), fragment)
    }

    /// Highest slot referenced by the parameters, the code or the debug table.
    pub fn compute_max_locals(&self) -> u16 {
        let debug = self
            .local_vars
            .iter()
            .map(|var| {
                let width = descriptor::field_width(&var.desc).unwrap_or(1);
                var.slot.saturating_add(width)
            })
            .max()
            .unwrap_or(0);
        self.param_slots()
            .unwrap_or(0)
            .max(self.instructions.slot_frontier())
            .max(debug)
            .max(self.max_locals)
    }
}

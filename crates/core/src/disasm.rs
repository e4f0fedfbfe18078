//! Human-readable listings of classes, methods and instruction lists.
//!
//! Labels are printed by their placement order (`L0`, `L1`, ...) rather than by arena index, so
//! two structurally equal lists print identically. A label that is referenced but never placed
//! prints as `L?` followed by its arena index.

use crate::insn::{Insn, Label};
use crate::insn_list::InsnList;
use crate::tree::{ClassNode, FieldNode, MethodNode};
use std::collections::HashMap;
use std::fmt;

struct LabelNames(HashMap<Label, usize>);

impl LabelNames {
    fn of(list: &InsnList) -> Self {
        let mut names = HashMap::new();
        for insn in list.iter() {
            if let Insn::Label(label) = insn {
                let next = names.len();
                names.entry(*label).or_insert(next);
            }
        }
        Self(names)
    }

    fn name(&self, label: Label) -> String {
        match self.0.get(&label) {
            Some(ordinal) => format!("L{ordinal}"),
            None => format!("L?{}", label.index()),
        }
    }
}

fn write_insn(f: &mut fmt::Formatter<'_>, insn: &Insn, names: &LabelNames) -> fmt::Result {
    match insn {
        Insn::Label(label) => write!(f, "{}", names.name(*label)),
        Insn::Line(line) => write!(f, "  LINE {line}"),
        Insn::Simple(op) => write!(f, "  {op}"),
        Insn::Int(op, value) => write!(f, "  {op} {value}"),
        Insn::Ldc(constant) => write!(f, "  LDC {constant}"),
        Insn::Var(op, local) => write!(f, "  {op} {local}"),
        Insn::Iinc(local, delta) => write!(f, "  IINC {local} {delta}"),
        Insn::Jump(op, label) => write!(f, "  {op} {}", names.name(*label)),
        Insn::Field(op, member) | Insn::Method(op, member) => write!(f, "  {op} {member}"),
        Insn::Type(op, class) => write!(f, "  {op} {class}"),
        Insn::TableSwitch {
            low,
            default,
            targets,
        } => {
            write!(f, "  TABLESWITCH")?;
            for (i, target) in targets.iter().enumerate() {
                write!(f, " {}: {}", i64::from(*low) + i as i64, names.name(*target))?;
            }
            write!(f, " default: {}", names.name(*default))
        }
        Insn::LookupSwitch { default, pairs } => {
            write!(f, "  LOOKUPSWITCH")?;
            for (key, target) in pairs {
                write!(f, " {key}: {}", names.name(*target))?;
            }
            write!(f, " default: {}", names.name(*default))
        }
    }
}

fn write_list(
    f: &mut fmt::Formatter<'_>,
    list: &InsnList,
    names: &LabelNames,
    indent: &str,
) -> fmt::Result {
    for insn in list.iter() {
        write!(f, "{indent}")?;
        write_insn(f, insn, names)?;
        writeln!(f)?;
    }
    for entry in list.handlers() {
        writeln!(
            f,
            "{indent}TRYCATCH {} {} {} {}",
            names.name(entry.start),
            names.name(entry.end),
            names.name(entry.handler),
            entry.catch_type.as_deref().unwrap_or("*")
        )?;
    }
    Ok(())
}

impl fmt::Display for InsnList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, self, &LabelNames::of(self), "")
    }
}

impl fmt::Display for FieldNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {:#06x} {} {}", self.access, self.name, self.desc)?;
        if let Some(value) = &self.value {
            write!(f, " = {value}")?;
        }
        Ok(())
    }
}

impl fmt::Display for MethodNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method {:#06x} {}{}", self.access, self.name, self.desc)?;
        if !self.exceptions.is_empty() {
            write!(f, " throws {}", self.exceptions.join(", "))?;
        }
        writeln!(f)?;
        if self.instructions.is_empty() {
            return Ok(());
        }
        writeln!(
            f,
            "    max_stack {}, max_locals {}",
            self.max_stack, self.max_locals
        )?;
        let names = LabelNames::of(&self.instructions);
        write_list(f, &self.instructions, &names, "    ")?;
        for var in &self.local_vars {
            writeln!(
                f,
                "    LOCAL {} {} {} {} {}",
                var.name,
                var.desc,
                names.name(var.start),
                names.name(var.end),
                var.slot
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ClassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {:#06x} {}", self.access, self.name)?;
        if let Some(super_name) = &self.super_name {
            write!(f, " extends {super_name}")?;
        }
        if !self.interfaces.is_empty() {
            write!(f, " implements {}", self.interfaces.join(", "))?;
        }
        writeln!(f, " // version {}.{}", self.major, self.minor)?;
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        for method in &self.methods {
            write!(f, "  {method}")?;
        }
        Ok(())
    }
}

//! Container encoding: turns a [`ClassNode`] back into class bytes.
//!
//! The constant pool is rebuilt from scratch by interning operands in traversal order, which
//! makes the output a pure function of the IR. Each method body is laid out to a fixed point:
//! `GOTO`s whose offset does not fit 16 bits are widened to `GOTO_W`, which can push other
//! branches out of range in turn. Conditional branches have no wide form and fail instead.

use crate::decoder::{MAGIC, MAX_CODE_LEN, switch_padding};
use crate::descriptor;
use crate::insn::{Insn, Label, Local};
use crate::opcode::raw;
use crate::pool::PoolWriter;
use crate::result::{Error, Result};
use crate::stack;
use crate::tree::{ClassNode, FieldNode, MethodNode};
use crate::Opcode;
use std::collections::{HashMap, HashSet};

/// Big-endian writers over a byte buffer.
trait Put {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_i16(&mut self, value: i16);
    fn put_u32(&mut self, value: u32);
    fn put_i32(&mut self, value: i32);
}

impl Put for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }
    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_be_bytes());
    }
    fn put_i16(&mut self, value: i16) {
        self.extend_from_slice(&value.to_be_bytes());
    }
    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }
    fn put_i32(&mut self, value: i32) {
        self.extend_from_slice(&value.to_be_bytes());
    }
}

fn count(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::OperandOutOfRange(format!("{len} {what}")))
}

fn check_unique<'a>(members: impl Iterator<Item = (&'a str, &'a str)>) -> Result<()> {
    let mut seen = HashSet::new();
    for (name, desc) in members {
        if !seen.insert((name, desc)) {
            return Err(Error::DuplicateMember {
                name: name.to_string(),
                desc: desc.to_string(),
            });
        }
    }
    Ok(())
}

/// Encodes a whole class.
///
/// `max_stack` is recomputed for every method body and `max_locals` is raised to cover every slot
/// the body references.
pub fn encode_class(class: &ClassNode) -> Result<Vec<u8>> {
    check_unique(class.fields.iter().map(|f| (f.name.as_str(), f.desc.as_str())))?;
    check_unique(class.methods.iter().map(|m| (m.name.as_str(), m.desc.as_str())))?;

    let mut pool = PoolWriter::new();
    let mut body = Vec::new();
    body.put_u16(class.access);
    body.put_u16(pool.class(&class.name)?);
    body.put_u16(match &class.super_name {
        Some(name) => pool.class(name)?,
        None => 0,
    });
    body.put_u16(count(class.interfaces.len(), "interfaces")?);
    for interface in &class.interfaces {
        body.put_u16(pool.class(interface)?);
    }
    body.put_u16(count(class.fields.len(), "fields")?);
    for field in &class.fields {
        encode_field(field, &mut pool, &mut body)?;
    }
    body.put_u16(count(class.methods.len(), "methods")?);
    for method in &class.methods {
        encode_method(method, &mut pool, &mut body)?;
    }

    let mut out = Vec::with_capacity(body.len() + 256);
    out.put_u32(MAGIC);
    out.put_u16(class.major);
    out.put_u16(class.minor);
    pool.write(&mut out);
    out.extend_from_slice(&body);

    tracing::debug!(
        "Encoded class {}: {} bytes, {} methods",
        class.name,
        out.len(),
        class.methods.len()
    );
    Ok(out)
}

fn encode_field(field: &FieldNode, pool: &mut PoolWriter, out: &mut Vec<u8>) -> Result<()> {
    out.put_u16(field.access);
    out.put_u16(pool.utf8(&field.name)?);
    out.put_u16(pool.utf8(&field.desc)?);
    match &field.value {
        Some(value) => {
            out.put_u8(1);
            out.put_u16(pool.constant(value)?);
        }
        None => out.put_u8(0),
    }
    Ok(())
}

fn encode_method(method: &MethodNode, pool: &mut PoolWriter, out: &mut Vec<u8>) -> Result<()> {
    out.put_u16(method.access);
    out.put_u16(pool.utf8(&method.name)?);
    out.put_u16(pool.utf8(&method.desc)?);
    out.put_u16(count(method.exceptions.len(), "exceptions")?);
    for exception in &method.exceptions {
        out.put_u16(pool.class(exception)?);
    }
    if method.instructions.is_empty() {
        out.put_u8(0);
        return Ok(());
    }
    out.put_u8(1);
    encode_code(method, pool, out)
}

/// Program counters of a laid-out body.
struct Layout {
    /// Start of every node; one extra entry holds the code length.
    pcs: Vec<usize>,
    /// Nodes encoded as `GOTO_W`.
    wide: HashSet<usize>,
    /// Marker index of every placed label.
    placed: HashMap<Label, usize>,
}

impl Layout {
    fn label(&self, label: Label) -> usize {
        self.placed
            .get(&label)
            .map_or(self.code_len(), |&index| self.pcs[index])
    }

    fn code_len(&self) -> usize {
        self.pcs.last().copied().unwrap_or(0)
    }
}

fn insn_size(insn: &Insn, pc: usize, operand: u16, wide: bool) -> usize {
    match insn {
        Insn::Label(_) | Insn::Line(_) => 0,
        Insn::Simple(_) => 1,
        Insn::Int(op, _) => {
            if *op == Opcode::SIPUSH {
                3
            } else {
                2
            }
        }
        Insn::Ldc(constant) => {
            if constant.width() == 1 && operand < 256 {
                2
            } else {
                3
            }
        }
        Insn::Var(op, local) => {
            let slot = match local {
                Local::Slot(slot) => *slot,
                Local::Temp(_) => u16::MAX,
            };
            if op.short_form(slot).is_some() {
                1
            } else if slot <= 255 {
                2
            } else {
                4
            }
        }
        Insn::Iinc(local, delta) => match local {
            Local::Slot(slot) if *slot <= 255 && i8::try_from(*delta).is_ok() => 3,
            _ => 6,
        },
        Insn::Jump(..) => {
            if wide {
                5
            } else {
                3
            }
        }
        Insn::Method(Opcode::INVOKEINTERFACE, _) => 5,
        Insn::Field(..) | Insn::Method(..) | Insn::Type(..) => 3,
        Insn::TableSwitch { targets, .. } => 1 + switch_padding(pc) + 12 + 4 * targets.len(),
        Insn::LookupSwitch { pairs, .. } => 1 + switch_padding(pc) + 8 + 8 * pairs.len(),
    }
}

fn layout(
    nodes: &[&Insn],
    operands: &[u16],
    placed: HashMap<Label, usize>,
    signature: &str,
) -> Result<Layout> {
    let mut wide = HashSet::new();
    // Every round that does not settle widens at least one more GOTO.
    for round in 0..=nodes.len() {
        let mut pcs = Vec::with_capacity(nodes.len() + 1);
        let mut pc = 0usize;
        for (index, insn) in nodes.iter().enumerate() {
            pcs.push(pc);
            pc += insn_size(insn, pc, operands[index], wide.contains(&index));
        }
        pcs.push(pc);
        if pc > MAX_CODE_LEN {
            return Err(Error::CodeTooLarge(signature.to_string(), pc));
        }

        let mut changed = false;
        for (index, insn) in nodes.iter().enumerate() {
            let Insn::Jump(op, target) = insn else {
                continue;
            };
            let from = pcs[index];
            let to = pcs[placed[target]];
            if i16::try_from(to as i64 - from as i64).is_ok() {
                continue;
            }
            if *op != Opcode::GOTO {
                return Err(Error::BranchOutOfRange {
                    pc: from,
                    target: to,
                });
            }
            changed |= wide.insert(index);
        }
        if !changed {
            if round > 0 {
                tracing::debug!("{}: widened {} jumps after {} rounds", signature, wide.len(), round);
            }
            return Ok(Layout { pcs, wide, placed });
        }
    }
    Err(Error::LayoutDiverged(signature.to_string()))
}

fn encode_code(method: &MethodNode, pool: &mut PoolWriter, out: &mut Vec<u8>) -> Result<()> {
    let list = &method.instructions;
    let signature = format!("{}{}", method.name, method.desc);
    let nodes: Vec<&Insn> = list.iter().collect();
    let placed = list.positions();

    let require = |label: Label| -> Result<()> {
        if placed.contains_key(&label) {
            Ok(())
        } else {
            Err(Error::DanglingLabel(label.index()))
        }
    };
    for insn in &nodes {
        if let Some((Local::Temp(temp), _)) = insn.local() {
            return Err(Error::UnresolvedTemp(temp));
        }
        for target in insn.targets() {
            require(target)?;
        }
    }
    for entry in list.handlers() {
        entry.labels().into_iter().try_for_each(require)?;
    }
    for var in &method.local_vars {
        require(var.start)?;
        require(var.end)?;
    }

    let mut operands = vec![0u16; nodes.len()];
    for (index, insn) in nodes.iter().enumerate() {
        operands[index] = match insn {
            Insn::Ldc(constant) => pool.constant(constant)?,
            Insn::Field(_, member) => pool.field(member)?,
            Insn::Method(_, member) => pool.method(member)?,
            Insn::Type(_, class) => pool.class(class)?,
            _ => 0,
        };
    }

    let layout = layout(&nodes, &operands, placed, &signature)?;
    let mut code = Vec::with_capacity(layout.code_len());
    for (index, insn) in nodes.iter().enumerate() {
        let pc = layout.pcs[index];
        emit(&mut code, insn, pc, operands[index], layout.wide.contains(&index), &layout)?;
        debug_assert_eq!(code.len(), layout.pcs[index + 1], "size mismatch for {insn:?}");
    }

    out.put_u16(stack::max_stack(list));
    out.put_u16(method.compute_max_locals());
    out.put_u32(code.len() as u32);
    out.extend_from_slice(&code);

    let mut handlers = Vec::new();
    for entry in list.handlers() {
        let start = layout.label(entry.start);
        let end = layout.label(entry.end);
        if start >= end {
            tracing::debug!("{}: dropping empty handler range [{}, {})", signature, start, end);
            continue;
        }
        let catch_type = match &entry.catch_type {
            Some(class) => pool.class(class)?,
            None => 0,
        };
        handlers.push((start, end, layout.label(entry.handler), catch_type));
    }
    out.put_u16(count(handlers.len(), "handlers")?);
    for (start, end, handler, catch_type) in handlers {
        out.put_u16(start as u16);
        out.put_u16(end as u16);
        out.put_u16(handler as u16);
        out.put_u16(catch_type);
    }

    let mut locals = Vec::new();
    for var in &method.local_vars {
        let start = layout.label(var.start);
        let end = layout.label(var.end);
        if end < start {
            tracing::debug!("{}: dropping inverted local range for {}", signature, var.name);
            continue;
        }
        locals.push((
            start as u16,
            (end - start) as u16,
            pool.utf8(&var.name)?,
            pool.utf8(&var.desc)?,
            var.slot,
        ));
    }
    out.put_u16(count(locals.len(), "local variables")?);
    for (start, length, name, desc, slot) in locals {
        out.put_u16(start);
        out.put_u16(length);
        out.put_u16(name);
        out.put_u16(desc);
        out.put_u16(slot);
    }

    let lines: Vec<(u16, u16)> = nodes
        .iter()
        .enumerate()
        .filter_map(|(index, insn)| match insn {
            Insn::Line(line) if layout.pcs[index] < layout.code_len() => {
                Some((layout.pcs[index] as u16, *line))
            }
            _ => None,
        })
        .collect();
    out.put_u16(count(lines.len(), "line numbers")?);
    for (start, line) in lines {
        out.put_u16(start);
        out.put_u16(line);
    }

    tracing::debug!(
        "Encoded {}: {} bytes, {} handlers, {} locals",
        signature,
        code.len(),
        list.handlers().len(),
        method.local_vars.len()
    );
    Ok(())
}

fn out_of_range(insn: &Insn) -> Error {
    Error::OperandOutOfRange(format!("{insn:?}"))
}

fn emit(
    code: &mut Vec<u8>,
    insn: &Insn,
    pc: usize,
    operand: u16,
    wide: bool,
    layout: &Layout,
) -> Result<()> {
    let offset = |label: Label| layout.label(label) as i64 - pc as i64;
    match insn {
        Insn::Label(_) | Insn::Line(_) => {}
        Insn::Simple(op) => code.put_u8(op.to_byte()),
        Insn::Int(op, value) => {
            code.put_u8(op.to_byte());
            match op {
                Opcode::BIPUSH => {
                    code.put_u8(i8::try_from(*value).map_err(|_| out_of_range(insn))? as u8)
                }
                Opcode::SIPUSH => {
                    code.put_i16(i16::try_from(*value).map_err(|_| out_of_range(insn))?)
                }
                _ => code.put_u8(u8::try_from(*value).map_err(|_| out_of_range(insn))?),
            }
        }
        Insn::Ldc(constant) => {
            if constant.width() == 2 {
                code.put_u8(raw::LDC2_W);
                code.put_u16(operand);
            } else if let Ok(index) = u8::try_from(operand) {
                code.put_u8(Opcode::LDC.to_byte());
                code.put_u8(index);
            } else {
                code.put_u8(raw::LDC_W);
                code.put_u16(operand);
            }
        }
        Insn::Var(op, local) => {
            let Local::Slot(slot) = *local else {
                return Err(out_of_range(insn));
            };
            if let Some(byte) = op.short_form(slot) {
                code.put_u8(byte);
            } else if let Ok(slot) = u8::try_from(slot) {
                code.put_u8(op.to_byte());
                code.put_u8(slot);
            } else {
                code.put_u8(raw::WIDE);
                code.put_u8(op.to_byte());
                code.put_u16(slot);
            }
        }
        Insn::Iinc(local, delta) => {
            let Local::Slot(slot) = *local else {
                return Err(out_of_range(insn));
            };
            match (u8::try_from(slot), i8::try_from(*delta)) {
                (Ok(slot), Ok(delta)) => {
                    code.put_u8(Opcode::IINC.to_byte());
                    code.put_u8(slot);
                    code.put_u8(delta as u8);
                }
                _ => {
                    code.put_u8(raw::WIDE);
                    code.put_u8(Opcode::IINC.to_byte());
                    code.put_u16(slot);
                    code.put_i16(*delta);
                }
            }
        }
        Insn::Jump(op, target) => {
            let delta = offset(*target);
            if wide {
                code.put_u8(raw::GOTO_W);
                code.put_i32(i32::try_from(delta).map_err(|_| out_of_range(insn))?);
            } else {
                code.put_u8(op.to_byte());
                code.put_i16(i16::try_from(delta).map_err(|_| out_of_range(insn))?);
            }
        }
        Insn::Field(op, _) | Insn::Type(op, _) => {
            code.put_u8(op.to_byte());
            code.put_u16(operand);
        }
        Insn::Method(op, member) => {
            code.put_u8(op.to_byte());
            code.put_u16(operand);
            if *op == Opcode::INVOKEINTERFACE {
                let shape = descriptor::method_shape(&member.desc)?;
                let slots = u8::try_from(shape.arg_slots + 1).map_err(|_| out_of_range(insn))?;
                code.put_u8(slots);
                code.put_u8(0);
            }
        }
        Insn::TableSwitch {
            low,
            default,
            targets,
        } => {
            if targets.is_empty() {
                return Err(out_of_range(insn));
            }
            let high = i32::try_from(targets.len() - 1)
                .ok()
                .and_then(|span| low.checked_add(span))
                .ok_or_else(|| out_of_range(insn))?;
            code.put_u8(Opcode::TABLESWITCH.to_byte());
            code.resize(code.len() + switch_padding(pc), 0);
            code.put_i32(offset(*default) as i32);
            code.put_i32(*low);
            code.put_i32(high);
            for target in targets {
                code.put_i32(offset(*target) as i32);
            }
        }
        Insn::LookupSwitch { default, pairs } => {
            let mut sorted = pairs.clone();
            sorted.sort_by_key(|(key, _)| *key);
            code.put_u8(Opcode::LOOKUPSWITCH.to_byte());
            code.resize(code.len() + switch_padding(pc), 0);
            code.put_i32(offset(*default) as i32);
            code.put_i32(sorted.len() as i32);
            for (key, target) in sorted {
                code.put_i32(key);
                code.put_i32(offset(target) as i32);
            }
        }
    }
    Ok(())
}

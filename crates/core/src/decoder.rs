//! Container decoding: turns class bytes into a [`ClassNode`].
//!
//! Code is read in two passes. The first pass walks the byte stream and records every
//! instruction with branch targets still expressed as absolute program counters. The second pass
//! allocates one label per referenced program counter (branches, exception ranges, local variable
//! ranges) and emits the instruction list with label markers and line numbers in front of the
//! instructions they describe.

use crate::descriptor;
use crate::insn::{Insn, Label, Local};
use crate::insn_list::TryCatch;
use crate::opcode::{OperandKind, raw};
use crate::pool::PoolReader;
use crate::reader::ByteReader;
use crate::result::{Error, Result};
use crate::tree::{ClassNode, FORMAT_MAJOR, FieldNode, LocalVar, MethodNode};
use crate::Opcode;
use std::collections::{BTreeMap, BTreeSet};

/// Container magic number ("GRFT").
pub const MAGIC: u32 = 0x4752_4654;

/// Largest code attribute accepted by the format.
pub const MAX_CODE_LEN: usize = 65535;

/// Instruction with branch targets still as program counters.
#[derive(Debug)]
enum Pending {
    Ready(Insn),
    Jump(Opcode, i64),
    TableSwitch {
        low: i32,
        default: i64,
        targets: Vec<i64>,
    },
    LookupSwitch {
        default: i64,
        pairs: Vec<(i32, i64)>,
    },
}

impl Pending {
    fn targets(&self) -> Vec<i64> {
        match self {
            Pending::Ready(_) => Vec::new(),
            Pending::Jump(_, target) => vec![*target],
            Pending::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default).chain(targets.iter().copied()).collect(),
            Pending::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, target)| *target))
                .collect(),
        }
    }
}

/// Decoded instruction tagged with its program counter.
#[derive(Debug)]
struct RawInsn {
    pc: usize,
    pending: Pending,
}

/// Decodes a whole container.
pub fn decode_class(bytes: &[u8]) -> Result<ClassNode> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(Error::BadMagic(magic));
    }
    let major = reader.u16()?;
    let minor = reader.u16()?;
    if major > FORMAT_MAJOR {
        return Err(Error::UnsupportedVersion { major, minor });
    }

    let pool = PoolReader::read(&mut reader)?;
    let access = reader.u16()?;
    let name = pool.class(reader.u16()?)?;
    let super_name = pool.optional_class(reader.u16()?)?;
    let interfaces = reader.vec(|r| pool.class(r.u16()?))?;
    let fields = reader.vec(|r| decode_field(r, &pool))?;
    let methods = reader.vec(|r| decode_method(r, &pool))?;

    if reader.remaining() > 0 {
        return Err(Error::TrailingBytes(reader.remaining()));
    }

    tracing::debug!(
        "Decoded class {}: {} fields, {} methods",
        name,
        fields.len(),
        methods.len()
    );

    Ok(ClassNode {
        major,
        minor,
        access,
        name,
        super_name,
        interfaces,
        fields,
        methods,
    })
}

fn decode_field(reader: &mut ByteReader<'_>, pool: &PoolReader) -> Result<FieldNode> {
    let access = reader.u16()?;
    let name = pool.utf8(reader.u16()?)?.to_string();
    let desc = pool.utf8(reader.u16()?)?.to_string();
    descriptor::field_width(&desc)?;
    let value = match reader.u8()? {
        0 => None,
        _ => Some(pool.constant(reader.u16()?)?),
    };
    Ok(FieldNode {
        access,
        name,
        desc,
        value,
    })
}

fn decode_method(reader: &mut ByteReader<'_>, pool: &PoolReader) -> Result<MethodNode> {
    let access = reader.u16()?;
    let name = pool.utf8(reader.u16()?)?.to_string();
    let desc = pool.utf8(reader.u16()?)?.to_string();
    descriptor::method_shape(&desc)?;
    let exceptions = reader.vec(|r| pool.class(r.u16()?))?;

    let mut method = MethodNode::new(access, name, desc);
    method.exceptions = exceptions;
    if reader.u8()? != 0 {
        decode_code(reader, pool, &mut method)?;
    }
    Ok(method)
}

fn decode_code(
    reader: &mut ByteReader<'_>,
    pool: &PoolReader,
    method: &mut MethodNode,
) -> Result<()> {
    method.max_stack = reader.u16()?;
    method.max_locals = reader.u16()?;
    let code_len = reader.u32()? as usize;
    if code_len > MAX_CODE_LEN {
        return Err(Error::CodeTooLarge(
            format!("{}{}", method.name, method.desc),
            code_len,
        ));
    }
    let mut code = reader.sub(code_len)?;
    let mut raws = Vec::new();
    while code.remaining() > 0 {
        raws.push(decode_insn(&mut code, pool)?);
    }

    let handlers = reader.vec(|r| {
        Ok((
            r.u16()?,
            r.u16()?,
            r.u16()?,
            pool.optional_class(r.u16()?)?,
        ))
    })?;
    let locals = reader.vec(|r| {
        let start = r.u16()?;
        let length = r.u16()?;
        let name = pool.utf8(r.u16()?)?.to_string();
        let desc = pool.utf8(r.u16()?)?.to_string();
        let slot = r.u16()?;
        Ok((start, length, name, desc, slot))
    })?;
    let lines = reader.vec(|r| Ok((r.u16()?, r.u16()?)))?;

    // Program counters that may carry a label: every instruction start plus the end of the code.
    let boundaries: BTreeSet<usize> = raws
        .iter()
        .map(|raw| raw.pc)
        .chain(std::iter::once(code_len))
        .collect();
    let check = |pc: usize, target: i64| -> Result<usize> {
        usize::try_from(target)
            .ok()
            .filter(|t| boundaries.contains(t))
            .ok_or(Error::InvalidBranchTarget { pc, target })
    };

    let list = &mut method.instructions;
    let mut labels: BTreeMap<usize, Label> = BTreeMap::new();
    let mut wanted: Vec<usize> = Vec::new();
    for raw in &raws {
        for target in raw.pending.targets() {
            // Branches must land on an instruction, never on the end of the code.
            let pc = check(raw.pc, target)?;
            if pc == code_len {
                return Err(Error::InvalidBranchTarget {
                    pc: raw.pc,
                    target,
                });
            }
            wanted.push(pc);
        }
    }
    for (start, end, handler, _) in &handlers {
        for pc in [start, end, handler] {
            wanted.push(check(usize::from(*pc), i64::from(*pc))?);
        }
    }
    for (start, length, ..) in &locals {
        let end = i64::from(*start) + i64::from(*length);
        wanted.push(check(usize::from(*start), i64::from(*start))?);
        wanted.push(check(usize::from(*start), end)?);
    }
    let mut line_starts: BTreeMap<usize, Vec<u16>> = BTreeMap::new();
    for (start, line) in &lines {
        let pc = check(usize::from(*start), i64::from(*start))?;
        line_starts.entry(pc).or_default().push(*line);
    }
    wanted.sort_unstable();
    wanted.dedup();
    for pc in wanted {
        labels.insert(pc, list.new_label());
    }
    let label_at = |pc: i64| labels[&(pc as usize)];

    for raw in raws {
        if let Some(&label) = labels.get(&raw.pc) {
            list.place(label);
        }
        for &line in line_starts.get(&raw.pc).into_iter().flatten() {
            list.line(line);
        }
        let insn = match raw.pending {
            Pending::Ready(insn) => insn,
            Pending::Jump(op, target) => Insn::Jump(op, label_at(target)),
            Pending::TableSwitch {
                low,
                default,
                targets,
            } => Insn::TableSwitch {
                low,
                default: label_at(default),
                targets: targets.into_iter().map(label_at).collect(),
            },
            Pending::LookupSwitch { default, pairs } => Insn::LookupSwitch {
                default: label_at(default),
                pairs: pairs
                    .into_iter()
                    .map(|(key, target)| (key, label_at(target)))
                    .collect(),
            },
        };
        list.push(insn);
    }
    if let Some(&label) = labels.get(&code_len) {
        list.place(label);
    }

    for (start, end, handler, catch_type) in handlers {
        list.add_handler(TryCatch {
            start: labels[&usize::from(start)],
            end: labels[&usize::from(end)],
            handler: labels[&usize::from(handler)],
            catch_type,
        });
    }
    method.local_vars = locals
        .into_iter()
        .map(|(start, length, name, desc, slot)| LocalVar {
            name,
            desc,
            start: labels[&usize::from(start)],
            end: labels[&(usize::from(start) + usize::from(length))],
            slot,
        })
        .collect();

    tracing::debug!(
        "Decoded {}{}: {} bytes, {} nodes, {} handlers",
        method.name,
        method.desc,
        code_len,
        method.instructions.len(),
        method.instructions.handlers().len()
    );
    Ok(())
}

fn decode_insn(code: &mut ByteReader<'_>, pool: &PoolReader) -> Result<RawInsn> {
    let pc = code.pos();
    let byte = code.u8()?;
    let unsupported = || Error::UnsupportedOpcode { opcode: byte, pc };
    let relative = |offset: i64| pc as i64 + offset;

    let pending = match byte {
        raw::WIDE => {
            let inner = code.u8()?;
            let opcode = Opcode::from_byte(inner).ok_or(Error::UnsupportedOpcode {
                opcode: inner,
                pc,
            })?;
            match opcode.kind() {
                OperandKind::Iinc => {
                    let slot = code.u16()?;
                    Pending::Ready(Insn::Iinc(Local::Slot(slot), code.i16()?))
                }
                OperandKind::Var => Pending::Ready(Insn::Var(opcode, Local::Slot(code.u16()?))),
                _ => {
                    return Err(Error::UnsupportedOpcode {
                        opcode: inner,
                        pc,
                    });
                }
            }
        }
        raw::LDC_W | raw::LDC2_W => Pending::Ready(Insn::Ldc(pool.constant(code.u16()?)?)),
        raw::GOTO_W => Pending::Jump(Opcode::GOTO, relative(i64::from(code.i32()?))),
        raw::ILOAD_0..=raw::ALOAD_3 | raw::ISTORE_0..=raw::ASTORE_3 => {
            let (opcode, slot) = Opcode::from_short_form(byte).ok_or_else(unsupported)?;
            Pending::Ready(Insn::Var(opcode, Local::Slot(slot)))
        }
        _ => {
            let opcode = Opcode::from_byte(byte).ok_or_else(unsupported)?;
            match opcode.kind() {
                OperandKind::None => Pending::Ready(Insn::Simple(opcode)),
                OperandKind::Int => {
                    let value = match opcode {
                        Opcode::BIPUSH => i32::from(code.i8()?),
                        Opcode::SIPUSH => i32::from(code.i16()?),
                        _ => i32::from(code.u8()?),
                    };
                    Pending::Ready(Insn::Int(opcode, value))
                }
                OperandKind::Ldc => {
                    Pending::Ready(Insn::Ldc(pool.constant(u16::from(code.u8()?))?))
                }
                OperandKind::Var => {
                    Pending::Ready(Insn::Var(opcode, Local::Slot(u16::from(code.u8()?))))
                }
                OperandKind::Iinc => {
                    let slot = u16::from(code.u8()?);
                    Pending::Ready(Insn::Iinc(Local::Slot(slot), i16::from(code.i8()?)))
                }
                OperandKind::Jump => Pending::Jump(opcode, relative(i64::from(code.i16()?))),
                OperandKind::Field => Pending::Ready(Insn::Field(opcode, pool.field(code.u16()?)?)),
                OperandKind::Method => {
                    let member = pool.method(code.u16()?)?;
                    if opcode == Opcode::INVOKEINTERFACE {
                        // Argument count and reserved zero byte.
                        code.skip(2)?;
                    }
                    Pending::Ready(Insn::Method(opcode, member))
                }
                OperandKind::Type => Pending::Ready(Insn::Type(opcode, pool.class(code.u16()?)?)),
                OperandKind::TableSwitch => {
                    code.skip(switch_padding(pc))?;
                    let default = relative(i64::from(code.i32()?));
                    let low = code.i32()?;
                    let high = code.i32()?;
                    if high < low {
                        return Err(Error::InvalidBranchTarget {
                            pc,
                            target: i64::from(high),
                        });
                    }
                    let count = i64::from(high) - i64::from(low) + 1;
                    let targets = (0..count)
                        .map(|_| Ok(relative(i64::from(code.i32()?))))
                        .collect::<Result<Vec<_>>>()?;
                    Pending::TableSwitch {
                        low,
                        default,
                        targets,
                    }
                }
                OperandKind::LookupSwitch => {
                    code.skip(switch_padding(pc))?;
                    let default = relative(i64::from(code.i32()?));
                    let count = code.i32()?;
                    if count < 0 {
                        return Err(Error::InvalidBranchTarget {
                            pc,
                            target: i64::from(count),
                        });
                    }
                    let pairs = (0..count)
                        .map(|_| Ok((code.i32()?, relative(i64::from(code.i32()?)))))
                        .collect::<Result<Vec<_>>>()?;
                    Pending::LookupSwitch { default, pairs }
                }
            }
        }
    };
    Ok(RawInsn { pc, pending })
}

/// Bytes of padding after a switch opcode at `pc` so that its payload starts 4-byte aligned.
pub(crate) fn switch_padding(pc: usize) -> usize {
    (4 - (pc + 1) % 4) % 4
}

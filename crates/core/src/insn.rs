//! Instruction nodes.

use crate::Opcode;
use crate::descriptor;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Handle of a label marker.
///
/// A label is the arena index of its marker node inside one [`InsnList`](crate::InsnList); it
/// carries no meaning outside of that list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl Label {
    /// Arena index backing this label.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Reference to a local variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Local {
    /// A concrete slot of the enclosing method.
    Slot(u16),
    /// A block-private local. Fragments use temps for scratch storage; they are bound to a fresh
    /// slot (or to the slot captured by a needle) when the fragment is spliced into a method.
    Temp(u16),
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Local::Slot(slot) => write!(f, "{slot}"),
            Local::Temp(temp) => write!(f, "${temp}"),
        }
    }
}

/// Loadable constant (`LDC` operand and field default value).
#[derive(Debug, Clone)]
pub enum Constant {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(String),
}

impl Constant {
    /// Stack slots occupied by the constant once loaded.
    pub fn width(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

// Floats compare by bit pattern so constants can be interned and matched exactly.
impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Long(a), Constant::Long(b)) => a == b,
            (Constant::Double(a), Constant::Double(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            (Constant::Class(a), Constant::Class(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::Int(v) => v.hash(state),
            Constant::Float(v) => v.to_bits().hash(state),
            Constant::Long(v) => v.hash(state),
            Constant::Double(v) => v.to_bits().hash(state),
            Constant::String(v) | Constant::Class(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v}F"),
            Constant::Long(v) => write!(f, "{v}L"),
            Constant::Double(v) => write!(f, "{v}D"),
            Constant::String(v) => write!(f, "{v:?}"),
            Constant::Class(v) => write!(f, "{v}.class"),
        }
    }
}

/// Symbolic reference to a field or method of some class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub desc: String,
    /// Set for methods declared on an interface.
    pub interface: bool,
}

impl MemberRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
            interface: false,
        }
    }

    /// Same reference, flagged as an interface method.
    pub fn on_interface(mut self) -> Self {
        self.interface = true;
        self
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {}", self.owner, self.name, self.desc)
    }
}

/// One element of an instruction list.
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// Label marker; carries its own handle.
    Label(Label),
    /// Source line number attached to the following instruction.
    Line(u16),
    /// Opcode without operands.
    Simple(Opcode),
    /// `BIPUSH`, `SIPUSH` or `NEWARRAY` with its immediate.
    Int(Opcode, i32),
    /// Constant load.
    Ldc(Constant),
    /// Local load or store.
    Var(Opcode, Local),
    /// Local increment.
    Iinc(Local, i16),
    /// Conditional or unconditional branch.
    Jump(Opcode, Label),
    /// Field access.
    Field(Opcode, MemberRef),
    /// Method invocation.
    Method(Opcode, MemberRef),
    /// `NEW`, `ANEWARRAY`, `CHECKCAST` or `INSTANCEOF` with its class operand.
    Type(Opcode, String),
    /// Dense switch over `low..low + targets.len()`.
    TableSwitch {
        low: i32,
        default: Label,
        targets: Vec<Label>,
    },
    /// Sparse switch; keys are kept sorted by the encoder.
    LookupSwitch {
        default: Label,
        pairs: Vec<(i32, Label)>,
    },
}

impl Insn {
    /// Returns true for nodes that do not encode to bytes.
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Insn::Label(_) | Insn::Line(_))
    }

    /// Canonical opcode of a real instruction.
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Insn::Label(_) | Insn::Line(_) => None,
            Insn::Simple(op)
            | Insn::Int(op, _)
            | Insn::Var(op, _)
            | Insn::Jump(op, _)
            | Insn::Field(op, _)
            | Insn::Method(op, _)
            | Insn::Type(op, _) => Some(*op),
            Insn::Ldc(_) => Some(Opcode::LDC),
            Insn::Iinc(..) => Some(Opcode::IINC),
            Insn::TableSwitch { .. } => Some(Opcode::TABLESWITCH),
            Insn::LookupSwitch { .. } => Some(Opcode::LOOKUPSWITCH),
        }
    }

    /// Labels this node branches to, in operand order.
    pub fn targets(&self) -> Vec<Label> {
        match self {
            Insn::Jump(_, label) => vec![*label],
            Insn::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            Insn::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, label)| *label))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Copy of this node with every label (marker or target) passed through `map`.
    pub fn map_labels(&self, mut map: impl FnMut(Label) -> Label) -> Insn {
        match self {
            Insn::Label(label) => Insn::Label(map(*label)),
            Insn::Jump(op, label) => Insn::Jump(*op, map(*label)),
            Insn::TableSwitch {
                low,
                default,
                targets,
            } => Insn::TableSwitch {
                low: *low,
                default: map(*default),
                targets: targets.iter().map(|label| map(*label)).collect(),
            },
            Insn::LookupSwitch { default, pairs } => Insn::LookupSwitch {
                default: map(*default),
                pairs: pairs.iter().map(|(key, label)| (*key, map(*label))).collect(),
            },
            other => other.clone(),
        }
    }

    /// Local referenced by this node together with the number of slots it spans.
    pub fn local(&self) -> Option<(Local, u16)> {
        match self {
            Insn::Var(op, local) => Some((*local, op.slot_width())),
            Insn::Iinc(local, _) => Some((*local, 1)),
            _ => None,
        }
    }

    /// Copy of this node with its local (if any) passed through `map`.
    pub fn map_local(&self, map: impl FnOnce(Local) -> Local) -> Insn {
        match self {
            Insn::Var(op, local) => Insn::Var(*op, map(*local)),
            Insn::Iinc(local, delta) => Insn::Iinc(map(*local), *delta),
            other => other.clone(),
        }
    }

    /// Net effect on the operand stack in slots.
    ///
    /// Descriptors that fail to parse count as zero-sized; the decoder validates every descriptor
    /// it reads, so this only affects hand-built fragments.
    pub fn stack_delta(&self) -> i32 {
        match self {
            Insn::Label(_) | Insn::Line(_) | Insn::Iinc(..) => 0,
            Insn::Ldc(constant) => i32::from(constant.width()),
            Insn::Field(op, member) => {
                let width = descriptor::field_width(&member.desc).unwrap_or(1) as i32;
                match op {
                    Opcode::GETSTATIC => width,
                    Opcode::PUTSTATIC => -width,
                    Opcode::GETFIELD => width - 1,
                    _ => -width - 1,
                }
            }
            Insn::Method(op, member) => {
                let (args, ret) = descriptor::method_shape(&member.desc)
                    .map(|shape| (shape.arg_slots as i32, shape.return_slots as i32))
                    .unwrap_or((0, 0));
                let receiver = if *op == Opcode::INVOKESTATIC { 0 } else { 1 };
                ret - args - receiver
            }
            Insn::Simple(op)
            | Insn::Int(op, _)
            | Insn::Var(op, _)
            | Insn::Jump(op, _)
            | Insn::Type(op, _) => op.fixed_stack_delta(),
            Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => -1,
        }
    }

    /// Returns true if control never falls through to the next node.
    pub fn ends_flow(&self) -> bool {
        self.opcode().is_some_and(Opcode::ends_flow)
    }
}

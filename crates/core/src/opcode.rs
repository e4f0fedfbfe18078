//! Instruction set of the container format.
//!
//! Only canonical opcodes appear in [`Opcode`]. Alternate encodings that the decoder folds into a
//! canonical node (short-form local access, `LDC_W`, `LDC2_W`, `GOTO_W`, the `WIDE` prefix) are
//! listed in [`raw`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of the operands that follow an opcode in the code stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operands.
    None,
    /// Signed 8-bit (`BIPUSH`), signed 16-bit (`SIPUSH`) or unsigned 8-bit (`NEWARRAY`) immediate.
    Int,
    /// Pool-backed loadable constant.
    Ldc,
    /// Local slot index.
    Var,
    /// Local slot index plus signed increment.
    Iinc,
    /// Relative branch offset.
    Jump,
    /// Field reference.
    Field,
    /// Method reference.
    Method,
    /// Class reference.
    Type,
    /// Table switch payload.
    TableSwitch,
    /// Lookup switch payload.
    LookupSwitch,
}

macro_rules! opcodes {
    ($($name:ident = $byte:literal, $kind:ident, $delta:literal;)*) => {
        /// Canonical opcodes of the container instruction set.
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $byte,)*
        }

        impl Opcode {
            /// Parses a canonical opcode byte.
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// Operand shape of this opcode.
            pub fn kind(self) -> OperandKind {
                match self {
                    $(Opcode::$name => OperandKind::$kind,)*
                }
            }

            /// Upper-case mnemonic.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name),)*
                }
            }

            /// Fixed stack delta in slots. Only meaningful for opcodes whose effect does not
            /// depend on their operand.
            pub(crate) fn fixed_stack_delta(self) -> i32 {
                match self {
                    $(Opcode::$name => $delta,)*
                }
            }
        }
    };
}

opcodes! {
    NOP = 0x00, None, 0;
    ACONST_NULL = 0x01, None, 1;
    ICONST_M1 = 0x02, None, 1;
    ICONST_0 = 0x03, None, 1;
    ICONST_1 = 0x04, None, 1;
    ICONST_2 = 0x05, None, 1;
    ICONST_3 = 0x06, None, 1;
    ICONST_4 = 0x07, None, 1;
    ICONST_5 = 0x08, None, 1;
    LCONST_0 = 0x09, None, 2;
    LCONST_1 = 0x0a, None, 2;
    FCONST_0 = 0x0b, None, 1;
    FCONST_1 = 0x0c, None, 1;
    FCONST_2 = 0x0d, None, 1;
    DCONST_0 = 0x0e, None, 2;
    DCONST_1 = 0x0f, None, 2;
    BIPUSH = 0x10, Int, 1;
    SIPUSH = 0x11, Int, 1;
    LDC = 0x12, Ldc, 0;
    ILOAD = 0x15, Var, 1;
    LLOAD = 0x16, Var, 2;
    FLOAD = 0x17, Var, 1;
    DLOAD = 0x18, Var, 2;
    ALOAD = 0x19, Var, 1;
    IALOAD = 0x2e, None, -1;
    LALOAD = 0x2f, None, 0;
    FALOAD = 0x30, None, -1;
    DALOAD = 0x31, None, 0;
    AALOAD = 0x32, None, -1;
    BALOAD = 0x33, None, -1;
    CALOAD = 0x34, None, -1;
    SALOAD = 0x35, None, -1;
    ISTORE = 0x36, Var, -1;
    LSTORE = 0x37, Var, -2;
    FSTORE = 0x38, Var, -1;
    DSTORE = 0x39, Var, -2;
    ASTORE = 0x3a, Var, -1;
    IASTORE = 0x4f, None, -3;
    LASTORE = 0x50, None, -4;
    FASTORE = 0x51, None, -3;
    DASTORE = 0x52, None, -4;
    AASTORE = 0x53, None, -3;
    BASTORE = 0x54, None, -3;
    CASTORE = 0x55, None, -3;
    SASTORE = 0x56, None, -3;
    POP = 0x57, None, -1;
    POP2 = 0x58, None, -2;
    DUP = 0x59, None, 1;
    DUP_X1 = 0x5a, None, 1;
    DUP_X2 = 0x5b, None, 1;
    DUP2 = 0x5c, None, 2;
    DUP2_X1 = 0x5d, None, 2;
    DUP2_X2 = 0x5e, None, 2;
    SWAP = 0x5f, None, 0;
    IADD = 0x60, None, -1;
    LADD = 0x61, None, -2;
    FADD = 0x62, None, -1;
    DADD = 0x63, None, -2;
    ISUB = 0x64, None, -1;
    LSUB = 0x65, None, -2;
    FSUB = 0x66, None, -1;
    DSUB = 0x67, None, -2;
    IMUL = 0x68, None, -1;
    LMUL = 0x69, None, -2;
    FMUL = 0x6a, None, -1;
    DMUL = 0x6b, None, -2;
    IDIV = 0x6c, None, -1;
    LDIV = 0x6d, None, -2;
    FDIV = 0x6e, None, -1;
    DDIV = 0x6f, None, -2;
    IREM = 0x70, None, -1;
    LREM = 0x71, None, -2;
    FREM = 0x72, None, -1;
    DREM = 0x73, None, -2;
    INEG = 0x74, None, 0;
    LNEG = 0x75, None, 0;
    FNEG = 0x76, None, 0;
    DNEG = 0x77, None, 0;
    ISHL = 0x78, None, -1;
    LSHL = 0x79, None, -1;
    ISHR = 0x7a, None, -1;
    LSHR = 0x7b, None, -1;
    IUSHR = 0x7c, None, -1;
    LUSHR = 0x7d, None, -1;
    IAND = 0x7e, None, -1;
    LAND = 0x7f, None, -2;
    IOR = 0x80, None, -1;
    LOR = 0x81, None, -2;
    IXOR = 0x82, None, -1;
    LXOR = 0x83, None, -2;
    IINC = 0x84, Iinc, 0;
    I2L = 0x85, None, 1;
    I2F = 0x86, None, 0;
    I2D = 0x87, None, 1;
    L2I = 0x88, None, -1;
    L2F = 0x89, None, -1;
    L2D = 0x8a, None, 0;
    F2I = 0x8b, None, 0;
    F2L = 0x8c, None, 1;
    F2D = 0x8d, None, 1;
    D2I = 0x8e, None, -1;
    D2L = 0x8f, None, 0;
    D2F = 0x90, None, -1;
    I2B = 0x91, None, 0;
    I2C = 0x92, None, 0;
    I2S = 0x93, None, 0;
    LCMP = 0x94, None, -3;
    FCMPL = 0x95, None, -1;
    FCMPG = 0x96, None, -1;
    DCMPL = 0x97, None, -3;
    DCMPG = 0x98, None, -3;
    IFEQ = 0x99, Jump, -1;
    IFNE = 0x9a, Jump, -1;
    IFLT = 0x9b, Jump, -1;
    IFGE = 0x9c, Jump, -1;
    IFGT = 0x9d, Jump, -1;
    IFLE = 0x9e, Jump, -1;
    IF_ICMPEQ = 0x9f, Jump, -2;
    IF_ICMPNE = 0xa0, Jump, -2;
    IF_ICMPLT = 0xa1, Jump, -2;
    IF_ICMPGE = 0xa2, Jump, -2;
    IF_ICMPGT = 0xa3, Jump, -2;
    IF_ICMPLE = 0xa4, Jump, -2;
    IF_ACMPEQ = 0xa5, Jump, -2;
    IF_ACMPNE = 0xa6, Jump, -2;
    GOTO = 0xa7, Jump, 0;
    TABLESWITCH = 0xaa, TableSwitch, -1;
    LOOKUPSWITCH = 0xab, LookupSwitch, -1;
    IRETURN = 0xac, None, -1;
    LRETURN = 0xad, None, -2;
    FRETURN = 0xae, None, -1;
    DRETURN = 0xaf, None, -2;
    ARETURN = 0xb0, None, -1;
    RETURN = 0xb1, None, 0;
    GETSTATIC = 0xb2, Field, 0;
    PUTSTATIC = 0xb3, Field, 0;
    GETFIELD = 0xb4, Field, 0;
    PUTFIELD = 0xb5, Field, 0;
    INVOKEVIRTUAL = 0xb6, Method, 0;
    INVOKESPECIAL = 0xb7, Method, 0;
    INVOKESTATIC = 0xb8, Method, 0;
    INVOKEINTERFACE = 0xb9, Method, 0;
    NEW = 0xbb, Type, 1;
    NEWARRAY = 0xbc, Int, 0;
    ANEWARRAY = 0xbd, Type, 0;
    ARRAYLENGTH = 0xbe, None, 0;
    ATHROW = 0xbf, None, -1;
    CHECKCAST = 0xc0, Type, 0;
    INSTANCEOF = 0xc1, Type, 0;
    MONITORENTER = 0xc2, None, -1;
    MONITOREXIT = 0xc3, None, -1;
    IFNULL = 0xc6, Jump, -1;
    IFNONNULL = 0xc7, Jump, -1;
}

/// Non-canonical opcode bytes understood by the decoder and chosen by the encoder.
pub mod raw {
    /// `LDC` with a 16-bit pool index.
    pub const LDC_W: u8 = 0x13;
    /// `LDC` of a two-slot constant.
    pub const LDC2_W: u8 = 0x14;
    /// First short-form load (`ILOAD_0`); loads run through `ALOAD_3` (0x2d).
    pub const ILOAD_0: u8 = 0x1a;
    /// Last short-form load (`ALOAD_3`).
    pub const ALOAD_3: u8 = 0x2d;
    /// First short-form store (`ISTORE_0`); stores run through `ASTORE_3` (0x4e).
    pub const ISTORE_0: u8 = 0x3b;
    /// Last short-form store (`ASTORE_3`).
    pub const ASTORE_3: u8 = 0x4e;
    /// Prefix widening the local index (and `IINC` increment) to 16 bits.
    pub const WIDE: u8 = 0xc4;
    /// `GOTO` with a 32-bit offset.
    pub const GOTO_W: u8 = 0xc8;
}

impl Opcode {
    /// Byte value of the canonical encoding.
    #[inline]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Returns true for local loads (`ILOAD`..`ALOAD`).
    pub fn is_load(self) -> bool {
        matches!(
            self,
            Opcode::ILOAD | Opcode::LLOAD | Opcode::FLOAD | Opcode::DLOAD | Opcode::ALOAD
        )
    }

    /// Returns true for local stores (`ISTORE`..`ASTORE`).
    pub fn is_store(self) -> bool {
        matches!(
            self,
            Opcode::ISTORE | Opcode::LSTORE | Opcode::FSTORE | Opcode::DSTORE | Opcode::ASTORE
        )
    }

    /// Number of local slots touched by a `Var` opcode.
    pub fn slot_width(self) -> u16 {
        match self {
            Opcode::LLOAD | Opcode::DLOAD | Opcode::LSTORE | Opcode::DSTORE => 2,
            _ => 1,
        }
    }

    /// Returns true if execution never continues with the next instruction.
    pub fn ends_flow(self) -> bool {
        matches!(
            self,
            Opcode::GOTO
                | Opcode::TABLESWITCH
                | Opcode::LOOKUPSWITCH
                | Opcode::IRETURN
                | Opcode::LRETURN
                | Opcode::FRETURN
                | Opcode::DRETURN
                | Opcode::ARETURN
                | Opcode::RETURN
                | Opcode::ATHROW
        )
    }

    /// Maps a short-form local access byte to its canonical opcode and slot.
    pub fn from_short_form(byte: u8) -> Option<(Self, u16)> {
        let (base, first) = match byte {
            raw::ILOAD_0..=raw::ALOAD_3 => (Opcode::ILOAD, raw::ILOAD_0),
            raw::ISTORE_0..=raw::ASTORE_3 => (Opcode::ISTORE, raw::ISTORE_0),
            _ => return None,
        };
        let rel = byte - first;
        let opcode = Opcode::from_byte(base.to_byte() + rel / 4)?;
        Some((opcode, u16::from(rel % 4)))
    }

    /// Short-form byte for a canonical local access, if one exists for `slot`.
    pub fn short_form(self, slot: u16) -> Option<u8> {
        if slot > 3 {
            return None;
        }
        let slot = slot as u8;
        if self.is_load() {
            Some(raw::ILOAD_0 + (self.to_byte() - Opcode::ILOAD.to_byte()) * 4 + slot)
        } else if self.is_store() {
            Some(raw::ISTORE_0 + (self.to_byte() - Opcode::ISTORE.to_byte()) * 4 + slot)
        } else {
            None
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

//! Core results and error types

use thiserror::Error;

/// Core error type encompassing decode, IR and encode failures.
#[derive(Debug, Error)]
pub enum Error {
    /// Input ended before a complete structure could be read.
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    /// The container does not start with the expected magic number.
    #[error("wrong magic: got {0:#010x}, expected 0x47524654")]
    BadMagic(u32),

    /// The container was produced by a newer format revision.
    #[error("unsupported container version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found in the header.
        major: u16,
        /// Minor version found in the header.
        minor: u16,
    },

    /// A pool index is zero or past the end of the pool.
    #[error("invalid pool index {0}")]
    InvalidPoolIndex(u16),

    /// A pool entry has a different kind than the reference requires.
    #[error("pool entry {index} is not a {expected}")]
    PoolTypeMismatch {
        /// The offending index.
        index: u16,
        /// The entry kind that was required.
        expected: &'static str,
    },

    /// A pool entry carries an unknown tag byte.
    #[error("unknown pool tag {tag} at offset {offset}")]
    UnknownPoolTag {
        /// The tag byte.
        tag: u8,
        /// Offset of the tag within the input.
        offset: usize,
    },

    /// A UTF-8 pool entry is not valid UTF-8.
    #[error("invalid utf-8 in pool entry: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The opcode is not part of the supported instruction set.
    #[error("unsupported opcode 0x{opcode:02x} at pc {pc}")]
    UnsupportedOpcode {
        /// The raw opcode byte.
        opcode: u8,
        /// Program counter of the instruction.
        pc: usize,
    },

    /// A branch, handler or debug range points outside of an instruction boundary.
    #[error("invalid branch target {target} from pc {pc}")]
    InvalidBranchTarget {
        /// Program counter of the referencing instruction or table entry.
        pc: usize,
        /// The target that does not start an instruction.
        target: i64,
    },

    /// A type or method descriptor is malformed.
    #[error("invalid descriptor '{0}'")]
    InvalidDescriptor(String),

    /// Bytes remain after the last method.
    #[error("{0} trailing bytes after class body")]
    TrailingBytes(usize),

    /// An instruction or table references a label whose marker is not in the list.
    #[error("label {0} is referenced but not placed")]
    DanglingLabel(u32),

    /// A conditional branch offset does not fit into 16 bits.
    #[error("branch from pc {pc} to pc {target} is out of range")]
    BranchOutOfRange {
        /// Program counter of the branch.
        pc: usize,
        /// Program counter of the target.
        target: usize,
    },

    /// A method body exceeds the 65535-byte limit.
    #[error("method {0} code is too large ({1} bytes)")]
    CodeTooLarge(String, usize),

    /// The constant pool exceeds 65535 entries.
    #[error("constant pool overflow")]
    PoolOverflow,

    /// A string does not fit into a UTF-8 pool entry.
    #[error("string of {0} bytes does not fit into the constant pool")]
    StringTooLong(usize),

    /// An immediate operand does not fit into its encoding.
    #[error("operand out of range: {0}")]
    OperandOutOfRange(String),

    /// Two members share the same name and descriptor.
    #[error("duplicate member {name} {desc}")]
    DuplicateMember {
        /// Member name.
        name: String,
        /// Member descriptor.
        desc: String,
    },

    /// A block-private local reached the encoder without being assigned a slot.
    #[error("temporary local {0} was never assigned a slot")]
    UnresolvedTemp(u16),

    /// Instruction layout did not settle on a fixed point.
    #[error("instruction layout for {0} did not converge")]
    LayoutDiverged(String),
}

impl Error {
    /// Returns true for errors raised while reading a container.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedEof(_)
                | Error::BadMagic(_)
                | Error::UnsupportedVersion { .. }
                | Error::InvalidPoolIndex(_)
                | Error::PoolTypeMismatch { .. }
                | Error::UnknownPoolTag { .. }
                | Error::InvalidUtf8(_)
                | Error::UnsupportedOpcode { .. }
                | Error::InvalidBranchTarget { .. }
                | Error::InvalidDescriptor(_)
                | Error::TrailingBytes(_)
        )
    }
}

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;

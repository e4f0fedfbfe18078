pub mod decoder;
pub mod descriptor;
pub mod disasm;
pub mod encoder;
pub mod insn;
pub mod insn_list;
pub mod locals;
pub mod matcher;
pub mod opcode;
mod pool;
mod reader;
pub mod result;
pub mod stack;
pub mod tree;

pub use insn::{Constant, Insn, Label, Local, MemberRef};
pub use insn_list::{Binding, InsnList, MatchRegion, TryCatch};
pub use opcode::Opcode;
pub use result::{Error, Result};
pub use tree::{ClassNode, FieldNode, LocalVar, MethodNode, access};

/// Decodes and re-encodes a class without editing it.
///
/// The output is the canonical encoding of the input: pool rebuilt, shortest instruction forms,
/// recomputed stack limits. Normalizing an already normalized class returns identical bytes.
///
/// # Example
/// ```rust,ignore
/// let canonical = graft_core::normalize(&bytes)?;
/// assert_eq!(graft_core::normalize(&canonical)?, canonical);
/// ```
pub fn normalize(bytes: &[u8]) -> Result<Vec<u8>> {
    let class = decoder::decode_class(bytes)?;
    encoder::encode_class(&class)
}

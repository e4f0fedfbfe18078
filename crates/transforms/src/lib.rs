pub mod config;
pub mod dump;
pub mod edit;
pub mod identifier;
pub mod patch_set;
pub mod registry;
pub mod report;

pub use config::{DumpMode, TransformerConfig};
pub use dump::{Dump, DumpSink, FileDumpSink, NullDumpSink};
pub use edit::{CodeEdit, EditKind};
pub use identifier::{Identifier, IdentityResolver, MappingTable, ResolvedIdentifier, Resolver};
pub use patch_set::ClassPatchSet;
pub use registry::{PatchRegistry, PatchRegistryBuilder};
pub use report::{EditOutcome, TransformReport};

use thiserror::Error;

/// Transform error type covering every way a class transform can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// An edit targets a member that does not exist in the class.
    #[error("member not found: {target}")]
    MemberNotFound {
        /// The missing member.
        target: Identifier,
    },

    /// The input bytes do not decode into a class.
    #[error("malformed input for class {class}: {source}")]
    MalformedInput {
        /// Class being transformed.
        class: String,
        /// Decoder failure.
        source: graft_core::Error,
    },

    /// The edited class cannot be encoded again.
    #[error("failed to serialize class {class}: {source}")]
    SerializationFailure {
        /// Class being transformed.
        class: String,
        /// Encoder failure.
        source: graft_core::Error,
    },

    /// An edit's own preconditions do not hold.
    #[error("cannot apply edit to {target}: {reason}")]
    EditApplicationFailure {
        /// Member the edit targets.
        target: Identifier,
        /// What went wrong.
        reason: String,
    },

    /// A mapping table or configuration document is not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is not understood.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Transform result type
pub type Result<T> = std::result::Result<T, Error>;

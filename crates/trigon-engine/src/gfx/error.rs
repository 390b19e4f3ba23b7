use std::fmt;

use thiserror::Error;

/// Kind of GPU object a context failed to allocate.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResourceKind {
    Buffer,
    VertexArray,
    Shader,
    Program,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::VertexArray => "vertex array",
            ResourceKind::Shader => "shader",
            ResourceKind::Program => "program",
        };
        f.write_str(name)
    }
}

/// Errors raised by a graphics context.
///
/// Every variant is unrecoverable at startup: the process has no fallback
/// when the device cannot be brought up or refuses an allocation.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Adapter, device or surface configuration failed.
    #[error("graphics context initialization failed: {0}")]
    Init(String),

    /// The context rejected an object allocation.
    #[error("{kind} allocation rejected: {reason}")]
    Allocation { kind: ResourceKind, reason: String },

    /// A handle was passed that this context never issued.
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: ResourceKind, id: u32 },
}

impl ContextError {
    pub(crate) fn allocation(kind: ResourceKind, reason: impl Into<String>) -> Self {
        Self::Allocation {
            kind,
            reason: reason.into(),
        }
    }
}

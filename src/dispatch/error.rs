//! Dispatch failures

use crate::cluster::{NodeAddr, Role};
use crate::commands::OpCategory;

/// Broad failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IllegalOperation,
    DisabledOperation,
    NodeUnavailable,
    InvocationFault,
}

/// Why a call did not produce a reply
///
/// Every failure on the dispatch path ends up here; nothing panics or
/// propagates past [`Dispatcher::dispatch`](super::Dispatcher::dispatch).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("disabled operation: {0}")]
    DisabledOperation(String),

    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    #[error("node configuration missing: no {role} node for {op}")]
    NodeConfigMissing { op: String, role: Role },

    #[error("connection failed: {addr}: {reason}")]
    ConnectionFailed { addr: NodeAddr, reason: String },

    #[error("invocation fault on {addr}: {message}")]
    InvocationFault { addr: NodeAddr, message: String },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::DisabledOperation(_) => ErrorKind::DisabledOperation,
            DispatchError::IllegalOperation(_) => ErrorKind::IllegalOperation,
            DispatchError::NodeConfigMissing { .. } | DispatchError::ConnectionFailed { .. } => {
                ErrorKind::NodeUnavailable
            }
            DispatchError::InvocationFault { .. } => ErrorKind::InvocationFault,
        }
    }
}

/// Decide whether an operation may be sent and which pool serves it
///
/// System operations need `allow_system`; disabled and unknown ones never pass.
pub(crate) fn admit(op: &str, category: OpCategory, allow_system: bool) -> Result<Role, DispatchError> {
    match category {
        OpCategory::Read => Ok(Role::Slave),
        OpCategory::Write => Ok(Role::Master),
        OpCategory::System if allow_system => Ok(Role::Master),
        OpCategory::Disabled => Err(DispatchError::DisabledOperation(op.to_string())),
        OpCategory::System | OpCategory::Unknown => {
            Err(DispatchError::IllegalOperation(op.to_string()))
        }
    }
}

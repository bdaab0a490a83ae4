use qbx_cfg::graph::BlockId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinearizeError {
    #[error("GOSUB return site {block} is registered but has no block")]
    MissingReturnSite { block: BlockId },
}

/// Problems that do not stop a routine from being emitted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("{block}: {reason}; continuing along its first edge")]
    UnknownEdgeShape { block: BlockId, reason: String },
    #[error("{block} is unreachable from the routine entry")]
    UnreachableBlock { block: BlockId },
}

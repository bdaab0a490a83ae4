//! Checks run on a freshly built graph. A failure here means the builder wired something wrong.

use qbx_middle::sourcemap::Span;

use crate::error::Error;
use crate::graph::{BasicBlock, ControlFlowGraph, EdgeShape};

fn span_of(block: &BasicBlock<'_>) -> Span {
    block.last_statement().map_or(Span::COMPILER_GENERATED, |s| s.span)
}

/// Every block's outgoing edges must form one of the legal shapes
pub fn verify_shapes(cfg: &ControlFlowGraph<'_>) -> Result<(), Error> {
    for block in cfg.blocks() {
        cfg.shape(block.id()).map_err(|err| Error::from_shape(err, span_of(block)))?;
    }
    Ok(())
}

/// Every loop header still has one of the back edges the builder wired for it.
/// Jumps into a loop body from outside do not matter here.
pub fn verify_loop_headers(cfg: &ControlFlowGraph<'_>) -> Result<(), Error> {
    for block in cfg.blocks() {
        let Some(span) = block.loop_span() else {
            continue;
        };
        if !cfg.incoming(block.id()).any(|edge| edge.back) {
            return Err(Error::structural(format!("loop header {} has no back edge", block.id()), span));
        }
    }
    Ok(())
}

/// Every call site's return edge lands in a registered return block, and every registered block exists
pub fn verify_gosub_sites(cfg: &ControlFlowGraph<'_>) -> Result<(), Error> {
    for &block in cfg.gosub_return_blocks() {
        if !cfg.contains(block) {
            return Err(Error::structural(
                format!("return site {block} is not part of the graph"),
                Span::COMPILER_GENERATED,
            ));
        }
    }

    for block in cfg.blocks() {
        if let Ok(EdgeShape::Call { return_site, .. }) = cfg.shape(block.id()) {
            if !cfg.gosub_return_blocks().contains(&return_site) {
                return Err(Error::structural(
                    format!("call site {} returns to unregistered block {return_site}", block.id()),
                    span_of(block),
                ));
            }
        }
    }
    Ok(())
}

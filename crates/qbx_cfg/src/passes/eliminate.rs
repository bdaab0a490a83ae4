//! Dead and empty block elimination.
//!
//! Runs to a fixpoint, so running it again on its own output changes nothing.

use smallvec::SmallVec;

use crate::graph::{BlockId, ControlFlowGraph, EdgeKind};

/// Blocks that stay even without predecessors: they can be reached by dispatch at run time
fn is_pinned(cfg: &ControlFlowGraph<'_>, block: BlockId) -> bool {
    block == cfg.entry() || cfg.landing_zones().contains(&block) || cfg.gosub_return_blocks().contains(&block)
}

pub fn eliminate(cfg: &mut ControlFlowGraph<'_>) {
    loop {
        let pruned = prune_dead(cfg);
        let spliced = splice_empty(cfg);
        if !pruned && !spliced {
            break;
        }
    }
    demote_loop_headers(cfg);
}

/// Removes blocks without incoming edges. A self edge (e.g. RETURN) does not keep a block alive.
fn prune_dead(cfg: &mut ControlFlowGraph<'_>) -> bool {
    let dead: Vec<BlockId> = cfg
        .blocks()
        .iter()
        .filter(|b| !is_pinned(cfg, b.id()) && b.predecessors().iter().all(|&p| p == b.id()))
        .map(|b| b.id())
        .collect();

    if dead.is_empty() {
        return false;
    }
    qbx_log::debug!(routine = cfg.name(), count = dead.len(), "pruning dead blocks");
    cfg.retain_blocks(|b| dead.binary_search(&b.id()).is_err());
    true
}

/// Splices out every empty block sitting on a single unconditional edge
fn splice_empty(cfg: &mut ControlFlowGraph<'_>) -> bool {
    let mut changed = false;
    while let Some(Splice {
        block,
        incoming,
        successor,
        back,
    }) = find_splice(cfg)
    {
        qbx_log::trace!(%block, %successor, "splicing empty block");
        cfg.retarget_edge(incoming, successor, back);
        cfg.remove_outgoing(block);
        cfg.retain_blocks(|b| b.id() != block);
        changed = true;
    }
    changed
}

struct Splice {
    block: BlockId,
    /// Index of the only incoming edge
    incoming: usize,
    successor: BlockId,
    /// The outgoing edge closes a loop
    back: bool,
}

fn find_splice(cfg: &ControlFlowGraph<'_>) -> Option<Splice> {
    cfg.blocks().iter().find_map(|block| {
        let id = block.id();
        if is_pinned(cfg, id) || block.is_loop_header() || !block.statements().is_empty() || block.condition().is_some()
        {
            return None;
        }

        let incoming: SmallVec<[usize; 2]> = cfg
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.target == id)
            .map(|(i, _)| i)
            .take(2)
            .collect();
        let outgoing: SmallVec<[_; 2]> = cfg
            .outgoing(id)
            .filter(|e| e.kind != EdgeKind::Exception)
            .take(2)
            .collect();

        match (incoming.as_slice(), outgoing.as_slice()) {
            ([index], [out]) => {
                let edge = &cfg.edges()[*index];
                let splicable = edge.kind.is_unconditional()
                    && edge.source != id
                    && out.kind.is_unconditional()
                    && out.label.is_none()
                    && out.target != id;
                splicable.then_some(Splice {
                    block: id,
                    incoming: *index,
                    successor: out.target,
                    back: out.back,
                })
            }
            _ => None,
        }
    })
}

/// Clears the loop header flag of blocks whose back edges all came from pruned blocks
fn demote_loop_headers(cfg: &mut ControlFlowGraph<'_>) {
    let headers: Vec<BlockId> = cfg.loop_headers().collect();
    for header in headers {
        if !cfg.incoming(header).any(|e| e.back) {
            qbx_log::debug!(%header, "loop never repeats");
            cfg.clear_loop_header(header);
        }
    }
}

#[cfg(test)]
mod tests {
    use qbx_middle::sourcemap::Span;

    use super::*;
    use crate::graph::{BlockStmt, UnitKind};

    #[test]
    fn prunes_blocks_without_predecessors() {
        let mut cfg = ControlFlowGraph::new("MAIN", UnitKind::Main);
        let entry = cfg.entry();
        let dead = cfg.add_block(None);
        let ret = cfg.add_block(None);
        cfg.push_stmt(dead, BlockStmt::PopHandler);
        cfg.add_edge(dead, ret, EdgeKind::Jump);
        cfg.add_edge(ret, ret, EdgeKind::Return);

        eliminate(&mut cfg);
        assert_eq!(cfg.blocks().len(), 1);
        assert_eq!(cfg.blocks()[0].id(), entry);
        assert!(cfg.edges().is_empty());
    }

    #[test]
    fn splices_empty_forwarders() {
        let mut cfg = ControlFlowGraph::new("MAIN", UnitKind::Main);
        let entry = cfg.entry();
        let a = cfg.add_block(None);
        let b = cfg.add_block(None);
        let end = cfg.add_block(None);
        cfg.push_stmt(end, BlockStmt::PopHandler);
        cfg.add_edge(entry, a, EdgeKind::Jump);
        cfg.add_edge(a, b, EdgeKind::Fallthrough);
        cfg.add_edge(b, end, EdgeKind::Jump);

        eliminate(&mut cfg);
        let ids: Vec<_> = cfg.blocks().iter().map(|b| b.id()).collect();
        assert_eq!(ids, [entry, end]);
        assert_eq!(cfg.edges().len(), 1);
        assert_eq!(cfg.edges()[0].kind, EdgeKind::Jump);
        assert_eq!(cfg[end].predecessors(), [entry]);
    }

    #[test]
    fn splicing_a_latch_keeps_the_back_edge() {
        let mut cfg = ControlFlowGraph::new("MAIN", UnitKind::Main);
        let header = cfg.add_block(None);
        let latch = cfg.add_block(None);
        cfg.mark_loop_header(header, Span::new(0, 4));
        cfg.push_stmt(header, BlockStmt::PopHandler);
        cfg.add_edge(cfg.entry(), header, EdgeKind::Fallthrough);
        cfg.add_edge(header, latch, EdgeKind::Fallthrough);
        cfg.add_back_edge(latch, header, EdgeKind::Jump);

        eliminate(&mut cfg);
        assert!(!cfg.contains(latch));
        assert!(cfg.incoming(header).any(|e| e.source == header && e.back));
        assert!(cfg[header].is_loop_header());
    }

    #[test]
    fn dead_latch_demotes_the_header() {
        let mut cfg = ControlFlowGraph::new("MAIN", UnitKind::Main);
        let header = cfg.add_block(None);
        let latch = cfg.add_block(None);
        cfg.mark_loop_header(header, Span::new(0, 4));
        cfg.push_stmt(header, BlockStmt::PopHandler);
        cfg.push_stmt(latch, BlockStmt::PopHandler);
        cfg.add_edge(cfg.entry(), header, EdgeKind::Fallthrough);
        cfg.add_back_edge(latch, header, EdgeKind::Jump);

        eliminate(&mut cfg);
        assert!(!cfg.contains(latch));
        assert!(!cfg[header].is_loop_header());
    }

    #[test]
    fn keeps_pinned_blocks() {
        let mut cfg = ControlFlowGraph::new("MAIN", UnitKind::Main);
        let landing = cfg.add_block(None);
        let ret = cfg.add_block(None);
        cfg.pin_landing_zone(landing);
        cfg.register_gosub_return(ret);

        eliminate(&mut cfg);
        assert_eq!(cfg.blocks().len(), 3);
    }
}

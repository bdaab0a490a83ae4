//! Human readable projection of a graph, for debugging and golden tests

use std::fmt;

use qbx_middle::util::fmt_group;

use crate::graph::{BlockId, ControlFlowGraph};

pub struct CfgReport<'g, 'a>(pub &'g ControlFlowGraph<'a>);

struct IdList<'i>(&'i [BlockId]);

impl fmt::Display for IdList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        fmt_group(f, self.0, ", ")?;
        f.write_str("]")
    }
}

impl fmt::Display for CfgReport<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = self.0;
        writeln!(
            f,
            "{} ({}): {} blocks, {} edges, entry {}",
            cfg.name(),
            cfg.unit(),
            cfg.blocks().len(),
            cfg.edges().len(),
            cfg.entry()
        )?;

        for block in cfg.blocks() {
            write!(f, "{}", block.id())?;
            if let Some(role) = block.role() {
                write!(f, " {role}")?;
            }
            if block.is_loop_header() {
                f.write_str(" (loop header)")?;
            }
            writeln!(
                f,
                ": {} statements, preds {}, succs {}",
                block.statements().len(),
                IdList(block.predecessors()),
                IdList(block.successors())
            )?;
        }

        writeln!(f, "edges:")?;
        for edge in cfg.edges() {
            writeln!(f, "  {edge}")?;
        }

        let headers: Vec<BlockId> = cfg.loop_headers().collect();
        let returns: Vec<BlockId> = cfg.gosub_return_blocks().iter().copied().collect();
        writeln!(f, "loop headers: {}", IdList(&headers))?;
        writeln!(f, "gosub return sites: {}", IdList(&returns))
    }
}

//! The graph model: basic blocks, typed edges and the per-routine graph.
//!
//! Blocks are addressed by [`BlockId`] only. Predecessor and successor sets are derived from the edge list and
//! every mutation of the edge list goes through [`ControlFlowGraph`], so the two can never drift apart.

use std::collections::BTreeSet;
use std::fmt;

use bitvec::prelude::*;
use qbx_middle::index_type;
use qbx_middle::parser::expr::Expr;
use qbx_middle::parser::statement::{ForLoop, RoutineKind, SelectCase, Statement};
use qbx_middle::sourcemap::Span;
use smallvec::SmallVec;
use strum_macros::{Display as StrumDisplay, IntoStaticStr};
use thiserror::Error;

index_type!(BlockId u32, "bb");
index_type!(LoopId u32, "loop");

/// Role annotation of a block, used by later phases and diagnostics. Never used for addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, IntoStaticStr)]
pub enum BlockRole {
    Entry,
    #[strum(serialize = "Routine_Exit")]
    RoutineExit,
    /// Forced boundary for a GOTO/GOSUB/ON target
    Landing,
    /// Code following an unconditional transfer
    #[strum(serialize = "After_Jump")]
    AfterJump,
    #[strum(serialize = "If_Then")]
    IfThen,
    #[strum(serialize = "If_Else")]
    IfElse,
    #[strum(serialize = "If_Join")]
    IfJoin,
    #[strum(serialize = "Case_Body")]
    CaseBody,
    #[strum(serialize = "Case_Else")]
    CaseElse,
    #[strum(serialize = "Select_Join")]
    SelectJoin,
    #[strum(serialize = "For_Init")]
    ForInit,
    #[strum(serialize = "For_Header")]
    ForHeader,
    #[strum(serialize = "For_Body")]
    ForBody,
    #[strum(serialize = "For_Increment")]
    ForIncrement,
    #[strum(serialize = "For_Exit")]
    ForExit,
    #[strum(serialize = "Loop_Header")]
    LoopHeader,
    #[strum(serialize = "Loop_Body")]
    LoopBody,
    #[strum(serialize = "Loop_Test")]
    LoopTest,
    #[strum(serialize = "Loop_Exit")]
    LoopExit,
    #[strum(serialize = "Try_Entry")]
    TryEntry,
    Catch,
    Finally,
    #[strum(serialize = "Try_Join")]
    TryJoin,
    /// Pops handlers on the way from a FINALLY block to where a non-local exit continues
    #[strum(serialize = "Finally_Resume")]
    FinallyResume,
    #[strum(serialize = "Gosub_Return")]
    GosubReturn,
    #[strum(serialize = "Call_Stub")]
    CallStub,
}

/// One entry of a block's straight-line body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockStmt<'a> {
    /// A statement borrowed from the AST, lowered by the statement emitter
    Plain(&'a Statement),
    /// Evaluates start, limit and step once and stores them
    ForInit { loop_id: LoopId, for_loop: &'a ForLoop },
    /// Adds the stored step to the induction variable
    ForIncrement { loop_id: LoopId, for_loop: &'a ForLoop },
    /// Installs `handler` as the innermost exception handler
    PushHandler { handler: BlockId },
    PopHandler,
    /// Binds the raised error at the start of a CATCH body
    CatchEnter { binding: Option<&'a str> },
    /// End of FINALLY: re-raises an exception that entered the FINALLY block, if any
    ResumePending,
    /// Records where control continues once `finally` completes: case edge `case` of its exit dispatch, or its
    /// join for [`None`]
    SetPending { finally: BlockId, case: Option<u32> },
}

/// The value a block tests before its conditional or multiway transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition<'a> {
    /// IF, ELSEIF, WHILE and DO conditions
    Expr(&'a Expr),
    /// FOR header: the induction variable against the stored limit, direction picked by the step
    ForTest { loop_id: LoopId, for_loop: &'a ForLoop },
    /// SELECT CASE selector; case edge `i` belongs to `cases[i]`
    Select(&'a SelectCase),
    /// ON x GOTO/GOSUB selector; case edge `i` is taken when the selector equals `i + 1`
    OnIndex(&'a Expr),
    /// End of a FINALLY block; case edge `i` is taken when the exit that entered it stored case `i`
    Pending(BlockId),
}

#[derive(Debug, Clone)]
pub struct BasicBlock<'a> {
    id: BlockId,
    role: Option<BlockRole>,
    statements: Vec<BlockStmt<'a>>,
    condition: Option<Condition<'a>>,
    /// Span of the loop statement this block heads
    loop_header: Option<Span>,
    predecessors: Vec<BlockId>,
    successors: Vec<BlockId>,
}

impl<'a> BasicBlock<'a> {
    fn new(id: BlockId, role: Option<BlockRole>) -> Self {
        Self {
            id,
            role,
            statements: Vec::new(),
            condition: None,
            loop_header: None,
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn role(&self) -> Option<BlockRole> {
        self.role
    }

    pub fn statements(&self) -> &[BlockStmt<'a>] {
        &self.statements
    }

    pub fn condition(&self) -> Option<Condition<'a>> {
        self.condition
    }

    pub fn is_loop_header(&self) -> bool {
        self.loop_header.is_some()
    }

    pub fn loop_span(&self) -> Option<Span> {
        self.loop_header
    }

    /// Sorted, deduplicated
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Sorted, deduplicated
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// The last AST statement in this block, used to point diagnostics at source
    pub fn last_statement(&self) -> Option<&'a Statement> {
        self.statements.iter().rev().find_map(|s| match s {
            BlockStmt::Plain(stmt) => Some(*stmt),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, IntoStaticStr)]
pub enum EdgeKind {
    Fallthrough,
    Jump,
    ConditionalTrue,
    ConditionalFalse,
    Call,
    Return,
    Exception,
}

impl EdgeKind {
    pub fn is_unconditional(self) -> bool {
        matches!(self, Self::Fallthrough | Self::Jump)
    }
}

/// Label of a multiway dispatch edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    /// Zero-based arm index
    Case(u32),
    Default,
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Case(index) => write!(f, "case {index}"),
            Self::Default => f.write_str("default"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgEdge {
    pub source: BlockId,
    pub target: BlockId,
    pub kind: EdgeKind,
    pub label: Option<EdgeLabel>,
    /// Wired by the builder to close a loop; the target is a loop header
    pub back: bool,
}

impl fmt::Display for CfgEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} [{}", self.source, self.target, self.kind)?;
        if let Some(label) = self.label {
            write!(f, " {label}")?;
        }
        if self.back {
            f.write_str(" back")?;
        }
        f.write_str("]")
    }
}

/// The legal outgoing-edge multisets of a block, ignoring `Exception` edges which may accompany any of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeShape {
    /// No outgoing edges: the routine ends here
    Terminal,
    /// A single `Fallthrough` or `Jump`
    Goto(BlockId),
    Branch { if_true: BlockId, if_false: BlockId },
    /// GOSUB: `Call` to the subroutine plus the edge to the return site
    Call { callee: BlockId, return_site: BlockId },
    /// RETURN: dispatch over the registered return sites at run time
    Return,
    /// SELECT CASE and ON..GOTO; `cases` in edge-list order
    Multiway { cases: Vec<BlockId>, default: BlockId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeKinds(pub Vec<EdgeKind>);

impl fmt::Display for EdgeKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        qbx_middle::util::fmt_group(f, &self.0, ", ")?;
        f.write_str("]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{block} has an illegal set of outgoing edges {kinds}")]
pub struct ShapeError {
    pub block: BlockId,
    pub kinds: EdgeKinds,
}

/// Which kind of program unit a graph was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum UnitKind {
    #[strum(serialize = "MAIN")]
    Main,
    #[strum(serialize = "SUB")]
    Sub,
    #[strum(serialize = "FUNCTION")]
    Function,
}

impl From<RoutineKind> for UnitKind {
    fn from(kind: RoutineKind) -> Self {
        match kind {
            RoutineKind::Sub => Self::Sub,
            RoutineKind::Function => Self::Function,
        }
    }
}

/// The control flow graph of one program unit
#[derive(Debug, Clone)]
pub struct ControlFlowGraph<'a> {
    name: String,
    unit: UnitKind,
    /// Ascending by id; ids of removed blocks are never reused
    blocks: Vec<BasicBlock<'a>>,
    edges: Vec<CfgEdge>,
    entry: BlockId,
    next_id: u32,
    gosub_return_blocks: BTreeSet<BlockId>,
    landing_zones: BTreeSet<BlockId>,
}

impl<'a> ControlFlowGraph<'a> {
    /// Creates a graph holding only its entry block
    pub fn new(name: impl Into<String>, unit: UnitKind) -> Self {
        let mut graph = Self {
            name: name.into(),
            unit,
            blocks: Vec::new(),
            edges: Vec::new(),
            entry: BlockId(0),
            next_id: 0,
            gosub_return_blocks: BTreeSet::new(),
            landing_zones: BTreeSet::new(),
        };
        graph.entry = graph.add_block(Some(BlockRole::Entry));
        graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> UnitKind {
        self.unit
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn blocks(&self) -> &[BasicBlock<'a>] {
        &self.blocks
    }

    pub fn edges(&self) -> &[CfgEdge] {
        &self.edges
    }

    /// One past the highest id ever handed out; sizes id-indexed bit sets
    pub fn id_bound(&self) -> usize {
        self.next_id as usize
    }

    /// Block ids that are legal landing sites for a dynamic RETURN, ascending
    pub fn gosub_return_blocks(&self) -> &BTreeSet<BlockId> {
        &self.gosub_return_blocks
    }

    /// Blocks forced by GOTO/GOSUB/ON targets
    pub fn landing_zones(&self) -> &BTreeSet<BlockId> {
        &self.landing_zones
    }

    pub fn loop_headers(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.iter().filter(|b| b.is_loop_header()).map(|b| b.id)
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock<'a>> {
        self.position(id).map(|pos| &self.blocks[pos])
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: BlockId) -> Option<usize> {
        self.blocks.binary_search_by_key(&id, |b| b.id).ok()
    }

    pub fn add_block(&mut self, role: Option<BlockRole>) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.blocks.push(BasicBlock::new(id, role));
        id
    }

    pub fn push_stmt(&mut self, block: BlockId, stmt: BlockStmt<'a>) {
        self[block].statements.push(stmt);
    }

    pub fn set_condition(&mut self, block: BlockId, condition: Condition<'a>) {
        let slot = &mut self[block].condition;
        debug_assert!(slot.is_none(), "{block} already tests a condition");
        *slot = Some(condition);
    }

    /// Marks `block` as the header of the loop statement at `span`
    pub fn mark_loop_header(&mut self, block: BlockId, span: Span) {
        self[block].loop_header = Some(span);
    }

    pub(crate) fn clear_loop_header(&mut self, block: BlockId) {
        self[block].loop_header = None;
    }

    pub fn register_gosub_return(&mut self, block: BlockId) {
        self.gosub_return_blocks.insert(block);
    }

    pub fn pin_landing_zone(&mut self, block: BlockId) {
        self.landing_zones.insert(block);
    }

    pub fn add_edge(&mut self, source: BlockId, target: BlockId, kind: EdgeKind) {
        self.push_edge(CfgEdge {
            source,
            target,
            kind,
            label: None,
            back: false,
        });
    }

    /// An edge that closes the loop headed by `header`
    pub fn add_back_edge(&mut self, source: BlockId, header: BlockId, kind: EdgeKind) {
        self.push_edge(CfgEdge {
            source,
            target: header,
            kind,
            label: None,
            back: true,
        });
    }

    pub fn add_labeled_edge(&mut self, source: BlockId, target: BlockId, kind: EdgeKind, label: EdgeLabel) {
        self.push_edge(CfgEdge {
            source,
            target,
            kind,
            label: Some(label),
            back: false,
        });
    }

    fn push_edge(&mut self, edge: CfgEdge) {
        insert_sorted(&mut self[edge.source].successors, edge.target);
        insert_sorted(&mut self[edge.target].predecessors, edge.source);
        self.edges.push(edge);
    }

    /// Outgoing edges of `block` in insertion order
    pub fn outgoing(&self, block: BlockId) -> impl Iterator<Item = &CfgEdge> + '_ {
        self.edges.iter().filter(move |e| e.source == block)
    }

    /// Incoming edges of `block` in insertion order
    pub fn incoming(&self, block: BlockId) -> impl Iterator<Item = &CfgEdge> + '_ {
        self.edges.iter().filter(move |e| e.target == block)
    }

    /// Classifies the outgoing edges of `block` into one of the legal shapes
    pub fn shape(&self, block: BlockId) -> Result<EdgeShape, ShapeError> {
        let edges: SmallVec<[&CfgEdge; 4]> = self.outgoing(block).filter(|e| e.kind != EdgeKind::Exception).collect();
        let illegal = || ShapeError {
            block,
            kinds: EdgeKinds(edges.iter().map(|e| e.kind).collect()),
        };

        if edges.iter().any(|e| e.label.is_some()) {
            let mut cases = Vec::new();
            let mut default = None;
            for edge in &edges {
                match (edge.kind, edge.label) {
                    (EdgeKind::Jump, Some(EdgeLabel::Case(index))) if index as usize == cases.len() => {
                        cases.push(edge.target)
                    }
                    (EdgeKind::Jump, Some(EdgeLabel::Default)) if default.is_none() => default = Some(edge.target),
                    _ => return Err(illegal()),
                }
            }
            return match default {
                Some(default) => Ok(EdgeShape::Multiway { cases, default }),
                None => Err(illegal()),
            };
        }

        match edges.as_slice() {
            [] => Ok(EdgeShape::Terminal),
            [e] if e.kind.is_unconditional() => Ok(EdgeShape::Goto(e.target)),
            [e] if e.kind == EdgeKind::Return => Ok(EdgeShape::Return),
            [a, b] => match (a.kind, b.kind) {
                (EdgeKind::ConditionalTrue, EdgeKind::ConditionalFalse) => Ok(EdgeShape::Branch {
                    if_true: a.target,
                    if_false: b.target,
                }),
                (EdgeKind::ConditionalFalse, EdgeKind::ConditionalTrue) => Ok(EdgeShape::Branch {
                    if_true: b.target,
                    if_false: a.target,
                }),
                (EdgeKind::Call, k) if k.is_unconditional() => Ok(EdgeShape::Call {
                    callee: a.target,
                    return_site: b.target,
                }),
                (k, EdgeKind::Call) if k.is_unconditional() => Ok(EdgeShape::Call {
                    callee: b.target,
                    return_site: a.target,
                }),
                _ => Err(illegal()),
            },
            _ => Err(illegal()),
        }
    }

    /// Blocks reachable from `start`, as a bit set indexed by block id.
    /// RETURN edges are not followed; their targets are only known at run time.
    pub fn reachable_from(&self, start: BlockId) -> BitVec {
        let mut seen = bitvec![0; self.id_bound()];
        if !self.contains(start) {
            return seen;
        }
        let mut worklist = vec![start];
        seen.set(start.into(), true);

        while let Some(block) = worklist.pop() {
            for edge in self.outgoing(block) {
                let target: usize = edge.target.into();
                if edge.kind != EdgeKind::Return && !seen[target] {
                    seen.set(target, true);
                    worklist.push(edge.target);
                }
            }
        }
        seen
    }

    /// Drops every block `keep` rejects together with all edges touching it.
    /// Surviving blocks keep their ids.
    pub(crate) fn retain_blocks(&mut self, mut keep: impl FnMut(&BasicBlock<'a>) -> bool) -> Vec<BlockId> {
        let mut removed = Vec::new();
        self.blocks.retain(|b| {
            let keep = b.id == self.entry || keep(b);
            if !keep {
                removed.push(b.id);
            }
            keep
        });
        if !removed.is_empty() {
            self.edges
                .retain(|e| removed.binary_search(&e.source).is_err() && removed.binary_search(&e.target).is_err());
            for id in &removed {
                self.gosub_return_blocks.remove(id);
                self.landing_zones.remove(id);
            }
            self.recompute_adjacency();
        }
        removed
    }

    /// Points the edge at `index` to `target`. It becomes a back edge if it now replaces one.
    pub(crate) fn retarget_edge(&mut self, index: usize, target: BlockId, back: bool) {
        let edge = &mut self.edges[index];
        edge.target = target;
        edge.back |= back;
    }

    /// Removes every edge leaving `block`
    pub(crate) fn remove_outgoing(&mut self, block: BlockId) {
        self.edges.retain(|e| e.source != block);
    }

    /// Rebuilds every predecessor and successor set from the edge list
    pub(crate) fn recompute_adjacency(&mut self) {
        for block in &mut self.blocks {
            block.predecessors.clear();
            block.successors.clear();
        }
        for i in 0..self.edges.len() {
            let CfgEdge { source, target, .. } = self.edges[i];
            insert_sorted(&mut self[source].successors, target);
            insert_sorted(&mut self[target].predecessors, source);
        }
    }
}

impl<'a> std::ops::Index<BlockId> for ControlFlowGraph<'a> {
    type Output = BasicBlock<'a>;

    fn index(&self, id: BlockId) -> &Self::Output {
        match self.position(id) {
            Some(pos) => &self.blocks[pos],
            None => panic!("{id} is not part of {}", self.name),
        }
    }
}

impl<'a> std::ops::IndexMut<BlockId> for ControlFlowGraph<'a> {
    fn index_mut(&mut self, id: BlockId) -> &mut Self::Output {
        match self.position(id) {
            Some(pos) => &mut self.blocks[pos],
            None => panic!("{id} is not part of {}", self.name),
        }
    }
}

fn insert_sorted(set: &mut Vec<BlockId>, id: BlockId) {
    if let Err(pos) = set.binary_search(&id) {
        set.insert(pos, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> ControlFlowGraph<'static> {
        ControlFlowGraph::new("MAIN", UnitKind::Main)
    }

    #[test]
    fn adjacency_follows_edges() {
        let mut g = graph();
        let a = g.entry();
        let b = g.add_block(None);
        let c = g.add_block(None);
        g.add_edge(a, c, EdgeKind::ConditionalTrue);
        g.add_edge(a, b, EdgeKind::ConditionalFalse);
        g.add_edge(b, c, EdgeKind::Jump);

        assert_eq!(g[a].successors(), [b, c]);
        assert_eq!(g[c].predecessors(), [a, b]);
        assert_eq!(g.shape(a), Ok(EdgeShape::Branch { if_true: c, if_false: b }));
        assert_eq!(g.shape(b), Ok(EdgeShape::Goto(c)));
        assert_eq!(g.shape(c), Ok(EdgeShape::Terminal));
    }

    #[test]
    fn call_and_return_shapes() {
        let mut g = graph();
        let site = g.entry();
        let callee = g.add_block(None);
        let ret = g.add_block(None);
        g.add_edge(site, callee, EdgeKind::Call);
        g.add_edge(site, ret, EdgeKind::Fallthrough);
        g.add_edge(callee, callee, EdgeKind::Return);

        assert_eq!(g.shape(site), Ok(EdgeShape::Call { callee, return_site: ret }));
        assert_eq!(g.shape(callee), Ok(EdgeShape::Return));
    }

    #[test]
    fn exception_edges_do_not_change_the_shape() {
        let mut g = graph();
        let body = g.entry();
        let next = g.add_block(None);
        let handler = g.add_block(None);
        g.add_edge(body, next, EdgeKind::Jump);
        g.add_edge(body, handler, EdgeKind::Exception);
        assert_eq!(g.shape(body), Ok(EdgeShape::Goto(next)));
    }

    #[test]
    fn multiway_requires_ordered_cases_and_one_default() {
        let mut g = graph();
        let sel = g.entry();
        let one = g.add_block(None);
        let two = g.add_block(None);
        let join = g.add_block(None);
        g.add_labeled_edge(sel, one, EdgeKind::Jump, EdgeLabel::Case(0));
        g.add_labeled_edge(sel, two, EdgeKind::Jump, EdgeLabel::Case(1));
        g.add_labeled_edge(sel, join, EdgeKind::Jump, EdgeLabel::Default);
        assert_eq!(
            g.shape(sel),
            Ok(EdgeShape::Multiway {
                cases: vec![one, two],
                default: join
            })
        );

        let mut g2 = graph();
        let sel = g2.entry();
        let one = g2.add_block(None);
        g2.add_labeled_edge(sel, one, EdgeKind::Jump, EdgeLabel::Case(0));
        assert!(g2.shape(sel).is_err());
    }

    #[test]
    fn illegal_shapes_are_reported() {
        let mut g = graph();
        let a = g.entry();
        let b = g.add_block(None);
        g.add_edge(a, b, EdgeKind::Jump);
        g.add_edge(a, b, EdgeKind::Jump);
        let err = g.shape(a).unwrap_err();
        assert_eq!(err.to_string(), "bb0 has an illegal set of outgoing edges [Jump, Jump]");

        let mut g = graph();
        let a = g.entry();
        g.add_edge(a, a, EdgeKind::ConditionalTrue);
        assert!(g.shape(a).is_err());
    }

    #[test]
    fn retain_keeps_ids_and_entry() {
        let mut g = graph();
        let a = g.entry();
        let dead = g.add_block(None);
        let c = g.add_block(None);
        g.add_edge(a, c, EdgeKind::Jump);
        g.add_edge(dead, c, EdgeKind::Jump);

        let removed = g.retain_blocks(|b| b.id() != dead && b.id() != a);
        assert_eq!(removed, [dead]);
        assert!(g.contains(a));
        assert_eq!(g[c].predecessors(), [a]);
        assert_eq!(g.edges().len(), 1);
        assert_eq!(g.add_block(None), BlockId(3));
    }

    #[test]
    fn back_edges_are_marked() {
        let mut g = graph();
        let header = g.add_block(None);
        let body = g.add_block(None);
        g.mark_loop_header(header, Span::new(4, 20));
        g.add_edge(g.entry(), header, EdgeKind::Fallthrough);
        g.add_edge(header, body, EdgeKind::Fallthrough);
        g.add_back_edge(body, header, EdgeKind::Jump);

        let back: Vec<_> = g.edges().iter().filter(|e| e.back).map(|e| e.to_string()).collect();
        assert_eq!(back, ["bb2 -> bb1 [Jump back]"]);
        assert_eq!(g[header].loop_span(), Some(Span::new(4, 20)));
        assert_eq!(g.loop_headers().collect::<Vec<_>>(), [header]);
    }

    #[test]
    fn reachability_skips_return_edges() {
        let mut g = graph();
        let a = g.entry();
        let b = g.add_block(None);
        let c = g.add_block(None);
        g.add_edge(a, b, EdgeKind::Jump);
        g.add_edge(b, b, EdgeKind::Return);
        let seen = g.reachable_from(a);
        assert!(seen[usize::from(a)] && seen[usize::from(b)]);
        assert!(!seen[usize::from(c)]);
    }
}

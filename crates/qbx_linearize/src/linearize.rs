use std::fmt;

use qbx_cfg::graph::{BasicBlock, BlockId, BlockStmt, Condition, ControlFlowGraph, EdgeKind, EdgeShape, LoopId, UnitKind};
use qbx_middle::parser::expr::{CmpOp, Expr};
use qbx_middle::parser::statement::{ForLoop, SelectCase};
use qbx_middle::symbols::{InitValue, SymbolTable};
use qbx_middle::util::Counter;

use crate::error::{LinearizeError, Warning};
use crate::op::{Op, Operand, Place, Reg, RuntimeError};
use crate::options::LinearizeOptions;

/// The op stream of one routine
#[derive(Debug, Clone)]
pub struct LinearizedRoutine<'a> {
    pub name: String,
    pub unit: UnitKind,
    /// Emission order; every block of the graph, ascending by id
    pub order: Vec<BlockId>,
    pub ops: Vec<Op<'a>>,
    pub warnings: Vec<Warning>,
}

impl<'a> LinearizedRoutine<'a> {
    /// The ops of `block`, without its label
    pub fn block_ops(&self, block: BlockId) -> &[Op<'a>] {
        let Some(start) = self.ops.iter().position(|op| *op == Op::Label(block)) else {
            return &[];
        };
        let rest = &self.ops[start + 1..];
        let len = rest
            .iter()
            .position(|op| matches!(op, Op::Label(_)))
            .unwrap_or(rest.len());
        &rest[..len]
    }
}

impl fmt::Display for LinearizedRoutine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.unit, self.name)?;
        for op in &self.ops {
            match op {
                Op::Label(_) => writeln!(f, "{op}")?,
                _ => writeln!(f, "    {op}")?,
            }
        }
        Ok(())
    }
}

/// Lowers a finished graph into a linear op stream.
///
/// Every block is emitted, reachable or not: GOSUB and ON dispatch may land in blocks no static edge leads to.
pub fn linearize<'a>(
    cfg: &ControlFlowGraph<'a>,
    symbols: &'a SymbolTable,
    options: LinearizeOptions,
) -> Result<LinearizedRoutine<'a>, LinearizeError> {
    let span = qbx_log::routine_span("linearize", cfg.name());
    let _entered = span.enter();

    if let Some(&block) = cfg.gosub_return_blocks().iter().find(|&&b| !cfg.contains(b)) {
        return Err(LinearizeError::MissingReturnSite { block });
    }

    let mut emitter = Emitter {
        cfg,
        options,
        regs: Counter::new(),
        ops: Vec::new(),
        warnings: Vec::new(),
    };

    let reachable = cfg.reachable_from(cfg.entry());
    for block in cfg.blocks() {
        if !reachable[usize::from(block.id())] {
            qbx_log::warn!(routine = cfg.name(), block = %block.id(), "unreachable block");
            emitter.warnings.push(Warning::UnreachableBlock { block: block.id() });
        }
    }

    let order: Vec<BlockId> = cfg.blocks().iter().map(BasicBlock::id).collect();
    for block in cfg.blocks() {
        emitter.ops.push(Op::Label(block.id()));
        if block.id() == cfg.entry() {
            emitter.allocate_storage(symbols);
        }
        for stmt in block.statements() {
            emitter.lower_stmt(*stmt);
        }
        emitter.terminator(block);
    }

    Ok(LinearizedRoutine {
        name: cfg.name().to_owned(),
        unit: cfg.unit(),
        order,
        ops: emitter.ops,
        warnings: emitter.warnings,
    })
}

struct Emitter<'c, 'a> {
    cfg: &'c ControlFlowGraph<'a>,
    options: LinearizeOptions,
    regs: Counter,
    ops: Vec<Op<'a>>,
    warnings: Vec<Warning>,
}

impl<'c, 'a> Emitter<'c, 'a> {
    fn reg(&mut self) -> Reg {
        Reg(self.regs.inc())
    }

    fn eval(&mut self, expr: &'a Expr) -> Reg {
        let dst = self.reg();
        self.ops.push(Op::Eval { dst, expr });
        dst
    }

    fn load(&mut self, place: Place<'a>) -> Reg {
        let dst = self.reg();
        self.ops.push(Op::Load { dst, place });
        dst
    }

    fn compare(&mut self, op: CmpOp, lhs: Reg, rhs: Operand) -> Reg {
        let dst = self.reg();
        self.ops.push(Op::Compare { dst, op, lhs, rhs });
        dst
    }

    /// Storage of the routine's variables, the hidden FOR and FINALLY slots and the GOSUB return stack
    fn allocate_storage(&mut self, symbols: &'a SymbolTable) {
        let routine = match self.cfg.unit() {
            UnitKind::Main => None,
            UnitKind::Sub | UnitKind::Function => Some(self.cfg.name()),
        };
        for symbol in symbols.storage_of(routine) {
            self.ops.push(Op::Alloc {
                place: Place::Var(&symbol.name),
                init: symbol.init_value(),
            });
        }

        let mut loops: Vec<LoopId> = Vec::new();
        let mut finallys: Vec<BlockId> = Vec::new();
        for stmt in self.cfg.blocks().iter().flat_map(|b| b.statements()) {
            match stmt {
                BlockStmt::ForInit { loop_id, .. } => loops.push(*loop_id),
                BlockStmt::SetPending { finally, .. } => finallys.push(*finally),
                _ => {}
            }
        }
        loops.sort_unstable();
        loops.dedup();
        finallys.sort_unstable();
        finallys.dedup();

        for id in loops {
            self.ops.push(Op::Alloc {
                place: Place::LoopLimit(id),
                init: InitValue::Zero,
            });
            self.ops.push(Op::Alloc {
                place: Place::LoopStep(id),
                init: InitValue::Zero,
            });
        }

        for finally in finallys {
            self.ops.push(Op::Alloc {
                place: Place::Pending(finally),
                init: InitValue::Zero,
            });
        }

        let uses_return_stack = self
            .cfg
            .edges()
            .iter()
            .any(|e| matches!(e.kind, EdgeKind::Call | EdgeKind::Return));
        if uses_return_stack {
            self.ops.push(Op::AllocReturnStack {
                capacity: self.options.return_stack_capacity,
            });
            self.ops.push(Op::Alloc {
                place: Place::ReturnSp,
                init: InitValue::Zero,
            });
        }
    }

    fn lower_stmt(&mut self, stmt: BlockStmt<'a>) {
        match stmt {
            BlockStmt::Plain(stmt) => self.ops.push(Op::Statement(stmt)),
            BlockStmt::ForInit { loop_id, for_loop } => {
                // limit and step may read the induction variable, so nothing is stored until all three are known
                let start = self.eval(&for_loop.start);
                let limit = self.eval(&for_loop.limit);
                let step = match &for_loop.step {
                    Some(step) => self.eval(step),
                    None => {
                        let dst = self.reg();
                        self.ops.push(Op::Const { dst, value: 1 });
                        dst
                    }
                };

                for (place, src) in [
                    (Place::Var(&for_loop.var), start),
                    (Place::LoopLimit(loop_id), limit),
                    (Place::LoopStep(loop_id), step),
                ] {
                    self.ops.push(Op::Store {
                        place,
                        src: Operand::Reg(src),
                    });
                }
            }
            BlockStmt::ForIncrement { loop_id, for_loop } => {
                let var = Place::Var(&for_loop.var);
                let value = self.load(var);
                let step = self.load(Place::LoopStep(loop_id));
                let dst = self.reg();
                self.ops.push(Op::Add {
                    dst,
                    lhs: value,
                    rhs: Operand::Reg(step),
                });
                self.ops.push(Op::Store {
                    place: var,
                    src: Operand::Reg(dst),
                });
            }
            BlockStmt::PushHandler { handler } => self.ops.push(Op::PushHandler(handler)),
            BlockStmt::PopHandler => self.ops.push(Op::PopHandler),
            BlockStmt::CatchEnter { binding } => self.ops.push(Op::CatchEnter(binding)),
            BlockStmt::ResumePending => self.ops.push(Op::ResumePending),
            BlockStmt::SetPending { finally, case } => self.ops.push(Op::Store {
                place: Place::Pending(finally),
                src: Operand::Imm(case.map_or(0, |case| i64::from(case) + 1)),
            }),
        }
    }

    fn terminator(&mut self, block: &BasicBlock<'a>) {
        let id = block.id();
        let shape = match self.cfg.shape(id) {
            Ok(shape) => shape,
            Err(err) => return self.fallback(block, err.to_string()),
        };

        match (shape, block.condition()) {
            (EdgeShape::Terminal, _) => self.ops.push(Op::Exit),
            (EdgeShape::Goto(target), _) => self.ops.push(Op::Jump(target)),
            (EdgeShape::Branch { if_true, if_false }, Some(Condition::Expr(expr))) => {
                let cond = self.eval(expr);
                self.ops.push(Op::Branch {
                    cond,
                    if_true,
                    if_false,
                });
            }
            (EdgeShape::Branch { if_true, if_false }, Some(Condition::ForTest { loop_id, for_loop })) => {
                let cond = self.for_test(loop_id, for_loop);
                self.ops.push(Op::Branch {
                    cond,
                    if_true,
                    if_false,
                });
            }
            (EdgeShape::Call { callee, return_site }, _) => self.gosub(callee, return_site),
            (EdgeShape::Return, _) => self.dispatch_return(),
            (EdgeShape::Multiway { cases, default }, Some(Condition::OnIndex(selector))) => {
                let selector = self.eval(selector);
                self.index_dispatch(selector, &cases, default);
            }
            (EdgeShape::Multiway { cases, default }, Some(Condition::Pending(finally))) => {
                let pending = self.load(Place::Pending(finally));
                self.index_dispatch(pending, &cases, default);
            }
            (EdgeShape::Multiway { cases, default }, Some(Condition::Select(select)))
                if select.cases.len() == cases.len() =>
            {
                self.select_case(select, &cases, default)
            }
            (shape, condition) => {
                let reason = format!("{shape:?} cannot be emitted for condition {condition:?}");
                self.fallback(block, reason)
            }
        }
    }

    /// Falls back to the first outgoing edge
    fn fallback(&mut self, block: &BasicBlock<'a>, reason: String) {
        qbx_log::warn!(block = %block.id(), %reason, "unknown edge shape");
        self.warnings.push(Warning::UnknownEdgeShape {
            block: block.id(),
            reason,
        });

        match self.cfg.outgoing(block.id()).find(|e| e.kind != EdgeKind::Exception) {
            Some(edge) => self.ops.push(Op::Jump(edge.target)),
            None => self.ops.push(Op::Exit),
        }
    }

    /// Compares the induction variable against the stored limit. A literal or missing step fixes the direction at
    /// compile time; otherwise both directions are computed and the sign of the stored step picks one, so the test
    /// never branches on the step.
    fn for_test(&mut self, loop_id: LoopId, for_loop: &'a ForLoop) -> Reg {
        let value = self.load(Place::Var(&for_loop.var));
        let limit = self.load(Place::LoopLimit(loop_id));

        let constant_step = match &for_loop.step {
            None => Some(1),
            Some(step) => step.as_integer_literal(),
        };
        if let Some(step) = constant_step {
            let op = if step >= 0 { CmpOp::Le } else { CmpOp::Ge };
            return self.compare(op, value, Operand::Reg(limit));
        }

        let step = self.load(Place::LoopStep(loop_id));
        let up = self.compare(CmpOp::Le, value, Operand::Reg(limit));
        let down = self.compare(CmpOp::Ge, value, Operand::Reg(limit));
        let ascending = self.compare(CmpOp::Ge, step, Operand::Imm(0));

        let dst = self.reg();
        self.ops.push(Op::Select {
            dst,
            cond: ascending,
            if_true: up,
            if_false: down,
        });
        dst
    }

    /// Pushes the id of the return block and jumps to the subroutine
    fn gosub(&mut self, callee: BlockId, return_site: BlockId) {
        let sp = self.load(Place::ReturnSp);
        let full = self.compare(
            CmpOp::Ge,
            sp,
            Operand::Imm(i64::from(self.options.return_stack_capacity)),
        );
        self.ops.push(Op::TrapIf {
            cond: full,
            error: RuntimeError::ReturnStackOverflow,
        });
        self.ops.push(Op::Store {
            place: Place::ReturnSlot(sp),
            src: Operand::Imm(i64::from(return_site.0)),
        });

        let next = self.reg();
        self.ops.push(Op::Add {
            dst: next,
            lhs: sp,
            rhs: Operand::Imm(1),
        });
        self.ops.push(Op::Store {
            place: Place::ReturnSp,
            src: Operand::Reg(next),
        });
        self.ops.push(Op::Jump(callee));
    }

    /// Pops a return block id and compares it against every registered return site, in ascending order
    fn dispatch_return(&mut self) {
        let sp = self.load(Place::ReturnSp);
        let empty = self.compare(CmpOp::Le, sp, Operand::Imm(0));
        self.ops.push(Op::TrapIf {
            cond: empty,
            error: RuntimeError::ReturnWithoutGosub,
        });

        let top = self.reg();
        self.ops.push(Op::Sub {
            dst: top,
            lhs: sp,
            rhs: Operand::Imm(1),
        });
        self.ops.push(Op::Store {
            place: Place::ReturnSp,
            src: Operand::Reg(top),
        });
        let popped = self.load(Place::ReturnSlot(top));

        let cfg = self.cfg;
        for &site in cfg.gosub_return_blocks() {
            let cond = self.compare(CmpOp::Eq, popped, Operand::Imm(i64::from(site.0)));
            self.ops.push(Op::JumpIf { cond, target: site });
        }
        self.ops.push(Op::Trap(RuntimeError::DispatchMiss));
    }

    /// Jumps to `cases[i]` if `selector` holds `i + 1`, to `default` otherwise
    fn index_dispatch(&mut self, selector: Reg, cases: &[BlockId], default: BlockId) {
        for (index, &target) in cases.iter().enumerate() {
            let cond = self.compare(CmpOp::Eq, selector, Operand::Imm(index as i64 + 1));
            self.ops.push(Op::JumpIf { cond, target });
        }
        self.ops.push(Op::Jump(default));
    }

    /// Tests the arms in declaration order; the first matching pattern wins
    fn select_case(&mut self, select: &'a SelectCase, cases: &[BlockId], default: BlockId) {
        let selector = self.eval(&select.selector);
        for (arm, &target) in select.cases.iter().zip(cases) {
            for pattern in &arm.patterns {
                let dst = self.reg();
                self.ops.push(Op::MatchCase {
                    dst,
                    selector,
                    pattern,
                });
                self.ops.push(Op::JumpIf { cond: dst, target });
            }
        }
        self.ops.push(Op::Jump(default));
    }
}

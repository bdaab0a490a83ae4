//! Builds the graph of one routine in a single recursive walk over its statements.
//!
//! Every construct takes the block control arrives in and returns the block control leaves through.
//! Internal blocks and edges of a construct are wired before it returns, so loops get their back edge as soon
//! as their body is built.

use std::collections::BTreeMap;

use qbx_middle::parser::expr::Expr;
use qbx_middle::parser::statement::{
    ConditionKind, DoLoop, ExitKind, ForLoop, IfStatement, JumpTarget, LoopKind, OnJump, OnJumpKind, SelectCase,
    Statement, StatementKind, TestPosition, TryCatch, WhileLoop,
};
use qbx_middle::sourcemap::Span;
use qbx_middle::util::Counter;
use smallvec::SmallVec;

use crate::error::Error;
use crate::graph::{BlockId, BlockRole, BlockStmt, Condition, ControlFlowGraph, EdgeKind, EdgeLabel, LoopId, UnitKind};
use crate::options::BuildOptions;
use crate::passes::jump_targets::JumpTargets;

/// Where EXIT and CONTINUE of one loop kind go
#[derive(Debug, Clone, Copy)]
struct LoopTargets {
    exit: BlockId,
    continue_: BlockId,
    /// Number of exception handlers installed when the loop was entered
    try_depth: usize,
    /// Number of enclosing FINALLY blocks when the loop was entered
    finally_depth: usize,
}

/// Threaded by value through the recursive walk; a nested construct sees its own copy
#[derive(Debug, Clone, Copy)]
struct Context {
    routine_exit: BlockId,
    for_loop: Option<LoopTargets>,
    while_loop: Option<LoopTargets>,
    do_loop: Option<LoopTargets>,
    /// The innermost installed exception handler
    handler: Option<BlockId>,
    try_depth: usize,
    /// Number of TRY bodies and CATCH blocks with a FINALLY around this point; indexes [`CfgBuilder::finallys`]
    finally_depth: usize,
    depth: usize,
}

impl Context {
    fn loop_targets(&self, kind: LoopKind) -> Option<LoopTargets> {
        match kind {
            LoopKind::For => self.for_loop,
            LoopKind::While => self.while_loop,
            LoopKind::Do => self.do_loop,
        }
    }

    fn with_loop(self, kind: LoopKind, targets: LoopTargets) -> Self {
        let mut this = self;
        match kind {
            LoopKind::For => this.for_loop = Some(targets),
            LoopKind::While => this.while_loop = Some(targets),
            LoopKind::Do => this.do_loop = Some(targets),
        }
        this
    }

    fn with_handler(self, handler: BlockId) -> Self {
        Self {
            handler: Some(handler),
            try_depth: self.try_depth + 1,
            ..self
        }
    }

    fn inside_finally(self) -> Self {
        Self {
            finally_depth: self.finally_depth + 1,
            ..self
        }
    }

    /// EXIT SUB, EXIT FUNCTION and RETURN with a value leave every construct
    fn routine(&self) -> LoopTargets {
        LoopTargets {
            exit: self.routine_exit,
            continue_: self.routine_exit,
            try_depth: 0,
            finally_depth: 0,
        }
    }

    fn targets(&self, exit: BlockId, continue_: BlockId) -> LoopTargets {
        LoopTargets {
            exit,
            continue_,
            try_depth: self.try_depth,
            finally_depth: self.finally_depth,
        }
    }
}

/// A TRY with a FINALLY block whose body or CATCH is being built
#[derive(Debug)]
struct FinallyFrame {
    block: BlockId,
    /// Context of the TRY statement; the FINALLY block runs with its handlers
    outer: Context,
    /// `(where a non-local exit continues, block the FINALLY exit jumps to for it)`, indexed by dispatch case
    resumes: Vec<(BlockId, BlockId)>,
}

pub struct CfgBuilder<'a, 't> {
    cfg: ControlFlowGraph<'a>,
    targets: &'t JumpTargets,
    options: BuildOptions,
    /// Landing blocks by canonical position key, created on first use
    landing: BTreeMap<JumpTarget, BlockId>,
    /// `(block, handler)` pairs, turned into exception edges once the walk is done
    protected: Vec<(BlockId, BlockId)>,
    finallys: Vec<FinallyFrame>,
    loops: Counter,
}

impl<'a, 't> CfgBuilder<'a, 't> {
    pub fn new(name: &str, unit: UnitKind, targets: &'t JumpTargets, options: BuildOptions) -> Self {
        Self {
            cfg: ControlFlowGraph::new(name, unit),
            targets,
            options,
            landing: BTreeMap::new(),
            protected: Vec::new(),
            finallys: Vec::new(),
            loops: Counter::new(),
        }
    }

    /// Builds the whole routine. The graph still has to be verified.
    pub fn build(mut self, body: &'a [Statement]) -> Result<ControlFlowGraph<'a>, Error> {
        let entry = self.cfg.entry();
        let routine_exit = self.cfg.add_block(Some(BlockRole::RoutineExit));
        let ctx = Context {
            routine_exit,
            for_loop: None,
            while_loop: None,
            do_loop: None,
            handler: None,
            try_depth: 0,
            finally_depth: 0,
            depth: 0,
        };

        let last = self.build_body(entry, body, ctx)?;

        if self.cfg[routine_exit].predecessors().is_empty() {
            self.cfg.retain_blocks(|b| b.id() != routine_exit);
        } else {
            self.cfg.add_edge(last, routine_exit, EdgeKind::Fallthrough);
        }

        self.protected.sort_unstable();
        self.protected.dedup();
        for &(block, handler) in &self.protected {
            self.cfg.add_edge(block, handler, EdgeKind::Exception);
        }

        qbx_log::debug!(
            routine = self.cfg.name(),
            blocks = self.cfg.blocks().len(),
            edges = self.cfg.edges().len(),
            "built graph"
        );
        Ok(self.cfg)
    }

    fn new_block(&mut self, role: BlockRole, ctx: Context) -> BlockId {
        let id = self.cfg.add_block(Some(role));
        self.protect(id, ctx);
        id
    }

    fn protect(&mut self, block: BlockId, ctx: Context) {
        if let Some(handler) = ctx.handler {
            self.protected.push((block, handler));
        }
    }

    /// Code after an unconditional transfer. It has no predecessors unless a landing zone follows.
    fn after_jump(&mut self, ctx: Context) -> BlockId {
        self.new_block(BlockRole::AfterJump, ctx)
    }

    fn landing_block(&mut self, key: &JumpTarget) -> BlockId {
        if let Some(&block) = self.landing.get(key) {
            return block;
        }
        let block = self.cfg.add_block(Some(BlockRole::Landing));
        self.cfg.pin_landing_zone(block);
        self.landing.insert(key.clone(), block);
        qbx_log::trace!(%key, %block, "landing zone");
        block
    }

    fn resolve(&mut self, target: &JumpTarget, span: Span) -> Result<BlockId, Error> {
        match self.targets.resolve(target) {
            Some(key) => Ok(self.landing_block(key)),
            None => Err(Error::UnresolvedLabel {
                target: target.clone(),
                span,
            }),
        }
    }

    fn nested(&self, ctx: Context, span: Span) -> Result<Context, Error> {
        let depth = ctx.depth + 1;
        if depth > self.options.max_nesting_depth {
            return Err(Error::ConstructTooComplex {
                depth,
                limit: self.options.max_nesting_depth,
                span,
            });
        }
        qbx_log::trace!(depth, %span, "entering construct");
        Ok(Context { depth, ..ctx })
    }

    fn build_body(&mut self, incoming: BlockId, body: &'a [Statement], ctx: Context) -> Result<BlockId, Error> {
        let mut current = incoming;
        for (index, stmt) in body.iter().enumerate() {
            current = self.enter_statement(current, stmt, ctx);
            current = self.build_statement(current, stmt, body.get(index + 1), ctx)?;
        }
        Ok(current)
    }

    /// Splits the current block if `stmt` starts a landing zone
    fn enter_statement(&mut self, current: BlockId, stmt: &Statement, ctx: Context) -> BlockId {
        let Some(key) = stmt.position() else {
            return current;
        };
        if !self.targets.is_landing_zone(&key) {
            return current;
        }

        let landing = self.landing_block(&key);
        if landing != current {
            self.cfg.add_edge(current, landing, EdgeKind::Fallthrough);
        }
        self.protect(landing, ctx);
        landing
    }

    fn build_statement(
        &mut self,
        current: BlockId,
        stmt: &'a Statement,
        next: Option<&'a Statement>,
        ctx: Context,
    ) -> Result<BlockId, Error> {
        match &stmt.kind {
            StatementKind::Let { .. }
            | StatementKind::Print(_)
            | StatementKind::Call { .. }
            | StatementKind::Dim(_)
            | StatementKind::Restore(_)
            | StatementKind::Rem => {
                self.cfg.push_stmt(current, BlockStmt::Plain(stmt));
                Ok(current)
            }
            StatementKind::End => {
                self.cfg.push_stmt(current, BlockStmt::Plain(stmt));
                Ok(self.after_jump(ctx))
            }
            StatementKind::If(i) => self.build_if(current, stmt, i, ctx),
            StatementKind::Select(s) => self.build_select(current, stmt, s, ctx),
            StatementKind::For(l) => self.build_for(current, stmt, l, ctx),
            StatementKind::While(l) => self.build_while(current, stmt, l, ctx),
            StatementKind::Do(l) => self.build_do(current, stmt, l, ctx),
            StatementKind::Try(t) => self.build_try(current, stmt, t, ctx),
            StatementKind::Goto(target) => {
                let target = self.resolve(target, stmt.span)?;
                self.cfg.add_edge(current, target, EdgeKind::Jump);
                Ok(self.after_jump(ctx))
            }
            StatementKind::Gosub(target) => {
                let callee = self.resolve(target, stmt.span)?;
                let return_site = self.return_block(next, ctx);
                self.cfg.add_edge(current, callee, EdgeKind::Call);
                self.cfg.add_edge(current, return_site, EdgeKind::Fallthrough);
                Ok(return_site)
            }
            StatementKind::On(on) => self.build_on(current, stmt, on, next, ctx),
            StatementKind::Return(None) => {
                // resolved at run time against the registered return sites
                self.cfg.add_edge(current, current, EdgeKind::Return);
                Ok(self.after_jump(ctx))
            }
            StatementKind::Return(Some(_)) => {
                if self.cfg.unit() != UnitKind::Function {
                    return Err(Error::structural("RETURN with a value outside of a FUNCTION", stmt.span));
                }
                self.cfg.push_stmt(current, BlockStmt::Plain(stmt));
                let target = ctx.routine();
                self.leave(current, target.exit, target, stmt.span, ctx)?;
                Ok(self.after_jump(ctx))
            }
            StatementKind::Exit(kind) => {
                let target = self.exit_target(*kind, stmt.span, ctx)?;
                self.leave(current, target.exit, target, stmt.span, ctx)?;
                Ok(self.after_jump(ctx))
            }
            StatementKind::Continue(kind) => {
                let Some(target) = ctx.loop_targets(*kind) else {
                    return Err(Error::structural(format!("CONTINUE {kind} outside of a {kind} loop"), stmt.span));
                };
                self.leave(current, target.continue_, target, stmt.span, ctx)?;
                Ok(self.after_jump(ctx))
            }
        }
    }

    fn exit_target(&self, kind: ExitKind, span: Span, ctx: Context) -> Result<LoopTargets, Error> {
        let routine = ctx.routine();
        match (kind, self.cfg.unit()) {
            (ExitKind::Loop(l), _) => ctx
                .loop_targets(l)
                .ok_or_else(|| Error::structural(format!("EXIT {l} outside of a {l} loop"), span)),
            (ExitKind::Sub, UnitKind::Sub) | (ExitKind::Function, UnitKind::Function) => Ok(routine),
            (kind, unit) => Err(Error::structural(format!("EXIT {kind} inside {unit}"), span)),
        }
    }

    fn pop_handlers(&mut self, block: BlockId, from: usize, to: usize) {
        for _ in to..from {
            self.cfg.push_stmt(block, BlockStmt::PopHandler);
        }
    }

    /// Transfers control from `current` to `dest`, which belongs to the construct `target` describes.
    ///
    /// Every FINALLY block between the two runs once, innermost first. Each one is told where to continue
    /// through its pending slot, so its body is never duplicated.
    fn leave(
        &mut self,
        current: BlockId,
        dest: BlockId,
        target: LoopTargets,
        span: Span,
        ctx: Context,
    ) -> Result<(), Error> {
        let mut next = dest;
        let mut next_depth = target.try_depth;
        for index in target.finally_depth..ctx.finally_depth {
            let case = self.resume_case(index, next, next_depth, span)?;
            let frame = &self.finallys[index];
            let (finally, outer_depth) = (frame.block, frame.outer.try_depth);
            self.cfg.push_stmt(
                current,
                BlockStmt::SetPending {
                    finally,
                    case: Some(case),
                },
            );
            next = finally;
            next_depth = outer_depth;
        }

        self.pop_handlers(current, ctx.try_depth, next_depth);
        self.cfg.add_edge(current, next, EdgeKind::Jump);
        Ok(())
    }

    /// The dispatch case of FINALLY frame `index` that continues at `next`, added on first use.
    /// `next` expects `next_depth` handlers; the ones installed in between are popped on the way.
    fn resume_case(&mut self, index: usize, next: BlockId, next_depth: usize, span: Span) -> Result<u32, Error> {
        let outer = self.finallys[index].outer;
        let known = self.finallys[index].resumes.iter().position(|&(to, _)| to == next);
        let position = match known {
            Some(position) => position,
            None => {
                let resume = if outer.try_depth > next_depth {
                    let block = self.new_block(BlockRole::FinallyResume, outer);
                    self.pop_handlers(block, outer.try_depth, next_depth);
                    self.cfg.add_edge(block, next, EdgeKind::Jump);
                    block
                } else {
                    next
                };
                let resumes = &mut self.finallys[index].resumes;
                resumes.push((next, resume));
                resumes.len() - 1
            }
        };
        case_index(position, span)
    }

    /// The block RETURN lands in for a call site followed by `next`, registered as a return site
    fn return_block(&mut self, next: Option<&Statement>, ctx: Context) -> BlockId {
        let block = match next.and_then(Statement::position) {
            Some(key) if self.targets.is_return_site(&key) => self.landing_block(&key),
            _ => self.new_block(BlockRole::GosubReturn, ctx),
        };
        self.cfg.register_gosub_return(block);
        block
    }

    fn build_if(
        &mut self,
        current: BlockId,
        stmt: &Statement,
        i: &'a IfStatement,
        ctx: Context,
    ) -> Result<BlockId, Error> {
        let ctx = self.nested(ctx, stmt.span)?;
        // edges into the join block, wired once it exists
        let mut to_join: SmallVec<[(BlockId, EdgeKind); 4]> = SmallVec::new();

        let mut cond = current;
        self.build_if_arm(cond, &i.condition, &i.then, &mut to_join, ctx)?;

        for (condition, body) in &i.else_ifs {
            let next = self.new_block(BlockRole::IfElse, ctx);
            self.cfg.add_edge(cond, next, EdgeKind::ConditionalFalse);
            cond = next;
            self.build_if_arm(cond, condition, body, &mut to_join, ctx)?;
        }

        match i.el.as_deref() {
            Some(body) if !body.is_empty() => {
                let el = self.new_block(BlockRole::IfElse, ctx);
                self.cfg.add_edge(cond, el, EdgeKind::ConditionalFalse);
                let exit = self.build_body(el, body, ctx)?;
                to_join.push((exit, EdgeKind::Jump));
            }
            _ => to_join.push((cond, EdgeKind::ConditionalFalse)),
        }

        let join = self.new_block(BlockRole::IfJoin, ctx);
        for (block, kind) in to_join {
            self.cfg.add_edge(block, join, kind);
        }
        Ok(join)
    }

    fn build_if_arm(
        &mut self,
        cond: BlockId,
        condition: &'a Expr,
        body: &'a [Statement],
        to_join: &mut SmallVec<[(BlockId, EdgeKind); 4]>,
        ctx: Context,
    ) -> Result<(), Error> {
        self.cfg.set_condition(cond, Condition::Expr(condition));
        if body.is_empty() {
            to_join.push((cond, EdgeKind::ConditionalTrue));
        } else {
            let then = self.new_block(BlockRole::IfThen, ctx);
            self.cfg.add_edge(cond, then, EdgeKind::ConditionalTrue);
            let exit = self.build_body(then, body, ctx)?;
            to_join.push((exit, EdgeKind::Jump));
        }
        Ok(())
    }

    fn build_select(
        &mut self,
        current: BlockId,
        stmt: &Statement,
        s: &'a SelectCase,
        ctx: Context,
    ) -> Result<BlockId, Error> {
        let ctx = self.nested(ctx, stmt.span)?;
        self.cfg.set_condition(current, Condition::Select(s));

        let mut exits = Vec::with_capacity(s.cases.len() + 1);
        for (index, arm) in s.cases.iter().enumerate() {
            let body = self.new_block(BlockRole::CaseBody, ctx);
            self.cfg
                .add_labeled_edge(current, body, EdgeKind::Jump, EdgeLabel::Case(case_index(index, stmt.span)?));
            exits.push(self.build_body(body, &arm.body, ctx)?);
        }

        let default = match &s.default {
            Some(body) => {
                let el = self.new_block(BlockRole::CaseElse, ctx);
                self.cfg.add_labeled_edge(current, el, EdgeKind::Jump, EdgeLabel::Default);
                exits.push(self.build_body(el, body, ctx)?);
                true
            }
            None => false,
        };

        let join = self.new_block(BlockRole::SelectJoin, ctx);
        for exit in exits {
            self.cfg.add_edge(exit, join, EdgeKind::Jump);
        }
        if !default {
            self.cfg.add_labeled_edge(current, join, EdgeKind::Jump, EdgeLabel::Default);
        }
        Ok(join)
    }

    fn build_for(&mut self, current: BlockId, stmt: &Statement, l: &'a ForLoop, ctx: Context) -> Result<BlockId, Error> {
        let ctx = self.nested(ctx, stmt.span)?;
        let loop_id = LoopId(self.loops.inc());

        let init = self.new_block(BlockRole::ForInit, ctx);
        let header = self.new_block(BlockRole::ForHeader, ctx);
        let body = self.new_block(BlockRole::ForBody, ctx);
        let increment = self.new_block(BlockRole::ForIncrement, ctx);
        let exit = self.new_block(BlockRole::ForExit, ctx);

        self.cfg
            .push_stmt(init, BlockStmt::ForInit { loop_id, for_loop: l });
        self.cfg.mark_loop_header(header, stmt.span);
        self.cfg.set_condition(header, Condition::ForTest { loop_id, for_loop: l });
        self.cfg
            .push_stmt(increment, BlockStmt::ForIncrement { loop_id, for_loop: l });

        self.cfg.add_edge(current, init, EdgeKind::Fallthrough);
        self.cfg.add_edge(init, header, EdgeKind::Fallthrough);
        self.cfg.add_edge(header, body, EdgeKind::ConditionalTrue);
        self.cfg.add_edge(header, exit, EdgeKind::ConditionalFalse);

        let body_ctx = ctx.with_loop(LoopKind::For, ctx.targets(exit, increment));
        let body_exit = self.build_body(body, &l.body, body_ctx)?;
        self.cfg.add_edge(body_exit, increment, EdgeKind::Fallthrough);
        self.cfg.add_back_edge(increment, header, EdgeKind::Jump);

        Ok(exit)
    }

    fn build_while(
        &mut self,
        current: BlockId,
        stmt: &Statement,
        l: &'a WhileLoop,
        ctx: Context,
    ) -> Result<BlockId, Error> {
        let ctx = self.nested(ctx, stmt.span)?;
        self.build_pre_test(current, stmt.span, LoopKind::While, ConditionKind::While, &l.condition, &l.body, ctx)
    }

    fn build_do(&mut self, current: BlockId, stmt: &Statement, l: &'a DoLoop, ctx: Context) -> Result<BlockId, Error> {
        let ctx = self.nested(ctx, stmt.span)?;
        match &l.condition {
            Some(c) if c.position == TestPosition::Pre => {
                self.build_pre_test(current, stmt.span, LoopKind::Do, c.kind, &c.expr, &l.body, ctx)
            }
            Some(c) => self.build_post_test(current, stmt.span, c.kind, &c.expr, &l.body, ctx),
            None => {
                let header = self.new_block(BlockRole::LoopHeader, ctx);
                let exit = self.new_block(BlockRole::LoopExit, ctx);
                self.cfg.mark_loop_header(header, stmt.span);
                self.cfg.add_edge(current, header, EdgeKind::Fallthrough);

                let body_ctx = ctx.with_loop(LoopKind::Do, ctx.targets(exit, header));
                let body_exit = self.build_body(header, &l.body, body_ctx)?;
                self.cfg.add_back_edge(body_exit, header, EdgeKind::Jump);
                Ok(exit)
            }
        }
    }

    /// WHILE..WEND and DO WHILE/UNTIL..LOOP. UNTIL swaps which edge enters the body.
    #[allow(clippy::too_many_arguments)]
    fn build_pre_test(
        &mut self,
        current: BlockId,
        span: Span,
        kind: LoopKind,
        condition_kind: ConditionKind,
        condition: &'a Expr,
        body: &'a [Statement],
        ctx: Context,
    ) -> Result<BlockId, Error> {
        let header = self.new_block(BlockRole::LoopHeader, ctx);
        let body_block = self.new_block(BlockRole::LoopBody, ctx);
        let exit = self.new_block(BlockRole::LoopExit, ctx);

        self.cfg.mark_loop_header(header, span);
        self.cfg.set_condition(header, Condition::Expr(condition));
        self.cfg.add_edge(current, header, EdgeKind::Fallthrough);

        let (enter, leave) = condition_edges(condition_kind);
        self.cfg.add_edge(header, body_block, enter);
        self.cfg.add_edge(header, exit, leave);

        let body_ctx = ctx.with_loop(kind, ctx.targets(exit, header));
        let body_exit = self.build_body(body_block, body, body_ctx)?;
        self.cfg.add_back_edge(body_exit, header, EdgeKind::Jump);
        Ok(exit)
    }

    /// DO..LOOP WHILE/UNTIL: the body is the loop header, the test block holds the back edge
    fn build_post_test(
        &mut self,
        current: BlockId,
        span: Span,
        condition_kind: ConditionKind,
        condition: &'a Expr,
        body: &'a [Statement],
        ctx: Context,
    ) -> Result<BlockId, Error> {
        let header = self.new_block(BlockRole::LoopBody, ctx);
        let test = self.new_block(BlockRole::LoopTest, ctx);
        let exit = self.new_block(BlockRole::LoopExit, ctx);

        self.cfg.mark_loop_header(header, span);
        self.cfg.add_edge(current, header, EdgeKind::Fallthrough);

        let body_ctx = ctx.with_loop(LoopKind::Do, ctx.targets(exit, test));
        let body_exit = self.build_body(header, body, body_ctx)?;
        self.cfg.add_edge(body_exit, test, EdgeKind::Fallthrough);

        self.cfg.set_condition(test, Condition::Expr(condition));
        let (repeat, leave) = condition_edges(condition_kind);
        self.cfg.add_back_edge(test, header, repeat);
        self.cfg.add_edge(test, exit, leave);
        Ok(exit)
    }

    fn build_try(&mut self, current: BlockId, stmt: &Statement, t: &'a TryCatch, ctx: Context) -> Result<BlockId, Error> {
        let ctx = self.nested(ctx, stmt.span)?;

        // handler blocks are protected by whatever is installed when they run, not by the enclosing handler
        let try_entry = self.cfg.add_block(Some(BlockRole::TryEntry));
        let catch_entry = t.catch.as_ref().map(|_| self.cfg.add_block(Some(BlockRole::Catch)));
        let finally_entry = t.finally.as_ref().map(|_| self.cfg.add_block(Some(BlockRole::Finally)));
        let join = self.new_block(BlockRole::TryJoin, ctx);

        let Some(handler) = catch_entry.or(finally_entry) else {
            return Err(Error::structural("TRY without CATCH or FINALLY", stmt.span));
        };
        // where the normal paths out of the body and CATCH go
        let after = finally_entry.unwrap_or(join);
        // exits out of the body and CATCH are routed through FINALLY
        let scope = |inner: Context| match finally_entry {
            Some(_) => inner.inside_finally(),
            None => inner,
        };
        if let Some(block) = finally_entry {
            self.finallys.push(FinallyFrame {
                block,
                outer: ctx,
                resumes: Vec::new(),
            });
        }

        self.cfg.add_edge(current, try_entry, EdgeKind::Fallthrough);

        let body_ctx = scope(ctx.with_handler(handler));
        self.cfg.push_stmt(try_entry, BlockStmt::PushHandler { handler });
        self.protect(try_entry, body_ctx);
        let body_exit = self.build_body(try_entry, &t.body, body_ctx)?;
        self.cfg.push_stmt(body_exit, BlockStmt::PopHandler);
        self.cfg.add_edge(body_exit, after, EdgeKind::Jump);
        let mut normal_exits: SmallVec<[BlockId; 2]> = SmallVec::new();
        normal_exits.push(body_exit);

        if let (Some(catch), Some(entry)) = (&t.catch, catch_entry) {
            self.cfg.push_stmt(
                entry,
                BlockStmt::CatchEnter {
                    binding: catch.binding.as_deref(),
                },
            );
            let catch_ctx = match finally_entry {
                Some(finally) => {
                    self.cfg.push_stmt(entry, BlockStmt::PushHandler { handler: finally });
                    scope(ctx.with_handler(finally))
                }
                None => ctx,
            };
            self.protect(entry, catch_ctx);
            let exit = self.build_body(entry, &catch.body, catch_ctx)?;
            if finally_entry.is_some() {
                self.cfg.push_stmt(exit, BlockStmt::PopHandler);
            }
            self.cfg.add_edge(exit, after, EdgeKind::Jump);
            normal_exits.push(exit);
        }

        if let (Some(finally), Some(entry)) = (&t.finally, finally_entry) {
            let resumes = match self.finallys.pop() {
                Some(frame) => frame.resumes,
                None => Vec::new(),
            };
            self.protect(entry, ctx);
            let exit = self.build_body(entry, finally, ctx)?;
            self.cfg.push_stmt(exit, BlockStmt::ResumePending);

            if resumes.is_empty() {
                self.cfg.add_edge(exit, join, EdgeKind::Jump);
            } else {
                qbx_log::trace!(finally = %entry, exits = resumes.len(), "FINALLY resumes non-local exits");
                // a normal completion must not pick up a case stored on an earlier pass
                for block in normal_exits {
                    self.cfg.push_stmt(
                        block,
                        BlockStmt::SetPending {
                            finally: entry,
                            case: None,
                        },
                    );
                }
                self.cfg.set_condition(exit, Condition::Pending(entry));
                for (index, &(_, resume)) in resumes.iter().enumerate() {
                    let label = EdgeLabel::Case(case_index(index, stmt.span)?);
                    self.cfg.add_labeled_edge(exit, resume, EdgeKind::Jump, label);
                }
                self.cfg.add_labeled_edge(exit, join, EdgeKind::Jump, EdgeLabel::Default);
            }
        }

        Ok(join)
    }

    fn build_on(
        &mut self,
        current: BlockId,
        stmt: &Statement,
        on: &'a OnJump,
        next: Option<&'a Statement>,
        ctx: Context,
    ) -> Result<BlockId, Error> {
        self.cfg.set_condition(current, Condition::OnIndex(&on.selector));

        match on.kind {
            OnJumpKind::Goto => {
                for (index, target) in on.targets.iter().enumerate() {
                    let target = self.resolve(target, stmt.span)?;
                    let label = EdgeLabel::Case(case_index(index, stmt.span)?);
                    self.cfg.add_labeled_edge(current, target, EdgeKind::Jump, label);
                }
                // out-of-range selectors continue with the next statement
                let continuation = self.cfg.add_block(None);
                self.protect(continuation, ctx);
                self.cfg
                    .add_labeled_edge(current, continuation, EdgeKind::Jump, EdgeLabel::Default);
                Ok(continuation)
            }
            OnJumpKind::Gosub => {
                let return_site = self.return_block(next, ctx);
                for (index, target) in on.targets.iter().enumerate() {
                    let callee = self.resolve(target, stmt.span)?;
                    let stub = self.new_block(BlockRole::CallStub, ctx);
                    let label = EdgeLabel::Case(case_index(index, stmt.span)?);
                    self.cfg.add_labeled_edge(current, stub, EdgeKind::Jump, label);
                    self.cfg.add_edge(stub, callee, EdgeKind::Call);
                    self.cfg.add_edge(stub, return_site, EdgeKind::Jump);
                }
                self.cfg
                    .add_labeled_edge(current, return_site, EdgeKind::Jump, EdgeLabel::Default);
                Ok(return_site)
            }
        }
    }
}

/// `(edge taken while the loop keeps running, edge that leaves it)`
fn condition_edges(kind: ConditionKind) -> (EdgeKind, EdgeKind) {
    match kind {
        ConditionKind::While => (EdgeKind::ConditionalTrue, EdgeKind::ConditionalFalse),
        ConditionKind::Until => (EdgeKind::ConditionalFalse, EdgeKind::ConditionalTrue),
    }
}

fn case_index(index: usize, span: Span) -> Result<u32, Error> {
    u32::try_from(index).map_err(|_| Error::ConstructTooComplex {
        depth: index,
        limit: u32::MAX as usize,
        span,
    })
}

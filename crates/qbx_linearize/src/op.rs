//! The abstract operations a routine is lowered to.
//!
//! Ops work on numbered pseudo registers. Statements are passed through untouched, translating them is up to the
//! statement emitter of the backend.

use std::fmt;

use qbx_cfg::graph::{BlockId, LoopId};
use qbx_middle::index_type;
use qbx_middle::parser::expr::{CmpOp, Expr};
use qbx_middle::parser::statement::{CasePattern, Statement};
use qbx_middle::symbols::InitValue;
use thiserror::Error;

index_type!(Reg u32, "%");

/// A memory slot owned by the routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place<'a> {
    Var(&'a str),
    /// The limit of a FOR loop, stored once when the loop is entered
    LoopLimit(LoopId),
    /// The step of a FOR loop, stored once when the loop is entered
    LoopStep(LoopId),
    /// Number of pending GOSUB returns
    ReturnSp,
    /// An element of the GOSUB return stack
    ReturnSlot(Reg),
    /// Where a FINALLY block continues: 0 for its join, `i + 1` for exit dispatch case `i`
    Pending(BlockId),
}

impl fmt::Display for Place<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => f.write_str(name),
            Self::LoopLimit(id) => write!(f, "{id}.limit"),
            Self::LoopStep(id) => write!(f, "{id}.step"),
            Self::ReturnSp => f.write_str("retsp"),
            Self::ReturnSlot(index) => write!(f, "retstack[{index}]"),
            Self::Pending(finally) => write!(f, "{finally}.pending"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reg(reg) => write!(f, "{reg}"),
            Self::Imm(value) => write!(f, "{value}"),
        }
    }
}

/// Errors raised by the generated program while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("RETURN to an address that no GOSUB pushed")]
    DispatchMiss,
    #[error("too many nested GOSUBs")]
    ReturnStackOverflow,
    #[error("RETURN without GOSUB")]
    ReturnWithoutGosub,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op<'a> {
    Label(BlockId),
    /// Allocates and initializes a slot; only emitted in the entry block
    Alloc { place: Place<'a>, init: InitValue },
    AllocReturnStack { capacity: u32 },
    /// A statement for the statement emitter
    Statement(&'a Statement),
    Eval { dst: Reg, expr: &'a Expr },
    Const { dst: Reg, value: i64 },
    Load { dst: Reg, place: Place<'a> },
    Store { place: Place<'a>, src: Operand },
    Compare { dst: Reg, op: CmpOp, lhs: Reg, rhs: Operand },
    Add { dst: Reg, lhs: Reg, rhs: Operand },
    Sub { dst: Reg, lhs: Reg, rhs: Operand },
    /// `dst = cond ? if_true : if_false`, without branching
    Select { dst: Reg, cond: Reg, if_true: Reg, if_false: Reg },
    /// Tests a SELECT CASE selector against one pattern
    MatchCase { dst: Reg, selector: Reg, pattern: &'a CasePattern },
    Jump(BlockId),
    Branch { cond: Reg, if_true: BlockId, if_false: BlockId },
    /// Jumps if `cond` holds, otherwise continues with the next op
    JumpIf { cond: Reg, target: BlockId },
    TrapIf { cond: Reg, error: RuntimeError },
    Trap(RuntimeError),
    PushHandler(BlockId),
    PopHandler,
    CatchEnter(Option<&'a str>),
    ResumePending,
    /// Leaves the routine
    Exit,
}

impl Op<'_> {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Jump(_) | Self::Branch { .. } | Self::Trap(_) | Self::Exit)
    }
}

impl fmt::Display for Op<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(block) => write!(f, "{block}:"),
            Self::Alloc { place, init } => write!(f, "alloc {place} = {init}"),
            Self::AllocReturnStack { capacity } => write!(f, "alloc retstack[{capacity}]"),
            Self::Statement(stmt) => write!(f, "stmt {stmt}"),
            Self::Eval { dst, expr } => write!(f, "{dst} = eval {expr}"),
            Self::Const { dst, value } => write!(f, "{dst} = {value}"),
            Self::Load { dst, place } => write!(f, "{dst} = load {place}"),
            Self::Store { place, src } => write!(f, "store {place}, {src}"),
            Self::Compare { dst, op, lhs, rhs } => write!(f, "{dst} = {lhs} {op} {rhs}"),
            Self::Add { dst, lhs, rhs } => write!(f, "{dst} = add {lhs}, {rhs}"),
            Self::Sub { dst, lhs, rhs } => write!(f, "{dst} = sub {lhs}, {rhs}"),
            Self::Select {
                dst,
                cond,
                if_true,
                if_false,
            } => write!(f, "{dst} = select {cond}, {if_true}, {if_false}"),
            Self::MatchCase { dst, selector, pattern } => write!(f, "{dst} = match {selector}, {pattern}"),
            Self::Jump(target) => write!(f, "jmp {target}"),
            Self::Branch {
                cond,
                if_true,
                if_false,
            } => write!(f, "br {cond}, {if_true}, {if_false}"),
            Self::JumpIf { cond, target } => write!(f, "jmpif {cond}, {target}"),
            Self::TrapIf { cond, error } => write!(f, "trapif {cond}, {error:?}"),
            Self::Trap(error) => write!(f, "trap {error:?}"),
            Self::PushHandler(handler) => write!(f, "pushhandler {handler}"),
            Self::PopHandler => f.write_str("pophandler"),
            Self::CatchEnter(Some(binding)) => write!(f, "catch {binding}"),
            Self::CatchEnter(None) => f.write_str("catch"),
            Self::ResumePending => f.write_str("resume"),
            Self::Exit => f.write_str("exit"),
        }
    }
}

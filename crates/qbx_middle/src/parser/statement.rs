use std::fmt;

use derive_more::Display;
use strum_macros::{Display as StrumDisplay, IntoStaticStr};

use super::expr::{CmpOp, Expr};
use crate::sourcemap::Span;
use crate::util::fmt_group;

/// A BASIC line number, i.e. the `100` in `100 PRINT "sub"`
pub type LineNumber = u32;

/// A position that can be named by GOTO, GOSUB, ON..GOTO and RESTORE
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum JumpTarget {
    #[display("{_0}")]
    Line(LineNumber),
    #[display("{_0}")]
    Label(String),
}

impl From<LineNumber> for JumpTarget {
    fn from(line: LineNumber) -> Self {
        Self::Line(line)
    }
}

impl From<&str> for JumpTarget {
    fn from(label: &str) -> Self {
        Self::Label(label.into())
    }
}

/// A whole compilation unit: the main program followed by its SUBs and FUNCTIONs
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub main: Vec<Statement>,
    pub routines: Vec<Routine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, IntoStaticStr)]
pub enum RoutineKind {
    #[strum(serialize = "SUB")]
    Sub,
    #[strum(serialize = "FUNCTION")]
    Function,
}

#[derive(Debug, Clone)]
pub struct Routine {
    pub name: String,
    pub kind: RoutineKind,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

impl Routine {
    pub fn new(name: impl Into<String>, kind: RoutineKind, params: Vec<String>, body: Vec<Statement>) -> Self {
        Self {
            name: name.into(),
            kind,
            params,
            body,
            span: Span::COMPILER_GENERATED,
        }
    }
}

/// A BASIC statement
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `LET target = value`, with or without the keyword
    Let { target: Expr, value: Expr },
    /// `PRINT a; b`
    Print(Vec<Expr>),
    /// `CALL name(args)` or a bare SUB invocation
    Call { name: String, args: Vec<Expr> },
    /// `DIM` of the given names; storage is allocated at routine entry, this only (re)initializes
    Dim(Vec<String>),
    /// `RESTORE [target]`, moves the DATA pointer
    Restore(Option<JumpTarget>),
    /// `REM` or an empty line that only carries a line number or label
    Rem,
    /// `END`, terminates the program
    End,
    If(IfStatement),
    Select(SelectCase),
    For(ForLoop),
    While(WhileLoop),
    Do(DoLoop),
    Try(TryCatch),
    Goto(JumpTarget),
    Gosub(JumpTarget),
    /// `ON x GOTO a, b, c` / `ON x GOSUB a, b, c`
    On(OnJump),
    /// Bare `RETURN` returns from a GOSUB; `RETURN expr` returns a value from a FUNCTION
    Return(Option<Expr>),
    Exit(ExitKind),
    Continue(LoopKind),
}

/// The kind of loop an `EXIT` or `CONTINUE` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, IntoStaticStr)]
pub enum LoopKind {
    #[strum(serialize = "FOR")]
    For,
    #[strum(serialize = "WHILE")]
    While,
    #[strum(serialize = "DO")]
    Do,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExitKind {
    #[display("{_0}")]
    Loop(LoopKind),
    #[display("SUB")]
    Sub,
    #[display("FUNCTION")]
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Expr,
    pub then: Vec<Statement>,
    /// `ELSEIF` arms in source order
    pub else_ifs: Vec<(Expr, Vec<Statement>)>,
    pub el: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CasePattern {
    /// `CASE 3`
    Value(Expr),
    /// `CASE 1 TO 5`
    Range(Expr, Expr),
    /// `CASE IS > 10`
    Is(CmpOp, Expr),
}

impl fmt::Display for CasePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(e) => write!(f, "{e}"),
            Self::Range(lo, hi) => write!(f, "{lo} TO {hi}"),
            Self::Is(op, e) => write!(f, "IS {op} {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    /// Alternatives; the arm matches if any of them does
    pub patterns: Vec<CasePattern>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectCase {
    pub selector: Expr,
    /// Arms in declaration order; the first match wins
    pub cases: Vec<CaseArm>,
    /// `CASE ELSE`
    pub default: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    /// The induction variable
    pub var: String,
    pub start: Expr,
    pub limit: Expr,
    /// `STEP`, defaults to 1
    pub step: Option<Expr>,
    pub body: Vec<Statement>,
}

/// `WHILE cond ... WEND`
#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub condition: Expr,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum ConditionKind {
    #[strum(serialize = "WHILE")]
    While,
    #[strum(serialize = "UNTIL")]
    Until,
}

/// Where the condition of a `DO` loop is tested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPosition {
    /// `DO WHILE cond ... LOOP`
    Pre,
    /// `DO ... LOOP WHILE cond`
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopCondition {
    pub kind: ConditionKind,
    pub position: TestPosition,
    pub expr: Expr,
}

/// `DO [cond] ... LOOP [cond]`; without a condition the loop only ends through `EXIT DO`
#[derive(Debug, Clone, PartialEq)]
pub struct DoLoop {
    pub condition: Option<LoopCondition>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// The variable that receives the error, if any
    pub binding: Option<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryCatch {
    pub body: Vec<Statement>,
    pub catch: Option<CatchClause>,
    pub finally: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum OnJumpKind {
    #[strum(serialize = "GOTO")]
    Goto,
    #[strum(serialize = "GOSUB")]
    Gosub,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnJump {
    pub selector: Expr,
    pub kind: OnJumpKind,
    /// Selector value `i + 1` transfers to `targets[i]`
    pub targets: Vec<JumpTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
    /// Line number in front of the statement, if any
    pub line: Option<LineNumber>,
    /// `label:` in front of the statement, if any
    pub label: Option<String>,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            span: Span::COMPILER_GENERATED,
            line: None,
            label: None,
        }
    }

    pub fn at_line(mut self, line: LineNumber) -> Self {
        self.line = Some(line);
        self
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The key this statement's position is known by.
    /// A statement with both a line number and a label is reachable through either; the line number wins.
    pub fn position(&self) -> Option<JumpTarget> {
        match (&self.line, &self.label) {
            (Some(line), _) => Some(JumpTarget::Line(*line)),
            (None, Some(label)) => Some(JumpTarget::Label(label.clone())),
            (None, None) => None,
        }
    }

    /// Every name this statement can be addressed by
    pub fn names(&self) -> impl Iterator<Item = JumpTarget> + '_ {
        self.line
            .map(JumpTarget::Line)
            .into_iter()
            .chain(self.label.iter().map(|l| JumpTarget::Label(l.clone())))
    }

    pub fn print(args: Vec<Expr>) -> Self {
        Self::new(StatementKind::Print(args))
    }

    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Self::new(StatementKind::Let {
            target: Expr::var(target),
            value,
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(StatementKind::Call { name: name.into(), args })
    }

    pub fn goto(target: impl Into<JumpTarget>) -> Self {
        Self::new(StatementKind::Goto(target.into()))
    }

    pub fn gosub(target: impl Into<JumpTarget>) -> Self {
        Self::new(StatementKind::Gosub(target.into()))
    }

    pub fn ret() -> Self {
        Self::new(StatementKind::Return(None))
    }

    pub fn end() -> Self {
        Self::new(StatementKind::End)
    }

    pub fn rem() -> Self {
        Self::new(StatementKind::Rem)
    }

    pub fn exit(kind: ExitKind) -> Self {
        Self::new(StatementKind::Exit(kind))
    }

    pub fn if_then(condition: Expr, then: Vec<Statement>, el: Option<Vec<Statement>>) -> Self {
        Self::new(StatementKind::If(IfStatement {
            condition,
            then,
            else_ifs: Vec::new(),
            el,
        }))
    }

    pub fn for_loop(var: impl Into<String>, start: Expr, limit: Expr, step: Option<Expr>, body: Vec<Statement>) -> Self {
        Self::new(StatementKind::For(ForLoop {
            var: var.into(),
            start,
            limit,
            step,
            body,
        }))
    }

    pub fn while_loop(condition: Expr, body: Vec<Statement>) -> Self {
        Self::new(StatementKind::While(WhileLoop { condition, body }))
    }

    pub fn do_loop(condition: Option<LoopCondition>, body: Vec<Statement>) -> Self {
        Self::new(StatementKind::Do(DoLoop { condition, body }))
    }

    pub fn on(kind: OnJumpKind, selector: Expr, targets: Vec<JumpTarget>) -> Self {
        Self::new(StatementKind::On(OnJump {
            selector,
            kind,
            targets,
        }))
    }

    /// Whether control can leave this statement other than by falling through to the next one
    pub fn transfers_control(&self) -> bool {
        !matches!(
            self.kind,
            StatementKind::Let { .. }
                | StatementKind::Print(_)
                | StatementKind::Call { .. }
                | StatementKind::Dim(_)
                | StatementKind::Restore(_)
                | StatementKind::Rem
        )
    }
}

/// Renders the statement header only; nested bodies are elided.
impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "{line} ")?;
        }
        if let Some(label) = &self.label {
            write!(f, "{label}: ")?;
        }
        match &self.kind {
            StatementKind::Let { target, value } => write!(f, "{target} = {value}"),
            StatementKind::Print(args) => {
                f.write_str("PRINT")?;
                if !args.is_empty() {
                    f.write_str(" ")?;
                    fmt_group(f, args, "; ")?;
                }
                Ok(())
            }
            StatementKind::Call { name, args } => {
                write!(f, "CALL {name}(")?;
                fmt_group(f, args, ", ")?;
                f.write_str(")")
            }
            StatementKind::Dim(names) => {
                f.write_str("DIM ")?;
                fmt_group(f, names, ", ")
            }
            StatementKind::Restore(Some(target)) => write!(f, "RESTORE {target}"),
            StatementKind::Restore(None) => f.write_str("RESTORE"),
            StatementKind::Rem => f.write_str("REM"),
            StatementKind::End => f.write_str("END"),
            StatementKind::If(i) => write!(f, "IF {} THEN ...", i.condition),
            StatementKind::Select(s) => write!(f, "SELECT CASE {}", s.selector),
            StatementKind::For(l) => {
                write!(f, "FOR {} = {} TO {}", l.var, l.start, l.limit)?;
                if let Some(step) = &l.step {
                    write!(f, " STEP {step}")?;
                }
                Ok(())
            }
            StatementKind::While(l) => write!(f, "WHILE {}", l.condition),
            StatementKind::Do(DoLoop { condition: None, .. }) => f.write_str("DO"),
            StatementKind::Do(DoLoop {
                condition: Some(c), ..
            }) => match c.position {
                TestPosition::Pre => write!(f, "DO {} {}", c.kind, c.expr),
                TestPosition::Post => write!(f, "DO ... LOOP {} {}", c.kind, c.expr),
            },
            StatementKind::Try(_) => f.write_str("TRY"),
            StatementKind::Goto(target) => write!(f, "GOTO {target}"),
            StatementKind::Gosub(target) => write!(f, "GOSUB {target}"),
            StatementKind::On(on) => {
                write!(f, "ON {} {} ", on.selector, on.kind)?;
                fmt_group(f, &on.targets, ", ")
            }
            StatementKind::Return(None) => f.write_str("RETURN"),
            StatementKind::Return(Some(e)) => write!(f, "RETURN {e}"),
            StatementKind::Exit(kind) => write!(f, "EXIT {kind}"),
            StatementKind::Continue(kind) => write!(f, "CONTINUE {kind}"),
        }
    }
}

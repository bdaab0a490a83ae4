use std::fmt;

use derive_more::Display;
use strum_macros::{Display as StrumDisplay, IntoStaticStr};

use crate::sourcemap::Span;
use crate::util::fmt_group;

/// A comparison operator, shared by binary expressions and `CASE IS` patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, IntoStaticStr)]
pub enum CmpOp {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "<>")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    Cmp(CmpOp),
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::IntDiv => "\\",
            Self::Mod => "MOD",
            Self::Pow => "^",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Cmp(op) => op.into(),
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "NOT ")]
    Not,
}

/// A literal value
#[derive(Debug, Clone, PartialEq, Display)]
pub enum LiteralExpr {
    #[display("{_0}")]
    Integer(i64),
    #[display("{_0}")]
    Float(f64),
    #[display("\"{_0}\"")]
    String(String),
}

/// A parsed expression
///
/// The CFG builder never looks inside expressions; they are handed to the expression lowering collaborator as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(LiteralExpr),
    /// A scalar variable reference, i.e. `I` or `NAME$`
    Variable(String),
    Unary(UnaryOperator, Box<Expr>),
    Binary(BinaryOperator, Box<Expr>, Box<Expr>),
    /// A call to a FUNCTION or builtin, i.e. `LEN(A$)`
    Call(String, Vec<Expr>),
    /// An array element, i.e. `A(1, J)`
    Index(String, Vec<Expr>),
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Variable(name) => f.write_str(name),
            Self::Unary(op, expr) => write!(f, "{op}{expr}"),
            Self::Binary(op, l, r) => write!(f, "{l} {op} {r}"),
            Self::Call(name, args) | Self::Index(name, args) => {
                write!(f, "{name}(")?;
                fmt_group(f, args, ", ")?;
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Display)]
#[display("{kind}")]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::COMPILER_GENERATED,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Literal(LiteralExpr::Integer(value)))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Literal(LiteralExpr::Float(value)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Literal(LiteralExpr::String(value.into())))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Variable(name.into()))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call(name.into(), args))
    }

    pub fn index(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Index(name.into(), args))
    }

    pub fn unary(op: UnaryOperator, expr: Expr) -> Self {
        Self::new(ExprKind::Unary(op, Box::new(expr)))
    }

    /// Creates a binary expression, spanning both operands when they come from source
    pub fn binary(op: BinaryOperator, l: Expr, r: Expr) -> Self {
        let span = if l.span.is_user_span() && r.span.is_user_span() {
            l.span.to(r.span)
        } else {
            Span::COMPILER_GENERATED
        };
        Self {
            kind: ExprKind::Binary(op, Box::new(l), Box::new(r)),
            span,
        }
    }

    pub fn compare(op: CmpOp, l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOperator::Cmp(op), l, r)
    }

    /// Returns the value of an integer literal, looking through negation
    pub fn as_integer_literal(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::Literal(LiteralExpr::Integer(v)) => Some(*v),
            ExprKind::Unary(UnaryOperator::Neg, inner) => inner.as_integer_literal().and_then(i64::checked_neg),
            _ => None,
        }
    }
}

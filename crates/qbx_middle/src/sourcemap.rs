use derive_more::Display;

/// Byte range of a statement or expression in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
#[display("{lo}..{hi}")]
pub struct Span {
    pub lo: u32,
    pub hi: u32,
}

impl Span {
    /// A span for nodes that do not come from source text, e.g. fixtures or desugared statements.
    /// NOTE: this should not end up in diagnostics!
    pub const COMPILER_GENERATED: Span = Span { lo: u32::MAX, hi: u32::MAX };

    pub fn new(lo: u32, hi: u32) -> Self {
        debug_assert!(hi >= lo);
        Self { lo, hi }
    }

    pub fn res(self, src: &str) -> &str {
        &src[self.lo as usize..self.hi as usize]
    }

    pub fn to(self, other: Span) -> Span {
        debug_assert!(other.hi >= self.lo);
        Span {
            lo: self.lo,
            hi: other.hi,
        }
    }

    pub fn is_user_span(self) -> bool {
        self != Self::COMPILER_GENERATED
    }
}

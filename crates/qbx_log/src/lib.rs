//! A thin wrapper around the logging crate.
//! Compiler crates never depend on `tracing` directly, so swapping the backend only touches this crate.
//!
//! Logging is compiled in only when `QBX_LOG` is set while building.

#[doc(hidden)]
pub use tracing as __tracing;
#[doc(hidden)]
pub const ENABLED: bool = matches!(option_env!("QBX_LOG"), Some(..));

pub use tracing::Level;

#[macro_export]
macro_rules! trace {
    ($($tok:tt)*) => {
        if $crate::ENABLED {
            $crate::__tracing::trace!($($tok)*)
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($tok:tt)*) => {
        if $crate::ENABLED {
            $crate::__tracing::debug!($($tok)*)
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($tok:tt)*) => {
        if $crate::ENABLED {
            $crate::__tracing::error!($($tok)*)
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($tok:tt)*) => {
        if $crate::ENABLED {
            $crate::__tracing::warn!($($tok)*)
        }
    };
}

#[macro_export]
macro_rules! span {
    ($($tok:tt)*) => {
        if $crate::ENABLED {
            $crate::Span::Enabled($crate::__tracing::span!($($tok)*))
        } else {
            $crate::Span::Disabled
        }
    }
}

#[macro_export]
macro_rules! event {
    ($($tok:tt)*) => {
        if $crate::ENABLED {
            $crate::__tracing::event!($($tok)*);
        }
    };
}

/// A span that only exists when logging is compiled in.
pub enum Span {
    Enabled(tracing::Span),
    Disabled,
}

impl Span {
    pub fn enter(&self) -> Entered<'_> {
        match self {
            Self::Enabled(s) => Entered::Enabled(s.enter()),
            Self::Disabled => Entered::Disabled,
        }
    }

    pub fn in_scope<T, F: FnOnce() -> T>(&self, f: F) -> T {
        match self {
            Self::Enabled(s) => s.in_scope(f),
            Self::Disabled => f(),
        }
    }
}

/// Opens the span every per-routine pass runs in, e.g. `routine_span("build", "MAIN")`.
pub fn routine_span(phase: &'static str, routine: &str) -> Span {
    if ENABLED {
        Span::Enabled(tracing::span!(Level::DEBUG, "routine", phase, routine))
    } else {
        Span::Disabled
    }
}

pub enum Entered<'a> {
    Enabled(tracing::span::Entered<'a>),
    Disabled,
}

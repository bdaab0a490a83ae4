/// Knobs for building a routine's graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// How deeply control constructs may nest before the build gives up
    pub max_nesting_depth: usize,
    /// Runs the dead and empty block elimination after the graph is verified
    pub eliminate_dead_blocks: bool,
}

impl BuildOptions {
    pub const DEFAULT_MAX_NESTING_DEPTH: usize = 128;

    pub fn from_level(s: &str) -> Option<Self> {
        match s {
            "0" => Some(Self {
                eliminate_dead_blocks: false,
                ..Self::default()
            }),
            "1" => Some(Self::default()),
            _ => None,
        }
    }

    pub fn with_max_nesting_depth(self, max_nesting_depth: usize) -> Self {
        Self {
            max_nesting_depth,
            ..self
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: Self::DEFAULT_MAX_NESTING_DEPTH,
            eliminate_dead_blocks: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels() {
        assert!(!BuildOptions::from_level("0").unwrap().eliminate_dead_blocks);
        assert_eq!(BuildOptions::from_level("1"), Some(BuildOptions::default()));
        assert_eq!(BuildOptions::from_level("2"), None);
    }
}

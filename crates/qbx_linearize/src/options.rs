#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearizeOptions {
    /// Number of pending GOSUB returns a routine can hold before the program traps
    pub return_stack_capacity: u32,
}

impl LinearizeOptions {
    pub const DEFAULT_RETURN_STACK_CAPACITY: u32 = 64;
}

impl Default for LinearizeOptions {
    fn default() -> Self {
        Self {
            return_stack_capacity: Self::DEFAULT_RETURN_STACK_CAPACITY,
        }
    }
}

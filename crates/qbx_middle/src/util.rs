use std::fmt;

/// Writes `items` separated by `delim`
pub fn fmt_group<D: fmt::Display>(formatter: &mut fmt::Formatter<'_>, items: &[D], delim: &str) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            write!(formatter, "{}", delim)?;
        }

        write!(formatter, "{}", item)?;
    }
    Ok(())
}

/// Monotonic id source, used for loop ids and pseudo registers
#[derive(Debug, Default, Clone)]
pub struct Counter(u32);

impl Counter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn inc(&mut self) -> u32 {
        let old = self.0;
        self.0 += 1;
        old
    }
}

use crate::RuleError;

/// A cellular automaton rule over the Moore neighbourhood.
pub trait Rule: std::fmt::Debug + Send + Sync {
    /// Next state of a cell given its state and its live neighbour count (0-8).
    fn next(&self, alive: bool, neighbors: u8) -> bool;
}

/// Outer-totalistic two-state rule, written `B<counts>/S<counts>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifeLike {
    birth: u16,
    survival: u16,
}

impl LifeLike {
    /// Conway's Life, B3/S23.
    pub fn conway() -> Self {
        Self {
            birth: 1 << 3,
            survival: 1 << 2 | 1 << 3,
        }
    }

    pub fn parse(rule: &str) -> Result<Self, RuleError> {
        let malformed = || RuleError::Malformed(rule.to_owned());
        let (birth, survival) = rule.trim().split_once('/').ok_or_else(malformed)?;
        let birth = birth
            .strip_prefix(['B', 'b'])
            .ok_or_else(malformed)?;
        let survival = survival
            .strip_prefix(['S', 's'])
            .ok_or_else(malformed)?;
        Ok(Self {
            birth: counts(birth)?,
            survival: counts(survival)?,
        })
    }
}

impl Default for LifeLike {
    fn default() -> Self {
        Self::conway()
    }
}

impl Rule for LifeLike {
    fn next(&self, alive: bool, neighbors: u8) -> bool {
        let mask = if alive { self.survival } else { self.birth };
        mask & (1 << neighbors) != 0
    }
}

impl std::fmt::Display for LifeLike {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = |mask: u16| -> String {
            (0..=8u8)
                .filter(|n| mask & (1 << n) != 0)
                .map(|n| char::from(b'0' + n))
                .collect()
        };
        write!(f, "B{}/S{}", digits(self.birth), digits(self.survival))
    }
}

fn counts(digits: &str) -> Result<u16, RuleError> {
    digits.chars().try_fold(0u16, |mask, c| match c.to_digit(10) {
        Some(n) if n <= 8 => Ok(mask | 1 << n),
        _ => Err(RuleError::InvalidCount(c)),
    })
}

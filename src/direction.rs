//! Migration direction
//!
//! A direction is nothing more than a sort-order flag: positive values run the
//! migration files in ascending order, negative values in the exact reverse.
//! It carries no rollback semantics of its own; handlers receive it and decide
//! what "down" means for their datastore.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Signed sort-order flag passed to every handler, hook and reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Direction(i32);

impl Direction {
    /// Forward order (`+1`)
    pub const UP: Direction = Direction(1);

    /// Reverse order (`-1`)
    pub const DOWN: Direction = Direction(-1);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// The raw signed value handed to handlers
    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Returns true when files run in reverse order (value < 0)
    #[inline]
    pub const fn is_reverse(self) -> bool {
        self.0 < 0
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::UP
    }
}

impl From<i32> for Direction {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Direction {
    type Err = String;

    /// Accepts `up`, `down` or any signed integer
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::UP),
            "down" => Ok(Self::DOWN),
            other => other
                .parse::<i32>()
                .map(Self)
                .map_err(|_| format!("Invalid direction '{}': expected up, down or an integer", s)),
        }
    }
}

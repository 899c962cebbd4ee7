use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{helpers::format_number, op};

//--------------------------------------        Won          ---------------------------------------------------------
/// An exact amount of Korean won. Balances, deposits and deltas are all whole numbers of won, so there is no
/// fractional part and no floating point anywhere near money. Deltas may be negative (a withdrawal).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Won(i64);

op!(binary Won, Add, add);
op!(binary Won, Sub, sub);
op!(inplace Won, AddAssign, add_assign);
op!(inplace Won, SubAssign, sub_assign);
op!(unary Won, Neg, neg);

impl Sum for Won {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in won: {0}")]
pub struct WonConversionError(String);

impl From<i64> for Won {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for Won {
    type Err = WonConversionError;

    /// Parses a plain integer amount. Surrounding whitespace is ignored; thousands separators are not accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|e| WonConversionError(format!("'{s}' is not an amount. {e}")))
    }
}

impl Display for Won {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}원", format_number(self.0))
    }
}

impl Won {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

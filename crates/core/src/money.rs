//! Monetary amounts in minor currency units.

use serde::{Deserialize, Serialize};

/// An amount of money in the smallest currency unit (e.g. cents).
///
/// Integer arithmetic keeps order totals exact: the total of an order is the
/// sum of `quantity * unit_price` with no rounding anywhere. Amounts are
/// capped at [`Money::MAX`] so they always fit a signed 64-bit column.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);
    pub const MAX: Money = Money(i64::MAX as u64);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn in_range(&self) -> bool {
        self.0 <= Self::MAX.0
    }

    /// `None` when the sum exceeds [`Money::MAX`].
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money).filter(Money::in_range)
    }

    /// Line total for `quantity` units at this price. `None` on overflow past
    /// [`Money::MAX`] or a negative quantity.
    pub fn checked_mul(self, quantity: i64) -> Option<Money> {
        let quantity = u64::try_from(quantity).ok()?;
        self.0.checked_mul(quantity).map(Money).filter(Money::in_range)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

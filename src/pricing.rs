//! Identity-based pricing.
//!
//! Amounts use `rust_decimal` so discounts are exact; only the final total is
//! rounded to whole currency units.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;

/// Student discount rate.
pub const STUDENT_DISCOUNT: Decimal = dec!(0.10);

/// Senior discount rate.
pub const SENIOR_DISCOUNT: Decimal = dec!(0.20);

/// Identity class shown on the receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityLabel {
    /// No discount-relevant identity.
    General,
    /// Verified student.
    Student,
    /// Verified senior citizen.
    Senior,
}

impl IdentityLabel {
    /// Discount rate granted to this identity.
    #[must_use]
    pub fn discount_rate(self) -> Decimal {
        match self {
            Self::General => Decimal::ZERO,
            Self::Student => STUDENT_DISCOUNT,
            Self::Senior => SENIOR_DISCOUNT,
        }
    }

    /// Receipt label.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::General => "一般",
            Self::Student => "學生",
            Self::Senior => "長者",
        }
    }
}

impl fmt::Display for IdentityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Priced outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricingDecision {
    /// Amount before discount.
    pub base_amount: Decimal,
    /// Identity the discount was granted for.
    pub identity: IdentityLabel,
    /// Applied rate: 0, 0.10 or 0.20.
    pub discount_rate: Decimal,
    /// Amount taken off, rounded to whole units.
    pub discount_amount: Decimal,
    /// Amount to pay, rounded to whole units.
    pub final_amount: Decimal,
}

impl PricingDecision {
    /// Price `base_amount` for the given eligibility flags.
    ///
    /// Student wins if both flags are set.
    #[must_use]
    pub fn decide(base_amount: Decimal, student: bool, senior: bool) -> Self {
        let identity = if student {
            IdentityLabel::Student
        } else if senior {
            IdentityLabel::Senior
        } else {
            IdentityLabel::General
        };
        Self::for_identity(base_amount, identity)
    }

    /// Price `base_amount` for a known identity.
    #[must_use]
    pub fn for_identity(base_amount: Decimal, identity: IdentityLabel) -> Self {
        let discount_rate = identity.discount_rate();
        let final_amount = round_whole(base_amount * (Decimal::ONE - discount_rate));
        Self {
            base_amount,
            identity,
            discount_rate,
            discount_amount: round_whole(base_amount) - final_amount,
            final_amount,
        }
    }

    /// Returns true if any discount applies.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        !self.discount_rate.is_zero()
    }

    /// Discount as a whole percentage (10 for 0.10).
    #[must_use]
    pub fn discount_percent(&self) -> Decimal {
        (self.discount_rate * Decimal::ONE_HUNDRED).normalize()
    }
}

fn round_whole(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}

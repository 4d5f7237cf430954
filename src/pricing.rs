//! Pricing

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use thiserror::Error;

/// Minor units (paisa) in one currency unit.
pub const MINOR_UNITS_PER_UNIT: u64 = 100;

/// Loyalty points exchanged for one currency unit.
pub const POINTS_PER_UNIT: u64 = 10;

/// Errors that can occur while pricing a cart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// The user tried to redeem more points than they hold.
    #[error("cannot redeem {requested} points with a balance of {available}")]
    InsufficientPoints {
        /// Points the user asked to redeem.
        requested: u64,

        /// Points the user currently holds.
        available: u64,
    },

    /// The redeemed points are worth more than the whole cart.
    #[error("point discount of {point_discount} exceeds cart total of {cart_total}")]
    ExcessiveRedemption {
        /// Value of the redeemed points in minor units.
        point_discount: u64,

        /// Cart total in minor units.
        cart_total: u64,
    },

    /// Percentages must be in `0..=100`.
    #[error("discount percentage {0} is out of range")]
    InvalidPercentage(u16),

    /// An intermediate amount could not be represented.
    #[error("amount overflowed while pricing")]
    Overflow,
}

/// Inputs to [`price`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRequest {
    /// Sum of `unit price × quantity` over the cart, in minor units.
    pub cart_total: u64,

    /// Percentage of the active user discount, if any.
    pub discount_percentage: Option<u16>,

    /// The user's current loyalty point balance.
    pub points_balance: u64,

    /// Points the user wants to redeem against this cart.
    pub points_redeemed: u64,
}

/// Full breakdown of a priced cart. All amounts are minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    /// Cart total before any discount.
    pub total_price: u64,

    /// Percentage of the user discount that was applied (0 when none).
    pub discount_percentage: u16,

    /// Amount taken off by the user discount.
    pub discount_amount: u64,

    /// Points redeemed.
    pub points_redeemed: u64,

    /// Value of the redeemed points.
    pub point_discount: u64,

    /// Amount the customer pays. Never negative.
    pub final_price: u64,
}

/// Price a cart.
///
/// The percentage discount is taken off the cart total first and the point discount is then
/// subtracted from what remains, flooring at zero.
///
/// # Errors
///
/// - [`PricingError::InsufficientPoints`]: more points requested than the balance holds.
/// - [`PricingError::ExcessiveRedemption`]: the points are worth more than the cart total.
/// - [`PricingError::InvalidPercentage`]: the discount percentage is above 100.
/// - [`PricingError::Overflow`]: an amount could not be represented.
pub fn price(request: PriceRequest) -> Result<PriceBreakdown, PricingError> {
    let PriceRequest {
        cart_total,
        discount_percentage,
        points_balance,
        points_redeemed,
    } = request;

    if points_redeemed > points_balance {
        return Err(PricingError::InsufficientPoints {
            requested: points_redeemed,
            available: points_balance,
        });
    }

    let point_discount = point_value(points_redeemed)?;

    if point_discount > cart_total {
        return Err(PricingError::ExcessiveRedemption {
            point_discount,
            cart_total,
        });
    }

    let percentage = discount_percentage.unwrap_or(0);
    let discount_amount = percent_of(cart_total, percentage)?;
    let after_percent = cart_total.saturating_sub(discount_amount);

    Ok(PriceBreakdown {
        total_price: cart_total,
        discount_percentage: percentage,
        discount_amount,
        points_redeemed,
        point_discount,
        final_price: after_percent.saturating_sub(point_discount),
    })
}

/// Value of a number of loyalty points in minor units.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] when the value does not fit in a `u64`.
pub fn point_value(points: u64) -> Result<u64, PricingError> {
    points
        .checked_mul(MINOR_UNITS_PER_UNIT / POINTS_PER_UNIT)
        .ok_or(PricingError::Overflow)
}

/// Sum of `unit_price × quantity` over `(unit_price, quantity)` pairs.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] when the total does not fit in a `u64`.
pub fn line_total<I>(lines: I) -> Result<u64, PricingError>
where
    I: IntoIterator<Item = (u64, u64)>,
{
    lines.into_iter().try_fold(0_u64, |acc, (unit_price, quantity)| {
        unit_price
            .checked_mul(quantity)
            .and_then(|line| acc.checked_add(line))
            .ok_or(PricingError::Overflow)
    })
}

/// `percentage`% of `amount`, rounded half away from zero to whole minor units.
///
/// # Errors
///
/// - [`PricingError::InvalidPercentage`]: `percentage` is above 100.
/// - [`PricingError::Overflow`]: the result could not be represented.
pub fn percent_of(amount: u64, percentage: u16) -> Result<u64, PricingError> {
    if percentage > 100 {
        return Err(PricingError::InvalidPercentage(percentage));
    }

    let applied = Decimal::from(amount)
        .checked_mul(Decimal::from(percentage))
        .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(PricingError::Overflow)?;

    applied
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or(PricingError::Overflow)
}

//! Orders
//!
//! Order lifecycle values and the decisions settlement makes about them. An order starts
//! `pending` when checkout hands the customer to the payment gateway and becomes `completed`
//! once a valid callback arrives. A cancelled order is deleted rather than kept in a third state.

use std::{fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Length of the external order token sent to the payment gateway.
pub const ORDER_TOKEN_LENGTH: usize = 8;

/// Errors raised when parsing order values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderValueError {
    /// Unknown payment status.
    #[error("unknown payment status: {0}")]
    UnknownStatus(String),

    /// Unknown payment method.
    #[error("unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// Unknown signature policy.
    #[error("unknown signature policy: {0}")]
    UnknownSignaturePolicy(String),

    /// Unknown cancellation policy.
    #[error("unknown cancellation policy: {0}")]
    UnknownCancellationPolicy(String),

    /// A shipping address field was left blank.
    #[error("shipping address is missing {0}")]
    MissingAddressField(&'static str),
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting the payment callback.
    Pending,

    /// Paid and settled.
    Completed,
}

impl OrderStatus {
    /// Stored representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// What settlement should do with an order in this state.
    pub const fn settlement(self) -> Settlement {
        match self {
            Self::Pending => Settlement::Apply,
            Self::Completed => Settlement::AlreadySettled,
        }
    }
}

impl FromStr for OrderStatus {
    type Err = OrderValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(OrderValueError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a payment callback should apply settlement side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Decrement stock, deactivate cart lines, consume the discount and award points.
    Apply,

    /// The order was settled by an earlier callback; do nothing.
    AlreadySettled,
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum PaymentMethod {
    /// eSewa wallet.
    #[default]
    #[serde(rename = "esewa")]
    Esewa,

    /// Cash on delivery.
    #[serde(rename = "cod")]
    CashOnDelivery,
}

impl PaymentMethod {
    /// Stored representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Esewa => "esewa",
            Self::CashOnDelivery => "cod",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = OrderValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "esewa" => Ok(Self::Esewa),
            "cod" => Ok(Self::CashOnDelivery),
            other => Err(OrderValueError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short external identifier for an order, also used as the gateway transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OrderToken(String);

impl OrderToken {
    /// Generate a fresh token from the first characters of a random UUID.
    pub fn generate() -> Self {
        Self(
            Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(ORDER_TOKEN_LENGTH)
                .collect(),
        )
    }

    /// Wrap a stored token.
    pub fn from_stored(token: String) -> Self {
        Self(token)
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an order ships to. Stored with the order, never shared between orders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ShippingAddress {
    /// Recipient name.
    pub full_name: String,

    /// Contact phone number.
    pub phone: String,

    /// Street address.
    pub address: String,

    /// City.
    pub city: String,
}

impl ShippingAddress {
    /// Check every field is filled in.
    ///
    /// # Errors
    ///
    /// Returns [`OrderValueError::MissingAddressField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), OrderValueError> {
        for (name, value) in [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
        ] {
            if value.trim().is_empty() {
                return Err(OrderValueError::MissingAddressField(name));
            }
        }

        Ok(())
    }
}

/// Result of taking an order line out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrement {
    /// Stock left on the product.
    pub remaining: u64,

    /// Units that were sold without stock to cover them.
    pub shortfall: u64,
}

/// Remove `quantity` units from `stock`, clamping at zero.
pub const fn decrement_stock(stock: u64, quantity: u64) -> StockDecrement {
    StockDecrement {
        remaining: stock.saturating_sub(quantity),
        shortfall: quantity.saturating_sub(stock),
    }
}

/// What to do when a payment callback fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignaturePolicy {
    /// Refuse to settle. A pending order is cancelled.
    #[default]
    Strict,

    /// Log the failure and settle anyway. Only for test gateways.
    Lenient,
}

/// Action settlement takes after a callback fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    /// Cancel the pending order, then reject the callback.
    CancelAndReject,

    /// Reject the callback and leave the order alone.
    Reject,

    /// Carry on settling.
    Proceed,
}

impl SignaturePolicy {
    /// Decide how to handle a failed verification for an order in `status`.
    pub const fn on_failure(self, status: OrderStatus) -> VerificationFailure {
        match (self, status) {
            (Self::Lenient, _) => VerificationFailure::Proceed,
            (Self::Strict, OrderStatus::Pending) => VerificationFailure::CancelAndReject,
            (Self::Strict, OrderStatus::Completed) => VerificationFailure::Reject,
        }
    }
}

impl FromStr for SignaturePolicy {
    type Err = OrderValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(OrderValueError::UnknownSignaturePolicy(other.to_string())),
        }
    }
}

/// What happens to redeemed points when a pending order is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancellationPolicy {
    /// Points stay spent.
    #[default]
    Forfeit,

    /// Points are credited back.
    Restore,
}

impl CancellationPolicy {
    /// Points to credit back for an order that redeemed `points_redeemed`.
    pub const fn points_restored(self, points_redeemed: u64) -> u64 {
        match self {
            Self::Forfeit => 0,
            Self::Restore => points_redeemed,
        }
    }
}

impl FromStr for CancellationPolicy {
    type Err = OrderValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "forfeit" => Ok(Self::Forfeit),
            "restore" => Ok(Self::Restore),
            other => Err(OrderValueError::UnknownCancellationPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn tokens_are_eight_hex_characters() {
        let token = OrderToken::generate();

        assert_eq!(token.as_str().len(), ORDER_TOKEN_LENGTH);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn status_round_trips_through_storage() -> TestResult {
        assert_eq!("pending".parse::<OrderStatus>()?, OrderStatus::Pending);
        assert_eq!(OrderStatus::Completed.as_str().parse::<OrderStatus>()?, OrderStatus::Completed);
        assert!("cancelled".parse::<OrderStatus>().is_err());

        Ok(())
    }

    #[test]
    fn only_pending_orders_settle() {
        assert_eq!(OrderStatus::Pending.settlement(), Settlement::Apply);
        assert_eq!(OrderStatus::Completed.settlement(), Settlement::AlreadySettled);
    }

    #[test]
    fn stock_decrement_clamps_at_zero() {
        assert_eq!(
            decrement_stock(5, 2),
            StockDecrement {
                remaining: 3,
                shortfall: 0
            }
        );
        assert_eq!(
            decrement_stock(1, 3),
            StockDecrement {
                remaining: 0,
                shortfall: 2
            }
        );
    }

    #[test]
    fn strict_policy_cancels_only_pending_orders() {
        let policy = SignaturePolicy::default();

        assert_eq!(
            policy.on_failure(OrderStatus::Pending),
            VerificationFailure::CancelAndReject
        );
        assert_eq!(
            policy.on_failure(OrderStatus::Completed),
            VerificationFailure::Reject
        );
    }

    #[test]
    fn lenient_policy_proceeds() {
        assert_eq!(
            SignaturePolicy::Lenient.on_failure(OrderStatus::Pending),
            VerificationFailure::Proceed
        );
    }

    #[test]
    fn forfeit_keeps_points_spent() {
        assert_eq!(CancellationPolicy::default().points_restored(120), 0);
        assert_eq!(CancellationPolicy::Restore.points_restored(120), 120);
    }

    #[test]
    fn blank_address_fields_are_named() {
        let address = ShippingAddress {
            full_name: "Sita Sharma".to_string(),
            phone: "9800000000".to_string(),
            address: " ".to_string(),
            city: "Kathmandu".to_string(),
        };

        assert_eq!(
            address.validate(),
            Err(OrderValueError::MissingAddressField("address"))
        );
    }
}

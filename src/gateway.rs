//! Payment Gateway
//!
//! eSewa signs a payment with HMAC-SHA256 over a comma separated list of `name=value` pairs,
//! base64 encoded. Outbound forms always sign `total_amount,transaction_uuid,product_code`. The
//! success callback carries a base64 JSON document naming its signed fields, which must cover
//! [`CALLBACK_SIGNED_FIELDS`].

use std::{fmt, str::FromStr};

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde_json::{Map, Value};
use sha2::Sha256;
use smallvec::SmallVec;
use thiserror::Error;
use zeroize::Zeroize;

/// Fields signed on every outbound payment form.
pub const SIGNED_FIELD_NAMES: &str = "total_amount,transaction_uuid,product_code";

/// Fields a callback must sign before any of them is trusted.
pub const CALLBACK_SIGNED_FIELDS: [&str; 6] = [
    "transaction_code",
    "status",
    "total_amount",
    "transaction_uuid",
    "product_code",
    "signed_field_names",
];

/// Status eSewa reports for a successful payment.
pub const STATUS_COMPLETE: &str = "COMPLETE";

/// Product code of the eSewa sandbox merchant.
pub const SANDBOX_PRODUCT_CODE: &str = "EPAYTEST";

/// Shared secret of the eSewa sandbox merchant.
pub const SANDBOX_SECRET: &str = "8gBm/:&EnhH.1/q";

/// Form endpoint of the eSewa sandbox.
pub const SANDBOX_FORM_URL: &str = "https://rc-epay.esewa.com.np/api/epay/main/v2/form";

type HmacSha256 = Hmac<Sha256>;

/// Errors raised while signing or verifying gateway payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The callback payload is not base64 encoded JSON.
    #[error("callback payload is malformed")]
    MalformedPayload,

    /// A field named in `signed_field_names` is absent.
    #[error("callback is missing field {0}")]
    MissingField(String),

    /// The signature does not match the signed fields.
    #[error("callback signature does not match")]
    Forged,

    /// The callback belongs to another merchant.
    #[error("callback is for product code {0}")]
    ProductMismatch(String),

    /// The callback amount is not a decimal currency value.
    #[error("callback amount {0} is invalid")]
    InvalidAmount(String),

    /// The payment did not complete.
    #[error("payment status is {0}")]
    Incomplete(String),

    /// The callback is for a different order.
    #[error("callback is for transaction {actual}, expected {expected}")]
    TransactionMismatch {
        /// Token of the order being settled.
        expected: String,

        /// Token carried by the callback.
        actual: String,
    },

    /// The amount paid differs from the order's final price.
    #[error("callback amount {actual} does not match order amount {expected}")]
    AmountMismatch {
        /// Final price of the order in minor units.
        expected: u64,

        /// Amount carried by the callback in minor units.
        actual: u64,
    },

    /// The merchant secret cannot key an HMAC.
    #[error("gateway secret is invalid")]
    InvalidKey,
}

/// Merchant secret shared with the gateway.
#[derive(Clone)]
pub struct GatewaySecret {
    bytes: Vec<u8>,
}

impl GatewaySecret {
    /// Wrap raw secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for GatewaySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GatewaySecret(**redacted**)")
    }
}

impl Drop for GatewaySecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Merchant configuration for eSewa.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Merchant product code.
    pub product_code: String,

    /// Merchant secret.
    pub secret: GatewaySecret,

    /// Form endpoint the customer is redirected to.
    pub form_url: String,
}

impl GatewayConfig {
    /// Configuration for the public eSewa sandbox.
    pub fn sandbox() -> Self {
        Self {
            product_code: SANDBOX_PRODUCT_CODE.to_string(),
            secret: GatewaySecret::new(SANDBOX_SECRET),
            form_url: SANDBOX_FORM_URL.to_string(),
        }
    }
}

/// What the gateway is asked to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Amount to collect, in minor units.
    pub total_amount: u64,

    /// Order token, used as the gateway transaction id.
    pub transaction_uuid: String,

    /// Where the gateway redirects after a successful payment.
    pub success_url: String,

    /// Where the gateway redirects after a failed payment.
    pub failure_url: String,
}

/// A signed payment form ready to post to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayment {
    /// Form action.
    pub action_url: String,

    /// Form fields in submission order, including `signature`.
    pub fields: SmallVec<[(&'static str, String); 12]>,
}

impl SignedPayment {
    /// Value of a form field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.as_str())
    }

    /// The signature sent with the form.
    pub fn signature(&self) -> Option<&str> {
        self.field("signature")
    }
}

/// A callback whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCallback {
    /// Transaction id, i.e. the order token.
    pub transaction_uuid: String,

    /// Amount paid in minor units.
    pub total_amount: u64,

    /// Gateway payment status.
    pub status: String,

    /// Gateway reference for the payment.
    pub transaction_code: String,
}

impl VerifiedCallback {
    /// Check the callback settles the order with `token` and `final_price`.
    ///
    /// # Errors
    ///
    /// - [`SignatureError::Incomplete`]: the payment status is not `COMPLETE`.
    /// - [`SignatureError::TransactionMismatch`]: the callback is for another order.
    /// - [`SignatureError::AmountMismatch`]: the amount paid differs from `final_price`.
    pub fn ensure_settles(&self, token: &str, final_price: u64) -> Result<(), SignatureError> {
        if self.status != STATUS_COMPLETE {
            return Err(SignatureError::Incomplete(self.status.clone()));
        }

        if self.transaction_uuid != token {
            return Err(SignatureError::TransactionMismatch {
                expected: token.to_string(),
                actual: self.transaction_uuid.clone(),
            });
        }

        if self.total_amount != final_price {
            return Err(SignatureError::AmountMismatch {
                expected: final_price,
                actual: self.total_amount,
            });
        }

        Ok(())
    }
}

/// Signs outbound payment forms and verifies inbound callbacks.
pub trait PaymentGateway: fmt::Debug + Send + Sync {
    /// Build a signed payment form for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidKey`] if the merchant secret is unusable.
    fn create_signature(&self, request: &PaymentRequest) -> Result<SignedPayment, SignatureError>;

    /// Verify the `data` parameter of a callback.
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] if the payload is malformed, forged or for another merchant.
    fn verify_signature(&self, callback_data: &str) -> Result<VerifiedCallback, SignatureError>;
}

/// eSewa v2 gateway.
#[derive(Debug, Clone)]
pub struct EsewaGateway {
    config: GatewayConfig,
}

impl EsewaGateway {
    /// Create a gateway for the given merchant.
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn mac(&self) -> Result<HmacSha256, SignatureError> {
        HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|_err| SignatureError::InvalidKey)
    }

    /// Base64 HMAC-SHA256 of `message` under the merchant secret.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidKey`] if the merchant secret is unusable.
    pub fn sign(&self, message: &str) -> Result<String, SignatureError> {
        let mut mac = self.mac()?;

        mac.update(message.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl PaymentGateway for EsewaGateway {
    fn create_signature(&self, request: &PaymentRequest) -> Result<SignedPayment, SignatureError> {
        let total_amount = format_amount(request.total_amount);

        let message = format!(
            "total_amount={total_amount},transaction_uuid={},product_code={}",
            request.transaction_uuid, self.config.product_code
        );

        let signature = self.sign(&message)?;

        let mut fields: SmallVec<[(&'static str, String); 12]> = SmallVec::new();

        fields.push(("amount", total_amount.clone()));
        fields.push(("tax_amount", "0".to_string()));
        fields.push(("total_amount", total_amount));
        fields.push(("transaction_uuid", request.transaction_uuid.clone()));
        fields.push(("product_code", self.config.product_code.clone()));
        fields.push(("product_service_charge", "0".to_string()));
        fields.push(("product_delivery_charge", "0".to_string()));
        fields.push(("success_url", request.success_url.clone()));
        fields.push(("failure_url", request.failure_url.clone()));
        fields.push(("signed_field_names", SIGNED_FIELD_NAMES.to_string()));
        fields.push(("signature", signature));

        Ok(SignedPayment {
            action_url: self.config.form_url.clone(),
            fields,
        })
    }

    fn verify_signature(&self, callback_data: &str) -> Result<VerifiedCallback, SignatureError> {
        let decoded = STANDARD
            .decode(callback_data.trim())
            .map_err(|_err| SignatureError::MalformedPayload)?;

        let payload: Map<String, Value> =
            serde_json::from_slice(&decoded).map_err(|_err| SignatureError::MalformedPayload)?;

        let signed_field_names = text_field(&payload, "signed_field_names")?;
        let signature = text_field(&payload, "signature")?;

        // Every field settlement reads must be covered by the signature.
        if !CALLBACK_SIGNED_FIELDS
            .iter()
            .all(|required| signed_field_names.split(',').any(|name| name == *required))
        {
            return Err(SignatureError::Forged);
        }

        let message = signed_field_names
            .split(',')
            .map(|name| text_field(&payload, name).map(|value| format!("{name}={value}")))
            .collect::<Result<Vec<_>, _>>()?
            .join(",");

        let signature = STANDARD
            .decode(signature)
            .map_err(|_err| SignatureError::Forged)?;

        let mut mac = self.mac()?;

        mac.update(message.as_bytes());

        mac.verify_slice(&signature)
            .map_err(|_err| SignatureError::Forged)?;

        let product_code = text_field(&payload, "product_code")?;

        if product_code != self.config.product_code {
            return Err(SignatureError::ProductMismatch(product_code));
        }

        let total_amount = text_field(&payload, "total_amount")?;

        Ok(VerifiedCallback {
            transaction_uuid: text_field(&payload, "transaction_uuid")?,
            total_amount: parse_amount(&total_amount)?,
            status: text_field(&payload, "status")?,
            transaction_code: text_field(&payload, "transaction_code")?,
        })
    }
}

/// Read a callback field as the text that was signed.
fn text_field(payload: &Map<String, Value>, name: &str) -> Result<String, SignatureError> {
    match payload.get(name) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(Value::Number(value)) => Ok(value.to_string()),
        Some(Value::Bool(value)) => Ok(value.to_string()),
        Some(Value::Null | Value::Array(_) | Value::Object(_)) | None => {
            Err(SignatureError::MissingField(name.to_string()))
        }
    }
}

/// Render minor units as the decimal currency amount the gateway expects, e.g. `170.5`.
pub fn format_amount(minor: u64) -> String {
    Decimal::from_i128_with_scale(i128::from(minor), 2)
        .normalize()
        .to_string()
}

/// Parse a gateway currency amount such as `1,000.0` into minor units.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidAmount`] if the text is not a non-negative amount with at
/// most two decimal places.
pub fn parse_amount(text: &str) -> Result<u64, SignatureError> {
    let invalid = || SignatureError::InvalidAmount(text.to_string());

    let amount = Decimal::from_str(&text.replace(',', "")).map_err(|_err| invalid())?;

    let minor = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(invalid)?;

    if minor.fract() != Decimal::ZERO {
        return Err(invalid());
    }

    minor.to_u64().ok_or_else(invalid)
}

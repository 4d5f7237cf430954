//! Configuration
//!
//! Plain structs passed into service constructors, plus the `clap` argument groups the CLI
//! builds them from.

use clap::Args;
use sankalpa::{
    gateway::{GatewayConfig, GatewaySecret, SANDBOX_FORM_URL, SANDBOX_PRODUCT_CODE},
    orders::{CancellationPolicy, SignaturePolicy},
};

/// Order token attempts before checkout gives up on a collision streak.
pub const DEFAULT_ORDER_TOKEN_ATTEMPTS: u32 = 3;

/// Promo code attempts before creation gives up on a collision streak.
pub const DEFAULT_PROMO_CODE_ATTEMPTS: u32 = 5;

/// Settlement settings.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Base URL the gateway redirects to after payment; the order id is appended.
    pub success_base_url: String,

    /// Base URL the gateway redirects to after a failed payment; the order id is appended.
    pub failure_base_url: String,

    /// Order token attempts.
    pub order_token_attempts: u32,

    /// How to treat callbacks that fail verification.
    pub signature_policy: SignaturePolicy,

    /// What happens to redeemed points when an order is cancelled.
    pub cancellation_policy: CancellationPolicy,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            success_base_url: "http://localhost:3000/order-success".to_string(),
            failure_base_url: "http://localhost:3000/checkout".to_string(),
            order_token_attempts: DEFAULT_ORDER_TOKEN_ATTEMPTS,
            signature_policy: SignaturePolicy::Strict,
            cancellation_policy: CancellationPolicy::Forfeit,
        }
    }
}

impl SettlementConfig {
    /// Redirect URL for a successful payment of `order`.
    #[must_use]
    pub fn success_url(&self, order: impl std::fmt::Display) -> String {
        format!("{}/{order}", self.success_base_url.trim_end_matches('/'))
    }

    /// Redirect URL for a failed payment of `order`.
    #[must_use]
    pub fn failure_url(&self, order: impl std::fmt::Display) -> String {
        format!("{}/{order}", self.failure_base_url.trim_end_matches('/'))
    }
}

/// Promo code settings.
#[derive(Debug, Clone)]
pub struct PromotionsConfig {
    /// Promo code generation attempts.
    pub code_attempts: u32,
}

impl Default for PromotionsConfig {
    fn default() -> Self {
        Self {
            code_attempts: DEFAULT_PROMO_CODE_ATTEMPTS,
        }
    }
}

/// Database settings.
#[derive(Debug, Args)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// eSewa merchant settings.
#[derive(Debug, Args)]
pub struct GatewayArgs {
    /// eSewa merchant product code
    #[arg(long, env = "ESEWA_PRODUCT_CODE", default_value = SANDBOX_PRODUCT_CODE)]
    pub esewa_product_code: String,

    /// eSewa merchant secret
    #[arg(long, env = "ESEWA_SECRET_KEY", hide_env_values = true)]
    pub esewa_secret_key: String,

    /// eSewa form endpoint
    #[arg(long, env = "ESEWA_FORM_URL", default_value = SANDBOX_FORM_URL)]
    pub esewa_form_url: String,
}

impl From<GatewayArgs> for GatewayConfig {
    fn from(args: GatewayArgs) -> Self {
        Self {
            product_code: args.esewa_product_code,
            secret: GatewaySecret::new(args.esewa_secret_key),
            form_url: args.esewa_form_url,
        }
    }
}

/// Settlement settings from CLI/env.
#[derive(Debug, Args)]
pub struct SettlementArgs {
    /// Base URL for successful payment redirects
    #[arg(long, env = "PAYMENT_SUCCESS_URL", default_value = "http://localhost:3000/order-success")]
    pub payment_success_url: String,

    /// Base URL for failed payment redirects
    #[arg(long, env = "PAYMENT_FAILURE_URL", default_value = "http://localhost:3000/checkout")]
    pub payment_failure_url: String,

    /// Order token attempts before checkout fails
    #[arg(long, env = "ORDER_TOKEN_ATTEMPTS", default_value_t = DEFAULT_ORDER_TOKEN_ATTEMPTS)]
    pub order_token_attempts: u32,

    /// Callback verification policy (strict, lenient)
    #[arg(long, env = "SIGNATURE_POLICY", default_value = "strict")]
    pub signature_policy: SignaturePolicy,

    /// Redeemed points on cancellation (forfeit, restore)
    #[arg(long, env = "CANCELLATION_POLICY", default_value = "forfeit")]
    pub cancellation_policy: CancellationPolicy,
}

impl From<SettlementArgs> for SettlementConfig {
    fn from(args: SettlementArgs) -> Self {
        Self {
            success_base_url: args.payment_success_url,
            failure_base_url: args.payment_failure_url,
            order_token_attempts: args.order_token_attempts,
            signature_policy: args.signature_policy,
            cancellation_policy: args.cancellation_policy,
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
}

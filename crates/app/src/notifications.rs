//! Receipt notifications.

use async_trait::async_trait;
use mockall::automock;
use sankalpa::receipt::{OrderReceipt, ReceiptError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("could not render receipt")]
    Render(#[from] ReceiptError),

    #[error("receipt delivery failed: {0}")]
    Delivery(String),
}

/// Delivers order receipts after settlement. Failures never affect the order.
#[automock]
#[async_trait]
pub trait ReceiptNotifier: Send + Sync {
    async fn send_order_receipt(
        &self,
        recipient: &str,
        receipt: &OrderReceipt,
    ) -> Result<(), NotificationError>;
}

/// Renders the receipt and writes it to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReceiptNotifier;

#[async_trait]
impl ReceiptNotifier for LogReceiptNotifier {
    async fn send_order_receipt(
        &self,
        recipient: &str,
        receipt: &OrderReceipt,
    ) -> Result<(), NotificationError> {
        let body = receipt.render()?;

        info!(
            recipient,
            subject = %receipt.subject(),
            body = %body,
            "order receipt"
        );

        Ok(())
    }
}

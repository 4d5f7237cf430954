//! Receipt

use std::io;

use jiff::{Timestamp, tz::TimeZone};
use rusty_money::{Money, iso};
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use thiserror::Error;

use crate::orders::{PaymentMethod, ShippingAddress};

/// Errors that can occur when rendering a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// An amount is too large to display.
    #[error("amount {0} is out of range")]
    AmountOutOfRange(u64),

    /// IO error
    #[error("IO error")]
    IO,
}

/// One purchased product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    /// Product name.
    pub name: String,

    /// Units bought.
    pub quantity: u64,

    /// Price per unit at checkout, in minor units.
    pub unit_price: u64,
}

/// Receipt for a settled order, sent to the customer after payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    /// Order token.
    pub token: String,

    /// Customer email.
    pub email: String,

    /// When the order was placed.
    pub ordered_at: Timestamp,

    /// How the order was paid.
    pub payment_method: PaymentMethod,

    /// Where the order ships.
    pub shipping_address: ShippingAddress,

    /// Purchased products.
    pub lines: SmallVec<[ReceiptLine; 8]>,

    /// Total before discounts.
    pub total_price: u64,

    /// Percentage of the user discount applied.
    pub discount_percentage: u16,

    /// Amount taken off by the user discount.
    pub discount_amount: u64,

    /// Loyalty points redeemed.
    pub points_redeemed: u64,

    /// Amount taken off by redeemed points.
    pub point_discount: u64,

    /// Amount paid.
    pub final_price: u64,
}

impl OrderReceipt {
    /// Subject line for the receipt message.
    pub fn subject(&self) -> String {
        format!("Your order #{} receipt", self.token)
    }

    /// Render the receipt as text.
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if an amount cannot be displayed.
    pub fn render(&self) -> Result<String, ReceiptError> {
        let mut out = Vec::new();

        self.write_to(&mut out)?;

        String::from_utf8(out).map_err(|_err| ReceiptError::IO)
    }

    /// Write the receipt as a table of lines followed by a summary.
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if an amount cannot be displayed or writing fails.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        let mut builder = Builder::default();

        builder.push_record(["Item", "Qty", "Price", "Total"]);

        for line in &self.lines {
            let line_total = line
                .unit_price
                .checked_mul(line.quantity)
                .ok_or(ReceiptError::AmountOutOfRange(line.unit_price))?;

            builder.push_record([
                line.name.clone(),
                line.quantity.to_string(),
                money(line.unit_price)?,
                money(line_total)?,
            ]);
        }

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Columns::new(1..4), Alignment::right());

        let ordered_on = self.ordered_at.to_zoned(TimeZone::UTC).strftime("%B %d, %Y");

        let address = &self.shipping_address;

        writeln!(out, "Order #{} ({ordered_on})", self.token).map_err(|_err| ReceiptError::IO)?;
        writeln!(out, "Payment: {}", self.payment_method).map_err(|_err| ReceiptError::IO)?;
        writeln!(
            out,
            "Ship to: {}, {}, {} ({})",
            address.full_name, address.address, address.city, address.phone
        )
        .map_err(|_err| ReceiptError::IO)?;
        writeln!(out, "\n{table}").map_err(|_err| ReceiptError::IO)?;

        let mut summary = vec![("Subtotal", money(self.total_price)?)];

        if self.discount_amount > 0 {
            summary.push((
                "Discount",
                format!("({}%) -{}", self.discount_percentage, money(self.discount_amount)?),
            ));
        }

        if self.points_redeemed > 0 {
            summary.push((
                "Points",
                format!("({} pts) -{}", self.points_redeemed, money(self.point_discount)?),
            ));
        }

        summary.push(("Total", money(self.final_price)?));

        for (label, value) in summary {
            writeln!(out, " {label:<10}{value:>24}").map_err(|_err| ReceiptError::IO)?;
        }

        Ok(())
    }
}

fn money(minor: u64) -> Result<String, ReceiptError> {
    let minor_i64 = i64::try_from(minor).map_err(|_err| ReceiptError::AmountOutOfRange(minor))?;

    Ok(Money::from_minor(minor_i64, iso::NPR).to_string())
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;
    use testresult::TestResult;

    use super::*;

    fn receipt() -> TestResult<OrderReceipt> {
        Ok(OrderReceipt {
            token: "ab12cd34".to_string(),
            email: "sita@example.com".to_string(),
            ordered_at: "2024-03-01T10:00:00Z".parse()?,
            payment_method: PaymentMethod::Esewa,
            shipping_address: ShippingAddress {
                full_name: "Sita Sharma".to_string(),
                phone: "9800000000".to_string(),
                address: "Thamel Marg".to_string(),
                city: "Kathmandu".to_string(),
            },
            lines: smallvec![ReceiptLine {
                name: "Notebook".to_string(),
                quantity: 2,
                unit_price: 100_00,
            }],
            total_price: 200_00,
            discount_percentage: 10,
            discount_amount: 20_00,
            points_redeemed: 100,
            point_discount: 10_00,
            final_price: 170_00,
        })
    }

    #[test]
    fn renders_lines_and_summary() -> TestResult {
        let text = receipt()?.render()?;

        assert!(text.contains("Order #ab12cd34 (March 01, 2024)"));
        assert!(text.contains("Notebook"));
        assert!(text.contains("Discount"));
        assert!(text.contains("(100 pts)"));
        assert!(text.contains("Total"));
        assert!(text.contains("Kathmandu"));

        Ok(())
    }

    #[test]
    fn omits_unused_discounts() -> TestResult {
        let receipt = OrderReceipt {
            discount_percentage: 0,
            discount_amount: 0,
            points_redeemed: 0,
            point_discount: 0,
            final_price: 200_00,
            ..receipt()?
        };

        let text = receipt.render()?;

        assert!(!text.contains("Discount"));
        assert!(!text.contains("pts"));

        Ok(())
    }

    #[test]
    fn subject_names_the_order() -> TestResult {
        assert_eq!(receipt()?.subject(), "Your order #ab12cd34 receipt");

        Ok(())
    }

    #[test]
    fn rejects_unrepresentable_amounts() -> TestResult {
        let receipt = OrderReceipt {
            total_price: u64::MAX,
            ..receipt()?
        };

        assert!(matches!(
            receipt.render(),
            Err(ReceiptError::AmountOutOfRange(u64::MAX))
        ));

        Ok(())
    }
}

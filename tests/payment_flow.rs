//! Round trip through the eSewa redirect and callback.

use base64::{Engine, engine::general_purpose::STANDARD};
use sankalpa::{
    gateway::{
        EsewaGateway, GatewayConfig, PaymentGateway, PaymentRequest, SignatureError,
        format_amount,
    },
    orders::OrderToken,
};
use serde_json::json;
use testresult::TestResult;

/// Build the callback eSewa would send after the customer pays the given form.
fn gateway_callback(
    gateway: &EsewaGateway,
    token: &str,
    amount: u64,
    status: &str,
) -> TestResult<String> {
    let total_amount = format_amount(amount);
    let names = "transaction_code,status,total_amount,transaction_uuid,product_code,signed_field_names";

    let message = format!(
        "transaction_code=0007ZX9,status={status},total_amount={total_amount},\
         transaction_uuid={token},product_code=EPAYTEST,signed_field_names={names}"
    );

    let body = json!({
        "transaction_code": "0007ZX9",
        "status": status,
        "total_amount": total_amount,
        "transaction_uuid": token,
        "product_code": "EPAYTEST",
        "signed_field_names": names,
        "signature": gateway.sign(&message)?,
    });

    Ok(STANDARD.encode(serde_json::to_vec(&body)?))
}

#[test]
fn paid_order_callback_settles() -> TestResult {
    let gateway = EsewaGateway::new(GatewayConfig::sandbox());
    let token = OrderToken::generate();

    let form = gateway.create_signature(&PaymentRequest {
        total_amount: 170_00,
        transaction_uuid: token.to_string(),
        success_url: "https://shop.example/checkout/success".to_string(),
        failure_url: "https://shop.example/checkout/failure".to_string(),
    })?;

    assert_eq!(form.field("transaction_uuid"), Some(token.as_str()));

    let data = gateway_callback(&gateway, token.as_str(), 170_00, "COMPLETE")?;
    let callback = gateway.verify_signature(&data)?;

    callback.ensure_settles(token.as_str(), 170_00)?;

    Ok(())
}

#[test]
fn callback_for_another_order_does_not_settle() -> TestResult {
    let gateway = EsewaGateway::new(GatewayConfig::sandbox());
    let paid = OrderToken::generate();
    let pending = OrderToken::generate();

    let data = gateway_callback(&gateway, paid.as_str(), 50_00, "COMPLETE")?;
    let callback = gateway.verify_signature(&data)?;

    let result = callback.ensure_settles(pending.as_str(), 50_00);

    assert!(
        matches!(result, Err(SignatureError::TransactionMismatch { .. })) || paid == pending,
        "expected TransactionMismatch, got {result:?}"
    );

    Ok(())
}

#[test]
fn callback_from_another_merchant_is_rejected() -> TestResult {
    let ours = EsewaGateway::new(GatewayConfig::sandbox());
    let theirs = EsewaGateway::new(GatewayConfig {
        secret: sankalpa::gateway::GatewaySecret::new("another-merchant"),
        ..GatewayConfig::sandbox()
    });

    let data = gateway_callback(&theirs, "ab12cd34", 10_00, "COMPLETE")?;

    assert_eq!(ours.verify_signature(&data), Err(SignatureError::Forged));

    Ok(())
}

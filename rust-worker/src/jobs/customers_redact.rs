//! `customers/redact`: a store owner asked for a customer's data to be erased.
//!
//! The payload names the customer (`customer.id`, `customer.email`,
//! `customer.phone`) and the orders to redact (`orders_to_redact`).

use tracing::debug;

use super::{log_received, JobContext, JobError};
use crate::queue::{JobKind, WebhookPayload};
use crate::shop::with_shopify_session;

pub async fn perform(
    ctx: &JobContext,
    shop_domain: &str,
    webhook: &WebhookPayload,
) -> Result<(), JobError> {
    log_received(JobKind::CustomersRedact, shop_domain, webhook);

    let shop = ctx.find_shop(shop_domain).await?;

    with_shopify_session(ctx.sessions.as_ref(), &shop, |session| {
        debug!(
            shop_domain = %session.shop_domain(),
            has_customer = webhook.contains_key("customer"),
            "customers_redact_session_open"
        );
    })?;

    Ok(())
}

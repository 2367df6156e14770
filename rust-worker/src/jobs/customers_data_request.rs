//! `customers/data_request`: a customer asked for the data the app holds.
//!
//! The payload names the customer and the orders requested
//! (`orders_requested`), plus a `data_request.id` to reference in the reply.

use tracing::debug;

use super::{log_received, JobContext, JobError};
use crate::queue::{JobKind, WebhookPayload};
use crate::shop::with_shopify_session;

pub async fn perform(
    ctx: &JobContext,
    shop_domain: &str,
    webhook: &WebhookPayload,
) -> Result<(), JobError> {
    log_received(JobKind::CustomersDataRequest, shop_domain, webhook);

    let shop = ctx.find_shop(shop_domain).await?;

    with_shopify_session(ctx.sessions.as_ref(), &shop, |session| {
        debug!(
            shop_domain = %session.shop_domain(),
            orders_requested = webhook
                .get("orders_requested")
                .and_then(|v| v.as_array())
                .map(|orders| orders.len())
                .unwrap_or(0),
            "customers_data_request_session_open"
        );
    })?;

    Ok(())
}

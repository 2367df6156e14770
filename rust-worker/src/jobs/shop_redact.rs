//! `shop/redact`: sent 48 hours after a shop uninstalls the app.
//!
//! Payload: `{"shop_id": 954889, "shop_domain": "snowdevil.myshopify.com"}`.

use tracing::debug;

use super::{log_received, JobContext, JobError};
use crate::queue::{JobKind, WebhookPayload};
use crate::shop::with_shopify_session;

pub async fn perform(
    ctx: &JobContext,
    shop_domain: &str,
    webhook: &WebhookPayload,
) -> Result<(), JobError> {
    log_received(JobKind::ShopRedact, shop_domain, webhook);

    let shop = ctx.find_shop(shop_domain).await?;

    with_shopify_session(ctx.sessions.as_ref(), &shop, |session| {
        debug!(shop_domain = %session.shop_domain(), "shop_redact_session_open");
    })?;

    Ok(())
}

//! Webhook body to job payload conversion.

use serde_json::{Map, Value};
use thiserror::Error;
use url::form_urlencoded;

use crate::queue::WebhookPayload;

/// Keys added by request routing rather than sent by Shopify.
pub const ROUTING_KEYS: [&str; 3] = ["controller", "action", "type"];

/// Key holding a body that is valid JSON but not an object.
pub const NON_OBJECT_KEY: &str = "_json";

#[derive(Debug, Error)]
#[error("webhook body is not valid JSON: {0}")]
pub struct PayloadError(#[from] serde_json::Error);

/// Parse a raw webhook body and request query string into a payload map.
///
/// An empty body yields an empty map. A JSON object is used as-is; any other
/// JSON value is stored under `_json`. Query-string pairs are merged in as
/// strings and win over body keys of the same name. Routing keys are removed.
pub fn parse_webhook_payload(
    body: &[u8],
    query: Option<&str>,
) -> Result<WebhookPayload, PayloadError> {
    let mut payload = parse_body(body)?;

    if let Some(query) = query {
        merge_query(&mut payload, query);
    }

    strip_routing_keys(&mut payload);
    Ok(payload)
}

fn parse_body(body: &[u8]) -> Result<WebhookPayload, PayloadError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    Ok(match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert(NON_OBJECT_KEY.to_string(), other);
            map
        }
    })
}

/// Merge `application/x-www-form-urlencoded` pairs into a payload.
///
/// Repeated keys keep the last value.
pub fn merge_query(payload: &mut WebhookPayload, query: &str) {
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        payload.insert(key.into_owned(), Value::String(value.into_owned()));
    }
}

/// Remove routing-internal keys from a payload.
pub fn strip_routing_keys(payload: &mut WebhookPayload) {
    for key in ROUTING_KEYS {
        payload.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_body_passes_through() {
        let payload = parse_webhook_payload(
            br#"{"shop_id":954889,"customer":{"id":191167,"phone":null},"orders_requested":[1,2]}"#,
            None,
        )
        .unwrap();

        assert_eq!(
            Value::Object(payload),
            json!({"shop_id":954889,"customer":{"id":191167,"phone":null},"orders_requested":[1,2]})
        );
    }

    #[test]
    fn test_routing_keys_are_stripped() {
        let payload = parse_webhook_payload(
            br#"{"shop_id":1,"controller":"mandatory_webhooks","action":"shop_redact","type":"x"}"#,
            None,
        )
        .unwrap();

        assert_eq!(Value::Object(payload), json!({"shop_id": 1}));
    }

    #[test]
    fn test_nested_routing_keys_are_kept() {
        let payload = parse_webhook_payload(br#"{"customer":{"type":"guest"}}"#, None).unwrap();
        assert_eq!(payload["customer"]["type"], "guest");
    }

    #[test]
    fn test_empty_body_is_empty_payload() {
        assert!(parse_webhook_payload(b"", None).unwrap().is_empty());
        assert!(parse_webhook_payload(b" \n", None).unwrap().is_empty());
    }

    #[test]
    fn test_non_object_body_is_wrapped() {
        let payload = parse_webhook_payload(b"[1,2,3]", None).unwrap();
        assert_eq!(payload[NON_OBJECT_KEY], json!([1, 2, 3]));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(parse_webhook_payload(b"{not json", None).is_err());
    }

    #[test]
    fn test_query_params_are_merged() {
        let payload = parse_webhook_payload(
            br#"{"shop_id":954889,"source":"body"}"#,
            Some("source=query&ref=app%20store&controller=x&type=y"),
        )
        .unwrap();

        assert_eq!(
            Value::Object(payload),
            json!({"shop_id": 954889, "source": "query", "ref": "app store"})
        );
    }

    #[test]
    fn test_query_params_without_body() {
        let payload = parse_webhook_payload(b"", Some("shop=snowdevil&shop=other&=skipped")).unwrap();
        assert_eq!(Value::Object(payload), json!({"shop": "other"}));

        assert!(parse_webhook_payload(b"", Some("")).unwrap().is_empty());
    }
}

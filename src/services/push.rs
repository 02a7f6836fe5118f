//! Web-push delivery and the notify helper
//!
//! Push is best-effort: a failed endpoint is logged (and removed from the
//! registry when the push service says it is gone), and no delivery failure
//! ever propagates into a generation or publish cycle.

use serde::Serialize;
use sqlx::PgPool;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, URL_SAFE_NO_PAD, Urgency,
    VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessageBuilder,
};

use crate::domain::notifications;
use crate::domain::push as domain_push;
use crate::models::{DeliveryReport, NotificationKind};

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    title: &'a str,
    body: &'a str,
    kind: NotificationKind,
    tag: &'static str,
    data: Option<serde_json::Value>,
}

fn build_vapid_signature(
    private_key: &str,
    subscription_info: &SubscriptionInfo,
) -> Result<web_push::VapidSignature, WebPushError> {
    if private_key.contains("BEGIN PRIVATE KEY") || private_key.contains("BEGIN EC PRIVATE KEY") {
        VapidSignatureBuilder::from_pem(private_key.as_bytes(), subscription_info)?.build()
    } else {
        VapidSignatureBuilder::from_base64(private_key, URL_SAFE_NO_PAD, subscription_info)?.build()
    }
}

async fn send_push_message(
    client: &IsahcWebPushClient,
    payload: &[u8],
    subscription: &domain_push::PushSubscriptionData,
    private_key: &str,
) -> Result<(), WebPushError> {
    let subscription_info = SubscriptionInfo::new(
        &subscription.endpoint,
        &subscription.keys.p256dh,
        &subscription.keys.auth,
    );

    let signature = build_vapid_signature(private_key, &subscription_info)?;

    let mut message = WebPushMessageBuilder::new(&subscription_info);
    message.set_payload(ContentEncoding::Aes128Gcm, payload);
    message.set_ttl(4 * 60 * 60);
    message.set_urgency(Urgency::Normal);
    message.set_vapid_signature(signature);

    client.send(message.build()?).await
}

/// The push service reported the registration is gone for good.
fn endpoint_is_gone(error: &WebPushError) -> bool {
    matches!(
        error,
        WebPushError::EndpointNotValid | WebPushError::EndpointNotFound
    )
}

/// Fan a notification out to every registered endpoint.
///
/// Individual endpoint failures are counted and logged; expired
/// registrations are removed from the registry. The call itself never fails.
pub async fn broadcast(
    db: &PgPool,
    title: &str,
    body: &str,
    kind: NotificationKind,
    data: Option<serde_json::Value>,
) -> DeliveryReport {
    let private_key = match std::env::var("VAPID_PRIVATE_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => {
            eprintln!("[push] Missing VAPID_PRIVATE_KEY; skipping push broadcast");
            return DeliveryReport::default();
        }
    };

    let subscriptions = match domain_push::list_subscriptions(db).await {
        Ok(subs) => subs,
        Err(e) => {
            eprintln!("[push] Failed to list subscriptions: {}", e);
            return DeliveryReport::default();
        }
    };

    if subscriptions.is_empty() {
        return DeliveryReport::default();
    }

    let client = match IsahcWebPushClient::new() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("[push] Failed to create push client: {}", e);
            return DeliveryReport {
                total: subscriptions.len(),
                successful: 0,
                failed: subscriptions.len(),
            };
        }
    };

    let payload = PushPayload {
        title,
        body,
        kind,
        tag: "xbot",
        data,
    };
    let payload_bytes = match serde_json::to_vec(&payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("[push] Failed to encode payload: {}", e);
            return DeliveryReport::default();
        }
    };

    let mut report = DeliveryReport {
        total: subscriptions.len(),
        successful: 0,
        failed: 0,
    };

    for subscription in subscriptions {
        match send_push_message(&client, &payload_bytes, &subscription, &private_key).await {
            Ok(()) => report.successful += 1,
            Err(error) => {
                report.failed += 1;
                eprintln!(
                    "[push] Failed to send notification to {}: {}",
                    subscription.endpoint, error
                );

                if endpoint_is_gone(&error) {
                    match domain_push::delete_subscription(db, &subscription.endpoint).await {
                        Ok(()) => println!(
                            "[push] Removed expired subscription: {}",
                            subscription.endpoint
                        ),
                        Err(e) => eprintln!(
                            "[push] Failed to remove expired subscription {}: {}",
                            subscription.endpoint, e
                        ),
                    }
                }
            }
        }
    }

    report
}

/// Record a notification and push it, both best-effort.
pub async fn notify(
    db: &PgPool,
    title: &str,
    body: &str,
    kind: NotificationKind,
    data: Option<serde_json::Value>,
) {
    if let Err(e) = notifications::create_notification(db, title, body, kind, data.clone()).await {
        eprintln!("[notify] Failed to record notification: {}", e);
    }

    let report = broadcast(db, title, body, kind, data).await;
    if report.total > 0 {
        println!(
            "[push] Broadcast '{}': {}/{} delivered",
            title, report.successful, report.total
        );
    }
}

use serde_json::Value;
use tracing::info;

use crate::{Capabilities, Notification, PushMessage, ServiceWorkerError, WorkerConfig};

/// Pick the notification body for a push payload.
///
/// JSON payloads contribute their `message` field when it is truthy; anything
/// that is not JSON (or is JSON `null`) is used as plain text. No payload
/// yields `default`. Objects and arrays are truthy and render the way a page
/// would stringify them.
pub fn resolve_push_message(data: Option<&[u8]>, default: &str) -> String {
    let Some(data) = data else {
        return default.to_string();
    };

    match serde_json::from_slice::<Value>(data) {
        Ok(Value::Null) | Err(_) => String::from_utf8_lossy(data).into_owned(),
        Ok(value) => match value.get("message") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) if n.as_f64().is_some_and(|f| f != 0.0) => n.to_string(),
            Some(Value::Bool(true)) => "true".to_string(),
            Some(message @ (Value::Object(_) | Value::Array(_))) => script_string(message),
            _ => default.to_string(),
        },
    }
}

/// String conversion of a JSON value as a page script would see it.
fn script_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Object(_) => "[object Object]".to_string(),
        // Array join renders null elements as empty strings.
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => script_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Show a notification for a push message.
pub async fn handle_push(
    message: PushMessage,
    config: &WorkerConfig,
    caps: &Capabilities,
) -> Result<Notification, ServiceWorkerError> {
    info!(has_data = message.data.is_some(), "Push event received");

    let body = resolve_push_message(message.data.as_deref(), &config.default_push_message);
    let notification = Notification::new(
        config.notification_title.clone(),
        body,
        config.notification_icon.clone(),
    );

    caps.notifications
        .show_notification(notification.clone())
        .await?;
    info!("Push notification displayed");

    Ok(notification)
}

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::NotifyError;

/// Delivers one message to one address.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Submits mail as JSON to an HTTP relay (any transactional mail API that
/// accepts `{from, to, subject, text}` with an optional bearer token).
pub struct HttpMailNotifier {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    from: String,
}

impl HttpMailNotifier {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpMailNotifier {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.endpoint).json(&MailPayload {
            from: &self.from,
            to: recipient,
            subject,
            text: body,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Transient(format!("mail relay unreachable: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!("Mail relay accepted '{}' for {}", subject, recipient);
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        let message = format!("mail relay returned {}: {}", status, detail.trim());
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::REQUEST_TIMEOUT
        {
            Err(NotifyError::Transient(message))
        } else {
            Err(NotifyError::Rejected(message))
        }
    }
}

/// Writes reminders to the log instead of sending them. Used when no relay
/// is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), NotifyError> {
        info!(%recipient, %subject, "Reminder (log only): {}", body.trim_end());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};

    #[derive(Clone, Default)]
    struct Relay {
        received: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>,
    }

    async fn accept(
        State(relay): State<Relay>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        relay.received.lock().unwrap().push((auth, body));
        StatusCode::ACCEPTED
    }

    async fn spawn_relay(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/send", addr)
    }

    #[tokio::test]
    async fn posts_json_with_bearer_token() {
        let relay = Relay::default();
        let url = spawn_relay(Router::new().route("/send", post(accept)).with_state(relay.clone())).await;

        let notifier = HttpMailNotifier::new(url, Some("s3cret".into()), "bot@taskmate.local");
        notifier.send("1 day left", "body text", "a@x.com").await.unwrap();

        let received = relay.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let (auth, body) = &received[0];
        assert_eq!(auth.as_deref(), Some("Bearer s3cret"));
        assert_eq!(body["to"], "a@x.com");
        assert_eq!(body["from"], "bot@taskmate.local");
        assert_eq!(body["subject"], "1 day left");
        assert_eq!(body["text"], "body text");
    }

    #[tokio::test]
    async fn server_errors_are_transient_and_client_errors_are_rejections() {
        let url = spawn_relay(
            Router::new()
                .route("/send", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
                .route("/bad", post(|| async { StatusCode::UNPROCESSABLE_ENTITY })),
        )
        .await;

        let flaky = HttpMailNotifier::new(url.clone(), None, "bot@taskmate.local");
        let err = flaky.send("s", "b", "a@x.com").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transient(_)));

        let strict = HttpMailNotifier::new(url.replace("/send", "/bad"), None, "bot@taskmate.local");
        let err = strict.send("s", "b", "a@x.com").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(_)));
    }

    #[tokio::test]
    async fn unreachable_relay_is_transient() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = HttpMailNotifier::new(format!("http://{}/send", addr), None, "bot@taskmate.local");
        let err = notifier.send("s", "b", "a@x.com").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transient(_)));
    }
}

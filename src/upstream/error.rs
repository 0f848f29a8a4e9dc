use serde_json::Value;
use thiserror::Error;

/// Failure talking to one of the upstream APIs.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-2xx status.
    #[error("{service} returned {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// The request never produced a response (DNS, connect, timeout, TLS).
    #[error("could not reach {service}")]
    Connectivity {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response from {service}: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build a status error from a failed response, keeping the upstream
    /// payload when it is JSON.
    pub(crate) async fn from_response(
        service: &'static str,
        action: &str,
        resp: reqwest::Response,
    ) -> Self {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).ok();
        let detail = body
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| text.chars().take(200).collect());

        let message = if detail.is_empty() {
            format!("failed to {}", action)
        } else {
            format!("failed to {}: {}", action, detail)
        };

        UpstreamError::Status {
            service,
            status: status.as_u16(),
            message,
            body,
        }
    }
}

/// Pull a human-readable message out of an upstream error payload.
/// Both upstreams use `{summary, detail}` or `{error}` / `{message}` shapes.
fn extract_message(body: &Value) -> Option<String> {
    let pick = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);

    match (pick("summary"), pick("detail")) {
        (Some(s), Some(d)) => Some(format!("{} ({})", s, d)),
        (Some(s), None) => Some(s),
        (None, Some(d)) => Some(d),
        (None, None) => pick("error").or_else(|| pick("message")).or_else(|| {
            body.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_message_prefers_summary_and_detail() {
        let body = json!({"summary": "Invalid token", "detail": "Token is invalid or expired", "status_code": 401});
        assert_eq!(
            extract_message(&body).as_deref(),
            Some("Invalid token (Token is invalid or expired)")
        );
    }

    #[test]
    fn test_extract_message_handles_plain_error_shapes() {
        assert_eq!(
            extract_message(&json!({"error": "Access token does not exist."})).as_deref(),
            Some("Access token does not exist.")
        );
        assert_eq!(
            extract_message(&json!({"error": {"message": "nested"}})).as_deref(),
            Some("nested")
        );
        assert_eq!(extract_message(&json!({"foo": 1})), None);
    }
}

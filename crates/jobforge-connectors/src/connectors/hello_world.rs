// jobforge-connectors/src/connectors/hello_world.rs
// ============================================================================
// Module: Hello World Connector
// Description: The reference connector used to exercise the harness.
// Purpose: Give operators and tests a connector with no external
//          dependencies, so the harness's retry/backoff/timeout machinery
//          can be demonstrated deterministically.
// ============================================================================

//! ## Overview
//! Echoes `message` back with `" World!"` appended, optionally sleeping for
//! `delay_ms` first. Always returns status 200; it exists to prove the
//! harness's happy path, not to exercise retry behavior itself.

use jobforge_core::ids::ConnectorId;
use serde_json::Value;
use serde_json::json;

use crate::harness::Connector;
use crate::harness::ConnectorAttempt;
use crate::harness::ConnectorResponse;

/// The built-in `hello_world` connector.
pub struct HelloWorldConnector;

#[async_trait::async_trait]
impl Connector for HelloWorldConnector {
    fn id(&self) -> ConnectorId {
        ConnectorId::new("hello_world")
    }

    async fn invoke(&self, input: &Value) -> ConnectorAttempt {
        let message = input.get("message").and_then(Value::as_str).unwrap_or("Hello");
        let echo = input.get("echo").and_then(Value::as_bool).unwrap_or(false);
        let delay_ms = input.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);

        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        Ok(ConnectorResponse {
            status_code: 200,
            output: json!({
                "message": format!("{message} World!"),
                "echoed": echo,
                "delay_used": delay_ms,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::HelloWorldConnector;
    use crate::harness::Connector;

    #[tokio::test]
    async fn echoes_message_and_flags() {
        let connector = HelloWorldConnector;
        let response = connector
            .invoke(&json!({"message": "Hello", "echo": true, "delay_ms": 0}))
            .await
            .expect("invoke");
        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.output,
            json!({"message": "Hello World!", "echoed": true, "delay_used": 0})
        );
    }

    #[tokio::test]
    async fn defaults_message_when_absent() {
        let connector = HelloWorldConnector;
        let response = connector.invoke(&json!({})).await.expect("invoke");
        assert_eq!(response.output["message"], json!("Hello World!"));
        assert_eq!(response.output["echoed"], json!(false));
    }
}

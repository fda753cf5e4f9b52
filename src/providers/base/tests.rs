use super::*;
use serde_json::json;

struct FixedProvider;

#[async_trait]
impl MessagingProvider for FixedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Session
    }

    fn ready_states(&self) -> &'static [&'static str] {
        &["WORKING", "READY"]
    }

    async fn list_endpoints(&self) -> MaturationResult<Vec<RemoteEndpoint>> {
        Ok(vec![])
    }

    async fn lookup_phone(&self, _session: &str) -> Option<String> {
        None
    }

    async fn send_text(
        &self,
        _session: &str,
        _to_phone: &str,
        _text: &str,
    ) -> Result<SendReceipt, DeliveryError> {
        Ok(SendReceipt {
            message_id: None,
            http_status: 200,
        })
    }
}

#[test]
fn is_ready_normalizes_case_and_whitespace() {
    let p = FixedProvider;
    assert!(p.is_ready("WORKING"));
    assert!(p.is_ready(" working "));
    assert!(p.is_ready("Ready"));
    assert!(!p.is_ready("STOPPED"));
    assert!(!p.is_ready(""));
}

#[tokio::test]
async fn default_health_check_is_healthy() {
    let p = FixedProvider;
    assert!(!p.requires_health_check());
    assert_eq!(p.check_health("s").await, HealthCheck::Healthy);
    assert!(p.restart("s").await.is_ok());
}

#[test]
fn delivery_error_reason_codes() {
    assert_eq!(
        DeliveryError::InvalidNumber("x".into()).reason(),
        "invalid_number"
    );
    assert_eq!(
        DeliveryError::MissingCredentials.reason(),
        "missing_credentials"
    );
    assert_eq!(
        DeliveryError::Rejected {
            status: 500,
            body: String::new()
        }
        .reason(),
        "rejected"
    );
    assert_eq!(DeliveryError::Transport("x".into()).reason(), "transport");
}

#[test]
fn extract_phone_from_jid_string() {
    assert_eq!(
        extract_phone(&json!("5511999990000@c.us")).as_deref(),
        Some("5511999990000")
    );
}

#[test]
fn extract_phone_from_nested_me() {
    let v = json!({"name": "default", "me": {"id": "5511988887777@c.us", "pushName": "Ana"}});
    assert_eq!(extract_phone(&v).as_deref(), Some("5511988887777"));
}

#[test]
fn extract_phone_from_instance_array() {
    let v = json!([{"instance": {"instanceName": "i1", "owner": "5521977776666@s.whatsapp.net"}}]);
    assert_eq!(extract_phone(&v).as_deref(), Some("5521977776666"));
}

#[test]
fn extract_phone_skips_non_numeric_id() {
    let v = json!({"id": "default", "number": "5531966665555"});
    assert_eq!(extract_phone(&v).as_deref(), Some("5531966665555"));
}

#[test]
fn extract_phone_none_when_absent() {
    assert!(extract_phone(&json!({"name": "x", "status": "WORKING"})).is_none());
    assert!(extract_phone(&json!(null)).is_none());
}

#[test]
fn receipt_from_plain_body() {
    let r = receipt_from_body(201, "").unwrap();
    assert_eq!(r.http_status, 201);
    assert!(r.message_id.is_none());
}

#[test]
fn receipt_reads_serialized_id() {
    let body = r#"{"id": {"fromMe": true, "_serialized": "true_5511@c.us_ABC"}}"#;
    let r = receipt_from_body(200, body).unwrap();
    assert_eq!(r.message_id.as_deref(), Some("true_5511@c.us_ABC"));
}

#[test]
fn receipt_reads_key_id() {
    let body = r#"{"key": {"remoteJid": "5511@s.whatsapp.net", "id": "3EB0"}, "status": "PENDING"}"#;
    let r = receipt_from_body(201, body).unwrap();
    assert_eq!(r.message_id.as_deref(), Some("3EB0"));
}

#[test]
fn receipt_rejects_explicit_failure() {
    let err = receipt_from_body(200, r#"{"success": false, "message": "not on whatsapp"}"#)
        .unwrap_err();
    assert_eq!(err.reason(), "rejected");
    let err = receipt_from_body(200, r#"{"error": "boom"}"#).unwrap_err();
    assert_eq!(err.reason(), "rejected");
}

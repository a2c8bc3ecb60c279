//! REST key-management client
//!
//! Speaks the symmetric-key REST shape used by Yandex Cloud KMS and
//! compatible services:
//!
//! ```text
//! POST {endpoint}/keys/{key_id}:encrypt   {"plaintext":  "<base64>"} -> {"ciphertext": "<base64>", ...}
//! POST {endpoint}/keys/{key_id}:decrypt   {"ciphertext": "<base64>"} -> {"plaintext":  "<base64>", ...}
//! ```

use super::KeyManagementProvider;
use crate::{CryptoError, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

/// Configuration for a REST key-management endpoint
#[derive(Clone, Debug)]
pub struct RestKmsConfig {
    /// Base URL, e.g. "https://kms.yandex/kms/v1"
    pub endpoint: String,
    /// Bearer token sent with every request
    pub token: String,
    /// Request timeout
    pub timeout: Duration,
}

impl RestKmsConfig {
    /// Create a new config with the default timeout
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct EncryptRequest {
    plaintext: String,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

#[derive(Clone, Copy)]
enum Operation {
    Encrypt,
    Decrypt,
}

/// REST key-management client
#[derive(Clone)]
pub struct RestKms {
    client: Client,
    config: RestKmsConfig,
}

impl RestKms {
    /// Create a new client
    pub fn new(config: RestKmsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CryptoError::KeyManagementUnavailable(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, key_ref: &str, op: Operation) -> String {
        let verb = match op {
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
        };
        format!(
            "{}/keys/{}:{}",
            self.config.endpoint.trim_end_matches('/'),
            key_ref,
            verb
        )
    }

    async fn call<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        key_ref: &str,
        op: Operation,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(self.url(key_ref, op))
            .bearer_auth(&self.config.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, op, key_ref, detail));
        }

        response
            .json()
            .await
            .map_err(|e| CryptoError::KeyManagementUnavailable(format!("malformed response: {}", e)))
    }
}

fn classify_failure(status: StatusCode, op: Operation, key_ref: &str, detail: String) -> CryptoError {
    match (status, op) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND, _) => {
            CryptoError::KeyManagementDenied(format!("{} for key '{}': {}", status, key_ref, detail))
        }
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, Operation::Decrypt) => {
            CryptoError::CorruptEnvelope(format!("provider rejected ciphertext ({}): {}", status, detail))
        }
        _ => CryptoError::KeyManagementUnavailable(format!("{}: {}", status, detail)),
    }
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|e| CryptoError::KeyManagementUnavailable(format!("invalid base64 in '{}': {}", field, e)))
}

#[async_trait]
impl KeyManagementProvider for RestKms {
    fn name(&self) -> &'static str {
        "rest"
    }

    #[instrument(skip(self, plaintext), fields(size = plaintext.len()))]
    async fn encrypt(&self, key_ref: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let request = EncryptRequest {
            plaintext: base64::engine::general_purpose::STANDARD.encode(plaintext),
        };
        let response: EncryptResponse = self.call(key_ref, Operation::Encrypt, &request).await?;
        decode_b64("ciphertext", &response.ciphertext)
    }

    #[instrument(skip(self, ciphertext), fields(size = ciphertext.len()))]
    async fn decrypt(&self, key_ref: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let request = DecryptRequest {
            ciphertext: base64::engine::general_purpose::STANDARD.encode(ciphertext),
        };
        let response: DecryptResponse = self.call(key_ref, Operation::Decrypt, &request).await?;
        decode_b64("plaintext", &response.plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client(server: &MockServer) -> RestKms {
        RestKms::new(RestKmsConfig::new(server.uri(), "test-token")).unwrap()
    }

    #[tokio::test]
    async fn test_encrypt_roundtrip_through_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/keys/abc:encrypt"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({ "plaintext": STANDARD.encode(b"dek") })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keyId": "abc",
                "versionId": "v1",
                "ciphertext": STANDARD.encode(b"wrapped-dek"),
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/keys/abc:decrypt"))
            .and(body_json(serde_json::json!({ "ciphertext": STANDARD.encode(b"wrapped-dek") })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keyId": "abc",
                "plaintext": STANDARD.encode(b"dek"),
            })))
            .mount(&server)
            .await;

        let kms = client(&server);
        let wrapped = kms.encrypt("abc", b"dek").await.unwrap();
        assert_eq!(wrapped, b"wrapped-dek");
        assert_eq!(kms.decrypt("abc", &wrapped).await.unwrap(), b"dek");
    }

    #[tokio::test]
    async fn test_forbidden_is_denied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let result = client(&server).encrypt("abc", b"dek").await;
        assert!(matches!(result, Err(CryptoError::KeyManagementDenied(_))));
    }

    #[tokio::test]
    async fn test_bad_ciphertext_is_corrupt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/keys/abc:decrypt"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid ciphertext"))
            .mount(&server)
            .await;

        let result = client(&server).decrypt("abc", b"garbage").await;
        assert!(matches!(result, Err(CryptoError::CorruptEnvelope(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server).encrypt("abc", b"dek").await;
        let err = result.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        let kms = RestKms::new(
            RestKmsConfig::new("http://127.0.0.1:1", "t").with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let result = kms.encrypt("abc", b"dek").await;
        assert!(matches!(result, Err(CryptoError::KeyManagementUnavailable(_))));
    }
}

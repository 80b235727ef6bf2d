//! Guardian REST API client.

use alp_vault::{ChainId, EmitterAddress};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::VaaSource;
use crate::error::ServiceError;

/// gRPC "not found" as surfaced by the guardian REST gateway.
const GRPC_NOT_FOUND: i64 = 5;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignedVaaResponse {
    Found {
        #[serde(rename = "vaaBytes")]
        vaa_bytes: String,
    },
    Error {
        code: i64,
        #[serde(default)]
        message: String,
    },
}

pub struct GuardianApi {
    client: reqwest::Client,
    base_url: String,
}

impl GuardianApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn signed_vaa_url(&self, chain: ChainId, emitter: EmitterAddress, sequence: u64) -> String {
        format!("{}/v1/signed_vaa/{chain}/{emitter}/{sequence}", self.base_url)
    }
}

fn decode_response(body: SignedVaaResponse) -> Result<Option<Vec<u8>>, ServiceError> {
    match body {
        SignedVaaResponse::Found { vaa_bytes } => STANDARD
            .decode(vaa_bytes)
            .map(Some)
            .map_err(|e| ServiceError::Decode(format!("vaaBytes is not base64: {e}"))),
        SignedVaaResponse::Error { code, .. } if code == GRPC_NOT_FOUND => Ok(None),
        SignedVaaResponse::Error { code, message } => Err(ServiceError::Decode(format!(
            "guardian API error {code}: {message}"
        ))),
    }
}

#[async_trait]
impl VaaSource for GuardianApi {
    async fn signed_vaa(
        &self,
        chain: ChainId,
        emitter: EmitterAddress,
        sequence: u64,
    ) -> Result<Option<Vec<u8>>, ServiceError> {
        let url = self.signed_vaa_url(chain, emitter, sequence);
        debug!(%url, "Fetching signed VAA");
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode_response(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alp_vault::Address;

    #[test]
    fn test_signed_vaa_url_uses_padded_emitter() {
        let api = GuardianApi::new(reqwest::Client::new(), "https://guardian.example/");
        let emitter = Address([0x11; 20]).to_emitter();
        let url = api.signed_vaa_url(2, emitter, 7);
        assert_eq!(
            url,
            format!(
                "https://guardian.example/v1/signed_vaa/2/{}{}/7",
                "00".repeat(12),
                "11".repeat(20)
            )
        );
    }

    #[test]
    fn test_decode_found_and_not_found() {
        let found: SignedVaaResponse = serde_json::from_str(r#"{"vaaBytes":"AQID"}"#).unwrap();
        assert_eq!(decode_response(found).unwrap(), Some(vec![1, 2, 3]));

        let missing: SignedVaaResponse =
            serde_json::from_str(r#"{"code":5,"message":"requested VAA not found in store"}"#)
                .unwrap();
        assert_eq!(decode_response(missing).unwrap(), None);

        let other: SignedVaaResponse =
            serde_json::from_str(r#"{"code":13,"message":"internal"}"#).unwrap();
        assert!(decode_response(other).is_err());
    }
}

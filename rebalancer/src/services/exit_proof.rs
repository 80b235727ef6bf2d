//! Polygon PoS exit payload API client.

use alp_vault::TxHash;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::ExitProofSource;
use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct ExitPayloadsResponse {
    #[serde(default)]
    result: Option<Vec<String>>,
}

pub struct ExitProofApi {
    client: reqwest::Client,
    base_url: String,
}

impl ExitProofApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn exit_payloads_url(&self, tx_hash: TxHash, event_signature: &str) -> String {
        format!(
            "{}/all-exit-payloads/{tx_hash}?eventSignature={event_signature}",
            self.base_url
        )
    }
}

/// A transaction can burn several tokens; the asset burn is the last one.
fn last_payload(body: ExitPayloadsResponse) -> Result<Option<Vec<u8>>, ServiceError> {
    let Some(payload) = body.result.and_then(|mut payloads| payloads.pop()) else {
        return Ok(None);
    };
    let raw = payload.strip_prefix("0x").unwrap_or(&payload);
    hex::decode(raw)
        .map(Some)
        .map_err(|e| ServiceError::Decode(format!("exit payload is not hex: {e}")))
}

#[async_trait]
impl ExitProofSource for ExitProofApi {
    async fn exit_payload(
        &self,
        tx_hash: TxHash,
        event_signature: &str,
    ) -> Result<Option<Vec<u8>>, ServiceError> {
        let url = self.exit_payloads_url(tx_hash, event_signature);
        debug!(%url, "Fetching exit payload");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            // Not checkpointed yet, or the tx is unknown to the indexer.
            return Ok(None);
        }
        last_payload(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alp_vault::constants::ERC20_TRANSFER_EVENT_SIG;

    #[test]
    fn test_last_payload_is_the_asset_burn() {
        let body: ExitPayloadsResponse =
            serde_json::from_str(r#"{"result":["0xaaaa","0xbeef"]}"#).unwrap();
        assert_eq!(last_payload(body).unwrap(), Some(vec![0xbe, 0xef]));
    }

    #[test]
    fn test_error_body_means_not_ready() {
        let body: ExitPayloadsResponse =
            serde_json::from_str(r#"{"error":true,"message":"Burn transaction has not been checkpointed yet"}"#)
                .unwrap();
        assert_eq!(last_payload(body).unwrap(), None);

        let body: ExitPayloadsResponse = serde_json::from_str(r#"{"result":[]}"#).unwrap();
        assert_eq!(last_payload(body).unwrap(), None);
    }

    #[test]
    fn test_exit_payloads_url() {
        let api = ExitProofApi::new(reqwest::Client::new(), "https://apis.example/api/v1/matic");
        let url = api.exit_payloads_url(TxHash([0xab; 32]), ERC20_TRANSFER_EVENT_SIG);
        assert!(url.starts_with("https://apis.example/api/v1/matic/all-exit-payloads/0xabab"));
        assert!(url.ends_with(&format!("?eventSignature={ERC20_TRANSFER_EVENT_SIG}")));
    }
}

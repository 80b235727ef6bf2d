//! Published address book of deployed contracts.

use std::collections::HashMap;

use alp_vault::Address;
use serde::Deserialize;
use tracing::info;

use crate::error::ServiceError;

/// L1 vault entry name.
pub const L1_VAULT: &str = "EthAlpSave";
/// L2 vault entry name.
pub const L2_VAULT: &str = "PolygonAlpSave";

#[derive(Debug, Clone, Deserialize)]
pub struct AddressBookEntry {
    pub address: Address,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub chain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct AddressBook {
    entries: HashMap<String, AddressBookEntry>,
}

impl AddressBook {
    pub fn url(base_url: &str, contract_version: &str) -> String {
        format!(
            "{}/{contract_version}/addressbook.json",
            base_url.trim_end_matches('/')
        )
    }

    pub async fn fetch(
        client: &reqwest::Client,
        base_url: &str,
        contract_version: &str,
    ) -> Result<Self, ServiceError> {
        let url = Self::url(base_url, contract_version);
        let book: Self = client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(%url, contracts = book.entries.len(), "Address book loaded");
        Ok(book)
    }

    pub fn address(&self, name: &str) -> Result<Address, ServiceError> {
        self.entries
            .get(name)
            .map(|entry| entry.address)
            .ok_or_else(|| ServiceError::MissingContract(name.to_string()))
    }
}

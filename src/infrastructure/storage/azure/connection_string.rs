//! Storage account connection strings

use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::DomainError;

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";
const DEV_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

/// Account name, key and service endpoints parsed from a connection string
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: String,
    pub blob_endpoint: String,
    pub queue_endpoint: String,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("blob_endpoint", &self.blob_endpoint)
            .field("queue_endpoint", &self.queue_endpoint)
            .finish()
    }
}

impl ConnectionString {
    /// Settings of the local storage emulator
    pub fn development() -> Self {
        Self {
            account_name: DEV_ACCOUNT_NAME.to_string(),
            account_key: DEV_ACCOUNT_KEY.to_string(),
            blob_endpoint: DEV_BLOB_ENDPOINT.to_string(),
            queue_endpoint: DEV_QUEUE_ENDPOINT.to_string(),
        }
    }
}

impl FromStr for ConnectionString {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pairs: HashMap<String, String> = s
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.split_once('='))
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();

        if pairs
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self::development());
        }

        let account_name = pairs.get("accountname").cloned().ok_or_else(|| {
            DomainError::configuration("Connection string is missing AccountName")
        })?;
        let account_key = pairs.get("accountkey").cloned().ok_or_else(|| {
            DomainError::configuration("Connection string is missing AccountKey")
        })?;

        let protocol = pairs
            .get("defaultendpointsprotocol")
            .map(String::as_str)
            .unwrap_or("https");
        let suffix = pairs
            .get("endpointsuffix")
            .map(String::as_str)
            .unwrap_or("core.windows.net");

        let endpoint = |explicit: &str, service: &str| {
            pairs
                .get(explicit)
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("{}://{}.{}.{}", protocol, account_name, service, suffix))
        };

        Ok(Self {
            blob_endpoint: endpoint("blobendpoint", "blob"),
            queue_endpoint: endpoint("queueendpoint", "queue"),
            account_name: account_name.clone(),
            account_key,
        })
    }
}

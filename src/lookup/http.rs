//! HTTP経由の様式区分照会

use super::ClassificationLookup;
use crate::error::{ChecklistError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassificationResponse {
    #[serde(default)]
    form_type: Option<String>,
}

/// `GET <endpoint>?equipmentId=<id>` → `{"formType": "..."}`
#[derive(Debug, Clone)]
pub struct HttpClassificationLookup {
    client: Client,
    endpoint: Url,
}

impl HttpClassificationLookup {
    pub fn new(endpoint: &str, timeout_seconds: u64) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ChecklistError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self { client, endpoint })
    }

    fn request_url(&self, equipment_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("equipmentId", equipment_id);
        url
    }
}

#[async_trait]
impl ClassificationLookup for HttpClassificationLookup {
    async fn form_type(&self, equipment_id: &str) -> Result<Option<String>> {
        let response = self.client.get(self.request_url(equipment_id)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ChecklistError::Lookup(format!("status {}", response.status())));
        }

        let body: ClassificationResponse = response.json().await?;
        Ok(body.form_type)
    }
}

//! HTTP client for the remote code-search service.

use super::{CodeLookup, LookupError, ResponseShape};
use crate::codes::CodeEntry;
use crate::config::RemoteConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub struct RemoteLookupClient {
    client: Client,
    base_url: Url,
    shape: ResponseShape,
    term_param: String,
    count_param: String,
    extra_params: Vec<(String, String)>,
}

impl RemoteLookupClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, LookupError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| LookupError::Config(format!("invalid base url {}: {e}", config.base_url)))?;

        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| LookupError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            shape: config.shape,
            term_param: config.term_param.clone(),
            count_param: config.count_param.clone(),
            extra_params: config
                .extra_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    /// Full request URL for `term`.
    pub fn request_url(&self, term: &str, limit: usize) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(&self.term_param, term);
            query.append_pair(&self.count_param, &limit.to_string());
            for (key, value) in &self.extra_params {
                query.append_pair(key, value);
            }
        }
        url
    }
}

#[async_trait]
impl CodeLookup for RemoteLookupClient {
    fn name(&self) -> &'static str {
        "remote"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<CodeEntry>, LookupError> {
        let url = self.request_url(term, limit);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        let mut entries = self.shape.parse(&body)?;
        entries.truncate(limit);

        debug!(hits = entries.len(), "Remote lookup finished");
        Ok(entries)
    }
}

//! Client backend forwarding CLI commands to a running `canopy serve`
//! instance over HTTP.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::Paged;
use crate::query::ProjectSummary;
use crate::server::{ErrorResponse, IndexRequest, IndexResponse, SummaryRequest, SymbolsRequest};
use crate::store::SymbolInfo;

pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .context("failed to build HTTP client")?,
        })
    }

    fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}{endpoint}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if status == StatusCode::OK {
            return response
                .json::<Resp>()
                .with_context(|| format!("invalid response from {url}"));
        }

        match response.json::<ErrorResponse>() {
            Ok(envelope) => bail!("server error ({:?}): {}", envelope.kind, envelope.error),
            Err(_) => bail!("server returned {status} for {url}"),
        }
    }

    pub fn index(&self, request: &IndexRequest) -> Result<IndexResponse> {
        self.post("/v1/index", request)
    }

    pub fn resolve(&self) -> Result<crate::engine::ResolveReport> {
        self.post("/v1/resolve", &serde_json::json!({}))
    }

    pub fn symbols(&self, request: &SymbolsRequest) -> Result<Paged<SymbolInfo>> {
        self.post("/v1/symbols", request)
    }

    pub fn search(&self, request: &SymbolsRequest) -> Result<Paged<SymbolInfo>> {
        self.post("/v1/search", request)
    }

    pub fn summary(&self, request: &SummaryRequest) -> Result<ProjectSummary> {
        self.post("/v1/summary", request)
    }
}

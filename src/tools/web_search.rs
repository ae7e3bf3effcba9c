//! Web search tool backed by the Tavily search API

use super::{Tool, ToolContext, ToolOutcome, ToolOutput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
enum SearchError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] serde_json::Error),
    #[error("Search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Search service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Search cancelled")]
    Cancelled,
}

/// Searches the web and returns the top results as JSON
pub struct WebSearchTool {
    client: Client,
    api_key: String,
    max_results: u32,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>, max_results: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            max_results,
            endpoint: TAVILY_ENDPOINT.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn search(&self, input: Value, ctx: &ToolContext) -> Result<String, SearchError> {
        let SearchInput { query } = serde_json::from_value(input)?;

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&SearchRequest {
                query: &query,
                max_results: self.max_results,
            })
            .send();

        let response = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(SearchError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response.json().await?;
        tracing::debug!(
            conv_id = %ctx.conversation_id,
            query = %query,
            results = parsed.results.len(),
            "Web search completed"
        );
        Ok(serde_json::to_string(&parsed.results)?)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "search_web"
    }

    fn description(&self) -> String {
        "Search the web for current information. Returns the top results with \
         title, url and a content snippet."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutcome {
        match self.search(input, &ctx).await {
            Ok(results) => ToolOutput::success(results),
            Err(e) => {
                tracing::warn!(conv_id = %ctx.conversation_id, error = %e, "Web search failed");
                ToolOutput::error(e.to_string())
            }
        }
        .into()
    }
}

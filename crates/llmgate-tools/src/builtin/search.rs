use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use wreq::Client;

use llmgate_common::{ToolDescriptor, ToolParam};

use crate::tool::{Tool, ToolFailure};

const API_URL_ENV: &str = "WEB_SEARCH_API_URL";
const API_KEY_ENV: &str = "WEB_SEARCH_API_KEY";

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: u32,
}

fn default_max_results() -> u32 {
    5
}

/// Web search backed by an external search API. The endpoint and its key
/// live in this process's environment only; the gateway never sees them.
pub struct WebSearchTool {
    client: Client,
    api_url: Option<String>,
    api_key: Option<String>,
}

impl WebSearchTool {
    pub fn from_env() -> Result<Self, wreq::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_url: std::env::var(API_URL_ENV).ok(),
            api_key: std::env::var(API_KEY_ENV).ok(),
        })
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "web_search".into(),
            summary: "Search the web and return the top results as JSON.".into(),
            parameters: vec![
                ToolParam {
                    name: "query".into(),
                    semantic_type: "string".into(),
                    required: true,
                    description: "Search terms.".into(),
                },
                ToolParam {
                    name: "max_results".into(),
                    semantic_type: "integer".into(),
                    required: false,
                    description: "Maximum number of results (default 5).".into(),
                },
            ],
        }
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolFailure> {
        let args: SearchArgs = serde_json::from_value(arguments)
            .map_err(|err| ToolFailure::InvalidArguments(err.to_string()))?;
        let Some(api_url) = self.api_url.as_deref() else {
            return Err(ToolFailure::Execution(format!(
                "web search is not configured (set {API_URL_ENV})"
            )));
        };

        let payload = serde_json::to_vec(&json!({
            "q": args.query,
            "count": args.max_results,
        }))
        .map_err(|err| ToolFailure::Execution(err.to_string()))?;
        let mut request = self
            .client
            .request(wreq::Method::POST, api_url)
            .header("content-type", "application/json")
            .body(payload);
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("authorization", format!("Bearer {key}"));
        }

        let resp = request
            .send()
            .await
            .map_err(|err| ToolFailure::Execution(err.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|err| ToolFailure::Execution(err.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ToolFailure::Execution(format!(
                "search backend returned {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }
        serde_json::from_slice(&body)
            .map_err(|err| ToolFailure::Execution(format!("search response decode: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_arguments() {
        let tool = WebSearchTool::from_env().unwrap();
        let err = tool.invoke(json!({"max_results": 3})).await.unwrap_err();
        assert!(matches!(err, ToolFailure::InvalidArguments(_)));
    }
}

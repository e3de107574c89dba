use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    answer: Option<String>,
    error: Option<String>,
}

/// HTTP client for the PetroRAG query endpoint.
///
/// The service is stateless: every request carries only the query text,
/// no session or conversation identifier.
#[derive(Clone)]
pub struct QueryClient {
    client: Client,
    base_url: String,
}

impl QueryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send a question and return the answer text.
    ///
    /// Failures all surface as errors whose display text is what the
    /// transcript shows after the "Error: " prefix:
    /// non-2xx status -> "Server error: <code>", a payload carrying an
    /// `error` field -> that text verbatim, transport and parse failures
    /// -> the underlying message.
    pub async fn query(&self, query: &str) -> Result<String> {
        let url = format!("{}/api/query", self.base_url);

        tracing::debug!(chars = query.chars().count(), "sending query");

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { query })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Server error: {}", response.status().as_u16()));
        }

        let body: QueryResponse = response.json().await?;

        if let Some(error) = body.error {
            return Err(anyhow!(error));
        }

        body.answer
            .ok_or_else(|| anyhow!("response carried neither answer nor error"))
    }
}

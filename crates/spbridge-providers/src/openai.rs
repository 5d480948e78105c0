use reqwest::Client;
use serde::{Deserialize, Serialize};
use spbridge_core::{BridgeError, ChatRequest, OpenAIConfig, ProviderError, Result};
use std::time::Duration;

pub const BRIDGE_KIND: &str = "mcp";
pub const BRIDGE_NAME: &str = "sharepoint";
pub const BRIDGE_DESCRIPTION: &str = "SharePoint document library bridge";

/// Client for the OpenAI Responses endpoint.
#[derive(Debug)]
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
pub struct ResponsesRequest {
    model: String,
    temperature: f64,
    input: Vec<InputMessage>,
    attachments: Vec<BridgeAttachment>,
}

#[derive(Debug, Serialize)]
struct InputMessage {
    role: &'static str,
    content: Vec<InputContent>,
}

#[derive(Debug, Serialize)]
struct InputContent {
    #[serde(rename = "type")]
    content_type: &'static str,
    text: String,
}

/// Tells the API how to launch the tool server. The dispatcher never
/// interprets it.
#[derive(Debug, Serialize)]
struct BridgeAttachment {
    kind: &'static str,
    name: &'static str,
    metadata: BridgeMetadata,
    server: BridgeServer,
}

#[derive(Debug, Serialize)]
struct BridgeMetadata {
    description: &'static str,
}

#[derive(Debug, Serialize)]
struct BridgeServer {
    command: String,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesRequest {
    pub fn from_chat(request: &ChatRequest) -> Self {
        Self {
            model: request.model.clone(),
            temperature: request.temperature,
            input: vec![InputMessage {
                role: "user",
                content: vec![InputContent {
                    content_type: "input_text",
                    text: request.prompt.clone(),
                }],
            }],
            attachments: vec![BridgeAttachment {
                kind: BRIDGE_KIND,
                name: BRIDGE_NAME,
                metadata: BridgeMetadata {
                    description: BRIDGE_DESCRIPTION,
                },
                server: BridgeServer {
                    command: request.server_command.clone(),
                    args: request.server_args.clone(),
                },
            }],
        }
    }
}

impl ResponsesResponse {
    fn into_text(self) -> String {
        if let Some(text) = self.output_text {
            return text;
        }

        self.output
            .into_iter()
            .filter(|item| item.item_type == "message")
            .flat_map(|item| item.content)
            .filter(|part| part.content_type == "output_text")
            .filter_map(|part| part.text)
            .collect()
    }
}

impl OpenAIProvider {
    pub fn new(config: &OpenAIConfig) -> Result<Self> {
        let api_key = config
            .require_api_key()
            .map_err(|_| {
                BridgeError::Provider(ProviderError::AuthFailed(
                    "OpenAI API key not found".to_string(),
                ))
            })?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Sends one request and returns the response text, or an empty string
    /// when the API produced none.
    pub async fn respond(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/responses", self.base_url);
        let body = ResponsesRequest::from_chat(request);

        tracing::debug!(
            model = %request.model,
            server_command = %request.server_command,
            "sending responses request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BridgeError::Provider(ProviderError::ApiError {
                provider: "openai".to_string(),
                message: format!("HTTP {}: {}", status, error_text),
            }));
        }

        let parsed: ResponsesResponse = response.json().await.map_err(|e| {
            BridgeError::Provider(ProviderError::InvalidResponse(format!("openai: {}", e)))
        })?;

        Ok(parsed.into_text())
    }
}

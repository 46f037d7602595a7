use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ChatRequest, LlmClient, LlmError};
use crate::config::LlmConfig;

/// Azure OpenAI chat-completions client.
pub struct AzureOpenAiClient {
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl AzureOpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            deployment: config.deployment.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl LlmClient for AzureOpenAiClient {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let body = ChatCompletionRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            temperature: request.temperature,
            response_format: request
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    LlmError::Connection(self.endpoint.clone())
                } else {
                    LlmError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        let choice = parsed.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(LlmError::ContentFiltered);
        }
        choice
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn deployment(&self) -> &str {
        &self.deployment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Serve exactly one canned HTTP response on a local port.
    fn one_shot_server(status: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                read_request(&mut stream);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    /// Consume headers and the declared body so the client sees a clean close.
    fn read_request(stream: &mut std::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = stream.read(&mut buf) else { return };
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn config(endpoint: &str) -> LlmConfig {
        LlmConfig {
            endpoint: endpoint.to_string(),
            api_key: "test-key".into(),
            api_version: "2024-06-01".into(),
            deployment: "aiva-gpt4".into(),
            temperature: 0.2,
            timeout_secs: 5,
            max_prompt_tokens: None,
        }
    }

    fn request() -> ChatRequest<'static> {
        ChatRequest {
            system: "systeem",
            user: "gebruiker",
            temperature: 0.2,
            json_response: true,
        }
    }

    #[test]
    fn url_targets_deployment() {
        let client = AzureOpenAiClient::new(&config("https://example.openai.azure.com/")).unwrap();
        assert_eq!(
            client.url(),
            "https://example.openai.azure.com/openai/deployments/aiva-gpt4/chat/completions?api-version=2024-06-01"
        );
        assert_eq!(client.deployment(), "aiva-gpt4");
    }

    #[test]
    fn request_body_asks_for_json_object() {
        let body = ChatCompletionRequest {
            messages: vec![ChatMessage { role: "system", content: "s" }],
            temperature: 0.2,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn returns_first_choice_content() {
        let endpoint = one_shot_server(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"Respiratie\":\"CPAP\"}"},"finish_reason":"stop"}]}"#,
        );
        let client = AzureOpenAiClient::new(&config(&endpoint)).unwrap();
        assert_eq!(client.complete(&request()).unwrap(), r#"{"Respiratie":"CPAP"}"#);
    }

    #[test]
    fn service_error_carries_status() {
        let endpoint = one_shot_server("429 Too Many Requests", r#"{"error":"rate limited"}"#);
        let client = AzureOpenAiClient::new(&config(&endpoint)).unwrap();
        let err = client.complete(&request()).unwrap_err();
        assert!(matches!(err, LlmError::Service { status: 429, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn empty_content_is_error() {
        let endpoint = one_shot_server(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":""},"finish_reason":"stop"}]}"#,
        );
        let client = AzureOpenAiClient::new(&config(&endpoint)).unwrap();
        assert_eq!(client.complete(&request()).unwrap_err(), LlmError::EmptyResponse);
    }

    #[test]
    fn content_filter_is_error() {
        let endpoint = one_shot_server(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"content_filter"}]}"#,
        );
        let client = AzureOpenAiClient::new(&config(&endpoint)).unwrap();
        assert_eq!(client.complete(&request()).unwrap_err(), LlmError::ContentFiltered);
    }

    #[test]
    fn unreachable_service_is_connection_error() {
        // Bind then drop to get a port with nothing listening
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let client = AzureOpenAiClient::new(&config(&format!("http://127.0.0.1:{port}"))).unwrap();
        let err = client.complete(&request()).unwrap_err();
        assert!(matches!(err, LlmError::Connection(_)), "{err:?}");
    }
}

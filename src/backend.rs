// src/backend.rs

use crate::config::HostedCredentials;
use crate::error::BackendError;
use crate::types::BackendKind;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_GENAI_API: &str = "https://bam-api.res.ibm.com";

const GENAI_API_VERSION: &str = "2024-03-19";
const MAX_NEW_TOKENS: u32 = 1024;
const MIN_NEW_TOKENS: u32 = 20;

/// A text-generation backend.
pub trait Generate {
    fn kind(&self) -> BackendKind;

    /// Runs one completion. `Ok(None)` means the backend produced no text.
    fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<Option<String>, BackendError>;
}

/// The two backends a run can be constructed with.
pub enum Backend {
    Local(OllamaClient),
    Hosted(HostedClient),
}

impl Generate for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Local(client) => client.kind(),
            Backend::Hosted(client) => client.kind(),
        }
    }

    fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<Option<String>, BackendError> {
        match self {
            Backend::Local(client) => client.generate(prompt, model, temperature),
            Backend::Hosted(client) => client.generate(prompt, model, temperature),
        }
    }
}

/// Model calls block for as long as inference takes, so the client has no timeout.
fn build_http_client() -> Client {
    Client::builder()
        .timeout(None::<Duration>)
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!("Failed to build HTTP client: {err}");
            Client::new()
        })
}

/// Pulls the `error` field out of a JSON error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<serde_json::Value>,
        message: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(serde_json::Value::String(msg)),
            ..
        }) => msg,
        Ok(ErrorBody {
            message: Some(msg), ..
        }) => msg,
        Ok(ErrorBody {
            error: Some(other), ..
        }) => other.to_string(),
        _ => body.trim().to_string(),
    }
}

// --- Local (Ollama) ---

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Client for the `/api/generate` endpoint of a local Ollama server.
pub struct OllamaClient {
    http: Client,
    host: String,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            http: build_http_client(),
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.host)
    }
}

impl Generate for OllamaClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<Option<String>, BackendError> {
        let request = OllamaGenerateRequest {
            model,
            prompt,
            stream: false,
            options: OllamaOptions { temperature },
        };

        let response = self.http.post(self.endpoint()).json(&request).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(BackendError::Response {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: OllamaGenerateResponse =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Some(parsed.response))
    }
}

// --- Hosted ---

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReturnOptions {
    pub input_text: bool,
}

/// Generation parameters sent with every hosted request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub temperature: f32,
    pub decoding_method: &'static str,
    pub return_options: ReturnOptions,
}

impl GenerationParameters {
    pub fn sampled(temperature: f32) -> Self {
        Self {
            max_new_tokens: MAX_NEW_TOKENS,
            min_new_tokens: MIN_NEW_TOKENS,
            temperature,
            decoding_method: "sample",
            return_options: ReturnOptions { input_text: true },
        }
    }
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    input: &'a str,
    parameters: &'a GenerationParameters,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GenerationResult {
    pub generated_text: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// One element of the hosted response stream.
#[derive(Deserialize, Debug, Clone)]
pub struct GenerationResponse {
    #[serde(default)]
    pub results: Vec<GenerationResult>,
}

/// Wraps a message the way the hosted instruction models expect.
pub fn hosted_input(message: &str) -> String {
    format!("Question: {}\n\nAnswer:\n", message)
}

/// Client for the hosted text-generation service.
pub struct HostedClient {
    http: Client,
    credentials: HostedCredentials,
}

impl HostedClient {
    pub fn new(credentials: HostedCredentials) -> Self {
        Self {
            http: build_http_client(),
            credentials,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v2/text/generation?version={}",
            self.credentials.api_endpoint.trim_end_matches('/'),
            GENAI_API_VERSION
        )
    }

    fn create_one(
        &self,
        model_id: &str,
        input: &str,
        parameters: &GenerationParameters,
    ) -> Result<GenerationResponse, BackendError> {
        let request = GenerationRequest {
            model_id,
            input,
            parameters,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.credentials.api_key)
            .json(&request)
            .send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(BackendError::Response {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Streams one response per input. Requests are sent lazily, as the iterator advances.
    pub fn create<'a>(
        &'a self,
        model_id: &'a str,
        inputs: &'a [String],
        parameters: &'a GenerationParameters,
    ) -> impl Iterator<Item = Result<GenerationResponse, BackendError>> + 'a {
        inputs
            .iter()
            .map(move |input| self.create_one(model_id, input, parameters))
    }
}

impl Generate for HostedClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Hosted
    }

    fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<Option<String>, BackendError> {
        let inputs = vec![hosted_input(prompt)];
        let parameters = GenerationParameters::sampled(temperature);

        for response in self.create(model, &inputs, &parameters) {
            let response = response?;
            if let Some(first) = response.results.into_iter().next() {
                tracing::debug!(stop_reason = ?first.stop_reason, "hosted generation finished");
                return Ok(Some(first.generated_text));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// A request as the server saw it: lowercased head, then the body.
    type Seen = (String, String);

    /// Serves one canned `(status, body)` reply per connection, then returns what it received.
    fn serve(replies: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<Seen>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, reply) in replies {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);

                let mut head = String::new();
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line.trim_end().is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                    head.push_str(&line.to_lowercase());
                }
                let mut body = vec![0; content_length];
                reader.read_exact(&mut body).unwrap();
                seen.push((head, String::from_utf8(body).unwrap()));

                let mut stream = reader.into_inner();
                write!(
                    stream,
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                    reply.len()
                )
                .unwrap();
                stream.flush().unwrap();
            }
            seen
        });

        (base, handle)
    }

    fn hosted_client(base: String) -> HostedClient {
        HostedClient::new(HostedCredentials {
            api_key: "secret".to_string(),
            api_endpoint: base,
        })
    }

    #[test]
    fn ollama_reply_text_is_returned() {
        let (base, server) = serve(vec![(200, r#"{"model":"m","response":"```java\nA\n```","done":true}"#)]);

        let text = OllamaClient::new(base).generate("hi", "m", 0.5).unwrap();
        assert_eq!(text.as_deref(), Some("```java\nA\n```"));

        let seen = server.join().unwrap();
        assert!(seen[0].0.starts_with("post /api/generate "));
        let body: serde_json::Value = serde_json::from_str(&seen[0].1).unwrap();
        assert_eq!(body["prompt"], "hi");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn ollama_error_reply_carries_the_server_message() {
        let (base, server) = serve(vec![(404, r#"{"error":"model 'nope' not found"}"#)]);

        let err = OllamaClient::new(base).generate("hi", "nope", 0.25).unwrap_err();
        match err {
            BackendError::Response { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model 'nope' not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn unreachable_ollama_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = OllamaClient::new(base).generate("hi", "m", 0.25).unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[test]
    fn hosted_returns_the_first_result() {
        let (base, server) = serve(vec![(
            200,
            r#"{"results":[{"generated_text":"first","stop_reason":"eos_token"},{"generated_text":"second"}]}"#,
        )]);

        let text = hosted_client(base)
            .generate("hi", "ibm/granite-34b-code-instruct", 0.25)
            .unwrap();
        assert_eq!(text.as_deref(), Some("first"));

        let seen = server.join().unwrap();
        let (head, body) = &seen[0];
        assert!(head.starts_with("post /v2/text/generation?version=2024-03-19 "));
        assert!(head.contains("authorization: bearer secret"));
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["model_id"], "ibm/granite-34b-code-instruct");
        assert_eq!(body["input"], "Question: hi\n\nAnswer:\n");
        assert_eq!(body["parameters"]["decoding_method"], "sample");
    }

    #[test]
    fn hosted_without_results_is_none() {
        let (base, server) = serve(vec![(200, r#"{"results":[]}"#)]);

        let text = hosted_client(base).generate("hi", "m", 0.25).unwrap();
        assert_eq!(text, None);
        server.join().unwrap();
    }

    #[test]
    fn hosted_stream_yields_one_response_per_input() {
        let (base, server) = serve(vec![
            (200, r#"{"results":[]}"#),
            (200, r#"{"results":[{"generated_text":"B"}]}"#),
        ]);

        let client = hosted_client(base);
        let inputs = vec![hosted_input("a"), hosted_input("b")];
        let parameters = GenerationParameters::sampled(0.25);
        let responses: Vec<GenerationResponse> = client
            .create("m", &inputs, &parameters)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(responses.len(), 2);
        assert!(responses[0].results.is_empty());
        assert_eq!(responses[1].results[0].generated_text, "B");
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn hosted_error_reply_carries_the_server_message() {
        let (base, server) = serve(vec![(401, r#"{"status_code":401,"message":"Unauthorized"}"#)]);

        let err = hosted_client(base).generate("hi", "m", 0.25).unwrap_err();
        assert!(matches!(
            err,
            BackendError::Response { status: 401, ref message } if message == "Unauthorized"
        ));
        server.join().unwrap();
    }

    #[test]
    fn hosted_input_wraps_question_and_answer() {
        assert_eq!(hosted_input("Do it"), "Question: Do it\n\nAnswer:\n");
    }

    #[test]
    fn sampled_parameters_serialize_with_fixed_bounds() {
        let json = serde_json::to_value(GenerationParameters::sampled(0.25)).unwrap();
        assert_eq!(json["max_new_tokens"], 1024);
        assert_eq!(json["min_new_tokens"], 20);
        assert_eq!(json["decoding_method"], "sample");
        assert_eq!(json["return_options"]["input_text"], true);
        assert!((json["temperature"].as_f64().unwrap() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn ollama_request_disables_streaming() {
        let request = OllamaGenerateRequest {
            model: "granite-code:20b-instruct",
            prompt: "hi",
            stream: false,
            options: OllamaOptions { temperature: 0.5 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "granite-code:20b-instruct");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.5);
    }

    #[test]
    fn ollama_endpoint_tolerates_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(
            error_message(r#"{"error":"model 'nope' not found"}"#),
            "model 'nope' not found"
        );
        assert_eq!(
            error_message(r#"{"status_code":401,"message":"Unauthorized"}"#),
            "Unauthorized"
        );
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
    }

    #[test]
    fn generation_response_tolerates_missing_results() {
        let parsed: GenerationResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(parsed.results.is_empty());
        let parsed: GenerationResponse = serde_json::from_str(
            r#"{"results":[{"generated_text":"```java\nA\n```","stop_reason":"eos_token"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.results[0].stop_reason.as_deref(), Some("eos_token"));
    }
}

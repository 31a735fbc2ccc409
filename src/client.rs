use std::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ExplorerConfig;
use crate::directives::CompileInfo;
use crate::errors::{Result, SlideboltError};
use crate::report::strip_ansi;
use crate::retry::{retry, Attempt, RetryPolicy};

/// Client for the Compiler Explorer REST API
#[derive(Clone)]
pub struct ExplorerClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

/// Body of `POST /api/compiler/{id}/compile`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub source: String,
    pub compiler: String,
    pub lang: String,
    pub options: RequestOptions,
    pub allow_store_code_debug: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub user_arguments: String,
    pub filters: RequestFilters,
    pub libraries: Vec<RequestLibrary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestFilters {
    pub execute: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestLibrary {
    pub id: String,
    pub version: String,
}

/// One line of compiler or program output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputLine {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    #[serde(default)]
    pub did_execute: bool,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub stdout: Vec<OutputLine>,
    #[serde(default)]
    pub stderr: Vec<OutputLine>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub code: i32,
    #[serde(default)]
    pub stdout: Vec<OutputLine>,
    #[serde(default)]
    pub stderr: Vec<OutputLine>,
    #[serde(default)]
    pub exec_result: Option<ExecResult>,
}

impl CompileRequest {
    pub fn from_info(info: &CompileInfo) -> Self {
        Self {
            source: info.source.clone(),
            compiler: info.compiler.clone(),
            lang: info.language.clone(),
            options: RequestOptions {
                user_arguments: info.options.clone(),
                filters: RequestFilters {
                    execute: info.execute,
                },
                libraries: info
                    .libs
                    .iter()
                    .map(|lib| RequestLibrary {
                        id: lib.name.clone(),
                        version: lib.version.clone(),
                    })
                    .collect(),
            },
            allow_store_code_debug: false,
        }
    }
}

impl CompileResponse {
    /// Exit code that decides pass/fail: the program's when it ran, else the compiler's
    pub fn effective_code(&self, execute: bool) -> i32 {
        match &self.exec_result {
            Some(exec) if execute && exec.did_execute => exec.code,
            _ => self.code,
        }
    }

    /// Compiler stderr followed by program stderr, ANSI-stripped
    pub fn stderr_text(&self) -> String {
        let mut lines: Vec<&OutputLine> = self.stderr.iter().collect();
        if let Some(exec) = &self.exec_result {
            lines.extend(exec.stderr.iter());
        }
        join_lines(lines)
    }

    /// Program stdout when it ran, else compiler stdout, ANSI-stripped
    pub fn stdout_text(&self) -> String {
        match &self.exec_result {
            Some(exec) if exec.did_execute => join_lines(exec.stdout.iter()),
            _ => join_lines(self.stdout.iter()),
        }
    }
}

fn join_lines<'a>(lines: impl IntoIterator<Item = &'a OutputLine>) -> String {
    let joined = lines
        .into_iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    strip_ansi(&joined)
}

impl ExplorerClient {
    pub fn new(config: &ExplorerConfig, policy: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| SlideboltError::config_error("user_agent is not a valid header value"))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| SlideboltError::ConfigError {
                message: "Failed to create HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;

        Ok(Self { client, policy })
    }

    /// Compile a snippet, retrying server errors and transport failures
    pub async fn compile(&self, info: &CompileInfo) -> Result<CompileResponse> {
        let url = compile_url(&info.base_url, &info.compiler)?;
        let request = CompileRequest::from_info(info);

        info!("Compiling with {} at {}", info.compiler, url);

        retry(&self.policy, |attempt| {
            let url = url.clone();
            let request = &request;
            async move {
                debug!("POST {} (attempt {})", url, attempt + 1);
                self.send(&url, request).await.map_err(classify)
            }
        })
        .await
    }

    async fn send(&self, url: &str, request: &CompileRequest) -> Result<CompileResponse> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|source| SlideboltError::NetworkError {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| SlideboltError::NetworkError {
                url: url.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(SlideboltError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| SlideboltError::InvalidResponse {
            message: format!("could not decode compile result from {}", url),
            source: Some(Box::new(e)),
        })
    }

    /// Compile a snippet and hold the result to its expectations
    pub async fn check(&self, info: &CompileInfo) -> Result<CompileResponse> {
        let response = self.compile(info).await?;
        verify(info, &response)?;
        Ok(response)
    }
}

/// Server errors and transport failures may clear up on a later attempt
fn classify(err: SlideboltError) -> Attempt<SlideboltError> {
    if err.is_recoverable() {
        Attempt::Retry(err)
    } else {
        Attempt::Abort(err)
    }
}

/// Build the compile endpoint for `compiler` on the instance at `base_url`
pub fn compile_url(base_url: &str, compiler: &str) -> Result<String> {
    let mut base = url::Url::parse(base_url).map_err(|e| SlideboltError::ConfigError {
        message: format!("invalid base URL {}", base_url),
        source: Some(Box::new(e)),
    })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let endpoint = format!("api/compiler/{}/compile", urlencoding::encode(compiler));
    base.join(&endpoint)
        .map(String::from)
        .map_err(|e| SlideboltError::config_error(format!("invalid compiler id {}: {}", compiler, e)))
}

/// Check a compile result against what the snippet declares
pub fn verify(info: &CompileInfo, response: &CompileResponse) -> Result<()> {
    let code = response.effective_code(info.execute);

    match (&info.fail_reason, code) {
        (None, 0) => {}
        (None, code) => {
            return Err(SlideboltError::compile_failed(
                &info.compiler,
                code,
                response.stderr_text(),
                response.stdout_text(),
            ));
        }
        (Some(reason), 0) => {
            return Err(SlideboltError::UnexpectedSuccess {
                reason: reason.clone(),
            });
        }
        (Some(reason), code) => {
            debug!("Snippet failed as expected ({}) with code {}", reason, code);
        }
    }

    if !info.expected_output.is_empty() {
        let actual = response.stdout_text();
        for expected in &info.expected_output {
            if !actual.lines().any(|line| line.contains(expected.as_str())) {
                return Err(SlideboltError::OutputMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::directives::DirectiveParser;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            factor: 1.0,
            min_timeout: Duration::from_millis(1),
            max_timeout: Duration::from_millis(1),
        }
    }

    fn info_for(server: &MockServer, text: &str) -> CompileInfo {
        let mut config = Config::default();
        config.explorer.base_url = server.uri();
        DirectiveParser::new(&config).parse(text).info
    }

    fn client() -> ExplorerClient {
        ExplorerClient::new(&ExplorerConfig::default(), fast_policy()).unwrap()
    }

    #[test]
    fn test_compile_url() {
        assert_eq!(
            compile_url("https://godbolt.org/", "g82").unwrap(),
            "https://godbolt.org/api/compiler/g82/compile"
        );
        assert_eq!(
            compile_url("https://example.com/ce", "clang1600").unwrap(),
            "https://example.com/ce/api/compiler/clang1600/compile"
        );
        assert!(compile_url("not a url", "g82").is_err());
    }

    #[test]
    fn test_request_payload_shape() {
        let info = DirectiveParser::default()
            .parse("/// libs=fmt:trunk\n/// execute\nint main() {}\n")
            .info;
        let value = serde_json::to_value(CompileRequest::from_info(&info)).unwrap();

        assert_eq!(value["source"], "int main() {}\n");
        assert_eq!(value["options"]["userArguments"], info.options.as_str());
        assert_eq!(value["options"]["filters"]["execute"], true);
        assert_eq!(value["options"]["libraries"][0], json!({"id": "fmt", "version": "trunk"}));
        assert_eq!(value["allowStoreCodeDebug"], false);
    }

    #[tokio::test]
    async fn test_compile_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/compiler/g92/compile"))
            .and(header("accept", "application/json"))
            .and(body_partial_json(json!({"source": "int main() {}\n"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "stdout": [],
                "stderr": [],
                "asm": [{"text": "main:"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let info = info_for(&server, "/// compiler=g92\nint main() {}\n");
        let response = client().check(&info).await.unwrap();
        assert_eq!(response.code, 0);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
            .mount(&server)
            .await;

        let info = info_for(&server, "int main() {}\n");
        let response = client().compile(&info).await.unwrap();
        assert_eq!(response.code, 0);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Unknown compiler"))
            .mount(&server)
            .await;

        let info = info_for(&server, "/// compiler=nope\nint main() {}\n");
        let err = client().compile(&info).await.unwrap_err();
        assert!(matches!(err, SlideboltError::HttpStatus { status: 404, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let info = info_for(&server, "int main() {}\n");
        let err = client().compile(&info).await.unwrap_err();
        assert!(matches!(err, SlideboltError::HttpStatus { status: 500, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        // Bind then drop so nothing listens on the port
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let base_url = format!("http://127.0.0.1:{port}/");

        let mut config = Config::default();
        config.explorer.base_url = base_url.clone();
        let info = DirectiveParser::new(&config).parse("int main() {}\n").info;

        let policy = RetryPolicy {
            retries: 2,
            ..fast_policy()
        };
        let client = ExplorerClient::new(&config.explorer, policy.clone()).unwrap();

        let err = client.compile(&info).await.unwrap_err();
        assert!(matches!(err, SlideboltError::NetworkError { .. }));
        assert!(err.is_recoverable());

        let url = compile_url(&base_url, "g82").unwrap();
        let request = CompileRequest::from_info(&info);
        let calls = AtomicU32::new(0);
        let result = retry(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            let (client, url, request) = (&client, &url, &request);
            async move { client.send(url, request).await.map_err(classify) }
        })
        .await;

        assert!(matches!(result, Err(SlideboltError::NetworkError { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_compile_carries_stderr() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1,
                "stdout": [],
                "stderr": [{"text": "\u{1b}[01;31merror:\u{1b}[0m expected ';'"}]
            })))
            .mount(&server)
            .await;

        let info = info_for(&server, "int x\n");
        let err = client().check(&info).await.unwrap_err();
        match err {
            SlideboltError::CompileFailed { code, stderr, .. } => {
                assert_eq!(code, 1);
                assert_eq!(stderr, "error: expected ';'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let info = info_for(&server, "int main() {}\n");
        let err = client().compile(&info).await.unwrap_err();
        assert!(matches!(err, SlideboltError::InvalidResponse { .. }));
    }

    #[test]
    fn test_verify_expected_failure() {
        let info = DirectiveParser::default().parse("/// fails=narrowing\nint x{1.5};\n").info;

        let failed = CompileResponse { code: 1, ..Default::default() };
        assert!(verify(&info, &failed).is_ok());

        let passed = CompileResponse { code: 0, ..Default::default() };
        assert!(matches!(
            verify(&info, &passed),
            Err(SlideboltError::UnexpectedSuccess { .. })
        ));
    }

    #[test]
    fn test_verify_uses_exec_result() {
        let info = DirectiveParser::default()
            .parse("/// output=hello\nint main() {}\n")
            .info;

        let response = CompileResponse {
            code: 0,
            exec_result: Some(ExecResult {
                did_execute: true,
                code: 0,
                stdout: vec![OutputLine { text: "hello world".into() }],
                stderr: vec![],
            }),
            ..Default::default()
        };
        assert!(verify(&info, &response).is_ok());

        let crashed = CompileResponse {
            code: 0,
            exec_result: Some(ExecResult {
                did_execute: true,
                code: 139,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            verify(&info, &crashed),
            Err(SlideboltError::CompileFailed { code: 139, .. })
        ));

        let wrong_output = CompileResponse {
            code: 0,
            exec_result: Some(ExecResult {
                did_execute: true,
                stdout: vec![OutputLine { text: "goodbye".into() }],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            verify(&info, &wrong_output),
            Err(SlideboltError::OutputMismatch { .. })
        ));
    }
}

//! REST client for the comparison service.
//!
//! Speaks JSON over HTTP through a spawned `curl` process, so the crate
//! carries no TLS stack of its own. Transport failures surface as
//! [`EngineError`] and are never retried here; retry policy belongs to the
//! service side of the seam.
//!
//! # Configuration
//!
//! Settings default from the environment (see [`crate::config`]):
//! - `WEB_VISION_SERVER_URL`: service base URL
//! - `WEB_VISION_API_KEY`: key appended to every request
//! - `WEB_VISION_CONNECT_TIMEOUT` / `WEB_VISION_REQUEST_TIMEOUT`: curl limits

use base64::Engine;
use std::process::Command;

use crate::config;
use crate::engine::types::{
    EngineError, EngineResult, MatchResult, MatchWindowData, RunningSession, SessionStartInfo,
    TestResult,
};
use crate::engine::ComparisonEngine;

/// Configuration for the REST engine client
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the comparison service
    pub server_url: String,
    /// API key appended as a query parameter (empty disables)
    pub api_key: String,
    /// Timeout for establishing the connection (seconds)
    pub connect_timeout: u64,
    /// Timeout for the whole request (seconds)
    pub request_timeout: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            server_url: cfg.server.url.clone(),
            api_key: cfg.server.api_key.clone(),
            connect_timeout: cfg.server.connect_timeout,
            request_timeout: cfg.server.request_timeout,
        }
    }
}

impl RestConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout = seconds;
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = seconds;
        self
    }
}

/// Check if a comparison service endpoint is reachable (connection-only check).
///
/// Any HTTP response, even an error status, counts as reachable; only a
/// failed connection does not.
pub fn check_health(server_url: &str, timeout_secs: u64) -> EngineResult<bool> {
    let output = Command::new("curl")
        .args([
            "-s",
            "-o",
            "/dev/null",
            "-w",
            "%{http_code}",
            "--connect-timeout",
            &timeout_secs.to_string(),
            "--max-time",
            &timeout_secs.to_string(),
            "-I",
            server_url,
        ])
        .output()?;

    let status = String::from_utf8_lossy(&output.stdout);
    // 000 means the connection failed entirely
    let code: u16 = status.trim().parse().unwrap_or(0);
    Ok(code > 0)
}

/// [`ComparisonEngine`] implementation over the service's REST surface
#[derive(Debug, Clone)]
pub struct RestEngine {
    config: RestConfig,
}

impl RestEngine {
    /// Create a client with the given configuration
    pub fn new(config: RestConfig) -> Self {
        Self { config }
    }

    /// Create a client configured from the environment
    pub fn from_env() -> Self {
        Self::new(RestConfig::default())
    }

    /// Build a full URL for a path under the service, appending the API key
    fn endpoint(&self, path: &str, extra_query: Option<&str>) -> String {
        let base = self.config.server_url.trim_end_matches('/');
        let mut url = format!("{}{}", base, path);
        let mut separator = '?';
        if !self.config.api_key.is_empty() {
            url.push(separator);
            url.push_str("apiKey=");
            url.push_str(&self.config.api_key);
            separator = '&';
        }
        if let Some(query) = extra_query {
            url.push(separator);
            url.push_str(query);
        }
        url
    }

    /// Run one HTTP request through curl, returning status code and body
    fn request(&self, method: &str, url: &str, body: Option<String>) -> EngineResult<(u16, String)> {
        let connect_timeout = self.config.connect_timeout.to_string();
        let request_timeout = self.config.request_timeout.to_string();

        let mut args: Vec<String> = vec![
            "-s".to_string(),
            "-X".to_string(),
            method.to_string(),
            url.to_string(),
            "-H".to_string(),
            "Content-Type: application/json".to_string(),
            // Status code on its own trailing line, after the body
            "-w".to_string(),
            "\n%{http_code}".to_string(),
            "--connect-timeout".to_string(),
            connect_timeout,
            "--max-time".to_string(),
            request_timeout,
        ];
        if let Some(payload) = body {
            args.push("-d".to_string());
            args.push(payload);
        }

        let output = Command::new("curl").args(&args).output()?;
        if !output.status.success() {
            return Err(EngineError::ConnectionFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        let (body, status_line) = text
            .rsplit_once('\n')
            .ok_or_else(|| EngineError::InvalidResponse("missing status marker".to_string()))?;
        let status: u16 = status_line
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidResponse(format!("bad status: {}", status_line)))?;
        Ok((status, body.to_string()))
    }

    /// Parse a 2xx response body, or map the status to a server error
    fn parse<T: serde::de::DeserializeOwned>(&self, status: u16, body: String) -> EngineResult<T> {
        if !(200..300).contains(&status) {
            return Err(EngineError::Server { status, body });
        }
        serde_json::from_str(&body).map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

impl ComparisonEngine for RestEngine {
    fn open_session(&self, info: &SessionStartInfo) -> EngineResult<RunningSession> {
        let payload = serde_json::json!({ "startInfo": info });
        let body = serde_json::to_string(&payload)
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let url = self.endpoint("/api/sessions/running", None);
        let (status, response) = self.request("POST", &url, Some(body))?;
        self.parse(status, response)
    }

    fn match_window(
        &self,
        session: &RunningSession,
        data: &MatchWindowData,
    ) -> EngineResult<MatchResult> {
        let screenshot64 =
            base64::engine::general_purpose::STANDARD.encode(&data.app_output.screenshot_png);
        let payload = serde_json::json!({
            "appOutput": {
                "title": data.app_output.title,
                "screenshot64": screenshot64,
            },
            "tag": data.tag,
            "ignoreMismatch": data.ignore_mismatch,
            "matchTimeoutMs": data.match_timeout_ms,
            "region": data.region,
        });
        let body = serde_json::to_string(&payload)
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let url = self.endpoint(&format!("/api/sessions/running/{}", session.id), None);
        let (status, response) = self.request("POST", &url, Some(body))?;
        self.parse(status, response)
    }

    fn close_session(&self, session: &RunningSession, aborted: bool) -> EngineResult<TestResult> {
        let url = self.endpoint(
            &format!("/api/sessions/running/{}", session.id),
            Some(&format!("aborted={}", aborted)),
        );
        let (status, response) = self.request("DELETE", &url, None)?;
        self.parse(status, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_api_key_and_query() {
        let engine = RestEngine::new(
            RestConfig::new("http://127.0.0.1:9090/").api_key("secret"),
        );
        assert_eq!(
            engine.endpoint("/api/sessions/running", None),
            "http://127.0.0.1:9090/api/sessions/running?apiKey=secret"
        );
        assert_eq!(
            engine.endpoint("/api/sessions/running/s1", Some("aborted=false")),
            "http://127.0.0.1:9090/api/sessions/running/s1?apiKey=secret&aborted=false"
        );
    }

    #[test]
    fn test_endpoint_without_api_key() {
        let engine = RestEngine::new(RestConfig::new("http://host:9090"));
        assert_eq!(
            engine.endpoint("/api/sessions/running/s1", Some("aborted=true")),
            "http://host:9090/api/sessions/running/s1?aborted=true"
        );
    }

    #[test]
    fn test_parse_rejects_error_status() {
        let engine = RestEngine::new(RestConfig::new("http://host"));
        let err = engine
            .parse::<MatchResult>(401, "unauthorized".to_string())
            .unwrap_err();
        match err {
            EngineError::Server { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rest_config_builder() {
        let config = RestConfig::new("http://host:9090")
            .api_key("k")
            .connect_timeout(3)
            .request_timeout(30);
        assert_eq!(config.server_url, "http://host:9090");
        assert_eq!(config.api_key, "k");
        assert_eq!(config.connect_timeout, 3);
        assert_eq!(config.request_timeout, 30);
    }
}

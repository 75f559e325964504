//! Thin `reqwest` wrapper over the HTTP surface in `cc_gateway::api`. Every
//! call returns the parsed JSON body or a [`CliError`] carrying the exit
//! code the caller should use.

use serde_json::Value;

use super::config::ResolvedConfig;

pub struct Client {
    http: reqwest::Client,
    config: ResolvedConfig,
}

/// Exit code table: 0 ok, 1 generic, 2 auth, 3 validation, 4 not found,
/// 5 quota exceeded.
pub struct CliError {
    pub exit_code: i32,
    pub message: String,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn exit_code_for_kind(kind: &str) -> i32 {
    match kind {
        "auth_missing" | "auth_invalid" | "forbidden" => 2,
        "validation_error" => 3,
        "not_found" => 4,
        "quota_exceeded" => 5,
        _ => 1,
    }
}

impl Client {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { http: reqwest::Client::new(), config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("X-Api-Key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, CliError> {
        let response = self.authed(builder).send().await.map_err(|e| CliError { exit_code: 1, message: e.to_string() })?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            Ok(body)
        } else {
            let kind = body.get("error").and_then(Value::as_str).unwrap_or("internal");
            let message = body.get("message").and_then(Value::as_str).unwrap_or("request failed").to_string();
            Err(CliError { exit_code: exit_code_for_kind(kind), message })
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value, CliError> {
        self.send(self.http.get(self.url(path))).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, CliError> {
        self.send(self.http.post(self.url(path)).json(&body)).await
    }

    pub fn org_id(&self) -> Option<&str> {
        self.config.org_id.as_deref()
    }
}

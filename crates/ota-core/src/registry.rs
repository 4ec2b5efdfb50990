use async_trait::async_trait;
use log::{debug, info};
use ota_ports::{CheckQuery, CheckResponse, PortError, RegistryPort, ReportAck, StatusReport};
use reqwest::Url;

const APP_ID_HEADER: &str = "X-App-Id";
const API_KEY_HEADER: &str = "X-API-Key";
const BODY_SNIPPET_CHARS: usize = 160;

/// Update registry reached over HTTP.
#[derive(Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    api_url: String,
    app_id: String,
    api_key: Option<String>,
}

impl HttpRegistry {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.is_empty());
        self
    }

    fn check_url(&self, query: &CheckQuery) -> Result<Url, PortError> {
        let code = query.current.code.to_string();
        Url::parse_with_params(
            &format!("{}/updates/check", self.api_url),
            [
                ("currentVersion", query.current.name.as_str()),
                ("currentVersionCode", code.as_str()),
                ("appId", query.app_id.as_str()),
                ("deviceId", query.device_id.as_str()),
            ],
        )
        .map_err(|error| PortError::http_request_from("update check", error))
    }

    fn report_url(&self, device_id: &str) -> Result<Url, PortError> {
        Url::parse_with_params(
            &format!("{}/updates/report", self.api_url),
            [("deviceId", device_id)],
        )
        .map_err(|error| PortError::http_request_from("status report", error))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(APP_ID_HEADER, &self.app_id);
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }
}

async fn ensure_success(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, PortError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body_snippet = response
        .text()
        .await
        .ok()
        .map(|body| response_snippet(&body, BODY_SNIPPET_CHARS))
        .unwrap_or_default();
    Err(PortError::HttpStatus {
        operation,
        status,
        body_snippet,
    })
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[async_trait]
impl RegistryPort for HttpRegistry {
    async fn check_for_update(&self, query: &CheckQuery) -> Result<CheckResponse, PortError> {
        let url = self.check_url(query)?;
        debug!("Checking for updates at {url}");

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|error| PortError::http_request_from("update check", error))?;
        let response = ensure_success("update check", response).await?;

        let body: CheckResponse = response
            .json()
            .await
            .map_err(|error| PortError::http_parse_from("update check", error))?;

        if let Some(update) = body.update.as_ref().filter(|_| body.update_available) {
            info!(
                "Registry offers {} (code {}) to {}",
                update.version_name, update.version_code, query.current
            );
        }
        Ok(body)
    }

    async fn report_status(
        &self,
        device_id: &str,
        report: &StatusReport,
    ) -> Result<ReportAck, PortError> {
        let url = self.report_url(device_id)?;
        debug!("Reporting {} for {} to {url}", report.status, report.to_version);

        let response = self
            .authorize(self.client.post(url))
            .json(report)
            .send()
            .await
            .map_err(|error| PortError::http_request_from("status report", error))?;
        let response = ensure_success("status report", response).await?;

        response
            .json()
            .await
            .map_err(|error| PortError::http_parse_from("status report", error))
    }
}

use std::time::Duration;

use serde::Deserialize;

use super::{CoachRequest, DirectorConfig, DirectorRequest, ServiceError, TuningService};

#[derive(Debug, Deserialize)]
struct CoachResponse {
    line: String,
}

/// Thin reqwest client for the tuning/coach endpoints
#[derive(Clone)]
pub struct HttpTuningService {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTuningService {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: serde::Serialize + Sync,
        T: serde::de::DeserializeOwned + Send,
    {
        let key = self.api_key.as_deref().ok_or(ServiceError::MissingCredential)?;
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.post(url).bearer_auth(key).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(text.trim())?)
    }
}

impl TuningService for HttpTuningService {
    async fn director_update(&self, request: &DirectorRequest) -> Result<DirectorConfig, ServiceError> {
        self.post("director", request).await
    }

    async fn coach_feedback(&self, request: &CoachRequest) -> Result<String, ServiceError> {
        let response: CoachResponse = self.post("coach", request).await?;
        if response.line.trim().is_empty() {
            return Err(ServiceError::Empty);
        }
        Ok(response.line)
    }
}

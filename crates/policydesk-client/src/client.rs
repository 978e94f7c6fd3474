use std::time::Duration;

use policydesk_core::{
    Agent, CarFull, CreatePolicyRequest, CreatePolicyResponse, DashboardStats, PersonFull, PersonNew,
    PolicyFull, PolicyShort, SearchRow, Settings, Suggestion, UpdatePolicyRequest,
};
use reqwest::{Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;

/// HTTP client for the back-office REST API.
///
/// Holds a cookie store, so the session cookie set by the auth endpoints is
/// sent with every later request. Cloning is cheap and shares the session.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
}

impl BackendClient {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        Self::with_base_url(
            &settings.api_url,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn with_base_url(base: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base = Url::parse(base).map_err(|_| ClientError::InvalidUrl(base.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base.to_string()));
        }
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Network {
                path: String::new(),
                source,
            })?;
        Ok(BackendClient { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // --- People ---

    pub async fn list_people(&self) -> Result<Vec<PersonFull>, ClientError> {
        self.get("people").await
    }

    pub async fn search_people(&self, query: &str) -> Result<Vec<Suggestion>, ClientError> {
        self.search("people", query).await
    }

    pub async fn get_person(&self, id: i32) -> Result<PersonFull, ClientError> {
        self.get(&format!("people/{id}")).await
    }

    pub async fn create_person(&self, person: &PersonNew) -> Result<PersonFull, ClientError> {
        self.send(Method::POST, "people", person).await
    }

    pub async fn update_person(&self, id: i32, person: &PersonNew) -> Result<PersonFull, ClientError> {
        self.send(Method::PUT, &format!("people/{id}"), person).await
    }

    // --- Cars ---

    pub async fn search_cars(&self, query: &str) -> Result<Vec<Suggestion>, ClientError> {
        self.search("cars", query).await
    }

    pub async fn get_car(&self, id: i32) -> Result<CarFull, ClientError> {
        self.get(&format!("cars/{id}")).await
    }

    // --- Policies ---

    pub async fn list_policies(&self) -> Result<Vec<PolicyShort>, ClientError> {
        self.get("policies").await
    }

    pub async fn get_policy(&self, id: i32) -> Result<PolicyFull, ClientError> {
        self.get(&format!("policies/{id}")).await
    }

    pub async fn create_policy(
        &self,
        request: &CreatePolicyRequest,
    ) -> Result<CreatePolicyResponse, ClientError> {
        self.send(Method::POST, "policies", request).await
    }

    pub async fn update_policy(
        &self,
        id: i32,
        request: &UpdatePolicyRequest,
    ) -> Result<PolicyFull, ClientError> {
        self.send(Method::PUT, &format!("policies/{id}"), request).await
    }

    // --- Agents & dashboard ---

    pub async fn list_agents(&self) -> Result<Vec<Agent>, ClientError> {
        self.get("agents").await
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, ClientError> {
        self.get("dashboard").await
    }

    // --- Plumbing ---

    /// `GET {collection}/search?q=` mapped to suggestions.
    pub async fn search(&self, collection: &str, query: &str) -> Result<Vec<Suggestion>, ClientError> {
        let path = format!("{collection}/search");
        let url = self.url(&path)?;
        tracing::debug!(%path, query, "searching");
        let response = self
            .http
            .get(url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|source| ClientError::Network {
                path: path.clone(),
                source,
            })?;
        let rows: Vec<SearchRow> = decode(&path, response).await?;
        Ok(rows.into_iter().map(Suggestion::from).collect())
    }

    /// `GET {collection}/{id}`.
    pub async fn fetch<T: DeserializeOwned>(&self, collection: &str, id: i32) -> Result<T, ClientError> {
        self.get(&format!("{collection}/{id}")).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path)?;
        tracing::debug!(%path, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Network {
                path: path.to_string(),
                source,
            })?;
        decode(path, response).await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.url(path)?;
        tracing::debug!(%method, %path, "sending");
        let response = self
            .http
            .request(method, url)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Network {
                path: path.to_string(),
                source,
            })?;
        decode(path, response).await
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|_| ClientError::InvalidUrl(format!("{}{path}", self.base)))
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await.map_err(|source| ClientError::Network {
        path: path.to_string(),
        source,
    })?;
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(path.to_string()));
    }
    if status == StatusCode::UNAUTHORIZED && !path.starts_with("auth/") {
        tracing::warn!(%path, "session rejected, login required");
        return Err(ClientError::Unauthorized);
    }
    if !status.is_success() {
        return Err(ClientError::Status {
            code: status.as_u16(),
            path: path.to_string(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| ClientError::Decode {
        path: path.to_string(),
        source,
    })
}

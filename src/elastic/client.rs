use super::config::ElasticConfig;
use super::error::ElasticError;
use super::models::BulkResponse;
use super::{BulkService, IndexAdmin};
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Clone)]
pub struct ElasticClient {
    http: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticClient {
    pub fn new(config: ElasticConfig) -> Result<Self, ElasticError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("esbulk/0.1")
            .build()
            .map_err(ElasticError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username,
            password: config.password,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url_for(path));
        match &self.username {
            Some(username) => builder.basic_auth(username, self.password.as_ref()),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ElasticError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error body".to_string());
        Err(ElasticError::status(status, body))
    }

    async fn send(&self, method: Method, path: &str) -> Result<reqwest::Response, ElasticError> {
        let response = self
            .request(method, path)
            .send()
            .await
            .map_err(ElasticError::Http)?;
        Self::check(response).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<reqwest::Response, ElasticError> {
        let response = self
            .request(method, path)
            .json(payload)
            .send()
            .await
            .map_err(ElasticError::Http)?;
        Self::check(response).await
    }

    /// Verify the cluster answers on its root endpoint.
    pub async fn ping(&self) -> Result<(), ElasticError> {
        let response = self.send(Method::GET, "/").await?;
        let info: Value = response.json().await.map_err(ElasticError::Http)?;
        let version = info
            .pointer("/version/number")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!("elasticsearch reachable at {} (version {})", self.base_url, version);
        Ok(())
    }
}

impl IndexAdmin for ElasticClient {
    async fn index_exists(&self, index: &str) -> Result<bool, ElasticError> {
        let response = self
            .request(Method::HEAD, &format!("/{}", index))
            .send()
            .await
            .map_err(ElasticError::Http)?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "failed to read error body".to_string());
                Err(ElasticError::status(other, body))
            }
        }
    }

    async fn delete_index(&self, index: &str) -> Result<(), ElasticError> {
        debug!("elasticsearch: DELETE /{index}");
        self.send(Method::DELETE, &format!("/{}", index)).await?;
        Ok(())
    }

    async fn create_index(&self, index: &str, body: Option<&Value>) -> Result<(), ElasticError> {
        debug!("elasticsearch: PUT /{index}");
        let path = format!("/{}", index);
        match body {
            Some(body) => self.send_json(Method::PUT, &path, body).await?,
            None => self.send(Method::PUT, &path).await?,
        };
        Ok(())
    }

    async fn refresh_index(&self, index: &str) -> Result<(), ElasticError> {
        debug!("elasticsearch: POST /{index}/_refresh");
        self.send(Method::POST, &format!("/{}/_refresh", index)).await?;
        Ok(())
    }
}

impl BulkService for ElasticClient {
    async fn bulk(&self, body: String) -> Result<BulkResponse, ElasticError> {
        let response = self
            .request(Method::POST, "/_bulk")
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(ElasticError::Http)?;

        let response = Self::check(response).await?;
        let bytes = response.bytes().await.map_err(ElasticError::Http)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

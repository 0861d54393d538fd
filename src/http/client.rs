use std::sync::Arc;

use bytes::Bytes;
use reqwest::{header, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::auth::dto::{RefreshRequest, RefreshResponse};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::Session;

pub const TOKEN_REFRESH_PATH: &str = "/auth/token/refresh/";

/// One outgoing request, including its single-retry marker.
///
/// The marker lives here rather than on the client so that concurrent
/// requests recover from 401 independently.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    bearer: Option<String>,
    retried: bool,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> ClientResult<Self> {
        self.body = Some(serde_json::to_value(body).map_err(ClientError::Encode)?);
        Ok(self)
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    /// Decodes the body; an empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        if self.body.iter().all(|b| b.is_ascii_whitespace()) {
            serde_json::from_value(Value::Null).map_err(ClientError::Decode)
        } else {
            serde_json::from_slice(&self.body).map_err(ClientError::Decode)
        }
    }
}

/// Request dispatcher bound to one API root and one session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    login_path: Arc<str>,
    session: Session,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Session) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self {
            http,
            base_url: config.api_base_url().trim_end_matches('/').into(),
            login_path: config.login_path.as_str().into(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Sends a request with the stored bearer token and, on a first 401,
    /// refreshes the access token and replays the request exactly once.
    #[instrument(skip(self, ctx), fields(method = %ctx.method, path = %ctx.path))]
    pub async fn execute(&self, mut ctx: RequestContext) -> ClientResult<ApiResponse> {
        self.attach_token(&mut ctx).await?;
        match self.dispatch(&ctx).await {
            Err(err) if err.is_unauthorized() && !ctx.retried => {
                self.recover_unauthorized(ctx, err).await
            }
            other => other,
        }
    }

    async fn attach_token(&self, ctx: &mut RequestContext) -> ClientResult<()> {
        ctx.bearer = self.session.access_token().await?;
        Ok(())
    }

    async fn recover_unauthorized(
        &self,
        mut ctx: RequestContext,
        original: ClientError,
    ) -> ClientResult<ApiResponse> {
        ctx.retried = true;

        let Some(refresh) = self.session.refresh_token().await? else {
            debug!("401 without refresh token");
            return Err(original);
        };

        warn!("access token rejected, refreshing");
        let refreshed = match self.refresh_access(&refresh).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                self.session.expire(&self.login_path).await;
                return Err(ClientError::AuthRefresh(Box::new(e)));
            }
        };

        self.session
            .update_access(&refreshed.access, refreshed.refresh.as_deref())
            .await?;
        ctx.bearer = Some(refreshed.access);

        // a second 401 from here is surfaced as-is
        self.dispatch(&ctx).await
    }

    /// Exchanges the refresh token outside of the interceptor chain.
    async fn refresh_access(&self, refresh: &str) -> ClientResult<RefreshResponse> {
        let response = self
            .http
            .post(self.url(TOKEN_REFRESH_PATH))
            .json(&RefreshRequest {
                refresh: refresh.to_string(),
            })
            .send()
            .await
            .map_err(ClientError::Network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(ClientError::Network)?;
        if !status.is_success() {
            return Err(ClientError::from_response(status, &body));
        }
        ApiResponse { status, body }.json()
    }

    async fn dispatch(&self, ctx: &RequestContext) -> ClientResult<ApiResponse> {
        let mut builder = self
            .http
            .request(ctx.method.clone(), self.url(&ctx.path))
            .header(header::ACCEPT, "application/json");
        if !ctx.query.is_empty() {
            builder = builder.query(&ctx.query);
        }
        if let Some(body) = &ctx.body {
            builder = builder.json(body);
        }
        if let Some(token) = &ctx.bearer {
            builder = builder.bearer_auth(token);
        }

        debug!(retried = ctx.retried, authorized = ctx.bearer.is_some(), "dispatch");
        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "request failed before a response");
            ClientError::Network(e)
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(ClientError::Network)?;
        debug!(%status, bytes = body.len(), "response");

        if status.is_success() {
            Ok(ApiResponse { status, body })
        } else {
            Err(ClientError::from_response(status, &body))
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.execute(RequestContext::get(path)).await?.json()
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let ctx = query
            .iter()
            .fold(RequestContext::get(path), |ctx, (k, v)| {
                ctx.with_query(k, v.clone())
            });
        self.execute(ctx).await?.json()
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(RequestContext::post(path).with_json(body)?)
            .await?
            .json()
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.execute(RequestContext::post(path)).await?.json()
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(RequestContext::new(Method::PATCH, path).with_json(body)?)
            .await?
            .json()
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.execute(RequestContext::new(Method::DELETE, path))
            .await
            .map(|_| ())
    }
}

//! Remote store adapters (ratings and favorites)
//!
//! Both adapters share one `StoreClient`, which attaches the session's bearer token
//! and a fresh request ID to every call. A missing identity fails the call before any
//! request is built.
use reqwest::{Client as HttpClient, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult, WriteOp},
    session::{Credentials, Session},
};

pub mod favorites;
pub mod ratings;
pub mod request_id;

pub use favorites::{FavoriteStore, HttpFavoriteStore};
pub use ratings::{HttpRatingStore, RatingStore};
pub use request_id::{RequestId, REQUEST_ID_HEADER};

#[derive(Clone)]
pub struct StoreClient {
    http_client: HttpClient,
    api_base: String,
    session: Session,
}

impl StoreClient {
    pub fn new(http_client: HttpClient, api_base: String, session: Session) -> Self {
        Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Builds an authorized request, or fails with `NotAuthenticated`
    async fn request(&self, method: Method, path: &str) -> AppResult<(RequestBuilder, Credentials)> {
        let credentials = self.session.credentials().await?;
        let request_id = RequestId::new();

        tracing::debug!(
            method = %method,
            path = %path,
            request_id = %request_id,
            "Store request"
        );

        let builder = self
            .http_client
            .request(method, self.url(path))
            .bearer_auth(&credentials.token)
            .header(REQUEST_ID_HEADER, request_id.as_str());

        Ok((builder, credentials))
    }

    /// GET a JSON document
    pub(crate) async fn read_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> AppResult<T> {
        let (request, _) = self.request(Method::GET, path).await?;

        let response = request
            .send()
            .await
            .map_err(|e| AppError::read_transport(operation, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                operation = operation,
                status = %status,
                body = %body,
                "Store read failed"
            );
            return Err(AppError::from_read_status(operation, status, body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::read_transport(operation, e))
    }

    /// Sends a write; the attempted `op` travels with any failure
    pub(crate) async fn write(
        &self,
        op: WriteOp,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AppResult<()> {
        let (mut request, credentials) = self.request(method, path).await?;
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::write_transport(op.clone(), e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                user_id = %credentials.user_id,
                op = %op,
                status = %status,
                body = %body,
                "Store write failed"
            );
            return Err(AppError::from_write_status(op, status, body));
        }

        tracing::debug!(user_id = %credentials.user_id, op = %op, "Store write acknowledged");
        Ok(())
    }
}

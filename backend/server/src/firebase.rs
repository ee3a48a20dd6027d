//! # Firebase Realtime Database
//!
//! REST client for the tree store.
//!
//! ## Protocol
//!
//! - Every path maps to `{base_url}/{path}.json`
//! - GET returns `null` for absent nodes
//! - PUT replaces, PATCH merges children, DELETE removes
//! - Credentials ride along as the `auth` query parameter
//!
//! ## Transactions
//!
//! Counters use conditional writes:
//! 1. GET with `X-Firebase-ETag: true` to read the value and its ETag
//! 2. PUT the incremented value with `if-match: <etag>`
//! 3. On `412 Precondition Failed` the body carries the current value and the
//!    response the new ETag, so retry from step 2
use async_trait::async_trait;
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    header::{ETAG, IF_MATCH},
};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{error::StoreError, store::TreeStore, tree::counter_value};

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";
const MAX_TRANSACTION_RETRIES: usize = 25;

pub struct FirebaseStore {
    client: Client,
    base_url: String,
    secret: Option<String>,
}

impl FirebaseStore {
    pub fn new(base_url: &str, secret: Option<&str>) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));

        match &self.secret {
            Some(secret) => request.query(&[("auth", secret)]),
            None => request,
        }
    }

    async fn read_with_etag(&self, path: &str) -> Result<(String, Value), StoreError> {
        let response = self
            .request(Method::GET, path)
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let etag = etag(&response)?;
        Ok((etag, response.json().await?))
    }
}

#[async_trait]
impl TreeStore for FirebaseStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let response = self.request(Method::GET, path).send().await?;
        let value: Value = ensure_success(response).await?.json().await?;

        Ok((!value.is_null()).then_some(value))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let response = self.request(Method::PUT, path).json(&value).send().await?;
        ensure_success(response).await?;

        Ok(())
    }

    async fn update(&self, path: &str, children: Map<String, Value>) -> Result<(), StoreError> {
        let response = self
            .request(Method::PATCH, path)
            .json(&children)
            .send()
            .await?;
        ensure_success(response).await?;

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let response = self.request(Method::DELETE, path).send().await?;
        ensure_success(response).await?;

        Ok(())
    }

    async fn fetch_add(&self, path: &str) -> Result<u64, StoreError> {
        let (mut etag, mut current) = self.read_with_etag(path).await?;

        for attempt in 0..MAX_TRANSACTION_RETRIES {
            let value = counter_value(Some(&current), path)?;

            let response = self
                .request(Method::PUT, path)
                .header(IF_MATCH, &etag)
                .json(&json!(value + 1))
                .send()
                .await?;

            if response.status() == StatusCode::PRECONDITION_FAILED {
                debug!("Counter {path} changed underneath us, retry {}", attempt + 1);

                etag = self::etag(&response)?;
                current = response.json().await?;
                continue;
            }

            ensure_success(response).await?;
            return Ok(value);
        }

        Err(StoreError::Contention(path.to_string()))
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

fn etag(response: &Response) -> Result<String, StoreError> {
    response
        .headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| StoreError::Status {
            status: response.status(),
            body: "response carried no ETag".to_string(),
        })
}

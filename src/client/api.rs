// src/client/api.rs

//! Blocking HTTP client for a pushreq server
//!
//! Every call maps onto one endpoint of the server. Failures carry the
//! server's own error messages so the operator sees why a request was
//! refused.

use crate::index::IndexConfig;
use crate::pr::PrListing;
use anyhow::{Context, Result, bail};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header an approver sends with the serial they reviewed
pub const PR_SERIAL_HEADER: &str = "X-Devpi-PR-Serial";

/// Header carrying the acting principal
pub const DEFAULT_USER_HEADER: &str = "X-Pushreq-User";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<String>,
}

/// Index configuration as reported by the server
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteIndex {
    /// Full `user/index` name
    pub name: String,
    pub last_serial: i64,
    #[serde(flatten)]
    pub config: IndexConfig,
}

/// Client for one pushreq server, acting as one principal
pub struct PushreqClient {
    client: Client,
    base_url: String,
    user: Option<String>,
    user_header: String,
}

impl PushreqClient {
    /// Create a new client
    pub fn new(base_url: &str, user: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.map(String::from),
            user_header: DEFAULT_USER_HEADER.to_string(),
        })
    }

    /// Override the header used to name the acting principal
    pub fn with_user_header(mut self, header: &str) -> Self {
        self.user_header = header.to_string();
        self
    }

    /// The acting principal, if any
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.user {
            Some(user) => builder.header(self.user_header.as_str(), user.as_str()),
            None => builder,
        }
    }

    fn send(&self, what: &str, builder: RequestBuilder) -> Result<Response> {
        let response = self
            .request(builder)
            .send()
            .with_context(|| format!("Failed to connect to {}", self.base_url))?;
        debug!("{} -> {}", what, response.status());

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body: ErrorBody = response.json().unwrap_or_default();
        bail!("{}", describe_failure(what, status, &body));
    }

    fn result<T: DeserializeOwned>(&self, what: &str, builder: RequestBuilder) -> Result<T> {
        let envelope: Envelope<T> = self
            .send(what, builder)?
            .json()
            .with_context(|| format!("Failed to parse response of {what}"))?;
        Ok(envelope.result)
    }

    /// Read an index configuration
    pub fn get_index(&self, name: &str) -> Result<RemoteIndex> {
        self.result(
            &format!("get index {name}"),
            self.client.get(self.url(name)),
        )
    }

    /// Read an index configuration, `None` if it does not exist
    pub fn find_index(&self, name: &str) -> Result<Option<RemoteIndex>> {
        let response = self
            .request(self.client.get(self.url(name)))
            .send()
            .with_context(|| format!("Failed to connect to {}", self.base_url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body: ErrorBody = response.json().unwrap_or_default();
            bail!("{}", describe_failure(&format!("get index {name}"), status, &body));
        }
        let envelope: Envelope<RemoteIndex> = response
            .json()
            .with_context(|| format!("Failed to parse index {name}"))?;
        Ok(Some(envelope.result))
    }

    /// Create an index
    pub fn create_index(&self, name: &str, config: &Value) -> Result<RemoteIndex> {
        self.result(
            &format!("create index {name}"),
            self.client.put(self.url(name)).json(config),
        )
    }

    /// Apply config ops to an index, optionally sending the reviewed serial
    pub fn patch_index(&self, name: &str, ops: &[String], serial: Option<&str>) -> Result<RemoteIndex> {
        let mut builder = self.client.patch(self.url(name)).json(&ops);
        if let Some(serial) = serial {
            builder = builder.header(PR_SERIAL_HEADER, serial);
        }
        self.result(&format!("modify index {name}"), builder)
    }

    /// Delete an index
    pub fn delete_index(&self, name: &str) -> Result<()> {
        self.send(
            &format!("delete index {name}"),
            self.client.delete(self.url(name)),
        )?;
        Ok(())
    }

    /// Listing of one index, see [`crate::pr::index_listing`]
    pub fn index_listing(&self, name: &str) -> Result<PrListing> {
        self.result(
            &format!("list push requests of {name}"),
            self.client.get(self.url(&format!("{name}/+pr-list"))),
        )
    }

    /// Listing of one user's staging indexes
    pub fn user_listing(&self, user: &str) -> Result<PrListing> {
        self.result(
            &format!("list push requests of user {user}"),
            self.client.get(self.url(&format!("{user}/+pr-list"))),
        )
    }

    /// Push one release from `index` into `target`, returns the number of files copied
    pub fn push(&self, index: &str, project: &str, version: &str, target: &str) -> Result<usize> {
        let body = json!({
            "name": project,
            "version": version,
            "targetindex": target,
        });
        let result: Value = self.result(
            &format!("push {project}=={version} to {target}"),
            self.client.post(self.url(&format!("{index}/+push"))).json(&body),
        )?;
        Ok(result["files"].as_u64().unwrap_or(0) as usize)
    }
}

fn describe_failure(what: &str, status: StatusCode, body: &ErrorBody) -> String {
    let mut out = format!("Failed to {what}: {status}");
    if body.errors.len() > 1 {
        for error in &body.errors {
            out.push_str("\n  ");
            out.push_str(error);
        }
    } else if !body.message.is_empty() {
        out.push_str(": ");
        out.push_str(&body.message);
    }
    out
}

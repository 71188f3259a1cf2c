use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// One visibility check against the relay.
#[async_trait]
pub trait RelayProbe: Send + Sync {
    /// Ok when the stream path is published and its source is ready.
    async fn check_stream(&self) -> std::result::Result<(), ProbeError>;

    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<P: RelayProbe + ?Sized> RelayProbe for Arc<P> {
    async fn check_stream(&self) -> std::result::Result<(), ProbeError> {
        (**self).check_stream().await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Response of `GET {api}/paths/list`
#[derive(Debug, Deserialize)]
pub struct PathList {
    #[serde(default)]
    pub items: Vec<PathItem>,
}

#[derive(Debug, Deserialize)]
pub struct PathItem {
    pub name: String,
    /// `sourceReady` in the v2 API, `ready` in v3
    #[serde(rename = "sourceReady", alias = "ready", default)]
    pub source_ready: bool,
}

impl PathList {
    pub fn check(&self, path: &str) -> std::result::Result<(), ProbeError> {
        let item = self
            .items
            .iter()
            .find(|item| item.name == path)
            .ok_or_else(|| ProbeError::PathMissing {
                path: path.to_string(),
            })?;

        if item.source_ready {
            Ok(())
        } else {
            Err(ProbeError::NotReady {
                path: path.to_string(),
            })
        }
    }
}

/// Relay control API client
pub struct HttpRelayProbe {
    http: reqwest::Client,
    api_url: String,
    list_url: String,
    stream_path: String,
}

impl HttpRelayProbe {
    pub fn new(api_url: &str, stream_path: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProbeError::from)?;

        let api_url = api_url.trim_end_matches('/').to_string();
        let list_url = format!("{}/paths/list", api_url);

        Ok(Self {
            http,
            api_url,
            list_url,
            stream_path: stream_path.to_string(),
        })
    }

    pub fn stream_path(&self) -> &str {
        &self.stream_path
    }
}

#[async_trait]
impl RelayProbe for HttpRelayProbe {
    async fn check_stream(&self) -> std::result::Result<(), ProbeError> {
        trace!("Querying {}", self.list_url);

        let resp = self.http.get(&self.list_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let list: PathList = resp.json().await?;
        debug!(
            "Relay lists {} paths, looking for '{}'",
            list.items.len(),
            self.stream_path
        );

        list.check(&self.stream_path)
    }

    fn endpoint(&self) -> &str {
        &self.api_url
    }
}

//! Release lookup backed by the GitHub "latest release" API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

use crate::config::ReleaseConfig;
use crate::error::{DnsError, LookupError};

/// Source of the most recent released version of a project.
#[async_trait]
pub trait ReleaseLookup: Send + Sync {
    /// Latest version tag of `project`, `None` if the project is unknown or
    /// has no releases.
    async fn latest(&self, project: &str) -> Result<Option<String>, LookupError>;
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: Option<String>,
}

/// GitHub releases of repositories owned by one account.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    http: reqwest::Client,
    api_url: Url,
    owner: String,
    token: Option<String>,
}

impl GithubReleases {
    /// Build a client from configuration.
    pub fn new(config: &ReleaseConfig) -> Result<Self, DnsError> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| DnsError::Config(format!("invalid releases.api_url: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            api_url,
            owner: config.owner.clone(),
            token: config.token.clone(),
        })
    }

    fn latest_url(&self, project: &str) -> Result<Url, LookupError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::Url(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), project, "releases", "latest"]);
        Ok(url)
    }
}

#[async_trait]
impl ReleaseLookup for GithubReleases {
    async fn latest(&self, project: &str) -> Result<Option<String>, LookupError> {
        let url = self.latest_url(project)?;
        trace!(%url, "fetching latest release");

        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(owner = %self.owner, project, "no release found");
                Ok(None)
            }
            status if status.is_success() => {
                let release: LatestRelease = response.json().await?;
                match release.tag_name {
                    Some(tag) if !tag.is_empty() => Ok(Some(tag)),
                    _ => Err(LookupError::MissingTag {
                        project: project.to_string(),
                    }),
                }
            }
            status => Err(LookupError::Status(status)),
        }
    }
}

//! Remote repository access for `check` and `repo-last-migration`.
//!
//! The GitHub implementation talks to the contents REST API:
//! `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}`.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::config::GitHubConfig;
use crate::error::{MigrantError, Result};

const GITHUB_API: &str = "https://api.github.com";

/// Kind of entry in a remote directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

/// A hosted repository the migration directory can be read from.
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// List a directory, in the order the host returns it.
    async fn list_dir(&self, dir: &str) -> Result<Vec<RemoteEntry>>;

    /// Download one file's raw content.
    async fn download(&self, path: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// GitHub contents API client.
pub struct GitHubRepository {
    client: Client,
    base_url: String,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: String,
}

impl GitHubRepository {
    pub fn new(config: &GitHubConfig, token: impl Into<String>) -> Self {
        Self::with_base_url(config, token, GITHUB_API)
    }

    /// Point the client at another API root (GitHub Enterprise).
    pub fn with_base_url(
        config: &GitHubConfig,
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config
                .target_branch
                .clone()
                .filter(|b| !b.is_empty()),
            token: token.into(),
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url,
            self.owner,
            self.repo,
            path.trim_start_matches("./").trim_matches('/')
        )
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .get(self.contents_url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(USER_AGENT, concat!("pgmigrant/", env!("CARGO_PKG_VERSION")));
        if let Some(branch) = &self.branch {
            req = req.query(&[("ref", branch)]);
        }
        req
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = req
            .send()
            .await
            .map_err(|e| MigrantError::Remote(format!("{}: {}", what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MigrantError::Remote(format!("{}: {} - {}", what, status, body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteRepository for GitHubRepository {
    async fn list_dir(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        debug!(owner = %self.owner, repo = %self.repo, dir, "listing remote directory");
        let req = self.get(dir).header(ACCEPT, "application/vnd.github+json");
        let response = self
            .send(req, &format!("listing {}/{}:{}", self.owner, self.repo, dir))
            .await?;

        let items: Vec<ContentItem> = response.json().await.map_err(|e| {
            MigrantError::Remote(format!("{} is not a directory listing: {}", dir, e))
        })?;

        Ok(items
            .into_iter()
            .map(|item| RemoteEntry {
                kind: match item.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => EntryKind::Other,
                },
                name: item.name,
                path: item.path,
            })
            .collect())
    }

    async fn download(&self, path: &str) -> Result<String> {
        debug!(path, "downloading remote file");
        let req = self.get(path).header(ACCEPT, "application/vnd.github.raw");
        let response = self.send(req, &format!("downloading {}", path)).await?;
        response
            .text()
            .await
            .map_err(|e| MigrantError::Remote(format!("reading {}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(branch: Option<&str>) -> GitHubConfig {
        GitHubConfig {
            owner: "acme".into(),
            repo: "app".into(),
            target_branch: branch.map(String::from),
        }
    }

    #[test]
    fn test_contents_url() {
        let repo = GitHubRepository::new(&config(Some("main")), "t");
        assert_eq!(
            repo.contents_url("./migrations/"),
            "https://api.github.com/repos/acme/app/contents/migrations"
        );
    }

    #[test]
    fn test_enterprise_base_url_trailing_slash() {
        let repo = GitHubRepository::with_base_url(&config(None), "t", "https://ghe.local/api/v3/");
        assert_eq!(
            repo.contents_url("db/migrations"),
            "https://ghe.local/api/v3/repos/acme/app/contents/db/migrations"
        );
    }

    #[test]
    fn test_empty_branch_is_ignored() {
        let repo = GitHubRepository::new(&config(Some("")), "t");
        assert!(repo.branch.is_none());
    }

    #[test]
    fn test_listing_deserializes() {
        let json = r#"[
            {"name":"0001_init.sql","path":"migrations/0001_init.sql","type":"file","sha":"x"},
            {"name":"old","path":"migrations/old","type":"dir"}
        ]"#;
        let items: Vec<ContentItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, "file");
        assert_eq!(items[1].path, "migrations/old");
    }
}

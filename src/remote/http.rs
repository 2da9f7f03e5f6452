//! HTTP-backed remote store.
//!
//! Thin reqwest client over the store's JSON endpoints. Every response body
//! is decoded into the closed `RemotePayload` variant set; bodies that fit
//! none of the variants surface as remote errors instead of panicking
//! deeper in the engine.

use super::contract::{RemoteContent, RemotePayload, RemoteStore};
use crate::error::SyncError;
use crate::listing::DirectoryEntry;
use crate::types::{EntryKind, RepoPath};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

/// Remote store client speaking the repository server's JSON protocol.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        HttpRemoteStore {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, route: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(route));
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send a request and decode the tagged payload, mapping auth failures
    /// and error payloads along the way.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<RemotePayload, SyncError> {
        let response = builder
            .send()
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Auth(format!("remote returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;

        let payload: RemotePayload = serde_json::from_str(&body).map_err(|_| {
            SyncError::Remote(format!(
                "unrecognized remote payload (status {status}): {}",
                truncate(&body, 200)
            ))
        })?;

        if let RemotePayload::Error { error } = &payload {
            debug!(%status, error, "remote error payload");
            return Err(SyncError::Remote(error.clone()));
        }
        if !status.is_success() {
            return Err(SyncError::Remote(format!("remote returned {status}")));
        }
        Ok(payload)
    }

    fn unexpected(payload: &RemotePayload) -> SyncError {
        SyncError::Remote(format!("unexpected remote payload: {payload:?}"))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn kind_str(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "file",
        EntryKind::Folder => "folder",
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn clone_or_open(&self, repo: &str, owner: &str) -> Result<String, SyncError> {
        let result = self
            .send(
                self.request(reqwest::Method::POST, &format!("repos/{repo}/clone"))
                    .json(&json!({ "owner": owner })),
            )
            .await;
        match result {
            Ok(RemotePayload::WorkingCopy { path }) => Ok(path),
            // An existing working copy is success, not failure.
            Err(SyncError::Remote(msg)) if msg.to_lowercase().contains("already exists") => {
                Ok(format!("{owner}/{repo}"))
            }
            Ok(other) => Err(Self::unexpected(&other)),
            Err(e) => Err(e),
        }
    }

    async fn list_directory(
        &self,
        path: &RepoPath,
        owner: &str,
    ) -> Result<Vec<DirectoryEntry>, SyncError> {
        let payload = self
            .send(
                self.request(reqwest::Method::GET, "items")
                    .query(&[("path", path.as_str()), ("owner", owner)]),
            )
            .await?;
        match payload {
            RemotePayload::FolderListing { entries } => Ok(entries),
            other => Err(Self::unexpected(&other)),
        }
    }

    async fn read_content(
        &self,
        path: &RepoPath,
        owner: &str,
    ) -> Result<RemoteContent, SyncError> {
        let payload = self
            .send(
                self.request(reqwest::Method::GET, "content")
                    .query(&[("path", path.as_str()), ("owner", owner)]),
            )
            .await?;
        match payload {
            RemotePayload::FileContent { content } => Ok(RemoteContent::File(content)),
            RemotePayload::FolderListing { entries } => Ok(RemoteContent::Folder(entries)),
            other => Err(Self::unexpected(&other)),
        }
    }

    async fn write_content(
        &self,
        path: &RepoPath,
        owner: &str,
        content: &str,
    ) -> Result<(), SyncError> {
        self.send(self.request(reqwest::Method::PUT, "content").json(&json!({
            "path": path.as_str(),
            "owner": owner,
            "content": content,
        })))
        .await?;
        Ok(())
    }

    async fn create_item(
        &self,
        path: &RepoPath,
        kind: EntryKind,
        owner: &str,
        content: Option<&str>,
    ) -> Result<(), SyncError> {
        self.send(self.request(reqwest::Method::POST, "items").json(&json!({
            "path": path.as_str(),
            "kind": kind_str(kind),
            "owner": owner,
            "content": content,
        })))
        .await?;
        Ok(())
    }

    async fn rename_item(
        &self,
        old_path: &RepoPath,
        new_path: &RepoPath,
        owner: &str,
    ) -> Result<(), SyncError> {
        self.send(self.request(reqwest::Method::POST, "items/rename").json(&json!({
            "old_path": old_path.as_str(),
            "new_path": new_path.as_str(),
            "owner": owner,
        })))
        .await?;
        Ok(())
    }

    async fn delete_item(&self, path: &RepoPath, owner: &str) -> Result<(), SyncError> {
        self.send(
            self.request(reqwest::Method::DELETE, "items")
                .query(&[("path", path.as_str()), ("owner", owner)]),
        )
        .await?;
        Ok(())
    }

    async fn fetch_binary(
        &self,
        path: &RepoPath,
        owner: &str,
    ) -> Result<(Vec<u8>, String), SyncError> {
        let response = self
            .request(reqwest::Method::GET, "binary")
            .query(&[("path", path.as_str()), ("owner", owner)])
            .send()
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Auth(format!("remote returned {status}")));
        }
        if !status.is_success() {
            return Err(SyncError::Remote(format!("remote returned {status}")));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::Remote(e.to_string()))?;
        Ok((bytes.to_vec(), mime))
    }

    async fn push_commit(
        &self,
        repo: &str,
        owner: &str,
        message: &str,
    ) -> Result<(), SyncError> {
        let result = self
            .send(
                self.request(reqwest::Method::POST, &format!("repos/{repo}/push"))
                    .json(&json!({ "owner": owner, "message": message })),
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(SyncError::Remote(msg)) if msg.to_lowercase().contains("nothing to commit") => {
                Err(SyncError::NothingToCommit)
            }
            Err(e) => Err(e),
        }
    }
}

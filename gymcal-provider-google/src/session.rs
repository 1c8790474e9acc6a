//! Creates a valid Google session (access token) from the token file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// "Authorized user" token file, as written by Google's OAuth client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    /// Access token.
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
    /// Fields we don't use, kept so rewriting the file loses nothing.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl AuthorizedUser {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let Some(ref token) = self.token else {
            return false;
        };
        if token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => now + Duration::seconds(EXPIRY_MARGIN_SECS) < expiry,
            None => false,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize token")
    }
}

#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

/// A usable access token plus where it came from.
pub struct Session {
    path: PathBuf,
    data: AuthorizedUser,
    refreshed: bool,
}

impl Session {
    pub fn new(path: impl Into<PathBuf>, data: AuthorizedUser) -> Self {
        Session {
            path: path.into(),
            data,
            refreshed: false,
        }
    }

    /// Load the token file, refreshing and rewriting it when the access token
    /// is missing or about to expire.
    pub async fn load_valid(path: &Path) -> Result<Self> {
        let mut session = Self::load(path)?;
        session.ensure_fresh().await?;
        Ok(session)
    }

    /// Refresh and rewrite the token file if the access token is missing or
    /// about to expire.
    pub async fn ensure_fresh(&mut self) -> Result<()> {
        if self.data.is_valid_at(Utc::now()) {
            return Ok(());
        }
        if self.data.refresh_token.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("Token invalid or expired and can't be refreshed");
        }
        self.refresh(&reqwest::Client::new()).await?;
        self.save()
    }

    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Google token file {} not found! Run `gymcal auth` first.", path.display());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read Google token from {}", path.display()))?;

        let data: AuthorizedUser = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse Google token from {}", path.display()))?;

        Ok(Session::new(path, data))
    }

    pub fn access_token(&self) -> &str {
        self.data.token.as_deref().unwrap_or_default()
    }

    pub fn refreshed(&self) -> bool {
        self.refreshed
    }

    pub fn data(&self) -> &AuthorizedUser {
        &self.data
    }

    async fn refresh(&mut self, http: &reqwest::Client) -> Result<()> {
        let refresh_token = self.data.refresh_token.clone().unwrap_or_default();

        let response = http
            .post(&self.data.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.data.client_id.as_str()),
                ("client_secret", self.data.client_secret.as_str()),
            ])
            .send()
            .await
            .context("Failed to send token refresh request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Token invalid or expired and can't be refreshed ({}): {}",
                status,
                error_text
            );
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token refresh response")?;

        self.data.token = Some(tokens.access_token);
        self.data.expiry = Some(Utc::now() + Duration::seconds(tokens.expires_in));
        // Google typically doesn't return a new refresh_token on refresh
        if let Some(new_refresh) = tokens.refresh_token.filter(|t| !t.is_empty()) {
            self.data.refresh_token = Some(new_refresh);
        }
        self.refreshed = true;
        info!("refreshed Google access token");

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        write_token_file(&self.path, &self.data)
    }

    /// Append `refreshed=…` (and the new token when refreshed) to the file
    /// named by `GITHUB_OUTPUT`, if set.
    pub fn report_to_ci(&self) -> Result<()> {
        match std::env::var_os("GITHUB_OUTPUT") {
            Some(path) if !path.is_empty() => self.write_ci_output(Path::new(&path)),
            _ => Ok(()),
        }
    }

    fn write_ci_output(&self, path: &Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        writeln!(file, "refreshed={}", self.refreshed)?;
        if self.refreshed {
            writeln!(file, "refreshed_token={}", self.data.to_json()?)?;
        }
        debug!(path = %path.display(), refreshed = self.refreshed, "wrote CI outputs");

        Ok(())
    }
}

/// Write the token JSON, owner-only since it holds OAuth secrets.
pub fn write_token_file(path: &Path, data: &AuthorizedUser) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    std::fs::write(path, data.to_json()?)
        .with_context(|| format!("Failed to write token to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_json(token_uri: &str, expiry: DateTime<Utc>, refresh_token: Option<&str>) -> String {
        serde_json::json!({
            "token": "old-access",
            "refresh_token": refresh_token,
            "token_uri": token_uri,
            "client_id": "client.apps.googleusercontent.com",
            "client_secret": "shh",
            "scopes": ["https://www.googleapis.com/auth/calendar"],
            "universe_domain": "googleapis.com",
            "expiry": expiry.to_rfc3339()
        })
        .to_string()
    }

    #[tokio::test]
    async fn unexpired_token_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let json = token_json("http://127.0.0.1:1/token", Utc::now() + Duration::hours(1), Some("r"));
        std::fs::write(&path, &json).unwrap();

        let session = Session::load_valid(&path).await.unwrap();

        assert_eq!(session.access_token(), "old-access");
        assert!(!session.refreshed());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), json);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_saved() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                mockito::Matcher::UrlEncoded("refresh_token".into(), "keep-me".into()),
            ]))
            .with_body(r#"{"access_token": "new-access", "expires_in": 3599, "token_type": "Bearer"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let token_uri = format!("{}/token", server.url());
        std::fs::write(&path, token_json(&token_uri, Utc::now() - Duration::minutes(5), Some("keep-me"))).unwrap();

        let session = Session::load_valid(&path).await.unwrap();

        mock.assert_async().await;
        assert_eq!(session.access_token(), "new-access");
        assert!(session.refreshed());

        let saved: AuthorizedUser = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.token.as_deref(), Some("new-access"));
        assert_eq!(saved.refresh_token.as_deref(), Some("keep-me"));
        assert_eq!(saved.extra["universe_domain"], "googleapis.com");
        assert!(saved.expiry.unwrap() > Utc::now());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn expired_without_refresh_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, token_json(DEFAULT_TOKEN_URI, Utc::now() - Duration::hours(1), None)).unwrap();

        let err = Session::load_valid(&path).await.err().unwrap();
        assert!(err.to_string().contains("can't be refreshed"));
    }

    #[tokio::test]
    async fn rejected_refresh_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let token_uri = format!("{}/token", server.url());
        std::fs::write(&path, token_json(&token_uri, Utc::now() - Duration::hours(1), Some("revoked"))).unwrap();

        let err = Session::load_valid(&path).await.err().unwrap();
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn token_expiring_mid_run_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_body(r#"{"access_token": "second-access", "expires_in": 3599}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let token_uri = format!("{}/token", server.url());
        let json = token_json(&token_uri, Utc::now() + Duration::minutes(30), Some("r"));
        std::fs::write(&path, &json).unwrap();

        let mut session = Session::load_valid(&path).await.unwrap();
        assert!(!session.refreshed());

        // As if a long scrape ran the clock past the expiry margin.
        session.data.expiry = Some(Utc::now() + Duration::seconds(10));
        session.ensure_fresh().await.unwrap();
        session.ensure_fresh().await.unwrap();

        mock.assert_async().await;
        assert_eq!(session.access_token(), "second-access");
        assert!(session.refreshed());
        let saved: AuthorizedUser = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.token.as_deref(), Some("second-access"));
    }

    #[test]
    fn ci_output_reports_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("github_output");
        let data: AuthorizedUser =
            serde_json::from_str(&token_json(DEFAULT_TOKEN_URI, Utc::now(), Some("r"))).unwrap();

        let mut session = Session::new(dir.path().join("token.json"), data);
        session.write_ci_output(&output).unwrap();
        session.refreshed = true;
        session.write_ci_output(&output).unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "refreshed=false");
        assert_eq!(lines[1], "refreshed=true");
        assert!(lines[2].starts_with("refreshed_token={"));
        assert_eq!(lines.len(), 3);
    }
}

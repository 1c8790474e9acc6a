//! Interactive OAuth consent flow that produces the token file.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;
use url::Url;

use crate::session::{write_token_file, AuthorizedUser, TokenResponse, DEFAULT_TOKEN_URI};

pub const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

#[derive(Deserialize)]
struct ClientFile {
    installed: Option<InstalledClient>,
    web: Option<InstalledClient>,
}

/// OAuth client credentials downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledClient {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl InstalledClient {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read OAuth client file {}. Download it from the Google Cloud console.",
                path.display()
            )
        })?;
        Self::from_json(&contents).with_context(|| format!("Invalid OAuth client file {}", path.display()))
    }

    fn from_json(contents: &str) -> Result<Self> {
        let file: ClientFile = serde_json::from_str(contents)?;
        file.installed
            .or(file.web)
            .context("Expected an \"installed\" or \"web\" client")
    }

    pub fn consent_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.auth_uri)
            .with_context(|| format!("Invalid auth_uri {}", self.auth_uri))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Trade an authorization code for tokens.
    pub async fn exchange_code(&self, http: &reqwest::Client, code: &str, redirect_uri: &str) -> Result<AuthorizedUser> {
        let response = http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .context("Failed to exchange code for tokens")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Token exchange failed ({}): {}", status, error_text);
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        if tokens.refresh_token.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("Google returned no refresh token; revoke the app's access and try again");
        }

        Ok(AuthorizedUser {
            token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token,
            token_uri: self.token_uri.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry: Some(Utc::now() + Duration::seconds(tokens.expires_in)),
            extra: serde_json::Map::new(),
        })
    }
}

/// Run the consent flow and write the token file.
///
/// Returns the token JSON so it can be stored as a CI secret.
pub async fn authenticate(client_path: &Path, token_path: &Path) -> Result<String> {
    let client = InstalledClient::load(client_path)?;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind OAuth callback listener")?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://localhost:{}/", port);

    let state = uuid::Uuid::new_v4().to_string();
    let auth_url = client.consent_url(&redirect_uri, &state)?;

    eprintln!("\nOpen this URL in your browser to authenticate:\n");
    eprintln!("{}\n", auth_url);

    // Try to open the browser automatically
    if open::that(&auth_url).is_err() {
        eprintln!("(Could not open browser automatically, please copy the URL above)");
    }

    let (code, returned_state) = wait_for_callback(&listener).await?;
    if returned_state != state {
        anyhow::bail!("OAuth state mismatch; refusing the callback");
    }

    eprintln!("\nReceived authorization code, exchanging for tokens...");

    let tokens = client
        .exchange_code(&reqwest::Client::new(), &code, &redirect_uri)
        .await?;
    write_token_file(token_path, &tokens)?;
    info!(path = %token_path.display(), "saved Google token");

    tokens.to_json()
}

/// Accept one redirect on `listener` and return its `(code, state)`.
async fn wait_for_callback(listener: &TcpListener) -> Result<(String, String)> {
    let (stream, _) = listener
        .accept()
        .await
        .context("Failed to accept OAuth callback")?;

    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .await
        .context("Failed to read OAuth callback request line")?;

    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Invalid HTTP request"))?;

    let url = Url::parse(&format!("http://localhost{}", url_part))?;

    let query_value = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };

    let outcome = match (query_value("code"), query_value("state"), query_value("error")) {
        (_, _, Some(error)) => Err(anyhow::anyhow!("Authorization denied: {}", error)),
        (Some(code), Some(state), None) => Ok((code, state)),
        (None, _, None) => Err(anyhow::anyhow!("No code in callback")),
        (Some(_), None, None) => Err(anyhow::anyhow!("No state in callback")),
    };

    let body = if outcome.is_ok() {
        "<h1>Authentication successful!</h1>\
         <p>You can close this window and return to the terminal.</p>"
    } else {
        "<h1>Authentication failed</h1><p>Check the terminal for details.</p>"
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html\r\n\
         Connection: close\r\n\
         \r\n\
         <html><body>{}</body></html>",
        body
    );

    let mut stream = reader.into_inner();
    stream
        .write_all(response.as_bytes())
        .await
        .context("Failed to write OAuth callback response")?;
    stream.flush().await?;

    outcome
}

//! Bearer-token session for the vault's identity endpoint.
//!
//! The session authenticates this subsystem, not the application. Tokens are
//! requested with a password-scoped exchange against `{identity}/auth/tokens`;
//! the token comes back in the `X-Subject-Token` header and its expiry in the
//! JSON body. The stored expiry is pulled forward by a refresh buffer so a
//! token is never presented in its final seconds.
//!
//! States: no session, live session, stale session. A stale or missing session
//! re-authenticates before the caller gets a token. The state lock is held
//! across the exchange, so concurrent callers wait for a single in-flight
//! authentication instead of issuing their own.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::SecretString;
use crate::config::IdentityConfig;
use crate::errors::{Result, SecretsError};
use crate::observability::MetricsRecorder;

/// Response header carrying the issued token.
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// A token and the instant after which it must not be used.
#[derive(Debug, Clone)]
pub struct AuthSession {
    token: SecretString,
    expires_at: Instant,
    issued_until: DateTime<Utc>,
}

impl AuthSession {
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Expiry as declared by the identity service, before the buffer.
    pub fn issued_until(&self) -> DateTime<Utc> {
        self.issued_until
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Serialize)]
struct AuthBody<'a> {
    identity: IdentityBody<'a>,
    scope: ScopeBody<'a>,
}

#[derive(Serialize)]
struct IdentityBody<'a> {
    methods: [&'static str; 1],
    password: PasswordBody<'a>,
}

#[derive(Serialize)]
struct PasswordBody<'a> {
    user: UserBody<'a>,
}

#[derive(Serialize)]
struct UserBody<'a> {
    name: &'a str,
    domain: NamedRef<'a>,
    password: &'a str,
}

#[derive(Serialize)]
struct ScopeBody<'a> {
    project: ProjectBody<'a>,
}

#[derive(Serialize)]
struct ProjectBody<'a> {
    name: &'a str,
    domain: NamedRef<'a>,
}

#[derive(Serialize)]
struct NamedRef<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    expires_at: DateTime<Utc>,
}

/// Acquires and caches the identity token used for vault calls.
pub struct AuthSessionManager {
    client: Client,
    identity: IdentityConfig,
    refresh_buffer: Duration,
    session: Mutex<Option<AuthSession>>,
    metrics: MetricsRecorder,
}

impl std::fmt::Debug for AuthSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSessionManager")
            .field("identity_url", &self.identity.url)
            .field("username", &self.identity.username)
            .field("project", &self.identity.project)
            .field("refresh_buffer", &self.refresh_buffer)
            .finish_non_exhaustive()
    }
}

impl AuthSessionManager {
    /// `client` should already carry the request timeout.
    pub fn new(client: Client, identity: IdentityConfig, refresh_buffer: Duration) -> Self {
        Self { client, identity, refresh_buffer, session: Mutex::new(None), metrics: MetricsRecorder::new() }
    }

    fn tokens_url(&self) -> String {
        format!("{}/auth/tokens", self.identity.url.trim_end_matches('/'))
    }

    /// Returns a token that is valid for at least the refresh buffer,
    /// authenticating first if needed.
    pub async fn get_token(&self) -> Result<SecretString> {
        let mut session = self.session.lock().await;

        if let Some(current) = session.as_ref().filter(|s| s.is_live(Instant::now())) {
            return Ok(current.token.clone());
        }

        if session.is_some() {
            debug!(identity_url = %self.identity.url, "Auth session near expiry; re-authenticating");
        }
        *session = None;

        let fresh = self.authenticate().await?;
        let token = fresh.token.clone();
        *session = Some(fresh);
        Ok(token)
    }

    /// Drops the cached session; the next call re-authenticates.
    pub async fn invalidate(&self) {
        if self.session.lock().await.take().is_some() {
            info!(identity_url = %self.identity.url, "Auth session invalidated");
        }
    }

    /// Whether a live session is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.as_ref().is_some_and(|s| s.is_live(Instant::now()))
    }

    async fn authenticate(&self) -> Result<AuthSession> {
        let result = self.exchange().await;
        self.metrics.record_authentication(result.is_ok());
        match &result {
            Ok(session) => info!(
                identity_url = %self.identity.url,
                project = %self.identity.project,
                expires_at = %session.issued_until,
                "Authenticated with identity service"
            ),
            Err(e) => warn!(identity_url = %self.identity.url, error = %e, "Authentication failed"),
        }
        result
    }

    async fn exchange(&self) -> Result<AuthSession> {
        let body = AuthRequest {
            auth: AuthBody {
                identity: IdentityBody {
                    methods: ["password"],
                    password: PasswordBody {
                        user: UserBody {
                            name: &self.identity.username,
                            domain: NamedRef { name: &self.identity.user_domain },
                            password: self.identity.password.expose_secret(),
                        },
                    },
                },
                scope: ScopeBody {
                    project: ProjectBody {
                        name: &self.identity.project,
                        domain: NamedRef { name: &self.identity.project_domain },
                    },
                },
            },
        };

        let response =
            self.client.post(self.tokens_url()).json(&body).send().await.map_err(|e| {
                if e.is_timeout() {
                    SecretsError::authentication_failed("identity endpoint timed out")
                } else {
                    SecretsError::authentication_failed(format!("identity endpoint unreachable: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = match status {
                StatusCode::UNAUTHORIZED => "invalid credentials".to_string(),
                StatusCode::FORBIDDEN => "credentials lack access to the project".to_string(),
                other => format!("identity endpoint returned {}", other),
            };
            return Err(SecretsError::authentication_failed(reason));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(SecretString::new)
            .ok_or_else(|| {
                SecretsError::authentication_failed(format!("response missing {} header", SUBJECT_TOKEN_HEADER))
            })?;

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            SecretsError::authentication_failed(format!("unreadable token response: {}", e))
        })?;

        let issued_until = parsed.token.expires_at;
        let remaining = (issued_until - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let usable = remaining.saturating_sub(self.refresh_buffer);

        Ok(AuthSession { token, expires_at: Instant::now() + usable, issued_until })
    }
}

//! qBittorrent WebUI transport implementing the sync collaborator traits.
//!
//! # Design
//! - Session cookie (`SID`) captured at login and replayed on every request.
//! - `app/version` doubles as the authentication probe: 403 means "not logged in".
//! - HTTP failures map onto [`TransportError`] with the operation name and status.
//! - Login, auth probe and add carry the request timeout; `sync/maindata` never times out
//!   client-side.

mod wire;

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderValue, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use sluice_core::{Cursor, Snapshot};
use sluice_sync::{AuthCheck, LinkAdder, LinkError, SnapshotSource, TransportError};
use tracing::{debug, info};

use self::wire::MainData;

const SESSION_COOKIE: &str = "SID";
const LOGIN_OK: &str = "Ok.";

/// Username and password for the WebUI login form.
#[derive(Clone)]
pub(crate) struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client for one WebUI endpoint.
#[derive(Debug)]
pub(crate) struct QbitClient {
    http: Client,
    base: Url,
    credentials: Option<Credentials>,
    timeout: Duration,
    session: RwLock<Option<HeaderValue>>,
}

impl QbitClient {
    pub(crate) fn new(
        base: Url,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .build()
            .map_err(|err| TransportError::new("build_client", err))?;
        Ok(Self {
            http,
            base,
            credentials,
            timeout,
            session: RwLock::new(None),
        })
    }

    /// Log in with the configured credentials. Returns `false` when the engine refuses them.
    pub(crate) async fn login(&self) -> Result<bool, TransportError> {
        const OPERATION: &str = "login";
        let Some(credentials) = &self.credentials else {
            return Ok(false);
        };

        let response = self
            .http
            .post(self.endpoint(OPERATION, "auth/login")?)
            .timeout(self.timeout)
            .header(reqwest::header::REFERER, self.base.as_str())
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|err| TransportError::new(OPERATION, err))?;

        if response.status() == StatusCode::FORBIDDEN {
            return Ok(false);
        }
        let response = ensure_success(OPERATION, response)?;
        let cookie = session_cookie(&response);
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::new(OPERATION, err))?;
        if body.trim() != LOGIN_OK {
            debug!("engine refused the login");
            return Ok(false);
        }

        if let Some(cookie) = cookie {
            *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(cookie);
        }
        info!(username = %credentials.username, "logged in");
        Ok(true)
    }

    fn has_session(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn endpoint(&self, operation: &'static str, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(&format!("api/v2/{path}"))
            .map_err(|err| TransportError::new(operation, err))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let session = self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match session {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }
}

#[async_trait]
impl AuthCheck for QbitClient {
    async fn is_authenticated(&self) -> Result<bool, TransportError> {
        const OPERATION: &str = "auth_check";
        if self.credentials.is_some() && !self.has_session() && !self.login().await? {
            return Ok(false);
        }

        let response = self
            .authorize(self.http.get(self.endpoint(OPERATION, "app/version")?))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| TransportError::new(OPERATION, err))?;
        if response.status() == StatusCode::FORBIDDEN {
            return Ok(false);
        }
        ensure_success(OPERATION, response)?;
        Ok(true)
    }
}

#[async_trait]
impl SnapshotSource for QbitClient {
    async fn fetch(&self, cursor: Cursor) -> Result<Snapshot, TransportError> {
        const OPERATION: &str = "fetch_snapshot";
        let mut url = self.endpoint(OPERATION, "sync/maindata")?;
        url.query_pairs_mut()
            .append_pair("rid", &cursor.to_string());

        let response = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(|err| TransportError::new(OPERATION, err))?;
        let data: MainData = ensure_success(OPERATION, response)?
            .json()
            .await
            .map_err(|err| TransportError::new(OPERATION, err))?;
        Ok(data.into_snapshot())
    }
}

#[async_trait]
impl LinkAdder for QbitClient {
    async fn add_torrent_from_link(&self, value: &str) -> Result<(), LinkError> {
        const OPERATION: &str = "add_torrent";
        let response = self
            .authorize(self.http.post(self.endpoint(OPERATION, "torrents/add")?))
            .timeout(self.timeout)
            .form(&[("urls", value)])
            .send()
            .await
            .map_err(|err| TransportError::new(OPERATION, err))?;

        if response.status() == StatusCode::UNSUPPORTED_MEDIA_TYPE {
            return Err(LinkError::Rejected {
                reason: "torrent file is not valid".to_string(),
            });
        }
        let body = ensure_success(OPERATION, response)?
            .text()
            .await
            .map_err(|err| TransportError::new(OPERATION, err))?;
        if body.trim().eq_ignore_ascii_case("fails.") {
            return Err(LinkError::Rejected {
                reason: "engine refused the link".to_string(),
            });
        }
        Ok(())
    }
}

fn ensure_success(operation: &'static str, response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::status(operation, status.as_u16()))
    }
}

fn session_cookie(response: &Response) -> Option<HeaderValue> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .map(str::trim)
        .find(|pair| {
            pair.split_once('=')
                .is_some_and(|(name, _)| name == SESSION_COOKIE)
        })
        .and_then(|pair| HeaderValue::from_str(pair).ok())
}

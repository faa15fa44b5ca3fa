//! Interactive Strava authorization.
//!
//! Serves a local page linking to Strava's consent screen and waits on
//! `/exchange_token` for the redirect. The callback exchanges the code for an
//! access token and hands the result back through a oneshot channel, after
//! which the listener shuts down.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::oneshot;

pub const CALLBACK_PATH: &str = "/exchange_token";
/// Host the listener binds and the redirect points at.
pub const CALLBACK_HOST: &str = "127.0.0.1";
pub const WRITE_SCOPE: &str = "activity:write";

#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error("write permissions were not authorized, uploading cannot continue")]
    AccessDenied,
    #[error("incorrect client_id or client_secret")]
    InvalidCredentials,
    #[error("the authorization code was not recognized")]
    InvalidCode,
    #[error("authorization callback is missing the code parameter")]
    MissingCode,
    #[error("authorization state does not match this session")]
    StateMismatch,
    #[error("strava server error: {0}")]
    Server(String),
    #[error("invalid strava base url: {0}")]
    InvalidBaseUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("callback listener: {0}")]
    Listener(#[from] std::io::Error),
    #[error("callback listener stopped before authorization completed")]
    Interrupted,
}

/// A registered Strava API application.
#[derive(Clone, Debug)]
pub struct OAuthApp {
    pub client_id: u64,
    pub client_secret: SecretString,
    pub base_url: String,
    pub port: u16,
}

#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub athlete: Option<serde_json::Value>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("athlete", &self.athlete)
            .finish()
    }
}

impl OAuthApp {
    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}{}", CALLBACK_HOST, self.port, CALLBACK_PATH)
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, AuthorizeError> {
        let base = self.base_url.trim_end_matches('/');
        reqwest::Url::parse(&format!("{base}{path}"))
            .map_err(|e| AuthorizeError::InvalidBaseUrl(format!("{base}: {e}")))
    }

    /// Strava's consent page for this application.
    pub fn authorization_url(&self, state: &str) -> Result<String, AuthorizeError> {
        let mut url = self.endpoint("/oauth/authorize")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id.to_string())
            .append_pair("redirect_uri", &self.redirect_uri())
            .append_pair("response_type", "code")
            .append_pair("approval_prompt", "force")
            .append_pair("scope", WRITE_SCOPE)
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Trade an authorization code for an access token.
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
    ) -> Result<TokenResponse, AuthorizeError> {
        let url = self.endpoint("/oauth/token")?;
        let client_id = self.client_id.to_string();
        let form = [
            ("client_id", client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];
        let resp = http.post(url).form(&form).send().await?;
        let status = resp.status().as_u16();
        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(status, %body, "token exchange failed");
        Err(match status {
            401 => AuthorizeError::InvalidCredentials,
            400 if body.contains("RequestToken") => AuthorizeError::InvalidCode,
            400 => AuthorizeError::InvalidCredentials,
            _ => AuthorizeError::Server(format!(
                "status {status}: {}",
                body.chars().take(256).collect::<String>()
            )),
        })
    }
}

type ResultSender = oneshot::Sender<Result<TokenResponse, AuthorizeError>>;

struct CallbackState {
    app: OAuthApp,
    expected_state: String,
    http: reqwest::Client,
    result_tx: Mutex<Option<ResultSender>>,
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    scope: Option<String>,
    error: Option<String>,
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn index(State(state): State<Arc<CallbackState>>) -> Html<String> {
    match state.app.authorization_url(&state.expected_state) {
        Ok(url) => Html(format!(
            r#"<a href="{}"><div>Click here to connect with Strava!</div></a>"#,
            escape_html(&url)
        )),
        Err(e) => Html(format!("<p>{}</p>", escape_html(&e.to_string()))),
    }
}

async fn authorize(
    state: &CallbackState,
    params: CallbackParams,
) -> Result<TokenResponse, AuthorizeError> {
    if let Some(error) = params.error {
        return Err(if error == "access_denied" {
            AuthorizeError::AccessDenied
        } else {
            AuthorizeError::Server(error)
        });
    }
    if params.state.as_deref() != Some(state.expected_state.as_str()) {
        return Err(AuthorizeError::StateMismatch);
    }
    if let Some(scope) = params.scope.as_deref() {
        if !scope.split(',').any(|s| s == WRITE_SCOPE) {
            return Err(AuthorizeError::AccessDenied);
        }
    }
    let code = params.code.ok_or(AuthorizeError::MissingCode)?;
    state.app.exchange_code(&state.http, &code).await
}

async fn exchange_token(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    let result = authorize(&state, params).await;
    let page = match &result {
        Ok(token) => {
            let athlete = token
                .athlete
                .as_ref()
                .and_then(|a| serde_json::to_string_pretty(a).ok())
                .unwrap_or_default();
            format!(
                "<h1>SUCCESS</h1><p>Access token received, the upload continues in your terminal.</p>\
                 <p>The authenticated athlete (you):</p><pre>{}</pre>",
                escape_html(&athlete)
            )
        }
        Err(e) => format!(
            "<h1>Authorization Failure</h1><p>{}</p>",
            escape_html(&e.to_string())
        ),
    };
    let sender = state
        .result_tx
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match sender {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => tracing::debug!("authorization already completed, ignoring callback"),
    }
    Html(page)
}

/// Routes for the local authorization listener. The first callback's result
/// is sent on `result_tx`; later callbacks only render a page.
pub fn callback_router(app: OAuthApp, expected_state: String, result_tx: ResultSender) -> Router {
    let state = Arc::new(CallbackState {
        app,
        expected_state,
        http: reqwest::Client::new(),
        result_tx: Mutex::new(Some(result_tx)),
    });
    Router::new()
        .route("/", get(index))
        .route(CALLBACK_PATH, get(exchange_token))
        .with_state(state)
}

/// Run the interactive flow and return the access token.
pub async fn obtain_token(app: OAuthApp) -> Result<SecretString, AuthorizeError> {
    let port = app.port;
    let listener = tokio::net::TcpListener::bind((CALLBACK_HOST, port)).await?;
    let (result_tx, result_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let router = callback_router(app, uuid::Uuid::new_v4().to_string(), result_tx);

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });
    println!("No access token provided. Please follow the instructions to generate an access token.");
    println!("Visit http://{CALLBACK_HOST}:{port}/ to get an access token and continue the upload (ctrl-c to exit)");
    tracing::info!(port, "waiting for strava authorization");

    let result = result_rx.await.map_err(|_| AuthorizeError::Interrupted);
    let _ = stop_tx.send(());
    match tokio::time::timeout(Duration::from_secs(5), server).await {
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "callback listener error"),
        Err(_) => tracing::debug!("callback listener did not stop in time"),
        _ => {}
    }

    let token = result??;
    Ok(SecretString::new(token.access_token.into()))
}

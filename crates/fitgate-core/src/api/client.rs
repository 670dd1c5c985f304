//! Provider client for the Garmin Connect web services.
//!
//! Sessions are an OAuth1/OAuth2 token pair. The OAuth1 token is long-lived and
//! only used to mint OAuth2 bearer tokens; data calls carry the OAuth2 token.
//! The token store is a directory holding one JSON file per token.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::auth::{token_store, Credentials};
use crate::config::Config;

use super::oauth::{self, OAuthConsumer};
use super::sso::{self, SSO_USER_AGENT};
use super::tokens::{ExchangeResponse, OAuth1Token, OAuth2Token};
use super::{ProviderClient, ProviderError, ProviderResult};

// ============================================================================
// Constants
// ============================================================================

/// User agent for data calls
const API_USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// File names inside the token store directory
const OAUTH1_FILE: &str = "oauth1_token.json";
const OAUTH2_FILE: &str = "oauth2_token.json";

/// Social profile, used to learn the display name that most data paths key on
const PROFILE_PATH: &str = "/userprofile-service/socialProfile";

/// Padding around the sleep window, matching what the web app requests
const SLEEP_BUFFER_MINUTES: u32 = 60;

/// An authenticated Connect session.
pub struct ConnectSession {
    oauth1: OAuth1Token,
    oauth2: RwLock<OAuth2Token>,
    display_name: String,
    full_name: Option<String>,
}

impl ConnectSession {
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

#[derive(Debug, Deserialize)]
struct SocialProfile {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "fullName")]
    full_name: Option<String>,
}

/// Garmin Connect client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ConnectClient {
    client: Client,
    domain: String,
    timeout: Duration,
    consumer_url: String,
    consumer: Arc<OnceCell<OAuthConsumer>>,
}

impl ConnectClient {
    pub fn new(config: &Config) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            domain: config.provider_domain.clone(),
            timeout: config.request_timeout,
            consumer_url: config.oauth_consumer_url.clone(),
            consumer: Arc::new(OnceCell::new()),
        })
    }

    fn connectapi_base(&self) -> String {
        format!("https://connectapi.{}", self.domain)
    }

    /// OAuth consumer credentials, fetched once per process
    async fn consumer(&self) -> ProviderResult<&OAuthConsumer> {
        self.consumer
            .get_or_try_init(|| async {
                debug!(url = %self.consumer_url, "Fetching OAuth consumer");
                let response = self.client.get(&self.consumer_url).send().await?;
                let response = Self::check_response(response).await?;
                Ok::<_, ProviderError>(response.json::<OAuthConsumer>().await?)
            })
            .await
    }

    async fn check_response(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::from_status(status, &body))
        }
    }

    /// Trade an SSO ticket for an OAuth1 token.
    async fn preauthorize(&self, http: &Client, ticket: &str) -> ProviderResult<OAuth1Token> {
        let consumer = self.consumer().await?;
        let url = format!("{}/oauth-service/oauth/preauthorized", self.connectapi_base());
        let login_url = format!("https://sso.{}/sso/embed", self.domain);
        let params = [
            ("ticket", ticket),
            ("login-url", login_url.as_str()),
            ("accepts-mfa-tokens", "true"),
        ];

        let authorization = oauth::authorization_header(consumer, None, "GET", &url, &params);
        let response = http
            .get(&url)
            .query(&params)
            .header(header::USER_AGENT, SSO_USER_AGENT)
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await?;
        let body = Self::check_response(response).await?.text().await?;

        let mut oauth_token = None;
        let mut oauth_token_secret = None;
        let mut mfa_token = None;
        let mut mfa_expiration_timestamp = None;
        for pair in body.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            match key {
                "oauth_token" => oauth_token = Some(value),
                "oauth_token_secret" => oauth_token_secret = Some(value),
                "mfa_token" => mfa_token = Some(value),
                "mfa_expiration_timestamp" => mfa_expiration_timestamp = Some(value),
                _ => {}
            }
        }

        match (oauth_token, oauth_token_secret) {
            (Some(oauth_token), Some(oauth_token_secret)) => Ok(OAuth1Token {
                oauth_token,
                oauth_token_secret,
                mfa_token,
                mfa_expiration_timestamp,
                domain: Some(self.domain.clone()),
            }),
            _ => Err(ProviderError::Other(
                "Preauthorization response did not contain an OAuth1 token".to_string(),
            )),
        }
    }

    /// Mint a fresh OAuth2 token from the OAuth1 token.
    async fn exchange(&self, oauth1: &OAuth1Token) -> ProviderResult<OAuth2Token> {
        let consumer = self.consumer().await?;
        let url = format!("{}/oauth-service/oauth/exchange/user/2.0", self.connectapi_base());
        let mut form: Vec<(&str, &str)> = Vec::new();
        if let Some(ref mfa) = oauth1.mfa_token {
            form.push(("mfa_token", mfa.as_str()));
        }

        let authorization = oauth::authorization_header(
            consumer,
            Some((oauth1.oauth_token.as_str(), oauth1.oauth_token_secret.as_str())),
            "POST",
            &url,
            &form,
        );
        let response = self
            .client
            .post(&url)
            .header(header::USER_AGENT, SSO_USER_AGENT)
            .header(header::AUTHORIZATION, authorization)
            .form(&form)
            .send()
            .await?;
        let exchanged: ExchangeResponse = Self::check_response(response).await?.json().await?;
        debug!("Exchanged OAuth1 token for a fresh OAuth2 token");
        Ok(exchanged.into_token(Utc::now().timestamp()))
    }

    /// Current `Authorization` header value, refreshing the OAuth2 token first
    /// when it has expired.
    async fn authorization(&self, session: &ConnectSession) -> ProviderResult<String> {
        {
            let token = session.oauth2.read().await;
            if !token.is_expired() {
                return Ok(token.authorization());
            }
        }

        let mut token = session.oauth2.write().await;
        // Another request may have refreshed while we waited for the lock
        if token.is_expired() {
            info!("OAuth2 token expired, exchanging for a new one");
            *token = self.exchange(&session.oauth1).await?;
        }
        Ok(token.authorization())
    }

    /// GET a connectapi path. 204 responses yield `Value::Null`.
    async fn connectapi(&self, session: &ConnectSession, path: &str) -> ProviderResult<Value> {
        let url = format!("{}{}", self.connectapi_base(), path);
        let authorization = self.authorization(session).await?;

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, API_USER_AGENT)
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| {
                warn!(path = path, error = %e, "Provider request failed");
                ProviderError::from(e)
            })?;

        let response = Self::check_response(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(response.json().await?)
    }

    /// Wrap freshly obtained tokens into a session, loading the profile.
    /// The profile call is what tells us the provider accepts the tokens.
    async fn open_session(
        &self,
        oauth1: OAuth1Token,
        oauth2: OAuth2Token,
    ) -> ProviderResult<ConnectSession> {
        let mut session = ConnectSession {
            oauth1,
            oauth2: RwLock::new(oauth2),
            display_name: String::new(),
            full_name: None,
        };

        let profile: SocialProfile = serde_json::from_value(self.connectapi(&session, PROFILE_PATH).await?)?;
        session.display_name = profile.display_name.ok_or_else(|| {
            ProviderError::Other("Profile response did not include a display name".to_string())
        })?;
        session.full_name = profile.full_name;
        Ok(session)
    }

    fn user_path(&self, session: &ConnectSession, prefix: &str) -> String {
        format!("{}/{}", prefix, urlencoding::encode(&session.display_name))
    }
}

#[async_trait]
impl ProviderClient for ConnectClient {
    type Session = ConnectSession;

    async fn resume(&self, token_store: &Path) -> ProviderResult<ConnectSession> {
        let oauth1: OAuth1Token = read_token(&token_store.join(OAUTH1_FILE)).await?;
        let oauth2: OAuth2Token = read_token(&token_store.join(OAUTH2_FILE)).await?;
        if let Some(ref domain) = oauth1.domain {
            if domain != &self.domain {
                warn!(stored = %domain, configured = %self.domain, "Token store was written for another domain");
            }
        }

        let session = self.open_session(oauth1, oauth2).await?;
        info!(display_name = %session.display_name, "Resumed session from token store");
        Ok(session)
    }

    async fn login(&self, credentials: &Credentials) -> ProviderResult<ConnectSession> {
        // Fresh cookie jar per login so SSO state never leaks between attempts
        let http = Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProviderError::Other(format!("Failed to build HTTP client: {}", e)))?;

        let ticket = sso::sign_in(&http, &self.domain, credentials).await?;
        let oauth1 = self.preauthorize(&http, &ticket).await?;
        let oauth2 = self.exchange(&oauth1).await?;

        let session = self.open_session(oauth1, oauth2).await?;
        info!(display_name = %session.display_name, "Logged in with credentials");
        Ok(session)
    }

    async fn dump_tokens(&self, session: &ConnectSession, token_store: &Path) -> ProviderResult<()> {
        let oauth1 = serde_json::to_vec_pretty(&session.oauth1)?;
        let oauth2 = serde_json::to_vec_pretty(&*session.oauth2.read().await)?;

        // Both files are swapped in together so a reader never sees a mixed pair
        token_store::replace_dir(
            token_store,
            &[(OAUTH1_FILE, oauth1.as_slice()), (OAUTH2_FILE, oauth2.as_slice())],
        )
        .await
        .map_err(|e| {
            ProviderError::Other(format!("Failed to write {}: {}", token_store.display(), e))
        })?;
        debug!(path = %token_store.display(), "Tokens written to token store");
        Ok(())
    }

    async fn full_name(&self, session: &ConnectSession) -> ProviderResult<Option<String>> {
        Ok(session.full_name.clone())
    }

    async fn device_last_used(&self, session: &ConnectSession) -> ProviderResult<Value> {
        self.connectapi(session, "/device-service/deviceservice/mylastused").await
    }

    async fn user_summary(&self, session: &ConnectSession, date: NaiveDate) -> ProviderResult<Value> {
        let path = format!(
            "{}?calendarDate={}",
            self.user_path(session, "/usersummary-service/usersummary/daily"),
            date
        );
        self.connectapi(session, &path).await
    }

    async fn heart_rates(&self, session: &ConnectSession, date: NaiveDate) -> ProviderResult<Value> {
        let path = format!(
            "{}?date={}",
            self.user_path(session, "/wellness-service/wellness/dailyHeartRate"),
            date
        );
        self.connectapi(session, &path).await
    }

    async fn activities(
        &self,
        session: &ConnectSession,
        start: u32,
        limit: u32,
    ) -> ProviderResult<Vec<Value>> {
        let path = format!(
            "/activitylist-service/activities/search/activities?start={}&limit={}",
            start, limit
        );
        match self.connectapi(session, &path).await? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(ProviderError::Other(format!(
                "Unexpected activity list response: {}",
                other
            ))),
        }
    }

    async fn hydration(&self, session: &ConnectSession, date: NaiveDate) -> ProviderResult<Value> {
        let path = format!("/usersummary-service/usersummary/hydration/daily/{}", date);
        self.connectapi(session, &path).await
    }

    async fn sleep(&self, session: &ConnectSession, date: NaiveDate) -> ProviderResult<Value> {
        let path = format!(
            "{}?date={}&nonSleepBufferMinutes={}",
            self.user_path(session, "/wellness-service/wellness/dailySleepData"),
            date,
            SLEEP_BUFFER_MINUTES
        );
        self.connectapi(session, &path).await
    }

    async fn stress(&self, session: &ConnectSession, date: NaiveDate) -> ProviderResult<Value> {
        let path = format!("/wellness-service/wellness/dailyStress/{}", date);
        self.connectapi(session, &path).await
    }

    async fn body_composition(
        &self,
        session: &ConnectSession,
        date: NaiveDate,
    ) -> ProviderResult<Value> {
        let path = format!(
            "/weight-service/weight/dateRange?startDate={}&endDate={}",
            date, date
        );
        self.connectapi(session, &path).await
    }
}

async fn read_token<T: DeserializeOwned>(path: &Path) -> ProviderResult<T> {
    let contents = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ProviderError::Authentication(format!("No saved token at {}", path.display()))
        }
        _ => ProviderError::Other(format!("Failed to read {}: {}", path.display(), e)),
    })?;
    serde_json::from_slice(&contents)
        .map_err(|e| ProviderError::Other(format!("Failed to parse {}: {}", path.display(), e)))
}

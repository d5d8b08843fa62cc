//! WeCom (WeChat Work) HTTP client with token caching and bounded retry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::{DirectoryError, DirectoryResult, DirectorySource};
use crate::models::directory::{DirectoryDepartment, DirectoryUser};

/// Public WeCom API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://qyapi.weixin.qq.com";

/// `errcode` values meaning the cached access token is no longer accepted.
const TOKEN_EXPIRED_CODES: [i64; 2] = [40014, 42001];

/// Refresh the cached access token this long before WeCom expires it.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// WeCom user status: 2 = disabled, 5 = left the company.
const INACTIVE_USER_STATUSES: [i64; 2] = [2, 5];

/// Connection settings for the WeCom API.
#[derive(Clone, Debug)]
pub struct WeComConfig {
    pub corp_id: String,
    pub corp_secret: String,
    pub base_url: String,
    /// Department whose subtree is synchronised.
    pub root_department_id: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl WeComConfig {
    pub fn new(corp_id: impl Into<String>, corp_secret: impl Into<String>) -> Self {
        Self {
            corp_id: corp_id.into(),
            corp_secret: corp_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            root_department_id: "1".to_string(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }
}

/// Every WeCom response carries `errcode`/`errmsg` next to the payload.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenBody {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DepartmentListBody {
    department: Vec<WeComDepartment>,
}

#[derive(Debug, Deserialize)]
struct WeComDepartment {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    parentid: Option<i64>,
    #[serde(default)]
    order: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserListBody {
    userlist: Vec<WeComUser>,
}

#[derive(Debug, Deserialize)]
struct WeComUser {
    userid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    department: Vec<i64>,
    #[serde(default)]
    mobile: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default = "default_user_status")]
    status: i64,
}

fn default_user_status() -> i64 {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserInfoBody {
    #[serde(alias = "UserId")]
    userid: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<WeComDepartment> for DirectoryDepartment {
    fn from(d: WeComDepartment) -> Self {
        Self {
            external_id: d.id.to_string(),
            name: d.name,
            // The root department reports parent 0.
            parent_external_id: d.parentid.filter(|p| *p > 0).map(|p| p.to_string()),
            order: d.order,
        }
    }
}

impl From<WeComUser> for DirectoryUser {
    fn from(u: WeComUser) -> Self {
        Self {
            external_id: u.userid,
            name: u.name,
            department_ids: u.department.iter().map(|d| d.to_string()).collect(),
            mobile: non_empty(u.mobile),
            email: non_empty(u.email),
            position: non_empty(u.position),
            enabled: !INACTIVE_USER_STATUSES.contains(&u.status),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// WeCom API client.
#[derive(Debug)]
pub struct WeComClient {
    http: reqwest::Client,
    config: WeComConfig,
    token: Mutex<Option<CachedToken>>,
}

impl WeComClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: WeComConfig) -> DirectoryResult<Self> {
        if config.corp_id.is_empty() || config.corp_secret.is_empty() {
            return Err(DirectoryError::NotConfigured(
                "WECOM_CORP_ID and WECOM_CORP_SECRET are required".into(),
            ));
        }
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &WeComConfig {
        &self.config
    }

    /// GET with up to `max_attempts` tries and exponential backoff on
    /// transport failures and 5xx responses.
    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> DirectoryResult<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut delay = self.config.initial_backoff;
        let mut attempt = 1;
        loop {
            let result = self
                .http
                .get(&url)
                .query(query)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match result {
                Ok(resp) => return resp.json::<T>().await.map_err(DirectoryError::from),
                Err(e) if attempt < self.config.max_attempts && is_transient(&e) => {
                    warn!(
                        path,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "transient WeCom error, retrying after {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Call an endpoint and unwrap the `errcode` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> DirectoryResult<T> {
        let envelope: Envelope<T> = self.get_with_retry(path, query).await?;
        if envelope.errcode != 0 {
            return Err(DirectoryError::Api {
                code: envelope.errcode,
                message: envelope.errmsg,
            });
        }
        Ok(envelope.body)
    }

    async fn access_token(&self) -> DirectoryResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let body: TokenBody = self
            .call(
                "/cgi-bin/gettoken",
                &[
                    ("corpid", self.config.corp_id.as_str()),
                    ("corpsecret", self.config.corp_secret.as_str()),
                ],
            )
            .await?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        debug!(expires_in = body.expires_in, "WeCom access token refreshed");
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(body.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Call an endpoint with the access token, refreshing it once if WeCom
    /// reports it expired.
    async fn authed_call<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> DirectoryResult<T> {
        let mut refreshed = false;
        loop {
            let token = self.access_token().await?;
            let mut params = vec![("access_token", token.as_str())];
            params.extend_from_slice(query);
            match self.call(path, &params).await {
                Err(DirectoryError::Api { code, .. })
                    if !refreshed && TOKEN_EXPIRED_CODES.contains(&code) =>
                {
                    debug!(code, "WeCom token rejected, refreshing");
                    self.invalidate_token().await;
                    refreshed = true;
                }
                other => return other,
            }
        }
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout()
        || e.is_connect()
        || e.status().is_some_and(|s| s.is_server_error())
}

#[async_trait]
impl DirectorySource for WeComClient {
    #[instrument(skip(self))]
    async fn list_departments(&self) -> DirectoryResult<Vec<DirectoryDepartment>> {
        let body: DepartmentListBody = self
            .authed_call(
                "/cgi-bin/department/list",
                &[("id", self.config.root_department_id.as_str())],
            )
            .await?;
        Ok(body.department.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_users(&self, department_id: &str) -> DirectoryResult<Vec<DirectoryUser>> {
        let body: UserListBody = self
            .authed_call("/cgi-bin/user/list", &[("department_id", department_id)])
            .await?;
        Ok(body.userlist.into_iter().map(Into::into).collect())
    }

    #[instrument(skip_all)]
    async fn user_id_by_code(&self, code: &str) -> DirectoryResult<String> {
        let body: UserInfoBody = self
            .authed_call("/cgi-bin/auth/getuserinfo", &[("code", code)])
            .await?;
        body.userid
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DirectoryError::Api {
                code: -1,
                message: "code does not belong to a member of this corp".into(),
            })
    }
}

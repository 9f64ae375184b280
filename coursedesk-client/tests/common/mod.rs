// coursedesk-client/tests/common/mod.rs
// In-process stand-ins for the auth and role endpoints

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coursedesk_client::store::{AUTH_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use coursedesk_client::{
    AuthService, ClientError, ClientResult, LoginRequest, MemoryStore, PermissionRecord,
    ProfileRole, RoleRecord, RoleService, SessionConfig, SessionManager, SessionStore, TokenPair,
    UserProfile, UserRecord,
};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};

pub const SECRET: &[u8] = b"coursedesk-test-secret";

pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Sign `claims` the way the API does; signatures are never checked client side
pub fn mint(claims: &Value) -> String {
    jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET))
        .expect("encode token")
}

/// Token for the standard test user expiring `ttl` seconds from now
pub fn token_expiring_in(ttl: i64) -> String {
    let mut claims = default_claims();
    claims["exp"] = json!(now_secs() + ttl);
    mint(&claims)
}

pub fn default_claims() -> Value {
    json!({
        "userId": "u-100",
        "roleName": "instructor",
        "roleId": "r-7",
        "fullName": "Grace Hopper",
    })
}

pub fn instructor_role() -> RoleRecord {
    RoleRecord {
        id: "r-7".into(),
        name: "instructor".into(),
        description: Some("Course instructor".into()),
        is_active: true,
        permissions: vec![
            PermissionRecord::new("p1", "courses:read"),
            PermissionRecord::new("p2", "courses:write").with_route("POST", "/api/courses/*"),
        ],
    }
}

pub fn cached_user() -> UserRecord {
    UserRecord {
        id: "u-100".into(),
        email: "grace@example.com".into(),
        full_name: Some("Grace Hopper".into()),
        role: "instructor".into(),
        role_id: Some("r-7".into()),
        department: None,
        last_login: Some(1_700_000_000_000),
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Auth endpoints issuing real JWTs
pub struct FakeAuth {
    claims: Mutex<Value>,
    ttl: Mutex<i64>,
    refresh_delay: Mutex<Option<Duration>>,
    pub fail_login: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl FakeAuth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            claims: Mutex::new(default_claims()),
            ttl: Mutex::new(3600),
            refresh_delay: Mutex::new(None),
            fail_login: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_claims(&self, claims: Value) {
        *self.claims.lock().unwrap() = claims;
    }

    pub fn set_ttl(&self, ttl: i64) {
        *self.ttl.lock().unwrap() = ttl;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = Some(delay);
    }

    fn issue(&self) -> TokenPair {
        let claims = self.claims.lock().unwrap().clone();
        self.issue_for(claims)
    }

    /// Every pair is distinct, even when issued within the same second
    fn issue_for(&self, mut claims: Value) -> TokenPair {
        let serial = self.login_calls.load(Ordering::SeqCst) + self.refresh_calls.load(Ordering::SeqCst);
        claims["exp"] = json!(now_secs() + *self.ttl.lock().unwrap());
        claims["jti"] = json!(serial);
        TokenPair::new(mint(&claims), format!("refresh-{serial}"))
    }

    pub fn logins(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn login(&self, _request: &LoginRequest) -> ClientResult<TokenPair> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(ClientError::Unauthorized("bad credentials".into()));
        }
        Ok(self.issue())
    }

    async fn refresh(&self, _refresh_token: &str) -> ClientResult<TokenPair> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        // Tokens are for whoever held the refresh token when it was sent
        let claims = self.claims.lock().unwrap().clone();
        let delay = *self.refresh_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(ClientError::Unauthorized("refresh token revoked".into()));
        }
        Ok(self.issue_for(claims))
    }

    async fn logout(&self, _access_token: &str) -> ClientResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Canned response of a fake endpoint
#[derive(Clone)]
pub enum Reply<T> {
    Ok(T),
    Forbidden,
    Fail,
}

impl<T: Clone> Reply<T> {
    fn get(&self) -> ClientResult<T> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Forbidden => Err(ClientError::Forbidden("insufficient role".into())),
            Reply::Fail => Err(ClientError::Internal("upstream unavailable".into())),
        }
    }
}

pub struct FakeRoles {
    details: Mutex<HashMap<String, Reply<RoleRecord>>>,
    list: Mutex<Reply<Vec<RoleRecord>>>,
    profile: Mutex<Reply<UserProfile>>,
    pub detail_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
}

impl FakeRoles {
    /// Serves the instructor role by id and in the list
    pub fn new() -> Arc<Self> {
        let role = instructor_role();
        let mut details = HashMap::new();
        details.insert(role.id.clone(), Reply::Ok(role.clone()));
        Arc::new(Self {
            details: Mutex::new(details),
            list: Mutex::new(Reply::Ok(vec![role])),
            profile: Mutex::new(Reply::Fail),
            detail_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_detail(&self, role_id: &str, reply: Reply<RoleRecord>) {
        self.details.lock().unwrap().insert(role_id.to_string(), reply);
    }

    pub fn set_list(&self, reply: Reply<Vec<RoleRecord>>) {
        *self.list.lock().unwrap() = reply;
    }

    pub fn set_profile(&self, reply: Reply<UserProfile>) {
        *self.profile.lock().unwrap() = reply;
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn profiles(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleService for FakeRoles {
    async fn role_by_id(&self, _access_token: &str, role_id: &str) -> ClientResult<RoleRecord> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.details.lock().unwrap().get(role_id).cloned();
        match reply {
            Some(reply) => reply.get(),
            None => Err(ClientError::NotFound(format!("role {role_id}"))),
        }
    }

    async fn list_roles(&self, _access_token: &str) -> ClientResult<Vec<RoleRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.list.lock().unwrap().get()
    }

    async fn current_user(&self, _access_token: &str) -> ClientResult<UserProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile.lock().unwrap().get()
    }
}

/// Profile whose embedded role carries `permissions`
pub fn profile_with(permissions: Option<Vec<PermissionRecord>>) -> UserProfile {
    UserProfile {
        id: "u-100".into(),
        email: Some("grace@example.com".into()),
        full_name: Some("Grace Hopper".into()),
        role_id: Some("r-7".into()),
        department: None,
        role: Some(ProfileRole {
            id: Some("r-7".into()),
            name: Some("instructor".into()),
            description: None,
            permissions,
        }),
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub auth: Arc<FakeAuth>,
    pub roles: Arc<FakeRoles>,
    pub store: Arc<MemoryStore>,
    pub session: SessionManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let auth = FakeAuth::new();
        let roles = FakeRoles::new();
        let store = Arc::new(MemoryStore::new());
        let session = SessionManager::new(config, auth.clone(), roles.clone(), store.clone());
        Self {
            auth,
            roles,
            store,
            session,
        }
    }

    /// Seed the store as a previous run would have left it
    pub fn persist(&self, access_token: &str, user: &UserRecord) {
        self.store.set(AUTH_TOKEN_KEY, access_token).unwrap();
        self.store.set(REFRESH_TOKEN_KEY, "refresh-seed").unwrap();
        self.store
            .set(USER_KEY, &serde_json::to_string(user).unwrap())
            .unwrap();
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap()
    }
}

/// Config with a long validation interval so the monitor stays out of the way
pub fn test_config() -> SessionConfig {
    SessionConfig::new("http://coursedesk.test/api")
        .with_validation_interval(Duration::from_secs(3600))
        .with_initial_delay(Duration::from_secs(3600))
}

pub fn credentials() -> LoginRequest {
    LoginRequest::new("grace@example.com", "hunter2")
}

//! REST implementation of the service traits

use async_trait::async_trait;
use shared::{LoginRequest, RefreshRequest, RoleList, RoleRecord, TokenPair, UserProfile};

use super::{AuthService, RoleService};
use crate::config::ApiRoutes;
use crate::http::NetworkHttpClient;
use crate::{ClientResult, SessionConfig};

/// Platform REST API
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: NetworkHttpClient,
    routes: ApiRoutes,
}

impl HttpApi {
    pub fn new(http: NetworkHttpClient, routes: ApiRoutes) -> Self {
        Self { http, routes }
    }

    pub fn from_config(config: &SessionConfig) -> ClientResult<Self> {
        Ok(Self::new(
            NetworkHttpClient::from_config(config)?,
            config.routes.clone(),
        ))
    }

    pub fn http(&self) -> &NetworkHttpClient {
        &self.http
    }
}

#[async_trait]
impl AuthService for HttpApi {
    async fn login(&self, request: &LoginRequest) -> ClientResult<TokenPair> {
        self.http.post(&self.routes.login, request, None).await
    }

    async fn refresh(&self, refresh_token: &str) -> ClientResult<TokenPair> {
        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.http.post(&self.routes.refresh, &request, None).await
    }

    async fn logout(&self, access_token: &str) -> ClientResult<()> {
        self.http
            .post_empty(&self.routes.logout, Some(access_token))
            .await
    }
}

#[async_trait]
impl RoleService for HttpApi {
    async fn role_by_id(&self, access_token: &str, role_id: &str) -> ClientResult<RoleRecord> {
        self.http
            .get(&self.routes.role_detail(role_id), Some(access_token))
            .await
    }

    async fn list_roles(&self, access_token: &str) -> ClientResult<Vec<RoleRecord>> {
        let list: RoleList = self.http.get(&self.routes.roles, Some(access_token)).await?;
        Ok(list.into_roles())
    }

    async fn current_user(&self, access_token: &str) -> ClientResult<UserProfile> {
        self.http
            .get(&self.routes.current_user, Some(access_token))
            .await
    }
}

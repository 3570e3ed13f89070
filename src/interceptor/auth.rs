use std::sync::Arc;

use tonic::metadata::MetadataMap;
use tonic::{Request, Status};
use tracing::{debug, info};

use super::request_id;
use crate::auth::TokenService;
use crate::error::FlareError;

/// 认证通过后写入请求扩展的用户标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// 从 `authorization` 元数据中取出 Bearer 令牌
pub fn extract_bearer(metadata: &MetadataMap) -> Option<&str> {
    let value = metadata.get("authorization")?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    (!token.is_empty()).then_some(token)
}

/// 认证拦截器
///
/// 令牌校验需要查询存储，是异步操作，因此不实现 tonic 的同步
/// `Interceptor`，由服务方法在入口处调用 [`AuthInterceptor::authorize`]。
#[derive(Clone)]
pub struct AuthInterceptor {
    token_service: Arc<TokenService>,
}

impl AuthInterceptor {
    pub fn new(token_service: Arc<TokenService>) -> Self {
        Self { token_service }
    }

    /// 校验请求携带的令牌，返回用户 ID
    pub async fn authenticate<T>(&self, req: &Request<T>) -> Result<String, Status> {
        let token = extract_bearer(req.metadata())
            .ok_or_else(|| Status::from(FlareError::authentication_required()))?;

        let user_id = self.token_service.validate(token).await.map_err(|err| {
            debug!(error = %err, "request rejected by auth interceptor");
            Status::from(err)
        })?;

        info!(
            user_id = %user_id,
            request_id = request_id(req.metadata()).unwrap_or_default(),
            "request authenticated"
        );
        Ok(user_id)
    }

    /// 认证成功后把 [`AuthenticatedUser`] 放入请求扩展
    pub async fn authorize<T>(&self, mut req: Request<T>) -> Result<Request<T>, Status> {
        let user_id = self.authenticate(&req).await?;
        req.extensions_mut().insert(AuthenticatedUser(user_id));
        Ok(req)
    }
}

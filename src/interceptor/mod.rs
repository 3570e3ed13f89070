//! gRPC 拦截器
//!
//! 目前只有会话令牌认证。

pub mod auth;

pub use auth::{AuthInterceptor, AuthenticatedUser, extract_bearer};

use tonic::metadata::MetadataMap;

/// 用于日志关联的请求标识，优先取 `x-request-id`，其次 `x-trace-id`
pub fn request_id(metadata: &MetadataMap) -> Option<&str> {
    ["x-request-id", "x-trace-id"]
        .into_iter()
        .filter_map(|key| metadata.get(key)?.to_str().ok())
        .find(|value| !value.is_empty())
}

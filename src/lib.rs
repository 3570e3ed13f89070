//! Flare Auth Core Library
//!
//! Session tokens with stateful revocation, one-time codes (phone / email)
//! with atomic rate limiting and brute-force lockout, and a captcha answer store.
//! All ephemeral state lives behind the [`cache::Cache`] trait.

pub mod auth;
pub mod cache;
pub mod captcha;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod otp;
pub mod retry;
pub mod telemetry;

// gRPC 认证拦截器（可选）
#[cfg(feature = "grpc")]
pub mod interceptor;

// Re-exports
pub use auth::{CacheTokenStore, TokenClaims, TokenRecord, TokenService, TokenStore};
pub use cache::{Cache, MemoryCache, RedisCache};
pub use captcha::{CaptchaChallenge, CaptchaService};
pub use config::{AuthConfig, Environment, SceneConfig};
pub use context::{DiagnosticSink, RequestContext};
pub use error::{
    ErrorBuilder, ErrorCategory, ErrorCode, FlareError, InfraResult, LocalizedError, Result,
};
pub use metrics::AuthMetrics;
pub use notify::{NotificationSender, Notifiers};
pub use otp::{OtpKind, OtpService};
pub use telemetry::init_tracing;

#[cfg(feature = "grpc")]
pub use error::{GrpcErrorExt, GrpcResult};
#[cfg(feature = "grpc")]
pub use interceptor::{AuthInterceptor, AuthenticatedUser};

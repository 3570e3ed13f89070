//! Flare Auth Core 错误处理模块
//!
//! 提供统一的错误代码、错误类别和错误转换。
//! 基础设施层（缓存、存储、通知通道）返回 [`InfraResult`]，
//! 在服务边界通过 [`InfraResultExt`] 记录完整错误并收敛为通用内部错误。

pub mod builder;
pub mod code;
pub mod conversions;
pub mod flare_error;
#[cfg(feature = "grpc")]
pub mod grpc;
pub mod localized;

// 重新导出公共类型
pub use builder::ErrorBuilder;
pub use code::{ErrorCategory, ErrorCode};
pub use flare_error::{FlareError, Result};
#[cfg(feature = "grpc")]
pub use grpc::{GrpcErrorExt, GrpcResult};
pub use localized::LocalizedError;

/// 基础设施层默认使用的结果类型
pub type InfraResult<T> = anyhow::Result<T>;

/// 记录基础设施错误并转换为对外的通用内部错误
pub fn map_infra_error<E>(error: E, context: &str) -> FlareError
where
    E: std::fmt::Display,
{
    tracing::error!(context, error = %error, "infrastructure failure");
    FlareError::internal()
}

/// `InfraResult` 的辅助扩展，用于快速转换为统一的业务错误类型
pub trait InfraResultExt<T> {
    /// 记录完整错误链，对外只暴露 `INTERNAL_ERROR`
    fn or_internal(self, context: &str) -> Result<T>;

    /// 记录完整错误链，对外返回给定的错误（不携带细节）
    fn or_error(self, context: &str, error: FlareError) -> Result<T>;
}

impl<T> InfraResultExt<T> for InfraResult<T> {
    fn or_internal(self, context: &str) -> Result<T> {
        self.map_err(|err| map_infra_error(format!("{err:#}"), context))
    }

    fn or_error(self, context: &str, error: FlareError) -> Result<T> {
        self.map_err(|err| {
            tracing::error!(context, error = %format!("{err:#}"), "infrastructure failure");
            error
        })
    }
}

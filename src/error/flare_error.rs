//! Flare 认证核心统一错误类型

use std::collections::HashMap;

use thiserror::Error;

use super::builder::ErrorBuilder;
use super::code::{ErrorCategory, ErrorCode};
use super::localized::LocalizedError;

/// 统一错误类型
#[derive(Error, Debug, Clone)]
pub enum FlareError {
    /// 可以暴露给调用方的错误
    #[error("错误 [{code}] {reason}", code = .code.as_str())]
    Localized {
        code: ErrorCode,
        reason: String,
        details: Option<String>,
        params: Option<HashMap<String, String>>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// 内部错误，对外只显示为 `INTERNAL_ERROR`
    #[error("系统错误: {0}")]
    System(String),
}

impl FlareError {
    pub fn localized(code: ErrorCode, reason: impl Into<String>) -> Self {
        ErrorBuilder::new(code).reason(reason).build_error()
    }

    /// 使用错误代码的默认文案
    pub fn from_code(code: ErrorCode) -> Self {
        ErrorBuilder::new(code).build_error()
    }

    // 会话

    pub fn authentication_required() -> Self {
        Self::from_code(ErrorCode::AuthenticationRequired)
    }

    /// 令牌过期、被撤销或不可信，三者对外完全一致
    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    // 验证码

    pub fn otp_send_too_frequent() -> Self {
        Self::from_code(ErrorCode::OtpSendTooFrequent)
    }

    /// 未发送、已过期或已被锁定
    pub fn otp_expired() -> Self {
        Self::from_code(ErrorCode::OtpExpired)
    }

    pub fn otp_invalid() -> Self {
        Self::from_code(ErrorCode::OtpInvalid)
    }

    pub fn otp_send_failed() -> Self {
        Self::from_code(ErrorCode::OtpSendFailed)
    }

    pub fn scene_not_found(scene: impl Into<String>) -> Self {
        ErrorBuilder::new(ErrorCode::SceneNotFound)
            .param("scene", scene)
            .build_error()
    }

    pub fn captcha_empty() -> Self {
        Self::from_code(ErrorCode::CaptchaEmpty)
    }

    pub fn captcha_invalid() -> Self {
        Self::from_code(ErrorCode::CaptchaInvalid)
    }

    /// 通知模板缺少供应商侧的配置
    pub fn template_not_configured(template: impl Into<String>) -> Self {
        ErrorBuilder::new(ErrorCode::TemplateNotConfigured)
            .param("template", template)
            .build_error()
    }

    // 通用

    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::InvalidParameter, reason)
    }

    /// 对外的通用内部错误，不携带任何基础设施细节
    pub fn internal() -> Self {
        Self::from_code(ErrorCode::InternalError)
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::ConfigurationError, reason)
    }

    /// 调用方取消了操作
    pub fn cancelled() -> Self {
        Self::from_code(ErrorCode::OperationCancelled)
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            FlareError::Localized { code, .. } => Some(*code),
            FlareError::System(_) => None,
        }
    }

    /// 系统错误一律视为内部错误
    pub fn category(&self) -> ErrorCategory {
        self.code()
            .map(|code| code.category())
            .unwrap_or(ErrorCategory::Internal)
    }

    pub fn reason(&self) -> &str {
        match self {
            FlareError::Localized { reason, .. } => reason,
            FlareError::System(msg) => msg,
        }
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == Some(code)
    }

    pub fn to_localized(self) -> LocalizedError {
        match self {
            FlareError::Localized {
                code,
                reason,
                details,
                params,
                timestamp,
            } => LocalizedError {
                code,
                reason,
                details,
                params,
                timestamp,
            },
            FlareError::System(_) => LocalizedError::new(
                ErrorCode::InternalError,
                ErrorCode::InternalError.default_reason(),
            ),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_some_and(|code| code.is_retryable())
    }
}

pub type Result<T> = std::result::Result<T, FlareError>;

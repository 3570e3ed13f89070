//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按来源分组，每组占用1000个代码范围：
/// - 2000-2999: 认证 / 会话相关错误
/// - 3000-3999: 验证码（OTP / 图形验证码）相关错误
/// - 6000-6999: 系统相关错误
/// - 8000-8999: 序列化相关错误
/// - 9000-9999: 通用错误
///
/// 对调用方可见的语义由 [`ErrorCode::category`] 决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 认证相关错误 (2000-2999)
    // ============================================================
    AuthenticationRequired = 2003,
    TokenExpired = 2006,
    SessionNotFound = 2007,

    // ============================================================
    // 验证码相关错误 (3000-3999)
    // ============================================================
    OtpSendTooFrequent = 3000,
    OtpExpired = 3001,
    OtpInvalid = 3002,
    OtpSendFailed = 3003,
    SceneNotFound = 3004,
    CaptchaEmpty = 3005,
    CaptchaInvalid = 3006,

    // ============================================================
    // 系统相关错误 (6000-6999)
    // ============================================================
    InternalError = 6000,
    ServiceUnavailable = 6001,
    ConfigurationError = 6003,
    TemplateNotConfigured = 6005,

    // ============================================================
    // 序列化相关错误 (8000-8999)
    // ============================================================
    SerializationError = 8000,
    DeserializationError = 8001,

    // ============================================================
    // 通用错误 (9000-9999)
    // ============================================================
    InvalidParameter = 9001,
    OperationTimeout = 9004,
    OperationCancelled = 9005,
    UnknownError = 9999,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            2003 => Some(ErrorCode::AuthenticationRequired),
            2006 => Some(ErrorCode::TokenExpired),
            2007 => Some(ErrorCode::SessionNotFound),
            3000 => Some(ErrorCode::OtpSendTooFrequent),
            3001 => Some(ErrorCode::OtpExpired),
            3002 => Some(ErrorCode::OtpInvalid),
            3003 => Some(ErrorCode::OtpSendFailed),
            3004 => Some(ErrorCode::SceneNotFound),
            3005 => Some(ErrorCode::CaptchaEmpty),
            3006 => Some(ErrorCode::CaptchaInvalid),
            6000 => Some(ErrorCode::InternalError),
            6001 => Some(ErrorCode::ServiceUnavailable),
            6003 => Some(ErrorCode::ConfigurationError),
            6005 => Some(ErrorCode::TemplateNotConfigured),
            8000 => Some(ErrorCode::SerializationError),
            8001 => Some(ErrorCode::DeserializationError),
            9001 => Some(ErrorCode::InvalidParameter),
            9004 => Some(ErrorCode::OperationTimeout),
            9005 => Some(ErrorCode::OperationCancelled),
            9999 => Some(ErrorCode::UnknownError),
            _ => None,
        }
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::OtpSendTooFrequent => "OTP_SEND_TOO_FAST",
            ErrorCode::OtpExpired => "OTP_EXPIRED",
            ErrorCode::OtpInvalid => "OTP_INVALID",
            ErrorCode::OtpSendFailed => "OTP_SEND_ERROR",
            ErrorCode::SceneNotFound => "SCENE_NOT_FOUND",
            ErrorCode::CaptchaEmpty => "IMAGE_CAPTCHA_EMPTY",
            ErrorCode::CaptchaInvalid => "IMAGE_CAPTCHA_VERIFY_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::TemplateNotConfigured => "TEMPLATE_NOT_CONFIGURED",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::DeserializationError => "DESERIALIZATION_ERROR",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::OperationTimeout => "OPERATION_TIMEOUT",
            ErrorCode::OperationCancelled => "OPERATION_CANCELLED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// 对调用方展示的默认文案
    pub fn default_reason(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationRequired => "缺少认证令牌",
            ErrorCode::TokenExpired => "Token 已过期",
            ErrorCode::SessionNotFound => "会话不存在",
            ErrorCode::OtpSendTooFrequent => "发送过于频繁，请稍后再试",
            ErrorCode::OtpExpired => "验证码已过期或未发送",
            ErrorCode::OtpInvalid => "验证码错误",
            ErrorCode::OtpSendFailed => "发送验证码错误",
            ErrorCode::SceneNotFound => "验证码场景错误",
            ErrorCode::CaptchaEmpty => "验证码不能为空",
            ErrorCode::CaptchaInvalid => "图片验证码错误",
            ErrorCode::InternalError => "服务内部错误",
            ErrorCode::ServiceUnavailable => "服务暂不可用",
            ErrorCode::ConfigurationError => "配置错误",
            ErrorCode::TemplateNotConfigured => "通知模板未配置",
            ErrorCode::SerializationError => "序列化失败",
            ErrorCode::DeserializationError => "反序列化失败",
            ErrorCode::InvalidParameter => "参数错误",
            ErrorCode::OperationTimeout => "操作超时",
            ErrorCode::OperationCancelled => "操作已取消",
            ErrorCode::UnknownError => "未知错误",
        }
    }

    /// 获取错误代码的类别
    ///
    /// 会话被撤销与自然过期、验证码被锁定与未发送/过期，
    /// 都归入 [`ErrorCategory::Expired`]。
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::AuthenticationRequired
            | ErrorCode::SceneNotFound
            | ErrorCode::CaptchaEmpty
            | ErrorCode::InvalidParameter => ErrorCategory::Validation,

            ErrorCode::OtpSendTooFrequent => ErrorCategory::RateLimit,

            ErrorCode::SessionNotFound => ErrorCategory::NotFound,

            ErrorCode::TokenExpired | ErrorCode::OtpExpired => ErrorCategory::Expired,

            ErrorCode::OtpInvalid | ErrorCode::CaptchaInvalid => ErrorCategory::InvalidCredential,

            ErrorCode::OtpSendFailed
            | ErrorCode::InternalError
            | ErrorCode::ServiceUnavailable
            | ErrorCode::ConfigurationError
            | ErrorCode::TemplateNotConfigured
            | ErrorCode::SerializationError
            | ErrorCode::DeserializationError
            | ErrorCode::OperationTimeout
            | ErrorCode::OperationCancelled
            | ErrorCode::UnknownError => ErrorCategory::Internal,
        }
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ServiceUnavailable | ErrorCode::OperationTimeout | ErrorCode::OtpSendFailed
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// 输入不合法（格式错误、未知场景）
    Validation,
    /// 发送过于频繁
    RateLimit,
    /// 资源不存在
    NotFound,
    /// 自然过期、被撤销或被锁定
    Expired,
    /// 凭据错误（未达到锁定阈值）
    InvalidCredential,
    /// 缓存 / 存储 / 传输故障
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "VALIDATION"),
            ErrorCategory::RateLimit => write!(f, "RATE_LIMIT"),
            ErrorCategory::NotFound => write!(f, "NOT_FOUND"),
            ErrorCategory::Expired => write!(f, "EXPIRED"),
            ErrorCategory::InvalidCredential => write!(f, "INVALID_CREDENTIAL"),
            ErrorCategory::Internal => write!(f, "INTERNAL"),
        }
    }
}

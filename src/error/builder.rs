//! 错误构建器
//!
//! 以错误代码的默认文案为起点，按需覆盖原因并追加参数。
//! 参数只放可以回显给调用方的标识（场景、通道、jti），不放接收方或验证码。

use std::collections::HashMap;

use super::{ErrorCode, FlareError, LocalizedError};
use crate::otp::OtpKind;

pub struct ErrorBuilder {
    code: ErrorCode,
    reason: Option<String>,
    details: Option<String>,
    params: HashMap<String, String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            reason: None,
            details: None,
            params: HashMap::new(),
        }
    }

    /// 覆盖默认文案
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// 标记所属的验证码通道与场景
    #[must_use]
    pub fn challenge(self, kind: OtpKind, scene: impl Into<String>) -> Self {
        self.param("kind", kind.as_str()).param("scene", scene)
    }

    pub fn build(self) -> LocalizedError {
        LocalizedError {
            reason: self
                .reason
                .unwrap_or_else(|| self.code.default_reason().to_string()),
            code: self.code,
            details: self.details,
            params: (!self.params.is_empty()).then_some(self.params),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn build_error(self) -> FlareError {
        self.build().into()
    }
}

impl From<ErrorCode> for ErrorBuilder {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

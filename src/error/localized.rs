//! 面向调用方的错误信息
//!
//! 只包含错误代码、原因与可选参数；基础设施细节不会出现在这里。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::code::{ErrorCategory, ErrorCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizedError {
    pub code: ErrorCode,
    pub reason: String,
    /// 仅用于非敏感的调试信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// 如 scene、kind、jti
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<HashMap<String, String>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl LocalizedError {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            details: None,
            params: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.as_ref()?.get(key).map(String::as_str)
    }

    /// 可以返回给调用方的文案，内部错误一律使用默认文案
    pub fn public_reason(&self) -> &str {
        if self.category() == ErrorCategory::Internal {
            self.code.default_reason()
        } else {
            &self.reason
        }
    }
}

impl fmt::Display for LocalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.reason)
    }
}

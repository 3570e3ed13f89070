//! 一次性验证码（手机 / 邮箱）
//!
//! 每个挑战由 `(kind, scene, receiver)` 三元组标识，
//! 发送与校验必须使用同一个三元组。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FlareError;

pub mod cache;
pub mod code;
pub mod service;

pub use cache::OtpCache;
pub use code::{DEFAULT_CODE_LENGTH, MAX_CODE_LENGTH, generate_code, normalize_length};
pub use service::{FAIL_WINDOW, MAX_FAIL_COUNT, OtpService};

/// 验证码接收通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpKind {
    Phone,
    Email,
}

impl OtpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OtpKind::Phone => "phone",
            OtpKind::Email => "email",
        }
    }
}

impl fmt::Display for OtpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpKind {
    type Err = FlareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone" => Ok(OtpKind::Phone),
            "email" => Ok(OtpKind::Email),
            other => Err(FlareError::invalid_parameter(format!("unknown otp kind: {other}"))),
        }
    }
}

//! 错误类型转换实现

use super::{ErrorCode, FlareError, LocalizedError};

impl From<serde_json::Error> for FlareError {
    fn from(err: serde_json::Error) -> Self {
        FlareError::localized(ErrorCode::SerializationError, format!("JSON 序列化错误: {}", err))
    }
}

impl From<toml::de::Error> for FlareError {
    fn from(err: toml::de::Error) -> Self {
        FlareError::configuration(format!("配置解析失败: {}", err))
    }
}

impl From<std::io::Error> for FlareError {
    fn from(err: std::io::Error) -> Self {
        FlareError::configuration(format!("配置读取失败: {}", err))
    }
}

impl From<LocalizedError> for FlareError {
    fn from(err: LocalizedError) -> Self {
        FlareError::Localized {
            code: err.code,
            reason: err.reason,
            details: err.details,
            params: err.params,
            timestamp: err.timestamp,
        }
    }
}

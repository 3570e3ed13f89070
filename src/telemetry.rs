//! 日志初始化
//!
//! `RUST_LOG` 优先于配置中的 `log.level`。

use anyhow::{Context, anyhow};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

use crate::config::LogConfig;

/// 构造日志过滤器
pub fn env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log level {}", config.level)),
    }
}

/// 安装全局 tracing subscriber，重复调用返回错误
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<()> {
    let filter = env_filter(config)?;
    let registry = Registry::default().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

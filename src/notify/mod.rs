//! 通知通道
//!
//! 通道集合是封闭的（Mock / SMTP / HTTP 网关），在构造阶段由
//! [`NotificationSender::from_config`] 一次性选定，调用时不再判断环境或供应商。

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Environment, NotifyConfig, ProviderConfig, RetryConfig};
use crate::error::InfraResult;
use crate::otp::OtpKind;

pub mod http;
pub mod mock;
#[cfg(feature = "smtp")]
pub mod smtp;

pub use http::HttpGatewaySender;
pub use mock::{MockSender, SentMessage};
#[cfg(feature = "smtp")]
pub use smtp::SmtpSender;

/// 模板参数
pub type TemplateParams = HashMap<String, String>;

/// 供应商没有为该模板配置对应的模板编号
#[derive(Debug, thiserror::Error)]
#[error("template {template} is not configured for {channel}")]
pub struct TemplateNotConfigured {
    pub channel: OtpKind,
    pub template: String,
}

/// 通知发送器
#[derive(Clone)]
pub enum NotificationSender {
    Mock(MockSender),
    Http(HttpGatewaySender),
    #[cfg(feature = "smtp")]
    Smtp(SmtpSender),
}

impl NotificationSender {
    /// 根据配置构造发送器，开发环境始终使用 Mock
    pub fn from_config(
        channel: OtpKind,
        provider: &ProviderConfig,
        environment: Environment,
        retry: &RetryConfig,
    ) -> InfraResult<Self> {
        if environment.is_dev() {
            info!(%channel, "dev environment, using mock notification sender");
            return Ok(Self::Mock(MockSender::new(channel)));
        }

        let sender = match provider {
            ProviderConfig::Mock => Self::Mock(MockSender::new(channel)),
            ProviderConfig::Http(cfg) => Self::Http(HttpGatewaySender::new(channel, cfg, retry)?),
            #[cfg(feature = "smtp")]
            ProviderConfig::Smtp(cfg) => Self::Smtp(SmtpSender::new(cfg, retry)?),
            #[cfg(not(feature = "smtp"))]
            ProviderConfig::Smtp(_) => {
                anyhow::bail!("smtp provider requires the `smtp` feature")
            }
        };
        info!(%channel, provider = sender.provider_name(), "notification sender ready");
        Ok(sender)
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Mock(_) => "mock",
            Self::Http(_) => "http",
            #[cfg(feature = "smtp")]
            Self::Smtp(_) => "smtp",
        }
    }

    /// 发送模板消息；取消会中断正在进行的发送与重试等待
    pub async fn send(
        &self,
        receiver: &str,
        template: &str,
        params: &TemplateParams,
        cancel: &CancellationToken,
    ) -> InfraResult<()> {
        match self {
            Self::Mock(sender) => sender.send(receiver, template, params).await,
            Self::Http(sender) => sender.send(receiver, template, params, cancel).await,
            #[cfg(feature = "smtp")]
            Self::Smtp(sender) => sender.send(receiver, template, params, cancel).await,
        }
    }
}

/// 手机与邮箱两个通道的发送器
#[derive(Clone)]
pub struct Notifiers {
    pub sms: NotificationSender,
    pub email: NotificationSender,
}

impl Notifiers {
    pub fn new(sms: NotificationSender, email: NotificationSender) -> Self {
        Self { sms, email }
    }

    pub fn from_config(config: &NotifyConfig, environment: Environment) -> InfraResult<Self> {
        Ok(Self {
            sms: NotificationSender::from_config(
                OtpKind::Phone,
                &config.sms,
                environment,
                &config.retry,
            )?,
            email: NotificationSender::from_config(
                OtpKind::Email,
                &config.email,
                environment,
                &config.retry,
            )?,
        })
    }

    /// 两个通道都使用 Mock
    pub fn mock() -> Self {
        Self {
            sms: NotificationSender::Mock(MockSender::new(OtpKind::Phone)),
            email: NotificationSender::Mock(MockSender::new(OtpKind::Email)),
        }
    }

    pub fn for_kind(&self, kind: OtpKind) -> &NotificationSender {
        match kind {
            OtpKind::Phone => &self.sms,
            OtpKind::Email => &self.email,
        }
    }
}

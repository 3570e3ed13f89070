use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tracing::info;

use super::TemplateParams;
use crate::error::InfraResult;
use crate::otp::OtpKind;

/// Mock 通道记录的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub receiver: String,
    pub template: String,
    pub params: TemplateParams,
}

/// 不真正发送，只记录日志并保存到发件箱
#[derive(Debug, Clone)]
pub struct MockSender {
    channel: OtpKind,
    outbox: Arc<Mutex<Vec<SentMessage>>>,
    rejecting: bool,
}

impl MockSender {
    pub fn new(channel: OtpKind) -> Self {
        Self {
            channel,
            outbox: Arc::new(Mutex::new(Vec::new())),
            rejecting: false,
        }
    }

    /// 模拟供应商故障：所有发送都失败
    pub fn rejecting(channel: OtpKind) -> Self {
        Self {
            rejecting: true,
            ..Self::new(channel)
        }
    }

    pub async fn send(
        &self,
        receiver: &str,
        template: &str,
        params: &TemplateParams,
    ) -> InfraResult<()> {
        if self.rejecting {
            return Err(anyhow!("mock {} provider rejected the message", self.channel));
        }

        info!(
            channel = %self.channel,
            receiver,
            template,
            "mock send"
        );
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentMessage {
                receiver: receiver.to_string(),
                template: template.to_string(),
                params: params.clone(),
            });
        Ok(())
    }

    pub fn outbox(&self) -> Vec<SentMessage> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 发给指定接收方的最后一条消息
    pub fn last_sent_to(&self, receiver: &str) -> Option<SentMessage> {
        self.outbox()
            .into_iter()
            .rev()
            .find(|message| message.receiver == receiver)
    }
}

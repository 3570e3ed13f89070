use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{TemplateNotConfigured, TemplateParams};
use crate::config::{HttpGatewayConfig, RetryConfig};
use crate::error::InfraResult;
use crate::otp::OtpKind;
use crate::retry::{ExponentialBackoffPolicy, retry_with_cancel};

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    receiver: &'a str,
    sign_name: &'a str,
    template_code: &'a str,
    params: &'a TemplateParams,
}

/// 通过 HTTP 中继网关调用短信 / 邮件供应商
///
/// 目标协议是阿里云短信 `SendSms` 风格的中继：网关把 `sign_name`、
/// `template_code` 与 JSON 模板参数原样转交给供应商，对应
/// `SignName`、`TemplateCode`、`TemplateParam` 三个字段，`receiver` 对应 `PhoneNumbers`。
/// 本端不直接实现供应商的签名算法，鉴权由网关负责。
///
/// 请求体为 JSON `{receiver, sign_name, template_code, params}`，
/// 以 Bearer 方式携带 api key，非 2xx 响应视为失败并按退避策略重试。
#[derive(Clone)]
pub struct HttpGatewaySender {
    channel: OtpKind,
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    sign_name: String,
    template_mapping: Arc<HashMap<String, String>>,
    policy: Arc<ExponentialBackoffPolicy>,
}

impl HttpGatewaySender {
    pub fn new(
        channel: OtpKind,
        config: &HttpGatewayConfig,
        retry: &RetryConfig,
    ) -> InfraResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            channel,
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            sign_name: config.sign_name.clone(),
            template_mapping: Arc::new(config.template_mapping.clone()),
            policy: Arc::new(ExponentialBackoffPolicy::from_config(retry)),
        })
    }

    pub async fn send(
        &self,
        receiver: &str,
        template: &str,
        params: &TemplateParams,
        cancel: &CancellationToken,
    ) -> InfraResult<()> {
        let template_code = self
            .template_mapping
            .get(template)
            .filter(|code| !code.is_empty())
            .ok_or_else(|| TemplateNotConfigured {
                channel: self.channel,
                template: template.to_string(),
            })?;

        let body = GatewayRequest {
            receiver,
            sign_name: &self.sign_name,
            template_code,
            params,
        };

        let body = &body;
        retry_with_cancel(self.policy.as_ref(), cancel, "http gateway send", move || async move {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(self.api_key.expose_secret())
                .json(body)
                .send()
                .await
                .context("gateway request failed")?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(anyhow!("gateway responded {status}: {text}"));
            }
            debug!(channel = %self.channel, %status, "gateway accepted message");
            Ok(())
        })
        .await?;

        info!(channel = %self.channel, template, "notification sent via http gateway");
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tera::Tera;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::TemplateParams;
use crate::config::{RetryConfig, SmtpConfig};
use crate::error::InfraResult;
use crate::retry::{ExponentialBackoffPolicy, retry_with_cancel};

/// SMTP 邮件发送器
///
/// 模板在构造时一次性加载（`{templates_dir}/*.html`），
/// 发送时按模板名渲染 `{template}.html`，标题取自 `subjects` 映射。
#[derive(Clone)]
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    templates: Arc<Tera>,
    subjects: Arc<HashMap<String, String>>,
    policy: Arc<ExponentialBackoffPolicy>,
}

impl SmtpSender {
    pub fn new(config: &SmtpConfig, retry: &RetryConfig) -> InfraResult<Self> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .context("failed to create smtp transport")?
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        let from = config
            .from
            .parse()
            .with_context(|| format!("invalid from address {}", config.from))?;

        let pattern = format!("{}/*.html", config.templates_dir.trim_end_matches('/'));
        let templates = Tera::new(&pattern)
            .with_context(|| format!("failed to load email templates from {pattern}"))?;

        Ok(Self {
            transport,
            from,
            templates: Arc::new(templates),
            subjects: Arc::new(config.subjects.clone()),
            policy: Arc::new(ExponentialBackoffPolicy::from_config(retry)),
        })
    }

    fn render(&self, template: &str, params: &TemplateParams) -> InfraResult<String> {
        let context = tera::Context::from_serialize(params).context("invalid template params")?;
        self.templates
            .render(&format!("{template}.html"), &context)
            .with_context(|| format!("failed to render email template {template}"))
    }

    fn build_message(
        &self,
        to: &str,
        template: &str,
        params: &TemplateParams,
    ) -> InfraResult<Message> {
        let subject = self
            .subjects
            .get(template)
            .ok_or_else(|| anyhow!("no subject configured for template {template}"))?;
        let to: Mailbox = to.parse().with_context(|| format!("invalid email address {to}"))?;
        let body = self.render(template, params)?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .context("failed to build email message")
    }

    pub async fn send(
        &self,
        to: &str,
        template: &str,
        params: &TemplateParams,
        cancel: &CancellationToken,
    ) -> InfraResult<()> {
        let message = self.build_message(to, template, params)?;
        let message = &message;

        retry_with_cancel(self.policy.as_ref(), cancel, "smtp send", move || async move {
            self.transport
                .send(message.clone())
                .await
                .map(|_| ())
                .context("smtp delivery failed")
        })
        .await?;

        info!(template, "email sent via smtp");
        Ok(())
    }
}

//! 图形验证码答案存储
//!
//! 图片渲染由外部完成，这里只负责生成答案、保存与一次性校验。

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::cache::Cache;
use crate::config::Environment;
use crate::context::RequestContext;
use crate::error::{FlareError, InfraResultExt, Result};
use crate::metrics::AuthMetrics;
use crate::otp::generate_code;

/// 答案有效期
pub const CAPTCHA_TTL: Duration = Duration::from_secs(600);

/// 答案位数
pub const CAPTCHA_LENGTH: i32 = 4;

/// 写入调试输出时使用的键
pub const CAPTCHA_DIAGNOSTIC_KEY: &str = "captcha_answer";

/// 新生成的验证码
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub id: String,
    pub answer: String,
}

pub struct CaptchaService {
    cache: Arc<dyn Cache>,
    environment: Environment,
    metrics: Option<AuthMetrics>,
}

impl CaptchaService {
    pub fn new(cache: Arc<dyn Cache>, environment: Environment) -> Self {
        Self {
            cache,
            environment,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn key(id: &str) -> String {
        format!("captcha:{id}")
    }

    /// 生成验证码并保存答案，调用方据此渲染图片
    pub async fn generate(&self, ctx: &RequestContext) -> Result<CaptchaChallenge> {
        if ctx.is_cancelled() {
            return Err(FlareError::cancelled());
        }

        let id = Uuid::new_v4().simple().to_string();
        let answer = generate_code(CAPTCHA_LENGTH);
        self.cache
            .set(&Self::key(&id), &answer, Some(CAPTCHA_TTL))
            .await
            .or_internal("captcha store answer")?;

        if !self.environment.is_prod() {
            if let Some(sink) = ctx.diagnostics() {
                sink.record(CAPTCHA_DIAGNOSTIC_KEY, answer.as_str());
            }
        }
        debug!(captcha_id = %id, "captcha generated");
        Ok(CaptchaChallenge { id, answer })
    }

    /// 校验答案，无论结果如何答案都只能使用一次
    pub async fn verify(&self, id: &str, answer: &str) -> Result<()> {
        let answer = answer.trim();
        if id.is_empty() || answer.is_empty() {
            return Err(FlareError::captcha_empty());
        }

        let key = Self::key(id);
        let stored = self
            .cache
            .take(&key)
            .await
            .or_internal("captcha consume answer")?;

        let matched = stored.is_some_and(|stored| stored.eq_ignore_ascii_case(answer));
        if let Some(metrics) = &self.metrics {
            metrics.captcha_verified(matched);
        }
        if !matched {
            debug!(captcha_id = %id, "captcha rejected");
            return Err(FlareError::captcha_invalid());
        }
        Ok(())
    }
}

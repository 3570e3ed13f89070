use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::cache::OtpCache;
use super::code::generate_code;
use super::OtpKind;
use crate::cache::Cache;
use crate::config::{Environment, OtpConfig, SceneConfig};
use crate::context::RequestContext;
use crate::error::{FlareError, InfraResultExt, Result};
use crate::metrics::AuthMetrics;
use crate::notify::{Notifiers, TemplateNotConfigured, TemplateParams};
use crate::retry::Cancelled;

/// 达到该失败次数后，挑战按过期处理
pub const MAX_FAIL_COUNT: i64 = 5;

/// 失败计数器的固定窗口，与验证码有效期无关
pub const FAIL_WINDOW: Duration = Duration::from_secs(3600);

/// 验证码发送与校验
///
/// 限流与防暴力破解全部依赖共享缓存上的原子操作，
/// 多实例部署时不需要进程内加锁。
pub struct OtpService {
    cache: OtpCache,
    scenes: OtpConfig,
    notifiers: Notifiers,
    environment: Environment,
    metrics: Option<AuthMetrics>,
}

impl OtpService {
    pub fn new(
        cache: Arc<dyn Cache>,
        scenes: OtpConfig,
        notifiers: Notifiers,
        environment: Environment,
    ) -> Self {
        Self {
            cache: OtpCache::new(cache),
            scenes,
            notifiers,
            environment,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn notifiers(&self) -> &Notifiers {
        &self.notifiers
    }

    fn scene(&self, kind: OtpKind, scene: &str) -> Result<&SceneConfig> {
        self.scenes
            .scene(kind, scene)
            .ok_or_else(|| FlareError::scene_not_found(scene))
    }

    fn reject(&self, kind: OtpKind, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.otp_rejected(kind.as_str(), reason);
        }
    }

    /// 发送验证码，返回验证码的过期时间
    ///
    /// 发送失败时不缓存验证码，但已抢占的重发间隔标记保留到自然过期。
    pub async fn send_code(
        &self,
        kind: OtpKind,
        scene: &str,
        receiver: &str,
        ctx: &RequestContext,
    ) -> Result<DateTime<Utc>> {
        if receiver.is_empty() {
            return Err(FlareError::invalid_parameter("receiver is required"));
        }
        let config = self.scene(kind, scene)?;
        if ctx.is_cancelled() {
            return Err(FlareError::cancelled());
        }

        let acquired = self
            .cache
            .try_acquire_interval(kind, scene, receiver, config.resend_interval())
            .await
            .or_internal("otp acquire interval guard")?;
        if !acquired {
            debug!(%kind, scene, "otp resend rejected by interval guard");
            self.reject(kind, "rate_limited");
            return Err(FlareError::otp_send_too_frequent());
        }

        let code = generate_code(config.code_length);
        let mut params = TemplateParams::new();
        params.insert("code".to_string(), code.clone());

        if let Err(err) = self
            .notifiers
            .for_kind(kind)
            .send(receiver, &config.template, &params, ctx.cancellation())
            .await
        {
            if err.is::<Cancelled>() {
                warn!(%kind, scene, "otp send cancelled by caller");
                return Err(FlareError::cancelled());
            }
            error!(%kind, scene, error = %format!("{err:#}"), "failed to deliver otp");
            self.reject(kind, "send_failed");
            if err.is::<TemplateNotConfigured>() {
                return Err(FlareError::template_not_configured(config.template.as_str()));
            }
            return Err(FlareError::otp_send_failed());
        }

        let expires_in = config.expires_in();
        self.cache
            .store_code(kind, scene, receiver, &code, expires_in)
            .await
            .or_error("otp store code after delivery", FlareError::otp_send_failed())?;
        self.cache
            .clear_failures(kind, scene, receiver)
            .await
            .or_internal("otp clear failure counter")?;

        if !self.environment.is_prod() {
            if let Some(sink) = ctx.diagnostics() {
                sink.record("otp", code.as_str());
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.otp_sent(kind.as_str(), scene);
        }
        info!(%kind, scene, "otp sent");

        let expires_in = chrono::Duration::from_std(expires_in)
            .map_err(|err| crate::error::map_infra_error(err, "otp expiry out of range"))?;
        Ok(Utc::now() + expires_in)
    }

    /// 校验验证码，成功后验证码立即失效
    ///
    /// 未发送、已过期与被锁定统一返回 `OTP_EXPIRED`。
    pub async fn verify_code(
        &self,
        kind: OtpKind,
        scene: &str,
        receiver: &str,
        input: &str,
    ) -> Result<()> {
        if receiver.is_empty() || input.is_empty() {
            return Err(FlareError::invalid_parameter("receiver and code are required"));
        }
        self.scene(kind, scene)?;

        let Some(stored) = self
            .cache
            .load_code(kind, scene, receiver)
            .await
            .or_internal("otp load code")?
        else {
            self.reject(kind, "expired");
            return Err(FlareError::otp_expired());
        };

        let attempts = self
            .cache
            .record_attempt(kind, scene, receiver, FAIL_WINDOW)
            .await
            .or_internal("otp increment failure counter")?;
        if attempts > MAX_FAIL_COUNT {
            self.reject(kind, "locked");
            return Err(FlareError::otp_expired());
        }

        if stored != input {
            if attempts >= MAX_FAIL_COUNT {
                warn!(%kind, scene, attempts, "otp challenge locked");
                self.reject(kind, "locked");
                return Err(FlareError::otp_expired());
            }
            debug!(%kind, scene, attempts, "otp mismatch");
            self.reject(kind, "invalid");
            return Err(FlareError::otp_invalid());
        }

        // 同一验证码的并发提交只有删除成功的一方通过
        let consumed = self
            .cache
            .consume_code(kind, scene, receiver, &stored)
            .await
            .or_internal("otp consume code")?;
        if !consumed {
            self.reject(kind, "expired");
            return Err(FlareError::otp_expired());
        }
        self.cache
            .clear_failures(kind, scene, receiver)
            .await
            .or_internal("otp clear failure counter")?;

        if let Some(metrics) = &self.metrics {
            metrics.otp_verified(kind.as_str(), scene);
        }
        debug!(%kind, scene, "otp verified");
        Ok(())
    }
}

//! 指标收集模块
//!
//! 令牌与验证码相关的 Prometheus 计数器，注册到独立的 Registry，
//! 由宿主服务决定如何暴露。

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// 认证核心指标
#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    tokens_issued: IntCounter,
    tokens_revoked: IntCounterVec,
    token_rejections: IntCounter,
    otp_sent: IntCounterVec,
    otp_rejections: IntCounterVec,
    otp_verified: IntCounterVec,
    captcha_verifications: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new_custom(Some("flare_auth".to_string()), None)?)
    }

    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let tokens_issued = IntCounter::with_opts(Opts::new(
            "tokens_issued_total",
            "Number of session tokens issued",
        ))?;
        let tokens_revoked = IntCounterVec::new(
            Opts::new("tokens_revoked_total", "Number of revocation calls"),
            &["scope"],
        )?;
        let token_rejections = IntCounter::with_opts(Opts::new(
            "token_rejections_total",
            "Number of tokens rejected during validation",
        ))?;
        let otp_sent = IntCounterVec::new(
            Opts::new("otp_sent_total", "Number of one-time codes delivered"),
            &["kind", "scene"],
        )?;
        let otp_rejections = IntCounterVec::new(
            Opts::new("otp_rejections_total", "Number of rejected send/verify attempts"),
            &["kind", "reason"],
        )?;
        let otp_verified = IntCounterVec::new(
            Opts::new("otp_verified_total", "Number of successful verifications"),
            &["kind", "scene"],
        )?;
        let captcha_verifications = IntCounterVec::new(
            Opts::new("captcha_verifications_total", "Captcha verifications by result"),
            &["result"],
        )?;

        registry.register(Box::new(tokens_issued.clone()))?;
        registry.register(Box::new(tokens_revoked.clone()))?;
        registry.register(Box::new(token_rejections.clone()))?;
        registry.register(Box::new(otp_sent.clone()))?;
        registry.register(Box::new(otp_rejections.clone()))?;
        registry.register(Box::new(otp_verified.clone()))?;
        registry.register(Box::new(captcha_verifications.clone()))?;

        Ok(Self {
            registry,
            tokens_issued,
            tokens_revoked,
            token_rejections,
            otp_sent,
            otp_rejections,
            otp_verified,
            captcha_verifications,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 以 Prometheus 文本格式导出
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }

    pub fn token_issued(&self) {
        self.tokens_issued.inc();
    }

    /// `scope` 为 `single` 或 `all`
    pub fn token_revoked(&self, scope: &str) {
        self.tokens_revoked.with_label_values(&[scope]).inc();
    }

    pub fn token_rejected(&self) {
        self.token_rejections.inc();
    }

    pub fn otp_sent(&self, kind: &str, scene: &str) {
        self.otp_sent.with_label_values(&[kind, scene]).inc();
    }

    /// `reason`: rate_limited / invalid / expired / locked / send_failed
    pub fn otp_rejected(&self, kind: &str, reason: &str) {
        self.otp_rejections.with_label_values(&[kind, reason]).inc();
    }

    pub fn otp_verified(&self, kind: &str, scene: &str) {
        self.otp_verified.with_label_values(&[kind, scene]).inc();
    }

    pub fn captcha_verified(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.captcha_verifications.with_label_values(&[result]).inc();
    }

    /// 读取某个验证码拒绝原因的当前计数
    pub fn otp_rejection_count(&self, kind: &str, reason: &str) -> u64 {
        self.otp_rejections.with_label_values(&[kind, reason]).get()
    }
}

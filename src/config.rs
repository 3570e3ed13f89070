use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorBuilder, ErrorCode, FlareError, Result};
use crate::otp::OtpKind;

/// 运行环境，构造时注入各服务，决定调试输出与通知通道
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Test,
    Prod,
}

impl Environment {
    pub fn is_dev(self) -> bool {
        self == Environment::Dev
    }

    pub fn is_prod(self) -> bool {
        self == Environment::Prod
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = FlareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "test" | "testing" => Ok(Environment::Test),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(FlareError::configuration(format!("未知运行环境: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub log: LogConfig,
    pub redis: RedisConfig,
    pub token: TokenConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// HS256 签名密钥
    pub secret: SecretString,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_token_ttl")]
    pub ttl_secs: u64,
}

fn default_issuer() -> String {
    "flare".to_string()
}

fn default_token_ttl() -> u64 {
    7 * 24 * 3600
}

/// 单个验证码场景
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneConfig {
    /// 验证码长度，超出 [1, 10] 时在生成阶段钳制
    #[serde(default)]
    pub code_length: i32,
    pub expires_in_secs: u64,
    pub resend_interval_secs: u64,
    /// 通知模板名，由具体通道映射到供应商模板
    pub template: String,
}

impl SceneConfig {
    pub fn new(
        code_length: i32,
        expires_in: Duration,
        resend_interval: Duration,
        template: impl Into<String>,
    ) -> Self {
        Self {
            code_length,
            expires_in_secs: expires_in.as_secs(),
            resend_interval_secs: resend_interval.as_secs(),
            template: template.into(),
        }
    }

    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in_secs)
    }

    pub fn resend_interval(&self) -> Duration {
        Duration::from_secs(self.resend_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OtpConfig {
    #[serde(default)]
    pub phone_scenes: HashMap<String, SceneConfig>,
    #[serde(default)]
    pub email_scenes: HashMap<String, SceneConfig>,
}

impl OtpConfig {
    pub fn scene(&self, kind: OtpKind, name: &str) -> Option<&SceneConfig> {
        match kind {
            OtpKind::Phone => self.phone_scenes.get(name),
            OtpKind::Email => self.email_scenes.get(name),
        }
    }

    #[must_use]
    pub fn with_scene(
        mut self,
        kind: OtpKind,
        name: impl Into<String>,
        scene: SceneConfig,
    ) -> Self {
        match kind {
            OtpKind::Phone => self.phone_scenes.insert(name.into(), scene),
            OtpKind::Email => self.email_scenes.insert(name.into(), scene),
        };
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub sms: ProviderConfig,
    #[serde(default)]
    pub email: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// 通知通道配置，在构造阶段由工厂一次性解析
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    #[default]
    Mock,
    Smtp(SmtpConfig),
    Http(HttpGatewayConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: String,
    /// 模板文件目录，文件名为 `{template}.html`
    pub templates_dir: String,
    /// 模板名 -> 邮件标题
    #[serde(default)]
    pub subjects: HashMap<String, String>,
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    465
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpGatewayConfig {
    pub endpoint: String,
    pub api_key: SecretString,
    #[serde(default)]
    pub sign_name: String,
    /// 模板名 -> 供应商模板代码
    #[serde(default)]
    pub template_mapping: HashMap<String, String>,
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}

fn default_send_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    6000
}

impl AuthConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AuthConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置中无法在运行期恢复的错误
    pub fn validate(&self) -> Result<()> {
        if self.token.secret.expose_secret().is_empty() {
            return Err(FlareError::configuration("token.secret 不能为空"));
        }
        if self.token.ttl_secs == 0 {
            return Err(FlareError::configuration("token.ttl_secs 必须大于 0"));
        }

        let scenes = self
            .otp
            .phone_scenes
            .iter()
            .map(|(name, scene)| (OtpKind::Phone, name, scene))
            .chain(
                self.otp
                    .email_scenes
                    .iter()
                    .map(|(name, scene)| (OtpKind::Email, name, scene)),
            );
        for (kind, name, scene) in scenes {
            let invalid = |reason: &str| {
                ErrorBuilder::new(ErrorCode::ConfigurationError)
                    .reason(reason)
                    .challenge(kind, name.as_str())
                    .build_error()
            };
            if scene.expires_in_secs == 0 || scene.resend_interval_secs == 0 {
                return Err(invalid("验证码有效期与重发间隔必须大于 0"));
            }
            if scene.template.is_empty() {
                return Err(invalid("验证码场景未配置模板"));
            }
        }

        Ok(())
    }
}

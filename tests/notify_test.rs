use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flare_auth_core::cache::MemoryCache;
use flare_auth_core::config::{
    HttpGatewayConfig, NotifyConfig, OtpConfig, ProviderConfig, RetryConfig,
};
use flare_auth_core::notify::{MockSender, TemplateNotConfigured, TemplateParams};
use flare_auth_core::{
    Environment, ErrorCode, NotificationSender, Notifiers, OtpKind, OtpService, RequestContext,
    SceneConfig,
};
use secrecy::SecretString;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

fn gateway(mapping: &[(&str, &str)]) -> ProviderConfig {
    ProviderConfig::Http(HttpGatewayConfig {
        endpoint: "http://127.0.0.1:9/send".to_string(),
        api_key: SecretString::from("key"),
        sign_name: "Flare".to_string(),
        template_mapping: mapping
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        timeout_secs: 1,
    })
}

#[test]
fn dev_environment_always_uses_mock() {
    let sender = NotificationSender::from_config(
        OtpKind::Phone,
        &gateway(&[]),
        Environment::Dev,
        &RetryConfig::default(),
    )
    .expect("sender");
    assert_eq!(sender.provider_name(), "mock");
}

#[test]
fn factory_honours_configured_provider() {
    let config = NotifyConfig {
        sms: gateway(&[("login_code", "SMS_1")]),
        email: ProviderConfig::Mock,
        retry: RetryConfig::default(),
    };
    let notifiers = Notifiers::from_config(&config, Environment::Prod).expect("notifiers");

    assert_eq!(notifiers.for_kind(OtpKind::Phone).provider_name(), "http");
    assert_eq!(notifiers.for_kind(OtpKind::Email).provider_name(), "mock");
}

#[tokio::test]
async fn mock_records_messages_in_outbox() {
    let mock = MockSender::new(OtpKind::Email);
    let sender = NotificationSender::Mock(mock.clone());
    let mut params = TemplateParams::new();
    params.insert("code".to_string(), "123456".to_string());

    assert_ok!(
        sender
            .send("a@example.com", "login_code", &params, &CancellationToken::new())
            .await
    );
    let message = mock.last_sent_to("a@example.com").expect("recorded");
    assert_eq!(message.template, "login_code");
    assert_eq!(message.params, params);
    assert!(mock.last_sent_to("b@example.com").is_none());
}

#[tokio::test]
async fn gateway_without_template_mapping_fails_before_any_request() {
    let sender = NotificationSender::from_config(
        OtpKind::Phone,
        &gateway(&[]),
        Environment::Test,
        &RetryConfig::default(),
    )
    .expect("sender");

    let err = sender
        .send("+8613800000000", "login_code", &HashMap::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is::<TemplateNotConfigured>());
}

#[tokio::test]
async fn unmapped_template_surfaces_as_configuration_problem() {
    let sms = NotificationSender::from_config(
        OtpKind::Phone,
        &gateway(&[]),
        Environment::Test,
        &RetryConfig::default(),
    )
    .expect("sender");
    let notifiers = Notifiers::new(sms, NotificationSender::Mock(MockSender::new(OtpKind::Email)));
    let scenes = OtpConfig::default().with_scene(
        OtpKind::Phone,
        "login",
        SceneConfig::new(6, Duration::from_secs(300), Duration::from_secs(60), "login_code"),
    );
    let service = OtpService::new(
        Arc::new(MemoryCache::new()),
        scenes,
        notifiers,
        Environment::Test,
    );

    let err = service
        .send_code(OtpKind::Phone, "login", "+8613800000000", &RequestContext::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::TemplateNotConfigured));
}

//! 验证码发送与校验测试
//!
//! 通过 Mock 通道的发件箱取得真实下发的验证码。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use flare_auth_core::cache::{Cache, MemoryCache};
use flare_auth_core::error::InfraResult;
use flare_auth_core::config::OtpConfig;
use flare_auth_core::notify::MockSender;
use flare_auth_core::otp::{MAX_FAIL_COUNT, OtpCache};
use flare_auth_core::{
    AuthMetrics, DiagnosticSink, Environment, ErrorCode, NotificationSender, Notifiers, OtpKind,
    OtpService, RequestContext, SceneConfig,
};
use tokio::task::JoinSet;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

const PHONE: &str = "+8613800000000";
const EMAIL: &str = "someone@example.com";

struct Harness {
    service: OtpService,
    cache: Arc<MemoryCache>,
    sms: MockSender,
    email: MockSender,
}

fn scenes() -> OtpConfig {
    let login = SceneConfig::new(
        6,
        Duration::from_secs(300),
        Duration::from_secs(60),
        "login_code",
    );
    OtpConfig::default()
        .with_scene(OtpKind::Phone, "login", login.clone())
        .with_scene(OtpKind::Email, "login", login)
        .with_scene(
            OtpKind::Phone,
            "long",
            SceneConfig::new(15, Duration::from_secs(300), Duration::from_secs(60), "long_code"),
        )
}

fn harness_with(environment: Environment, sms: MockSender) -> Harness {
    let cache = Arc::new(MemoryCache::new());
    let email = MockSender::new(OtpKind::Email);
    let notifiers = Notifiers::new(
        NotificationSender::Mock(sms.clone()),
        NotificationSender::Mock(email.clone()),
    );
    let service = OtpService::new(cache.clone(), scenes(), notifiers, environment);
    Harness {
        service,
        cache,
        sms,
        email,
    }
}

fn harness() -> Harness {
    harness_with(Environment::Test, MockSender::new(OtpKind::Phone))
}

/// 读取带固定延迟的缓存，让并发校验在读取验证码后交错执行
struct SlowReads {
    inner: MemoryCache,
    delay: Duration,
}

#[async_trait]
impl Cache for SlowReads {
    async fn get(&self, key: &str) -> InfraResult<Option<String>> {
        let value = self.inner.get(key).await;
        tokio::time::sleep(self.delay).await;
        value
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> InfraResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> InfraResult<bool> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> InfraResult<()> {
        self.inner.del(key).await
    }

    async fn take(&self, key: &str) -> InfraResult<Option<String>> {
        self.inner.take(key).await
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> InfraResult<bool> {
        self.inner.del_if_eq(key, expected).await
    }

    async fn del_many(&self, keys: &[String]) -> InfraResult<()> {
        self.inner.del_many(keys).await
    }

    async fn exists(&self, key: &str) -> InfraResult<bool> {
        self.inner.exists(key).await
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> InfraResult<i64> {
        self.inner.incr_with_ttl(key, ttl).await
    }

    async fn sadd(&self, key: &str, member: &str) -> InfraResult<()> {
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> InfraResult<()> {
        self.inner.srem(key, member).await
    }

    async fn smembers(&self, key: &str) -> InfraResult<Vec<String>> {
        self.inner.smembers(key).await
    }
}

fn slow_service() -> (Arc<OtpService>, MockSender) {
    let cache = Arc::new(SlowReads {
        inner: MemoryCache::new(),
        delay: Duration::from_millis(20),
    });
    let sms = MockSender::new(OtpKind::Phone);
    let notifiers = Notifiers::new(
        NotificationSender::Mock(sms.clone()),
        NotificationSender::Mock(MockSender::new(OtpKind::Email)),
    );
    let service = OtpService::new(cache, scenes(), notifiers, Environment::Test);
    (Arc::new(service), sms)
}

fn last_code(sender: &MockSender, receiver: &str) -> String {
    sender
        .last_sent_to(receiver)
        .and_then(|message| message.params.get("code").cloned())
        .expect("a code was sent")
}

#[tokio::test]
async fn send_returns_expiry_and_delivers_six_digits() {
    let h = harness();
    let ctx = RequestContext::new();

    let before = Utc::now();
    let expires_at = assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    let after = Utc::now();

    assert!(expires_at >= before + chrono::Duration::seconds(300));
    assert!(expires_at <= after + chrono::Duration::seconds(300));

    let message = h.sms.last_sent_to(PHONE).expect("message delivered");
    assert_eq!(message.template, "login_code");
    let code = last_code(&h.sms, PHONE);
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    assert!(h.email.outbox().is_empty());
}

#[tokio::test]
async fn stored_keys_use_their_own_ttls() {
    let h = harness();
    let ctx = RequestContext::new();

    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);

    let guard = h
        .cache
        .ttl(&OtpCache::interval_key(OtpKind::Phone, "login", PHONE))
        .await
        .expect("guard has a ttl");
    let code = h
        .cache
        .ttl(&OtpCache::code_key(OtpKind::Phone, "login", PHONE))
        .await
        .expect("code has a ttl");
    assert!(guard <= Duration::from_secs(60) && guard > Duration::from_secs(55));
    assert!(code <= Duration::from_secs(300) && code > Duration::from_secs(295));
}

#[tokio::test]
async fn immediate_resend_is_rate_limited_and_first_code_survives() {
    let h = harness();
    let ctx = RequestContext::new();

    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    let code = last_code(&h.sms, PHONE);

    let err = h
        .service
        .send_code(OtpKind::Phone, "login", PHONE, &ctx)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpSendTooFrequent));
    assert_eq!(h.sms.outbox().len(), 1);

    assert_ok!(h.service.verify_code(OtpKind::Phone, "login", PHONE, &code).await);
}

#[tokio::test]
async fn lockout_after_five_failures_hides_correct_code() {
    let h = harness();
    let ctx = RequestContext::new();

    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    let code = last_code(&h.sms, PHONE);
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for attempt in 1..MAX_FAIL_COUNT {
        let err = h
            .service
            .verify_code(OtpKind::Phone, "login", PHONE, wrong)
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::OtpInvalid), "attempt {attempt}: {err}");
    }

    let err = h
        .service
        .verify_code(OtpKind::Phone, "login", PHONE, wrong)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpExpired));

    let err = h
        .service
        .verify_code(OtpKind::Phone, "login", PHONE, &code)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpExpired));
}

#[tokio::test]
async fn successful_verify_consumes_code() {
    let h = harness();
    let ctx = RequestContext::new();

    assert_ok!(h.service.send_code(OtpKind::Email, "login", EMAIL, &ctx).await);
    let code = last_code(&h.email, EMAIL);

    assert_ok!(h.service.verify_code(OtpKind::Email, "login", EMAIL, &code).await);
    let err = h
        .service
        .verify_code(OtpKind::Email, "login", EMAIL, &code)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpExpired));
    assert!(!assert_ok!(
        h.cache
            .exists(&OtpCache::fail_key(OtpKind::Email, "login", EMAIL))
            .await
    ));
}

#[tokio::test]
async fn verify_without_send_is_expired() {
    let h = harness();

    let err = h
        .service
        .verify_code(OtpKind::Phone, "login", PHONE, "123456")
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpExpired));
}

#[tokio::test]
async fn unknown_scene_is_rejected() {
    let h = harness();
    let ctx = RequestContext::new();

    let err = h
        .service
        .send_code(OtpKind::Phone, "bind-mobile", PHONE, &ctx)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::SceneNotFound));

    let err = h
        .service
        .verify_code(OtpKind::Email, "bind-mobile", EMAIL, "123456")
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::SceneNotFound));
    assert!(h.cache.is_empty().await);
}

#[tokio::test]
async fn empty_receiver_or_input_is_invalid() {
    let h = harness();
    let ctx = RequestContext::new();

    let err = h
        .service
        .send_code(OtpKind::Phone, "login", "", &ctx)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::InvalidParameter));

    let err = h
        .service
        .verify_code(OtpKind::Phone, "login", PHONE, "")
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::InvalidParameter));
}

#[tokio::test]
async fn oversized_length_is_clamped() {
    let h = harness();
    let ctx = RequestContext::new();

    assert_ok!(h.service.send_code(OtpKind::Phone, "long", PHONE, &ctx).await);
    assert_eq!(last_code(&h.sms, PHONE).len(), 10);
}

#[tokio::test]
async fn failed_delivery_keeps_guard_and_stores_nothing() {
    let h = harness_with(Environment::Test, MockSender::rejecting(OtpKind::Phone));
    let ctx = RequestContext::new();

    let err = h
        .service
        .send_code(OtpKind::Phone, "login", PHONE, &ctx)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpSendFailed));

    assert!(!assert_ok!(
        h.cache
            .exists(&OtpCache::code_key(OtpKind::Phone, "login", PHONE))
            .await
    ));
    assert!(assert_ok!(
        h.cache
            .exists(&OtpCache::interval_key(OtpKind::Phone, "login", PHONE))
            .await
    ));

    let err = h
        .service
        .send_code(OtpKind::Phone, "login", PHONE, &ctx)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpSendTooFrequent));
}

#[tokio::test]
async fn diagnostics_receive_code_outside_production() {
    let h = harness();
    let sink = DiagnosticSink::new();
    let ctx = RequestContext::new().with_diagnostics(sink.clone());

    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    assert_eq!(sink.get("otp"), Some(last_code(&h.sms, PHONE)));
}

#[tokio::test]
async fn production_never_writes_diagnostics() {
    let h = harness_with(Environment::Prod, MockSender::new(OtpKind::Phone));
    let sink = DiagnosticSink::new();
    let ctx = RequestContext::new().with_diagnostics(sink.clone());

    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn cancelled_context_does_not_take_guard() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = RequestContext::new().with_cancellation(cancel);

    let err = h
        .service
        .send_code(OtpKind::Phone, "login", PHONE, &ctx)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OperationCancelled));
    assert!(h.cache.is_empty().await);
}

#[tokio::test]
async fn phone_and_email_challenges_are_independent() {
    let h = harness();
    let ctx = RequestContext::new();

    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    assert_ok!(h.service.send_code(OtpKind::Email, "login", PHONE, &ctx).await);

    let sms_code = last_code(&h.sms, PHONE);
    let email_code = last_code(&h.email, PHONE);
    assert_ok!(h.service.verify_code(OtpKind::Email, "login", PHONE, &email_code).await);
    assert_ok!(h.service.verify_code(OtpKind::Phone, "login", PHONE, &sms_code).await);
}

#[tokio::test(start_paused = true)]
async fn guard_and_code_expire_independently() {
    let h = harness();
    let ctx = RequestContext::new();

    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    let first = last_code(&h.sms, PHONE);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    let second = last_code(&h.sms, PHONE);
    assert_eq!(h.sms.outbox().len(), 2);

    tokio::time::advance(Duration::from_secs(301)).await;
    let err = h
        .service
        .verify_code(OtpKind::Phone, "login", PHONE, &second)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpExpired));
    let err = h
        .service
        .verify_code(OtpKind::Phone, "login", PHONE, &first)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpExpired));
}

#[tokio::test(start_paused = true)]
async fn new_send_clears_failure_counter() {
    let h = harness();
    let ctx = RequestContext::new();

    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    let code = last_code(&h.sms, PHONE);
    let wrong = if code == "000000" { "111111" } else { "000000" };
    for _ in 0..3 {
        assert!(h
            .service
            .verify_code(OtpKind::Phone, "login", PHONE, wrong)
            .await
            .is_err());
    }

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_ok!(h.service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    assert!(!assert_ok!(
        h.cache
            .exists(&OtpCache::fail_key(OtpKind::Phone, "login", PHONE))
            .await
    ));

    let code = last_code(&h.sms, PHONE);
    let wrong = if code == "000000" { "111111" } else { "000000" };
    for _ in 1..MAX_FAIL_COUNT {
        let err = h
            .service
            .verify_code(OtpKind::Phone, "login", PHONE, wrong)
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::OtpInvalid));
    }
}

#[tokio::test(start_paused = true)]
async fn failure_window_expires_after_an_hour() {
    let h = harness();

    let fail_key = OtpCache::fail_key(OtpKind::Phone, "login", PHONE);
    assert_eq!(assert_ok!(h.cache.incr_with_ttl(&fail_key, Duration::from_secs(3600)).await), 1);
    let ttl = h.cache.ttl(&fail_key).await.expect("counter has a ttl");
    assert_eq!(ttl, Duration::from_secs(3600));

    tokio::time::advance(Duration::from_secs(3601)).await;
    assert!(!assert_ok!(h.cache.exists(&fail_key).await));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_win_exactly_once() {
    let h = harness();
    let service = Arc::new(h.service);

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let service = service.clone();
        tasks.spawn(async move {
            service
                .send_code(OtpKind::Phone, "login", PHONE, &RequestContext::new())
                .await
        });
    }

    let mut sent = 0;
    let mut limited = 0;
    while let Some(result) = tasks.join_next().await {
        match result.expect("task completed") {
            Ok(_) => sent += 1,
            Err(err) if err.is(ErrorCode::OtpSendTooFrequent) => limited += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(sent, 1);
    assert_eq!(limited, 15);
    assert_eq!(h.sms.outbox().len(), 1);
}

#[tokio::test]
async fn rejections_are_counted_by_reason() {
    let metrics = AuthMetrics::new().expect("metrics registry");
    let h = harness();
    let service = h.service.with_metrics(metrics.clone());
    let ctx = RequestContext::new();

    assert_ok!(service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await);
    assert!(service.send_code(OtpKind::Phone, "login", PHONE, &ctx).await.is_err());
    assert!(service.verify_code(OtpKind::Email, "login", EMAIL, "123456").await.is_err());

    assert_eq!(metrics.otp_rejection_count("phone", "rate_limited"), 1);
    assert_eq!(metrics.otp_rejection_count("email", "expired"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_correct_codes_verify_once() {
    let (service, sms) = slow_service();
    assert_ok!(service.send_code(OtpKind::Phone, "login", PHONE, &RequestContext::new()).await);
    let code = last_code(&sms, PHONE);

    let (first, second) = tokio::join!(
        service.verify_code(OtpKind::Phone, "login", PHONE, &code),
        service.verify_code(OtpKind::Phone, "login", PHONE, &code),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    let loser = results
        .into_iter()
        .find_map(|result| result.err())
        .expect("one verification rejected");
    assert!(loser.is(ErrorCode::OtpExpired), "{loser}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_guesses_cannot_exceed_attempt_limit() {
    let (service, sms) = slow_service();
    assert_ok!(service.send_code(OtpKind::Phone, "login", PHONE, &RequestContext::new()).await);
    let code = last_code(&sms, PHONE);
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let mut tasks = JoinSet::new();
    for attempt in 0..20 {
        let service = service.clone();
        let input = if attempt == 19 { code.clone() } else { wrong.to_string() };
        tasks.spawn(async move {
            service
                .verify_code(OtpKind::Phone, "login", PHONE, &input)
                .await
        });
    }

    let mut verified = 0;
    let mut invalid = 0;
    let mut expired = 0;
    while let Some(result) = tasks.join_next().await {
        match result.expect("task completed") {
            Ok(()) => verified += 1,
            Err(err) if err.is(ErrorCode::OtpInvalid) => invalid += 1,
            Err(err) if err.is(ErrorCode::OtpExpired) => expired += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    // 只有前 MAX_FAIL_COUNT 次尝试会与验证码比较
    assert!(verified <= 1);
    assert!(invalid < MAX_FAIL_COUNT);
    assert!(verified + invalid <= MAX_FAIL_COUNT);
    assert_eq!(verified + invalid + expired, 20);

    let err = service
        .verify_code(OtpKind::Phone, "login", PHONE, &code)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::OtpExpired));
}

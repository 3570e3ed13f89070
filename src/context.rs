//! 请求上下文
//!
//! 显式携带取消信号与可选的调试输出，替代隐式的请求级全局状态。

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// 有序的调试信息收集器
///
/// 仅在非生产环境由服务写入（验证码、图形验证码答案），
/// 传输层可在响应中附带这些信息以方便联调。
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    entries: Arc<Mutex<Vec<(String, String)>>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录，同名键会被覆盖但保留原有位置
    pub fn record(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// 按写入顺序返回所有记录
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }
}

/// 单次调用的上下文
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    diagnostics: Option<DiagnosticSink>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用调用方的取消信号
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn diagnostics(&self) -> Option<&DiagnosticSink> {
        self.diagnostics.as_ref()
    }
}

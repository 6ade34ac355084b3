//! # テスト用モック
//!
//! - [`InMemoryAuditSink`]: 監査イベントをメモリに保持する
//! - [`database_error`]: SQLSTATE 付きの `sqlx::Error::Database` を DB なしで作る
//!
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! pedalhub-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    borrow::Cow,
    error::Error as StdError,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use pedalhub_domain::audit::{AuditEvent, AuditEventType};
use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

use crate::{audit::AuditSink, error::InfraError};

// ===== InMemoryAuditSink =====

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録されたイベントのコピー（記録順）
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    /// 指定した種別のイベント数
    pub fn count(&self, event_type: AuditEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), InfraError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ===== StubDatabaseError =====

/// 指定した SQLSTATE を返すデータベースエラー
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StubDatabaseError {
    code:    &'static str,
    message: String,
}

impl DatabaseError for StubDatabaseError {
    fn message(&self) -> &str {
        &self.message
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.code))
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// SQLSTATE 付きの `sqlx::Error::Database` を作る
pub fn database_error(code: &'static str, message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Database(Box::new(StubDatabaseError {
        code,
        message: message.into(),
    }))
}

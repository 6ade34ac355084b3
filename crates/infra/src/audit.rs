//! # 監査イベントの配送
//!
//! [`AuditEvent`] の配送先を抽象化する [`AuditSink`] と、
//! 構造化ログに出力する [`TracingAuditSink`] を提供する。
//!
//! ログレベルは監査イベントの重大度で決まる:
//!
//! | 重大度 | ログレベル |
//! |-------|-----------|
//! | `Critical` | ERROR |
//! | `Warning` | WARN |
//! | `Info` | INFO |

use async_trait::async_trait;
use pedalhub_domain::audit::{AuditEvent, AuditSeverity};
use pedalhub_shared::{event_log::event, log_security_event};

use crate::error::InfraError;

/// 監査イベントの配送先
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// 監査イベントを記録する
    async fn record(&self, event: &AuditEvent) -> Result<(), InfraError>;
}

/// 構造化ログに監査イベントを出力する実装
///
/// JSON ログ基盤で長期保存されることを前提とする。
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, audit: &AuditEvent) -> Result<(), InfraError> {
        let metadata = audit.metadata().map(ToString::to_string);
        let actor = audit.actor().unwrap_or("-");
        let event_type: &'static str = audit.event_type().into();
        let access: &'static str = audit.access().into();
        let outcome: &'static str = audit.outcome().into();

        macro_rules! emit {
            ($level:ident) => {
                log_security_event!(
                    $level,
                    event.category = event::category::AUDIT,
                    event.action = event_type,
                    event.result = outcome,
                    event.access = access,
                    event.actor = actor,
                    event.resource = audit.resource(),
                    event.id = %audit.id(),
                    event.occurred_at = %audit.occurred_at(),
                    event.metadata = metadata.as_deref(),
                    "監査イベント"
                )
            };
        }

        match audit.severity() {
            AuditSeverity::Critical => emit!(error),
            AuditSeverity::Warning => emit!(warn),
            AuditSeverity::Info => emit!(info),
        }
        Ok(())
    }
}

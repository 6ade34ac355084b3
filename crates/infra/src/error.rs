//! # インフラ層エラー定義
//!
//! データベース、テナントスコープ、外部サービスとの連携で発生するエラーを表現する。
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターンを採用:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別（Database, TenantContext, AccessDenied 等）
//!
//! ## アクセス拒否のメッセージ
//!
//! [`InfraErrorKind::AccessDenied`] は詳細を持たない。
//! どの会社のどのレコードが存在したかを呼び出し元に漏らさないため、
//! 詳細は監査イベントにのみ記録する。

use std::fmt;

use derive_more::Display;
use pedalhub_domain::DomainError;
use pedalhub_shared::ErrorResponse;
use thiserror::Error;
use tracing_error::SpanTrace;

use crate::tenant_scope::TenantContextError;

/// PostgreSQL の `insufficient_privilege`（RLS の `WITH CHECK` 違反などで返る）
pub const POLICY_DENIAL_SQLSTATE: &str = "42501";

/// インフラ層で発生するエラー
///
/// エラー種別（[`InfraErrorKind`]）と [`SpanTrace`]（呼び出し経路）を保持する。
/// `From` 変換や convenience constructor でエラーを生成すると、
/// その時点のスパン情報が自動的にキャプチャされる。
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// データベースエラー
    ///
    /// SQL クエリの実行失敗、接続エラー、セッション変数の設定失敗など。
    #[error("データベースエラー: {0}")]
    Database(#[source] sqlx::Error),

    /// テナントコンテキストの異常
    ///
    /// リクエストスコープの外でテナント依存の処理が呼ばれた場合など。
    #[error("テナントコンテキストエラー: {0}")]
    TenantContext(#[source] TenantContextError),

    /// アクセス拒否
    ///
    /// クライアントには固定文言のみ返す。
    #[error("アクセスが拒否されました")]
    AccessDenied,

    /// 予期しないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl InfraError {
    /// エラー種別を取得する
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    /// SpanTrace を取得する
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// アクセス拒否かどうか
    pub fn is_access_denied(&self) -> bool {
        matches!(self.kind, InfraErrorKind::AccessDenied)
    }

    /// RLS ポリシーによる拒否（SQLSTATE `42501`）かどうか
    pub fn is_policy_denial(&self) -> bool {
        match &self.kind {
            InfraErrorKind::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some(POLICY_DENIAL_SQLSTATE)
            }
            _ => false,
        }
    }

    // ===== Convenience constructors =====

    /// アクセス拒否エラーを生成する
    pub fn access_denied() -> Self {
        Self {
            kind:       InfraErrorKind::AccessDenied,
            span_trace: SpanTrace::capture(),
        }
    }

    /// 予期しないエラーを生成する
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self {
            kind:       InfraErrorKind::Unexpected(msg.into()),
            span_trace: SpanTrace::capture(),
        }
    }
}

// ===== トレイト実装 =====

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

// ===== From 実装（SpanTrace 自動キャプチャ） =====

impl From<sqlx::Error> for InfraError {
    fn from(source: sqlx::Error) -> Self {
        Self {
            kind:       InfraErrorKind::Database(source),
            span_trace: SpanTrace::capture(),
        }
    }
}

impl From<TenantContextError> for InfraError {
    fn from(source: TenantContextError) -> Self {
        Self {
            kind:       InfraErrorKind::TenantContext(source),
            span_trace: SpanTrace::capture(),
        }
    }
}

// ===== ErrorResponse 変換 =====

impl From<&InfraError> for ErrorResponse {
    fn from(err: &InfraError) -> Self {
        match err.kind() {
            InfraErrorKind::AccessDenied => ErrorResponse::access_denied(),
            InfraErrorKind::Database(_)
            | InfraErrorKind::TenantContext(_)
            | InfraErrorKind::Unexpected(_) => ErrorResponse::internal_error(),
        }
    }
}

/// ドメインエラーをクライアント向けのレスポンスに変換する
///
/// 決済手段の検証エラーはフィールド名と理由を `invalid-params` に含める。
/// 権限エラーの内部メッセージはクライアントに返さない。
pub fn domain_error_response(err: &DomainError) -> ErrorResponse {
    match err {
        DomainError::Validation(message) => ErrorResponse::bad_request(message.clone()),
        DomainError::PaymentValidation(e) => ErrorResponse::validation_error(e.field, e.reason.clone()),
        DomainError::Forbidden(_) => ErrorResponse::access_denied(),
    }
}

//! # 監査イベント
//!
//! セキュリティ上重要な出来事を記録する追記専用のドメインモデル。
//!
//! ## 設計方針
//!
//! - **不変性**: 監査イベントは一度作成されたら変更されない（フィールドは非公開）
//! - **閉じた種別**: [`AuditEventType`] は列挙型。新しい種別を追加すると
//!   `severity()` などの網羅的 match がコンパイルエラーで知らせる
//! - **配送は範囲外**: 永続化先（ログ、キュー、DB）は infra 層の `AuditSink` が決める
//!
//! ## 種別の文字列表現
//!
//! `snake_case` で永続化・ログ出力される:
//!
//! | バリアント | 文字列表現 |
//! |-----------|-----------|
//! | `CrossTenantAccessAttempt` | `cross_tenant_access_attempt` |
//! | `FilterViolation` | `filter_violation` |
//! | `TenantContextError` | `tenant_context_error` |
//! | `AdminAction` | `admin_action` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use uuid::Uuid;

use crate::clock::Clock;

/// 監査イベント種別
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditEventType {
    /// 他社データへのアクセス試行
    CrossTenantAccessAttempt,
    /// 権限のない操作
    UnauthorizedAccess,
    AuthenticationSuccess,
    AuthenticationFailure,
    Logout,
    /// トークン検証失敗（署名不正、期限切れ）
    TokenValidationFailure,
    /// テナントコンテキスト未初期化などの異常
    TenantContextError,
    /// 上流で除外されるべきレコードをオブジェクト層で検出した
    FilterViolation,
    /// DB の行レベルセキュリティポリシー違反
    PolicyViolation,
    /// 実行時検証の失敗
    RuntimeValidationFailure,
    SuspiciousActivity,
    AdminAction,
    /// ユーザーと会社の関連付け変更
    CompanyAssociationChanged,
    SecurityConfigChanged,
}

/// 監査イベントの重大度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

impl AuditEventType {
    /// 種別ごとの重大度
    ///
    /// テナント分離の破綻を示す種別は `Critical`。
    pub fn severity(self) -> AuditSeverity {
        match self {
            Self::CrossTenantAccessAttempt
            | Self::FilterViolation
            | Self::PolicyViolation
            | Self::TenantContextError => AuditSeverity::Critical,
            Self::UnauthorizedAccess
            | Self::AuthenticationFailure
            | Self::TokenValidationFailure
            | Self::RuntimeValidationFailure
            | Self::SuspiciousActivity => AuditSeverity::Warning,
            Self::AuthenticationSuccess
            | Self::Logout
            | Self::AdminAction
            | Self::CompanyAssociationChanged
            | Self::SecurityConfigChanged => AuditSeverity::Info,
        }
    }
}

/// アクセス判定
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccessDecision {
    Allowed,
    Denied,
}

/// 処理結果
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// 監査イベント
///
/// フォレンジック調査のため無期限に保持される。作成後は変更されない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    id:          Uuid,
    event_type:  AuditEventType,
    actor:       Option<String>,
    resource:    String,
    access:      AccessDecision,
    outcome:     AuditOutcome,
    metadata:    Option<serde_json::Value>,
    occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    /// 監査イベントを作成する
    ///
    /// `occurred_at` は `clock` の現在時刻、`id` は UUID v7。
    pub fn new(
        clock: &dyn Clock,
        event_type: AuditEventType,
        actor: Option<String>,
        resource: impl Into<String>,
        access: AccessDecision,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type,
            actor,
            resource: resource.into(),
            access,
            outcome,
            metadata: None,
            occurred_at: clock.now(),
        }
    }

    /// 拒否されたアクセスの監査イベントを作成する
    pub fn denied(
        clock: &dyn Clock,
        event_type: AuditEventType,
        actor: Option<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(
            clock,
            event_type,
            actor,
            resource,
            AccessDecision::Denied,
            AuditOutcome::Failure,
        )
    }

    /// 構造化メタデータを付与する
    ///
    /// 作成直後に一度だけ呼ぶ想定の構築用メソッド。
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event_type(&self) -> AuditEventType {
        self.event_type
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn access(&self) -> AccessDecision {
        self.access
    }

    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn severity(&self) -> AuditSeverity {
        self.event_type.severity()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use strum::IntoEnumIterator;

    use super::*;
    use crate::clock::FixedClock;

    #[fixture]
    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap())
    }

    #[rstest]
    #[case(AuditEventType::CrossTenantAccessAttempt, "cross_tenant_access_attempt")]
    #[case(AuditEventType::FilterViolation, "filter_violation")]
    #[case(AuditEventType::TenantContextError, "tenant_context_error")]
    #[case(AuditEventType::CompanyAssociationChanged, "company_association_changed")]
    fn test_種別はsnake_caseの文字列に変換される(
        #[case] event_type: AuditEventType,
        #[case] expected: &str,
    ) {
        assert_eq!(event_type.to_string(), expected);
        assert_eq!(expected.parse::<AuditEventType>().unwrap(), event_type);
    }

    #[test]
    fn test_すべての種別が文字列から復元できる() {
        for event_type in AuditEventType::iter() {
            let restored: AuditEventType = event_type.to_string().parse().unwrap();
            assert_eq!(restored, event_type);
        }
        assert_eq!(AuditEventType::iter().count(), 14);
    }

    #[test]
    fn test_不明な種別文字列はエラーになる() {
        assert!("data_exfiltration".parse::<AuditEventType>().is_err());
    }

    #[rstest]
    #[case(AuditEventType::CrossTenantAccessAttempt, AuditSeverity::Critical)]
    #[case(AuditEventType::FilterViolation, AuditSeverity::Critical)]
    #[case(AuditEventType::AuthenticationFailure, AuditSeverity::Warning)]
    #[case(AuditEventType::Logout, AuditSeverity::Info)]
    fn test_種別ごとの重大度(#[case] event_type: AuditEventType, #[case] expected: AuditSeverity) {
        assert_eq!(event_type.severity(), expected);
    }

    #[rstest]
    fn test_deniedは拒否と失敗を設定する(clock: FixedClock) {
        let event = AuditEvent::denied(
            &clock,
            AuditEventType::CrossTenantAccessAttempt,
            Some("user-1".to_string()),
            "/api/v1/rentals/42",
        );

        assert_eq!(event.access(), AccessDecision::Denied);
        assert_eq!(event.outcome(), AuditOutcome::Failure);
        assert_eq!(event.actor(), Some("user-1"));
        assert_eq!(event.resource(), "/api/v1/rentals/42");
        assert_eq!(event.occurred_at(), clock.now());
        assert!(event.metadata().is_none());
    }

    #[rstest]
    fn test_メタデータを付与できる(clock: FixedClock) {
        let event = AuditEvent::new(
            &clock,
            AuditEventType::AdminAction,
            None,
            "company",
            AccessDecision::Allowed,
            AuditOutcome::Success,
        )
        .with_metadata(serde_json::json!({"company_id": "A"}));

        assert_eq!(event.metadata().unwrap()["company_id"], "A");
    }

    #[rstest]
    fn test_jsonシリアライズで種別と判定がsnake_caseになる(clock: FixedClock) {
        let event = AuditEvent::denied(&clock, AuditEventType::FilterViolation, None, "bike");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "filter_violation");
        assert_eq!(json["access"], "denied");
        assert_eq!(json["outcome"], "failure");
    }
}

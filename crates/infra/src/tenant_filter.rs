//! # 会社スコープのフィルタリング
//!
//! テナント分離を 2 段階で強制する。
//!
//! 1. **クエリ層**: [`push_company_filter`] が `WHERE` 句に会社条件を追加する
//! 2. **オブジェクト層**: [`TenantGuard`] が取得済みレコードを再検査する
//!
//! クエリ層で除外されるべきレコードがオブジェクト層に届いた場合は
//! フィルタ違反として監査イベントを記録し、呼び出し元には汎用のアクセス拒否のみ返す。
//! その手前で DB の RLS が拒否した場合（SQLSTATE `42501`）は
//! [`TenantGuard::audit_policy_denial`] がポリシー違反として記録する。
//!
//! ## 生成される条件
//!
//! | スコープ | 条件 |
//! |---------|------|
//! | `AllCompanies` | `TRUE` |
//! | `Companies(ids)` | `(column IS NULL OR column = ANY($n))` |
//! | `OwnDataOnly` | `column IS NULL` |
//!
//! `OwnDataOnly` の場合、呼び出し元が本人のデータを示す条件を `OR` で追加する。
//!
//! ## 使用例
//!
//! ```rust
//! use pedalhub_domain::{company::CompanyId, tenant::TenantContext};
//! use pedalhub_infra::tenant_filter::push_company_filter;
//! use sqlx::{Postgres, QueryBuilder};
//!
//! let ctx = TenantContext::new([CompanyId::new("A").unwrap()], false);
//! let mut query = QueryBuilder::<Postgres>::new("SELECT id FROM bikes WHERE ");
//! push_company_filter(&mut query, "bikes.company_id", &ctx.scope());
//!
//! assert_eq!(
//!     query.sql(),
//!     "SELECT id FROM bikes WHERE (bikes.company_id IS NULL OR bikes.company_id = ANY($1))"
//! );
//! ```

use std::sync::Arc;

use pedalhub_domain::{
    audit::{AuditEvent, AuditEventType},
    clock::Clock,
    company::CompanyId,
    tenant::{CompanyScope, TenantContext, TenantScoped},
};
use sqlx::{Postgres, QueryBuilder};

use crate::{
    audit::AuditSink,
    error::{InfraError, POLICY_DENIAL_SQLSTATE},
    tenant_scope::{self, TenantContextError},
};

/// 会社条件を `WHERE` 句に追加する
///
/// `column` は SQL にそのまま埋め込まれるため、コード上の定数のみ受け付ける。
/// 会社 ID は常にバインドパラメータとして渡す。
pub fn push_company_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    column: &'static str,
    scope: &CompanyScope,
) {
    match scope {
        CompanyScope::AllCompanies => {
            builder.push("TRUE");
        }
        CompanyScope::Companies(ids) => {
            let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_owned()).collect();
            builder
                .push("(")
                .push(column)
                .push(" IS NULL OR ")
                .push(column)
                .push(" = ANY(")
                .push_bind(ids)
                .push("))");
        }
        CompanyScope::OwnDataOnly => {
            builder.push(column).push(" IS NULL");
        }
    }
}

/// 暗黙コンテキストからクエリ用のスコープを導出する
///
/// スコープ外では失敗する。フィルタなしのクエリにフォールバックしない。
pub fn ambient_scope() -> Result<CompanyScope, TenantContextError> {
    tenant_scope::current().map(|ctx| ctx.scope())
}

/// オブジェクト層のテナント分離ガード
///
/// 暗黙コンテキストを使ってレコードの可視性を再検査し、違反を監査イベントとして記録する。
#[derive(Clone)]
pub struct TenantGuard {
    audit_sink: Arc<dyn AuditSink>,
    clock:      Arc<dyn Clock>,
}

impl TenantGuard {
    pub fn new(audit_sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self { audit_sink, clock }
    }

    /// レコードが現在のコンテキストから見えることを確認する
    ///
    /// 見えない場合は `FilterViolation` を記録してアクセス拒否を返す。
    pub async fn ensure_visible<T>(
        &self,
        actor: Option<&str>,
        resource: &str,
        record: &T,
    ) -> Result<(), InfraError>
    where
        T: TenantScoped + Sync + ?Sized,
    {
        let ctx = self.context(actor, resource).await?;
        if ctx.is_visible(record) {
            return Ok(());
        }

        self.record_violation(
            AuditEventType::FilterViolation,
            actor,
            resource,
            &ctx,
            record.owning_company(),
        )
        .await;
        Err(InfraError::access_denied())
    }

    /// 見えないレコードを取り除く
    ///
    /// 取り除いたレコードはそれぞれ `FilterViolation` として記録する。
    /// 順序は保持する。
    pub async fn retain_visible<T>(
        &self,
        actor: Option<&str>,
        resource: &str,
        records: Vec<T>,
    ) -> Result<Vec<T>, InfraError>
    where
        T: TenantScoped + Send + Sync,
    {
        let ctx = self.context(actor, resource).await?;

        let (visible, leaked): (Vec<T>, Vec<T>) =
            records.into_iter().partition(|record| ctx.is_visible(record));

        for record in &leaked {
            self.record_violation(
                AuditEventType::FilterViolation,
                actor,
                resource,
                &ctx,
                record.owning_company(),
            )
            .await;
        }
        Ok(visible)
    }

    /// リクエストで明示された会社へのアクセス権を確認する
    ///
    /// パスやクエリで会社 ID を受け取る操作で使う。
    /// 権限がなければ `CrossTenantAccessAttempt` を記録してアクセス拒否を返す。
    pub async fn require_company_access(
        &self,
        actor: Option<&str>,
        resource: &str,
        company: &CompanyId,
    ) -> Result<(), InfraError> {
        let ctx = self.context(actor, resource).await?;
        if ctx.can_see(Some(company)) {
            return Ok(());
        }

        self.record_violation(
            AuditEventType::CrossTenantAccessAttempt,
            actor,
            resource,
            &ctx,
            Some(company),
        )
        .await;
        Err(InfraError::access_denied())
    }

    /// DB の RLS ポリシーによる拒否を監査してアクセス拒否に置き換える
    ///
    /// クエリ層の条件をすり抜けたアクセスを RLS が止めた場合（SQLSTATE `42501`）は
    /// `PolicyViolation` を記録し、汎用のアクセス拒否を返す。それ以外の結果はそのまま返す。
    pub async fn audit_policy_denial<T>(
        &self,
        actor: Option<&str>,
        resource: &str,
        result: Result<T, InfraError>,
    ) -> Result<T, InfraError> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_policy_denial() => err,
            Err(err) => return Err(err),
        };

        let context_companies = match tenant_scope::current() {
            Ok(ctx) => company_names(&ctx),
            Err(_) => Vec::new(),
        };
        let audit = AuditEvent::denied(
            self.clock.as_ref(),
            AuditEventType::PolicyViolation,
            actor.map(str::to_owned),
            resource,
        )
        .with_metadata(serde_json::json!({
            "sqlstate": POLICY_DENIAL_SQLSTATE,
            "context_companies": context_companies,
            "reason": err.to_string(),
        }));
        self.emit(&audit).await;
        Err(InfraError::access_denied())
    }

    /// 暗黙コンテキストを取得する。スコープ外なら監査イベントを記録して失敗する。
    async fn context(
        &self,
        actor: Option<&str>,
        resource: &str,
    ) -> Result<TenantContext, InfraError> {
        match tenant_scope::current() {
            Ok(ctx) => Ok(ctx),
            Err(err) => {
                let audit = AuditEvent::denied(
                    self.clock.as_ref(),
                    AuditEventType::TenantContextError,
                    actor.map(str::to_owned),
                    resource,
                )
                .with_metadata(serde_json::json!({ "reason": err.to_string() }));
                self.emit(&audit).await;
                Err(err.into())
            }
        }
    }

    async fn record_violation(
        &self,
        event_type: AuditEventType,
        actor: Option<&str>,
        resource: &str,
        ctx: &TenantContext,
        owner: Option<&CompanyId>,
    ) {
        let audit = AuditEvent::denied(
            self.clock.as_ref(),
            event_type,
            actor.map(str::to_owned),
            resource,
        )
        .with_metadata(serde_json::json!({
            "record_company": owner.map(CompanyId::as_str),
            "context_companies": company_names(ctx),
        }));
        self.emit(&audit).await;
    }

    /// 監査イベントを配送する
    ///
    /// 配送に失敗してもアクセス判定の結果は変えない。
    async fn emit(&self, audit: &AuditEvent) {
        if let Err(err) = self.audit_sink.record(audit).await {
            tracing::error!(
                error.message = %err,
                event.id = %audit.id(),
                "監査イベントの記録に失敗"
            );
        }
    }
}

fn company_names(ctx: &TenantContext) -> Vec<String> {
    ctx.current_companies()
        .iter()
        .map(|id| id.as_str().to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pedalhub_domain::{clock::FixedClock, tenant::Ownership};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_subscriber::{
        Layer,
        layer::{Context, SubscriberExt as _},
    };

    use super::*;
    use crate::mock::{InMemoryAuditSink, database_error};

    fn company(id: &str) -> CompanyId {
        CompanyId::new(id).unwrap()
    }

    fn ab_context() -> TenantContext {
        TenantContext::new([company("A"), company("B")], false)
    }

    #[fixture]
    fn sink() -> InMemoryAuditSink {
        InMemoryAuditSink::new()
    }

    fn guard(sink: &InMemoryAuditSink) -> TenantGuard {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap());
        TenantGuard::new(Arc::new(sink.clone()), Arc::new(clock))
    }

    // クエリ条件

    #[rstest]
    #[case(TenantContext::new([], true), "SELECT id FROM bikes WHERE TRUE")]
    #[case(
        TenantContext::new([company("A")], false),
        "SELECT id FROM bikes WHERE (company_id IS NULL OR company_id = ANY($1))"
    )]
    #[case(TenantContext::default(), "SELECT id FROM bikes WHERE company_id IS NULL")]
    fn test_スコープに応じた条件を追加する(#[case] ctx: TenantContext, #[case] expected: &str) {
        let mut query = QueryBuilder::<Postgres>::new("SELECT id FROM bikes WHERE ");
        push_company_filter(&mut query, "company_id", &ctx.scope());

        assert_eq!(query.sql(), expected);
    }

    #[test]
    fn test_既存のバインドに続く番号で会社条件をバインドする() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT id FROM rentals WHERE status = ");
        query.push_bind("active").push(" AND ");
        push_company_filter(&mut query, "rentals.company_id", &ab_context().scope());

        assert_eq!(
            query.sql(),
            "SELECT id FROM rentals WHERE status = $1 AND \
             (rentals.company_id IS NULL OR rentals.company_id = ANY($2))"
        );
    }

    #[test]
    fn test_スコープ外ではクエリ用スコープを導出できない() {
        assert_eq!(ambient_scope().unwrap_err(), TenantContextError::NotInitialized);
    }

    #[tokio::test]
    async fn test_暗黙コンテキストからスコープを導出する() {
        let scope = tenant_scope::scope(ab_context(), async { ambient_scope() })
            .await
            .unwrap();

        assert_eq!(scope, ab_context().scope());
    }

    // オブジェクト層

    #[rstest]
    #[tokio::test]
    async fn test_見えるレコードは監査イベントを記録しない(sink: InMemoryAuditSink) {
        let guard = guard(&sink);

        tenant_scope::scope(ab_context(), async {
            guard
                .ensure_visible(Some("user-1"), "bike/1", &Ownership::Company(company("A")))
                .await
                .unwrap();
            guard
                .ensure_visible(Some("user-1"), "bike/2", &Ownership::Shared)
                .await
                .unwrap();
        })
        .await;

        assert!(sink.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_見えないレコードはフィルタ違反として記録しアクセス拒否を返す(
        sink: InMemoryAuditSink,
    ) {
        let guard = guard(&sink);

        let err = tenant_scope::scope(ab_context(), async {
            guard
                .ensure_visible(Some("user-1"), "bike/9", &Ownership::Company(company("C")))
                .await
                .unwrap_err()
        })
        .await;

        assert!(err.is_access_denied());
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), AuditEventType::FilterViolation);
        assert_eq!(events[0].actor(), Some("user-1"));
        assert_eq!(events[0].resource(), "bike/9");
        assert_eq!(events[0].metadata().unwrap()["record_company"], "C");
    }

    #[rstest]
    #[tokio::test]
    async fn test_漏れたレコードだけを取り除き順序を保持する(sink: InMemoryAuditSink) {
        let guard = guard(&sink);
        let records = vec![
            Ownership::Company(company("A")),
            Ownership::Company(company("C")),
            Ownership::Shared,
            Ownership::Company(company("D")),
            Ownership::Company(company("B")),
        ];

        let visible = tenant_scope::scope(ab_context(), async {
            guard.retain_visible(None, "bikes", records).await.unwrap()
        })
        .await;

        assert_eq!(
            visible,
            vec![
                Ownership::Company(company("A")),
                Ownership::Shared,
                Ownership::Company(company("B")),
            ]
        );
        assert_eq!(sink.count(AuditEventType::FilterViolation), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn test_スーパー管理者はすべてのレコードを保持する(sink: InMemoryAuditSink) {
        let guard = guard(&sink);
        let records = vec![Ownership::Company(company("X")), Ownership::Shared];

        let visible = tenant_scope::scope(TenantContext::new([], true), async {
            guard.retain_visible(None, "bikes", records.clone()).await.unwrap()
        })
        .await;

        assert_eq!(visible, records);
        assert!(sink.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_他社の会社idを指定した操作はクロステナント試行として記録する(
        sink: InMemoryAuditSink,
    ) {
        let guard = guard(&sink);

        let result = tenant_scope::scope(ab_context(), async {
            let own = guard
                .require_company_access(Some("user-1"), "/companies/A/bikes", &company("A"))
                .await;
            let other = guard
                .require_company_access(Some("user-1"), "/companies/C/bikes", &company("C"))
                .await;
            (own, other)
        })
        .await;

        assert!(result.0.is_ok());
        assert!(result.1.unwrap_err().is_access_denied());
        assert_eq!(sink.count(AuditEventType::CrossTenantAccessAttempt), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_スコープ外ではコンテキストエラーを記録して失敗する(sink: InMemoryAuditSink) {
        let guard = guard(&sink);

        let err = guard
            .ensure_visible(None, "bike/1", &Ownership::Shared)
            .await
            .unwrap_err();

        assert!(matches!(
            err.kind(),
            crate::error::InfraErrorKind::TenantContext(TenantContextError::NotInitialized)
        ));
        assert_eq!(sink.count(AuditEventType::TenantContextError), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_rlsによる拒否はポリシー違反として記録しアクセス拒否を返す(
        sink: InMemoryAuditSink,
    ) {
        let guard = guard(&sink);
        let denied: Result<(), InfraError> =
            Err(database_error("42501", "new row violates row-level security policy").into());

        let err = tenant_scope::scope(ab_context(), async {
            guard
                .audit_policy_denial(Some("user-1"), "bike/9", denied)
                .await
                .unwrap_err()
        })
        .await;

        assert!(err.is_access_denied());
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), AuditEventType::PolicyViolation);
        assert_eq!(events[0].metadata().unwrap()["sqlstate"], "42501");
        assert_eq!(
            events[0].metadata().unwrap()["context_companies"],
            serde_json::json!(["A", "B"])
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_ポリシー拒否以外の結果はそのまま返す(sink: InMemoryAuditSink) {
        let guard = guard(&sink);

        let ok = guard.audit_policy_denial(None, "bikes", Ok(3)).await.unwrap();
        let err = guard
            .audit_policy_denial::<()>(None, "bikes", Err(database_error("23505", "duplicate").into()))
            .await
            .unwrap_err();

        assert_eq!(ok, 3);
        assert!(matches!(err.kind(), crate::error::InfraErrorKind::Database(_)));
        assert!(sink.is_empty());
    }

    /// WARN 以上のイベント数を数えるレイヤー
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let level = *event.metadata().level();
            if level == tracing::Level::WARN || level == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_違反のログ出力は監査シンクに任せる(sink: InMemoryAuditSink) {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let _default = tracing::subscriber::set_default(subscriber);
        let guard = guard(&sink);

        tenant_scope::scope(ab_context(), async {
            guard
                .ensure_visible(Some("user-1"), "bike/9", &Ownership::Company(company("C")))
                .await
                .unwrap_err();
        })
        .await;

        assert_eq!(sink.count(AuditEventType::FilterViolation), 1);
        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }
}

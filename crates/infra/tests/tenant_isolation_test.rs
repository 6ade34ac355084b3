//! テナント分離の統合テスト
//!
//! 並行リクエスト間でテナントコンテキストが混ざらないこと、
//! パニックやレスポンス返却後にコンテキストが残留しないことを検証する。
//!
//! 実行方法:
//! ```bash
//! cargo test -p pedalhub-infra --test tenant_isolation_test
//! ```

use std::sync::Arc;

use axum::{Router, body::Body, http::Request, routing::get};
use chrono::{TimeZone, Utc};
use pedalhub_domain::{
    audit::AuditEventType,
    clock::FixedClock,
    company::CompanyId,
    tenant::{Ownership, TenantClaims, TenantContext},
};
use pedalhub_infra::{
    TenantScopeLayer,
    mock::InMemoryAuditSink,
    tenant_filter::TenantGuard,
    tenant_scope::{self, TenantContextError},
};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

fn company(id: &str) -> CompanyId {
    CompanyId::new(id).unwrap()
}

/// 暗黙コンテキストの会社集合をカンマ区切りで返すハンドラー
async fn visible_companies() -> String {
    match tenant_scope::current_companies() {
        Ok(companies) => companies
            .iter()
            .map(CompanyId::as_str)
            .collect::<Vec<_>>()
            .join(","),
        Err(TenantContextError::NotInitialized) => "uninitialized".to_string(),
    }
}

fn app() -> Router {
    Router::new()
        .route("/companies", get(visible_companies))
        .layer(TenantScopeLayer::new())
}

async fn call(app: Router, claims: Option<TenantClaims>) -> String {
    let mut request = Request::builder()
        .uri("/companies")
        .body(Body::empty())
        .unwrap();
    if let Some(claims) = claims {
        request.extensions_mut().insert(claims);
    }

    let response = app.oneshot(request).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// 並行実行
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_並行するスコープは互いのコンテキストを観測しない() {
    let handles: Vec<_> = (0..64)
        .map(|i| {
            tokio::spawn(tenant_scope::scope(
                TenantContext::new([company(&format!("C{i}"))], false),
                async move {
                    for _ in 0..10 {
                        tokio::task::yield_now().await;
                        let companies = tenant_scope::current_companies().unwrap();
                        assert_eq!(&*companies, &[company(&format!("C{i}"))]);
                    }
                    i
                },
            ))
        })
        .collect();

    for (expected, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_同一スレッド上で交互に進むスコープも互いを観測しない() {
    let a = tenant_scope::scope(TenantContext::new([company("A")], false), async {
        tokio::task::yield_now().await;
        tenant_scope::current_companies().unwrap()
    });
    let b = tenant_scope::scope(TenantContext::new([company("B")], true), async {
        tokio::task::yield_now().await;
        (
            tenant_scope::current_companies().unwrap(),
            tenant_scope::is_super_admin().unwrap(),
        )
    });

    let (a, (b, b_admin)) = tokio::join!(a, b);

    assert_eq!(&*a, &[company("A")]);
    assert_eq!(&*b, &[company("B")]);
    assert!(b_admin);
}

// =============================================================================
// 後片付け
// =============================================================================

#[test]
fn test_同期スコープ内でパニックしてもコンテキストは残らない() {
    let result = std::panic::catch_unwind(|| {
        tenant_scope::sync_scope(TenantContext::new([company("A")], true), || {
            panic!("ハンドラー内のパニック");
        })
    });

    assert!(result.is_err());
    assert!(!tenant_scope::is_initialized());
}

#[tokio::test]
async fn test_非同期スコープ内でパニックしても次のタスクにコンテキストは残らない() {
    let panicked = tokio::spawn(tenant_scope::scope(
        TenantContext::new([company("A")], true),
        async { panic!("ハンドラー内のパニック") },
    ))
    .await;
    assert!(panicked.unwrap_err().is_panic());

    let next = tokio::spawn(async { tenant_scope::current() }).await.unwrap();
    assert_eq!(next.unwrap_err(), TenantContextError::NotInitialized);
}

// =============================================================================
// リクエストライフサイクル
// =============================================================================

#[tokio::test]
async fn test_レイヤー経由のハンドラーはクレームのコンテキストを参照する() {
    let claims = TenantClaims::new(vec![company("A"), company("B")], vec![]);

    assert_eq!(call(app(), Some(claims)).await, "A,B");
    assert!(!tenant_scope::is_initialized());
}

#[tokio::test]
async fn test_連続するリクエストに前のコンテキストが残らない() {
    let first = call(app(), Some(TenantClaims::new(vec![company("A")], vec![]))).await;
    let second = call(app(), None).await;

    assert_eq!(first, "A");
    assert_eq!(second, "");
}

#[tokio::test]
async fn test_レイヤーを通らないハンドラーはコンテキスト未初期化になる() {
    let app = Router::new().route("/companies", get(visible_companies));

    assert_eq!(call(app, None).await, "uninitialized");
}

// =============================================================================
// オブジェクト層の再検査
// =============================================================================

#[tokio::test]
async fn test_クエリ層をすり抜けたレコードは監査され応答から除外される() {
    let sink = InMemoryAuditSink::new();
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap());
    let guard = TenantGuard::new(Arc::new(sink.clone()), Arc::new(clock));

    // クエリ層の不具合で他社レコードが混入した状態を再現する
    let fetched = vec![
        Ownership::Company(company("A")),
        Ownership::Company(company("C")),
        Ownership::Shared,
    ];

    let visible = tenant_scope::scope(TenantContext::new([company("A")], false), async {
        guard
            .retain_visible(Some("user-1"), "/api/v1/bikes", fetched)
            .await
            .unwrap()
    })
    .await;

    assert_eq!(
        visible,
        vec![Ownership::Company(company("A")), Ownership::Shared]
    );
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type(), AuditEventType::FilterViolation);
    assert_eq!(events[0].metadata().unwrap()["record_company"], "C");
    assert_eq!(
        events[0].metadata().unwrap()["context_companies"],
        serde_json::json!(["A"])
    );
}

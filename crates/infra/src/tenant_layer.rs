//! # テナントスコープ ミドルウェア
//!
//! 認証層が request extensions に格納した [`TenantClaims`] からテナントコンテキストを構築し、
//! 内側のサービス呼び出し全体を [`tenant_scope::scope`] で包む tower Layer。
//!
//! ## レイヤー配置
//!
//! 認証ミドルウェアの内側、ハンドラーの外側に配置する:
//!
//! ```text
//! 認証 → TenantScopeLayer → [他のミドルウェア] → handler
//! ```
//!
//! クレームを持たないリクエスト（公開エンドポイントなど）は空の非管理者コンテキストで処理する。
//! この場合は共有データのみが見える。

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use http::Request;
use pedalhub_domain::tenant::{TenantClaims, TenantContext};
use pedalhub_shared::{event_log::event, log_security_event};
use tower::{Layer, Service};

use crate::tenant_scope;

/// テナントスコープを確立する Layer
#[derive(Clone, Debug, Default)]
pub struct TenantScopeLayer;

impl TenantScopeLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TenantScopeLayer {
    type Service = TenantScopeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TenantScopeService { inner }
    }
}

/// テナントスコープを確立する Service
///
/// [`TenantScopeLayer`] が生成する Service 実装。
#[derive(Clone, Debug)]
pub struct TenantScopeService<S> {
    inner: S,
}

impl<S, ReqBody> Service<Request<ReqBody>> for TenantScopeService<S>
where
    S: Service<Request<ReqBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
{
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // clone-swap パターン: poll_ready で得た readiness を保持する inner を使う
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let claims = req.extensions().get::<TenantClaims>();
        let has_claims = claims.is_some();
        let ctx = claims.map(TenantClaims::to_context).unwrap_or_default();
        log_scope_opened(&ctx, has_claims);

        Box::pin(async move {
            let result = tenant_scope::scope(ctx, async move { inner.call(req).await }).await;
            tracing::debug!(
                event.category = event::category::TENANT,
                event.action = event::action::SCOPE_CLOSED,
                "テナントスコープを終了"
            );
            result
        })
    }
}

fn log_scope_opened(ctx: &TenantContext, has_claims: bool) {
    log_security_event!(
        info,
        event.category = event::category::TENANT,
        event.action = event::action::SCOPE_OPENED,
        event.result = event::result::SUCCESS,
        tenant.company_count = ctx.current_companies().len(),
        tenant.super_admin = ctx.is_super_admin(),
        tenant.has_claims = has_claims,
        "テナントスコープを開始"
    );
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use pedalhub_domain::company::CompanyId;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;
    use crate::tenant_scope::TenantContextError;

    /// 呼び出し時点の暗黙コンテキストを返すダミー Service
    #[derive(Clone)]
    struct ContextProbe;

    impl Service<Request<()>> for ContextProbe {
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
        type Response = Result<TenantContext, TenantContextError>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<()>) -> Self::Future {
            Box::pin(async { Ok(tenant_scope::current()) })
        }
    }

    fn company(id: &str) -> CompanyId {
        CompanyId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_クレームから構築したコンテキストで内側のサービスを呼ぶ() {
        let mut request = Request::new(());
        request.extensions_mut().insert(TenantClaims::new(
            vec![company("A"), company("B")],
            vec!["ROLE_USER".to_string()],
        ));

        let ctx = TenantScopeLayer::new()
            .layer(ContextProbe)
            .oneshot(request)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(&*ctx.current_companies(), &[company("A"), company("B")]);
        assert!(!ctx.is_super_admin());
    }

    #[tokio::test]
    async fn test_スーパー管理者ロールのクレームは管理者コンテキストになる() {
        let mut request = Request::new(());
        request
            .extensions_mut()
            .insert(TenantClaims::new(vec![], vec!["ROLE_SUPER_ADMIN".to_string()]));

        let ctx = TenantScopeLayer::new()
            .layer(ContextProbe)
            .oneshot(request)
            .await
            .unwrap()
            .unwrap();

        assert!(ctx.is_super_admin());
    }

    #[tokio::test]
    async fn test_クレームがないリクエストは空の非管理者コンテキストになる() {
        let ctx = TenantScopeLayer::new()
            .layer(ContextProbe)
            .oneshot(Request::new(()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ctx, TenantContext::default());
    }

    #[tokio::test]
    async fn test_レスポンス返却後はコンテキストが残らない() {
        let _ = TenantScopeLayer::new()
            .layer(ContextProbe)
            .oneshot(Request::new(()))
            .await;

        assert!(!tenant_scope::is_initialized());
    }
}

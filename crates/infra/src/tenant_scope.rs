//! # リクエストスコープのテナントコンテキスト
//!
//! [`TenantContext`] をタスク単位の暗黙コンテキストとして伝播する。
//!
//! ## 仕組み
//!
//! 1. [`TenantScopeLayer`](crate::tenant_layer::TenantScopeLayer) が認証済みクレームから
//!    コンテキストを構築し、[`scope`] でリクエスト処理全体を包む
//! 2. リポジトリや [`TenantGuard`](crate::tenant_filter::TenantGuard) が
//!    [`current`] などでコンテキストを参照する
//! 3. スコープ終了（正常終了・エラー・パニック）と同時にコンテキストは破棄される
//!
//! ## なぜ task-local を使用するか
//!
//! テナントコンテキストは全リポジトリ・全クエリに影響する横断的関心事であり、
//! 引数で明示的に渡すとほぼすべてのシグネチャが変わる。
//! task-local ならスコープ外で値が残留することが構造的にありえない。
//!
//! ## スコープ外での呼び出し
//!
//! スコープ外ではすべての操作が [`TenantContextError::NotInitialized`] を返す。
//! 「全件見える」「何も見えない」のどちらにも黙ってフォールバックしない。
//!
//! ## 子タスク
//!
//! `tokio::spawn` した子タスクはコンテキストを引き継がない。
//! 必要なら [`inherit`] で明示的に引き継ぐ。

use std::{cell::RefCell, future::Future, sync::Arc};

use pedalhub_domain::{company::CompanyId, tenant::TenantContext};
use thiserror::Error;

tokio::task_local! {
    static TENANT_CONTEXT: RefCell<TenantContext>;
}

/// テナントコンテキストのエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TenantContextError {
    /// リクエストスコープの外で呼び出された
    #[error("テナントコンテキストが初期化されていません")]
    NotInitialized,
}

/// `ctx` を暗黙コンテキストとして `future` を実行する
///
/// コンテキストは `future` の実行中のみ存在する。
pub async fn scope<F>(ctx: TenantContext, future: F) -> F::Output
where
    F: Future,
{
    TENANT_CONTEXT.scope(RefCell::new(ctx), future).await
}

/// 同期処理版の [`scope`]
pub fn sync_scope<F, R>(ctx: TenantContext, f: F) -> R
where
    F: FnOnce() -> R,
{
    TENANT_CONTEXT.sync_scope(RefCell::new(ctx), f)
}

/// 現在のコンテキストを引き継いで `future` を実行するラッパーを作る
///
/// `tokio::spawn` する子タスクにコンテキストを渡す場合に使う。
/// 引き継ぐのは呼び出し時点のスナップショットであり、以後の変更は共有しない。
pub fn inherit<F>(future: F) -> Result<impl Future<Output = F::Output>, TenantContextError>
where
    F: Future,
{
    let ctx = current()?;
    Ok(scope(ctx, future))
}

/// スコープ内かどうか
pub fn is_initialized() -> bool {
    TENANT_CONTEXT.try_with(|_| ()).is_ok()
}

/// 現在のコンテキストのコピーを返す
pub fn current() -> Result<TenantContext, TenantContextError> {
    with_context(|ctx| ctx.clone())
}

/// 参照可能な会社集合を置き換える
pub fn set_current_companies(
    companies: impl IntoIterator<Item = CompanyId>,
) -> Result<(), TenantContextError> {
    with_context_mut(|ctx| ctx.set_current_companies(companies))
}

/// 参照可能な会社集合のスナップショットを返す
pub fn current_companies() -> Result<Arc<[CompanyId]>, TenantContextError> {
    with_context(TenantContext::current_companies)
}

pub fn set_super_admin(super_admin: bool) -> Result<(), TenantContextError> {
    with_context_mut(|ctx| ctx.set_super_admin(super_admin))
}

pub fn is_super_admin() -> Result<bool, TenantContextError> {
    with_context(TenantContext::is_super_admin)
}

/// 会社集合と管理者フラグを初期状態に戻す
///
/// スコープ自体は残る。何度呼んでも結果は同じ。
pub fn clear() -> Result<(), TenantContextError> {
    with_context_mut(TenantContext::clear)
}

fn with_context<R>(f: impl FnOnce(&TenantContext) -> R) -> Result<R, TenantContextError> {
    TENANT_CONTEXT
        .try_with(|cell| f(&*cell.borrow()))
        .map_err(|_| TenantContextError::NotInitialized)
}

fn with_context_mut<R>(f: impl FnOnce(&mut TenantContext) -> R) -> Result<R, TenantContextError> {
    TENANT_CONTEXT
        .try_with(|cell| f(&mut *cell.borrow_mut()))
        .map_err(|_| TenantContextError::NotInitialized)
}

//! # PostgreSQL データベース接続管理
//!
//! 接続プールの作成と、行レベルセキュリティ（RLS）用のセッション変数を設定した
//! 会社スコープ付きコネクションを提供する。
//!
//! ## セッション変数
//!
//! | 変数 | 値 |
//! |-----|----|
//! | `app.company_ids` | 参照可能な会社 ID のカンマ区切り（空文字列は明示なし） |
//! | `app.super_admin` | `true` / `false` |
//!
//! RLS ポリシーの例:
//!
//! ```sql
//! CREATE POLICY company_isolation ON bikes USING (
//!     current_setting('app.super_admin', true) = 'true'
//!     OR company_id IS NULL
//!     OR company_id = ANY(string_to_array(current_setting('app.company_ids', true), ','))
//! );
//! ```
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use pedalhub_infra::db;
//!
//! let pool = db::create_pool("postgres://localhost/pedalhub").await?;
//! let mut conn = db::CompanyConnection::acquire_ambient(&pool).await?;
//! let bikes = sqlx::query("SELECT id FROM bikes").fetch_all(&mut *conn).await?;
//! ```

use std::{
    ops::{Deref, DerefMut},
    time::Duration,
};

use pedalhub_domain::tenant::TenantContext;
use sqlx::{PgConnection, PgPool, Postgres, pool::PoolConnection, postgres::PgPoolOptions};

use crate::{error::InfraError, tenant_scope};

/// 会社 ID の区切り文字
const COMPANY_ID_SEPARATOR: &str = ",";

/// RLS 用の `after_release` フックを含む `PgPoolOptions` を返す
///
/// コネクションがプールに返却される際、`app.company_ids` と `app.super_admin` を
/// 初期値に戻す。別の会社のリクエストで前の値が残留することはない。
///
/// テストでは `max_connections(1)` と組み合わせて使用する。
pub fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new().after_release(|conn, _meta| {
        Box::pin(async move {
            sqlx::query(
                "SELECT set_config('app.company_ids', '', false), \
                 set_config('app.super_admin', 'false', false)",
            )
            .execute(&mut *conn)
            .await?;
            Ok(true)
        })
    })
}

/// PostgreSQL 接続プールを作成する
///
/// アプリケーション起動時に一度だけ呼び出し、作成したプールを共有する。
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    pool_options()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// `app.company_ids` に設定する値
///
/// `CompanyId` は区切り文字を含めないため、ポリシー側の `string_to_array` で
/// 元の会社集合がそのまま復元される。
pub fn company_ids_setting(ctx: &TenantContext) -> String {
    ctx.current_companies()
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(COMPANY_ID_SEPARATOR)
}

// =============================================================================
// CompanyConnection
// =============================================================================

/// 会社スコープ付き DB コネクション
///
/// 取得時に `app.company_ids` / `app.super_admin` セッション変数を設定する。
/// ドロップ時（プールへの返却時）に [`pool_options`] の `after_release`
/// フックが両方をリセットする。
pub struct CompanyConnection {
    conn: PoolConnection<Postgres>,
    ctx:  TenantContext,
}

impl CompanyConnection {
    /// 指定したコンテキストでコネクションを取得する
    pub async fn acquire(pool: &PgPool, ctx: &TenantContext) -> Result<Self, InfraError> {
        let mut conn = pool.acquire().await?;
        sqlx::query(
            "SELECT set_config('app.company_ids', $1, false), \
             set_config('app.super_admin', $2, false)",
        )
        .bind(company_ids_setting(ctx))
        .bind(ctx.is_super_admin().to_string())
        .execute(&mut *conn)
        .await?;

        tracing::debug!(
            tenant.company_count = ctx.current_companies().len(),
            tenant.super_admin = ctx.is_super_admin(),
            "会社スコープ付きコネクションを取得"
        );
        Ok(Self {
            conn,
            ctx: ctx.clone(),
        })
    }

    /// 暗黙コンテキストでコネクションを取得する
    ///
    /// スコープ外では DB に触れる前に失敗する。
    pub async fn acquire_ambient(pool: &PgPool) -> Result<Self, InfraError> {
        let ctx = tenant_scope::current()?;
        Self::acquire(pool, &ctx).await
    }

    /// 設定されているコンテキスト
    pub fn context(&self) -> &TenantContext {
        &self.ctx
    }
}

// PoolConnection<Postgres> と同じく PgConnection に deref する。
impl Deref for CompanyConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for CompanyConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

//! # テナントコンテキスト
//!
//! リクエスト単位で「呼び出し元がどの会社のデータを参照できるか」を表現する。
//!
//! ## 構成要素
//!
//! | 型 | 役割 |
//! |---|------|
//! | [`TenantContext`] | 参照可能な会社の集合 + スーパー管理者フラグ |
//! | [`TenantScoped`] | 会社に所属するレコードが公開する能力（所有会社の取得） |
//! | [`Ownership`] | 会社所有 / 共有データを区別するタグ |
//! | [`CompanyOwned`] | 任意の値に所有区分を付与するラッパー |
//! | [`CompanyScope`] | コンテキストから導出したクエリ用のスコープ |
//! | [`TenantClaims`] | 認証層が検証済みトークンから取り出したクレーム |
//!
//! ## 可視性の規則
//!
//! レコードが見えるのは次のいずれかを満たす場合に限る:
//!
//! - スーパー管理者である
//! - レコードの所有会社がコンテキストの会社集合に含まれる
//! - レコードが所有会社を持たない（共有参照データ）
//!
//! この値自体はただのデータであり、リクエスト間で共有されない。
//! リクエストスコープへの束縛は infra 層の `tenant_scope` が担う。
//!
//! ## 使用例
//!
//! ```rust
//! use pedalhub_domain::{company::CompanyId, tenant::{Ownership, TenantContext}};
//!
//! let a = CompanyId::new("A").unwrap();
//! let c = CompanyId::new("C").unwrap();
//!
//! let mut ctx = TenantContext::default();
//! ctx.set_current_companies([a.clone(), CompanyId::new("B").unwrap()]);
//!
//! assert!(ctx.is_visible(&Ownership::Company(a)));
//! assert!(!ctx.is_visible(&Ownership::Company(c)));
//! assert!(ctx.is_visible(&Ownership::Shared));
//! ```

use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::company::CompanyId;

/// スーパー管理者ロール名
///
/// Spring 系サービスが発行するトークンの `ROLE_` プレフィックス付き表記も受け付ける。
pub const SUPER_ADMIN_ROLE: &str = "SUPER_ADMIN";

// =========================================================================
// TenantContext
// =========================================================================

/// リクエストスコープのテナントコンテキスト
///
/// # 不変条件
///
/// - 会社集合は挿入順を保持し、重複を含まない
/// - [`current_companies`](Self::current_companies) が返すスナップショットは
///   その後の変更の影響を受けない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    companies:   Arc<[CompanyId]>,
    super_admin: bool,
}

impl Default for TenantContext {
    fn default() -> Self {
        Self {
            companies:   Arc::from(Vec::new()),
            super_admin: false,
        }
    }
}

impl TenantContext {
    /// 会社集合とフラグを指定して作成する
    pub fn new(companies: impl IntoIterator<Item = CompanyId>, super_admin: bool) -> Self {
        let mut ctx = Self::default();
        ctx.set_current_companies(companies);
        ctx.set_super_admin(super_admin);
        ctx
    }

    /// 参照可能な会社集合を置き換える
    ///
    /// 空の集合は「明示的なリストなし」を意味し、「アクセス不可」ではない。
    /// 非管理者なら自身のデータのみ、管理者ならフィルタなしと解釈される。
    pub fn set_current_companies(&mut self, companies: impl IntoIterator<Item = CompanyId>) {
        let mut seen = HashSet::new();
        let deduped: Vec<CompanyId> = companies
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        self.companies = Arc::from(deduped);
    }

    /// 参照可能な会社集合のスナップショットを返す
    pub fn current_companies(&self) -> Arc<[CompanyId]> {
        Arc::clone(&self.companies)
    }

    pub fn set_super_admin(&mut self, super_admin: bool) {
        self.super_admin = super_admin;
    }

    pub fn is_super_admin(&self) -> bool {
        self.super_admin
    }

    /// 両方の状態を初期値に戻す
    ///
    /// 何度呼んでも `TenantContext::default()` と等しい状態になる。
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 所有会社を指定して可視性を判定する
    ///
    /// `None` は共有参照データを表し、常に可視。
    pub fn can_see(&self, owner: Option<&CompanyId>) -> bool {
        if self.super_admin {
            return true;
        }
        match owner {
            None => true,
            Some(owner) => self.companies.contains(owner),
        }
    }

    /// レコードの可視性を判定する
    pub fn is_visible<T: TenantScoped + ?Sized>(&self, record: &T) -> bool {
        self.can_see(record.owning_company())
    }

    /// クエリ構築用のスコープを導出する
    pub fn scope(&self) -> CompanyScope {
        if self.super_admin {
            CompanyScope::AllCompanies
        } else if self.companies.is_empty() {
            CompanyScope::OwnDataOnly
        } else {
            CompanyScope::Companies(self.current_companies())
        }
    }
}

/// クエリ構築時に適用するスコープ
///
/// [`TenantContext::can_see`] と同じ規則をクエリ条件として表現したもの。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyScope {
    /// スーパー管理者: フィルタしない
    AllCompanies,
    /// 列挙された会社 + 共有データ
    Companies(Arc<[CompanyId]>),
    /// 会社の明示なし: 共有データのみ（呼び出し元が本人条件を追加する）
    OwnDataOnly,
}

// =========================================================================
// TenantScoped
// =========================================================================

/// 会社に所属しうるレコードが公開する能力
///
/// 所有会社は作成後に変更してはならない。実装側は所有会社のセッターを公開しないこと。
pub trait TenantScoped {
    /// 所有会社。共有参照データは `None`。
    fn owning_company(&self) -> Option<&CompanyId>;
}

impl<T: TenantScoped + ?Sized> TenantScoped for &T {
    fn owning_company(&self) -> Option<&CompanyId> {
        (**self).owning_company()
    }
}

impl<T: TenantScoped + ?Sized> TenantScoped for Box<T> {
    fn owning_company(&self) -> Option<&CompanyId> {
        (**self).owning_company()
    }
}

/// レコードの所有区分
///
/// エンティティはこのタグをフィールドとして持つだけで [`TenantScoped`] を満たせる。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "company_id", rename_all = "snake_case")]
pub enum Ownership {
    /// 単一の会社に所属する
    Company(CompanyId),
    /// 全会社で共有される参照データ
    Shared,
}

impl TenantScoped for Ownership {
    fn owning_company(&self) -> Option<&CompanyId> {
        match self {
            Self::Company(id) => Some(id),
            Self::Shared => None,
        }
    }
}

/// 所有区分を後付けで与えるラッパー
///
/// 所有区分は構築時に固定され、変更手段を持たない。
/// 中身へは参照のみ許し、可変参照は所有区分と切り離して `value_mut` で得る。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyOwned<T> {
    ownership: Ownership,
    value:     T,
}

impl<T> CompanyOwned<T> {
    pub fn new(ownership: Ownership, value: T) -> Self {
        Self { ownership, value }
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> TenantScoped for CompanyOwned<T> {
    fn owning_company(&self) -> Option<&CompanyId> {
        self.ownership.owning_company()
    }
}

// =========================================================================
// TenantClaims
// =========================================================================

/// 検証済みトークンから取り出したテナント関連クレーム
///
/// 認証層がリクエストの extensions に格納する。
/// この層はクレームを完全に信頼し、再検証しない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantClaims {
    /// 所属会社
    pub companies: Vec<CompanyId>,
    /// ロール
    pub roles:     Vec<String>,
}

impl TenantClaims {
    pub fn new(companies: Vec<CompanyId>, roles: Vec<String>) -> Self {
        Self { companies, roles }
    }

    /// スーパー管理者ロールを持つか
    ///
    /// `SUPER_ADMIN` / `ROLE_SUPER_ADMIN` を大文字小文字を区別せずに判定する。
    pub fn is_super_admin(&self) -> bool {
        self.roles.iter().any(|role| {
            let role = role.trim();
            let role = role
                .get(..5)
                .filter(|prefix| prefix.eq_ignore_ascii_case("ROLE_"))
                .map_or(role, |_| &role[5..]);
            role.eq_ignore_ascii_case(SUPER_ADMIN_ROLE)
        })
    }

    /// クレームからテナントコンテキストを構築する
    pub fn to_context(&self) -> TenantContext {
        TenantContext::new(self.companies.iter().cloned(), self.is_super_admin())
    }
}

//! # PedalHub インフラ層
//!
//! テナント分離の実行時強制と、外部システムとの接続を担当する。
//!
//! ## 責務
//!
//! - **テナントスコープ**: リクエスト単位の暗黙テナントコンテキスト（task-local）
//! - **フィルタリング**: クエリ条件の生成と取得済みレコードの再検査
//! - **データベース接続**: RLS セッション変数付きの PostgreSQL コネクション
//! - **監査イベント配送**: 構造化ログへの出力
//! - **決済ゲートウェイ**: Webhook 署名の生成と検証
//!
//! ## 依存関係
//!
//! ```text
//! infra → domain
//!   ↓
//! shared
//! ```
//!
//! ## モジュール構成
//!
//! - [`tenant_scope`] - task-local のテナントコンテキスト
//! - [`tenant_layer`] - テナントスコープを確立する tower Layer
//! - [`tenant_filter`] - クエリ条件とオブジェクト層のガード
//! - [`db`] - PostgreSQL 接続管理
//! - [`audit`] - 監査イベントの配送先
//! - [`gateway_signature`] - 決済ゲートウェイの署名
//! - [`config`] - 決済関連の設定
//! - [`error`] - インフラ層エラー定義

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway_signature;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod tenant_filter;
pub mod tenant_layer;
pub mod tenant_scope;

pub use audit::{AuditSink, TracingAuditSink};
pub use error::{InfraError, InfraErrorKind};
pub use tenant_layer::TenantScopeLayer;
pub use tenant_scope::TenantContextError;

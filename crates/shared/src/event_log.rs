//! # セキュリティイベントログの構造化ヘルパー
//!
//! `jq` で効率的に調査できるよう、ログフィールドの命名規約と
//! ヘルパーマクロを提供する。
//!
//! ## セキュリティイベント
//!
//! [`log_security_event!`] マクロで出力する。`event.kind = "security_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "security_event")'` でフィルタできる。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`event.action`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// セキュリティイベントを構造化ログとして出力する。
///
/// 第 1 引数はログレベル（`info` / `warn` / `error`）。
/// `event.kind = "security_event"` マーカーを自動付与する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（監査イベント種別の文字列表現）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.actor`: 操作者
/// - `event.resource`: 対象リソース / エンドポイント
#[macro_export]
macro_rules! log_security_event {
    (info, $($args:tt)*) => {
        ::tracing::info!(event.kind = "security_event", $($args)*)
    };
    (warn, $($args:tt)*) => {
        ::tracing::warn!(event.kind = "security_event", $($args)*)
    };
    (error, $($args:tt)*) => {
        ::tracing::error!(event.kind = "security_event", $($args)*)
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const AUDIT: &str = "audit";
        pub const TENANT: &str = "tenant";
        pub const PAYMENT: &str = "payment";
    }

    /// テナントスコープのアクション
    pub mod action {
        pub const SCOPE_OPENED: &str = "tenant.scope_opened";
        pub const SCOPE_CLOSED: &str = "tenant.scope_closed";
        pub const WEBHOOK_VERIFIED: &str = "payment.webhook_verified";
        pub const WEBHOOK_REJECTED: &str = "payment.webhook_rejected";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

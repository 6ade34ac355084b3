//! # ドメイン層エラー定義
//!
//! ビジネスルール違反やドメイン固有の例外状態を表現するエラー型。
//!
//! ## エラーの種類と HTTP ステータスの対応
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | 値オブジェクトの検証失敗 |
//! | `PaymentValidation` | 400 Bad Request | 決済手段データの検証失敗（フィールド付き） |
//! | `Forbidden` | 403 Forbidden | 権限不足 |
//!
//! ## 使用例
//!
//! ```rust
//! use pedalhub_domain::{DomainError, payment::BicValidator};
//!
//! fn accept_bic(raw: &str) -> Result<(), DomainError> {
//!     BicValidator::validate(raw)?;
//!     Ok(())
//! }
//!
//! assert!(accept_bic("ABNANL2A").is_ok());
//! assert!(matches!(
//!     accept_bic("ABNANL12"),
//!     Err(DomainError::PaymentValidation(_))
//! ));
//! ```

use thiserror::Error;

use crate::payment::ValidationError;

/// ドメイン層で発生するエラー
///
/// API 層でこのエラーを受け取り、適切な HTTP レスポンスに変換する。
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 会社 ID やクレームなど、決済以外の値オブジェクトの検証失敗。
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 決済手段データの検証エラー
    ///
    /// 呼び出し元は入力を修正して再試行できる。
    /// フィールド名と理由は [`ValidationError`] が保持する。
    #[error(transparent)]
    PaymentValidation(#[from] ValidationError),

    /// 権限エラー
    ///
    /// 認証（Authentication）ではなく認可（Authorization）の失敗を表す。
    /// メッセージはログ用であり、クライアントには固定文言を返す。
    #[error("権限がありません: {0}")]
    Forbidden(String),
}

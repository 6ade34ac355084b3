//! # 決済手段の検証
//!
//! 決済ゲートウェイへ送る前に決済手段データを検証する純粋関数群。
//! いずれもテナントコンテキストに依存しない。
//!
//! ## 検証の流れ
//!
//! 生の文字列 → 正規化（clean）→ 構造検証 → チェックサム検証 → 受理 / 拒否
//!
//! 途中状態は持たず、推測による補正もしない。
//!
//! ## 含まれる検証器
//!
//! | 検証器 | 対象 | アルゴリズム |
//! |-------|------|-------------|
//! | [`CardValidator`] | カード番号 / CVV / 有効期限 | Luhn |
//! | [`IbanValidator`] | IBAN | ISO 7064 MOD 97-10 |
//! | [`BicValidator`] | BIC（SWIFT コード） | 構造 + 国コード |
//! | [`PhoneValidator`] | 電話番号 | E.164 + 国別モバイル規則 |
//! | [`PaymentMethodValidator`] | 決済手段全体 | 上記へのディスパッチ |
//!
//! ## 使用例
//!
//! ```rust
//! use pedalhub_domain::payment::{IbanValidator, ValidationErrorKind};
//!
//! let validator = IbanValidator::strict();
//! assert!(validator.validate("NL91ABNA0417164300").is_ok());
//!
//! let err = validator.validate("NL92ABNA0417164300").unwrap_err();
//! assert_eq!(err.kind, ValidationErrorKind::InvalidChecksum);
//! ```

mod bic;
mod card;
mod error;
mod iban;
mod method;
mod phone;

pub use bic::*;
pub use card::*;
pub use error::*;
pub use iban::*;
pub use method::*;
pub use phone::*;

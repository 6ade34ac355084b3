//! 決済手段の検証エラー

use thiserror::Error;

/// 検証失敗の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ValidationErrorKind {
    /// 必須項目が空
    Required,
    /// 使用できない文字や構造
    InvalidFormat,
    /// 桁数・文字数が範囲外
    InvalidLength,
    /// チェックサム不一致
    InvalidChecksum,
    /// 未知または対象外の国
    UnsupportedCountry,
    /// 有効期限切れ
    Expired,
}

/// 決済手段の検証エラー
///
/// 問題のあるフィールド名と、利用者にそのまま提示できる理由を持つ。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field:  &'static str,
    pub kind:   ValidationErrorKind,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, kind: ValidationErrorKind, reason: impl Into<String>) -> Self {
        Self {
            field,
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn required(field: &'static str, label: &str) -> Self {
        Self::new(field, ValidationErrorKind::Required, format!("{label}は必須です"))
    }
}

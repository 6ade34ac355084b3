//! # 会社（テナント）識別子
//!
//! レンタル事業者（会社）はマルチテナント環境におけるテナントの単位である。
//! 会社 ID は認証トークンのクレームや各サービスの DB から渡される不透明な文字列で、
//! UUID 形式に限定しない。
//!
//! 使える文字は ASCII 英数字・`-`・`_` のみ。DB の RLS セッション変数には
//! 会社 ID をカンマ区切りで渡すため、区切り文字を含む ID は作れない。

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// 会社の一意識別子
///
/// # 不変条件
///
/// - 空文字列ではない（前後の空白はトリミング）
/// - ASCII 英数字・`-`・`_` のみで構成される
///
/// # 使用例
///
/// ```rust
/// use pedalhub_domain::company::CompanyId;
///
/// let id = CompanyId::new("acme-bikes").unwrap();
/// assert_eq!(id.as_str(), "acme-bikes");
/// assert!(CompanyId::new("   ").is_err());
/// assert!(CompanyId::new("A,B").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
#[display("{_0}")]
pub struct CompanyId(String);

impl CompanyId {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(DomainError::Validation("会社 ID は必須です".to_string()));
        }
        if !value.chars().all(is_id_char) {
            return Err(DomainError::Validation(format!(
                "会社 ID に使用できない文字が含まれています: {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl TryFrom<String> for CompanyId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CompanyId> for String {
    fn from(id: CompanyId) -> Self {
        id.0
    }
}

//! # エラーレスポンス（RFC 9457 Problem Details）
//!
//! 全サービスで共通のエラーレスポンス構造体を提供する。
//!
//! ## 設計
//!
//! - `ErrorResponse` は純粋なデータ構造（`Serialize` / `Deserialize` のみ）
//! - 入力検証エラーは `invalid-params` 拡張メンバーでフィールド単位の理由を返す
//! - 認可エラーの detail は固定文言。どの会社のデータが存在するかを推測させない

use serde::{Deserialize, Serialize};

/// error_type URI のベースパス
const ERROR_TYPE_BASE: &str = "https://pedalhub.example.com/errors";

/// 認可失敗時に返す固定の detail
const ACCESS_DENIED_DETAIL: &str = "このリソースにアクセスする権限がありません";

/// フィールド単位の検証エラー（RFC 9457 `invalid-params`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidParam {
    pub name:   String,
    pub reason: String,
}

/// エラーレスポンス（RFC 9457 Problem Details）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type:     String,
    pub title:          String,
    pub status:         u16,
    pub detail:         String,
    #[serde(
        rename = "invalid-params",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub invalid_params: Vec<InvalidParam>,
}

impl ErrorResponse {
    /// 汎用コンストラクタ
    ///
    /// `error_type_suffix` はベース URI に付加される（例: `"invalid-iban"`）。
    pub fn new(
        error_type_suffix: &str,
        title: impl Into<String>,
        status: u16,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            error_type:     format!("{ERROR_TYPE_BASE}/{error_type_suffix}"),
            title:          title.into(),
            status,
            detail:         detail.into(),
            invalid_params: Vec::new(),
        }
    }

    /// 400 Bad Request
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new("bad-request", "Bad Request", 400, detail)
    }

    /// 403 Forbidden
    ///
    /// テナント越境・フィルタ違反を含むすべての認可失敗で同じ応答を返す。
    pub fn access_denied() -> Self {
        Self::new("forbidden", "Forbidden", 403, ACCESS_DENIED_DETAIL)
    }

    /// 400 Validation Error（フィールド単位の理由付き）
    pub fn validation_error(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut response = Self::new("validation-error", "Validation Error", 400, reason.clone());
        response.invalid_params.push(InvalidParam {
            name: field.into(),
            reason,
        });
        response
    }

    /// 500 Internal Server Error
    ///
    /// detail は固定値（内部情報を漏らさないため）。
    pub fn internal_error() -> Self {
        Self::new(
            "internal-error",
            "Internal Server Error",
            500,
            "内部エラーが発生しました",
        )
    }
}

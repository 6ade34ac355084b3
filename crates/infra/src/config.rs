//! # 決済関連の設定
//!
//! 環境変数から決済ゲートウェイ連携の設定を読み込む。
//!
//! | 環境変数 | 既定値 | 内容 |
//! |---------|-------|------|
//! | `PAYMENT_SANDBOX_IBANS` | なし | チェックサム検証を免除する IBAN（カンマ区切り） |
//! | `GATEWAY_API_KEY` | なし | 署名鍵。未設定なら Webhook 検証は無効 |
//! | `GATEWAY_WEBHOOK_TOLERANCE_SECS` | `300` | Webhook タイムスタンプの許容範囲（秒） |
//!
//! ログ出力形式（`LOG_FORMAT`）は `pedalhub_shared::observability` が読み込む。

use std::env;

use chrono::TimeDelta;
use pedalhub_domain::payment::IbanValidator;
use thiserror::Error;

use crate::gateway_signature::{DEFAULT_TOLERANCE_SECS, SignatureError, WebhookVerifier};

/// 設定値のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
}

/// 決済関連の設定
#[derive(Clone)]
pub struct PaymentConfig {
    /// サンドボックス用 IBAN の許可リスト
    pub sandbox_ibans:     Vec<String>,
    /// 決済ゲートウェイの API キー
    pub gateway_api_key:   Option<String>,
    /// Webhook タイムスタンプの許容範囲
    pub webhook_tolerance: TimeDelta,
}

impl PaymentConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// 任意の取得関数から設定を読み込む
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let sandbox_ibans = lookup("PAYMENT_SANDBOX_IBANS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|iban| !iban.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let gateway_api_key = lookup("GATEWAY_API_KEY").filter(|key| !key.trim().is_empty());

        let webhook_tolerance = match lookup("GATEWAY_WEBHOOK_TOLERANCE_SECS") {
            None => TimeDelta::seconds(DEFAULT_TOLERANCE_SECS),
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map(|secs| TimeDelta::seconds(i64::from(secs)))
                .map_err(|_| ConfigError::Invalid {
                    name: "GATEWAY_WEBHOOK_TOLERANCE_SECS",
                    value,
                })?,
        };

        Ok(Self {
            sandbox_ibans,
            gateway_api_key,
            webhook_tolerance,
        })
    }

    /// 設定に従った IBAN 検証器
    pub fn iban_validator(&self) -> IbanValidator {
        if self.sandbox_ibans.is_empty() {
            IbanValidator::strict()
        } else {
            IbanValidator::with_sandbox_ibans(&self.sandbox_ibans)
        }
    }

    /// 設定に従った Webhook 検証器（API キー未設定なら `None`）
    pub fn webhook_verifier(&self) -> Result<Option<WebhookVerifier>, SignatureError> {
        self.gateway_api_key
            .as_deref()
            .map(|key| {
                WebhookVerifier::new(key)
                    .map(|verifier| verifier.with_tolerance(self.webhook_tolerance))
            })
            .transpose()
    }
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("sandbox_ibans", &self.sandbox_ibans)
            .field("gateway_api_key", &self.gateway_api_key.as_ref().map(|_| "***"))
            .field("webhook_tolerance", &self.webhook_tolerance)
            .finish()
    }
}

//! # 決済ゲートウェイの署名
//!
//! 決済ゲートウェイとの間で交わすリクエスト署名と Webhook 通知の検証。
//!
//! ## 署名形式
//!
//! ```text
//! Authorization = base64( "{timestamp}:{hex(HMAC-SHA512(api_key, "{timestamp}:{body}"))}" )
//! ```
//!
//! `timestamp` は UNIX 秒。受信時刻との差が許容範囲（既定 300 秒、前後とも）を超えた通知は
//! リプレイとみなして拒否する。

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use pedalhub_shared::{event_log::event, log_security_event};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// タイムスタンプの既定の許容範囲（秒）
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// 署名・検証のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// API キーが空
    #[error("API キーが設定されていません")]
    InvalidKey,

    /// ヘッダーを `timestamp:signature` として解釈できない
    #[error("署名ヘッダーの形式が不正です")]
    MalformedHeader,

    /// 署名が一致しない
    #[error("署名が一致しません")]
    SignatureMismatch,

    /// タイムスタンプが許容範囲外
    #[error("署名のタイムスタンプが許容範囲外です: {timestamp}")]
    Expired { timestamp: i64 },
}

/// Webhook 通知の署名検証器
///
/// 送信リクエストの署名にも同じ鍵と形式を使う。
#[derive(Clone)]
pub struct WebhookVerifier {
    mac:       HmacSha512,
    tolerance: TimeDelta,
}

impl WebhookVerifier {
    /// API キーから検証器を作成する
    pub fn new(api_key: &str) -> Result<Self, SignatureError> {
        if api_key.trim().is_empty() {
            return Err(SignatureError::InvalidKey);
        }
        let mac = HmacSha512::new_from_slice(api_key.as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self {
            mac,
            tolerance: TimeDelta::seconds(DEFAULT_TOLERANCE_SECS),
        })
    }

    /// タイムスタンプの許容範囲を変更する
    pub fn with_tolerance(mut self, tolerance: TimeDelta) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    pub fn tolerance(&self) -> TimeDelta {
        self.tolerance
    }

    /// `Authorization` ヘッダーの値を生成する
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> String {
        let signature = hex::encode(self.digest(timestamp, body));
        BASE64.encode(format!("{timestamp}:{signature}"))
    }

    /// Webhook 通知の署名を検証する
    ///
    /// 成功時は署名に含まれるタイムスタンプを返す。
    /// 署名を先に検証し、正しい署名に対してのみ期限切れを報告する。
    pub fn verify(
        &self,
        auth_header: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<i64, SignatureError> {
        let result = self.check(auth_header, body, now);
        match &result {
            Ok(timestamp) => log_security_event!(
                info,
                event.category = event::category::PAYMENT,
                event.action = event::action::WEBHOOK_VERIFIED,
                event.result = event::result::SUCCESS,
                webhook.timestamp = timestamp,
                "Webhook 署名を検証"
            ),
            Err(err) => log_security_event!(
                warn,
                event.category = event::category::PAYMENT,
                event.action = event::action::WEBHOOK_REJECTED,
                event.result = event::result::FAILURE,
                error.message = %err,
                "Webhook 署名を拒否"
            ),
        }
        result
    }

    fn check(&self, auth_header: &str, body: &[u8], now: DateTime<Utc>) -> Result<i64, SignatureError> {
        let (timestamp, provided) = parse_header(auth_header)?;

        let expected = self.digest(timestamp, body);
        if !bool::from(expected.as_slice().ct_eq(&provided)) {
            return Err(SignatureError::SignatureMismatch);
        }

        let skew = now.timestamp().abs_diff(timestamp);
        if skew > self.tolerance.num_seconds().unsigned_abs() {
            return Err(SignatureError::Expired { timestamp });
        }
        Ok(timestamp)
    }

    fn digest(&self, timestamp: i64, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b":");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

/// ヘッダーを (タイムスタンプ, 署名バイト列) に分解する
fn parse_header(auth_header: &str) -> Result<(i64, Vec<u8>), SignatureError> {
    let decoded = BASE64
        .decode(auth_header.trim())
        .map_err(|_| SignatureError::MalformedHeader)?;
    let decoded = String::from_utf8(decoded).map_err(|_| SignatureError::MalformedHeader)?;

    let (timestamp, signature) = decoded
        .split_once(':')
        .ok_or(SignatureError::MalformedHeader)?;
    let timestamp = timestamp
        .parse::<i64>()
        .map_err(|_| SignatureError::MalformedHeader)?;
    let signature = hex::decode(signature).map_err(|_| SignatureError::MalformedHeader)?;

    Ok((timestamp, signature))
}

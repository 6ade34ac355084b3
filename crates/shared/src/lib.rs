//! # PedalHub 共有ユーティリティ
//!
//! 全サービスが起動時・エラー応答時・セキュリティイベント記録時に使う部品。
//! ビジネスルール（テナント分離や決済手段の検証）は持たず、
//! `pedalhub-domain` にも依存しない。
//!
//! | モジュール | 内容 |
//! |-----------|------|
//! | [`observability`] | トレーシング初期化と `LOG_FORMAT` |
//! | [`event_log`] | `log_security_event!` とイベント名の定数 |
//! | [`error_response`] | RFC 9457 形式のエラーレスポンス |

pub mod error_response;
pub mod event_log;
pub mod observability;

pub use error_response::ErrorResponse;

//! # PedalHub ドメイン層
//!
//! 自転車レンタルプラットフォームの中核となるドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **テナント分離**: 会社（レンタル事業者）単位のデータ可視性を型で表現する
//! - **監査**: セキュリティ上重要な出来事を不変のイベントとして記録する
//! - **決済手段の検証**: ゲートウェイへ送る前に決済データを純粋関数で検証する
//!
//! ## 依存関係の方向
//!
//! ```text
//! infra → domain
//! ```
//!
//! ドメイン層はインフラ層（DB、HTTP、ログ出力）に依存しない。
//! リクエストスコープへの束縛や監査イベントの配送は infra 層が担う。
//!
//! ## モジュール構成
//!
//! - [`audit`] - 監査イベント
//! - [`clock`] - 時刻プロバイダ
//! - [`company`] - 会社（テナント）識別子
//! - [`error`] - ドメイン層で発生するエラーの定義
//! - [`payment`] - 決済手段の検証（カード、IBAN、BIC、電話番号）
//! - [`tenant`] - テナントコンテキストと可視性の規則

pub mod audit;
pub mod clock;
pub mod company;
pub mod error;
pub mod payment;
pub mod tenant;

pub use error::DomainError;

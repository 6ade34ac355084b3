//! # Clock（時刻プロバイダ）
//!
//! カード有効期限の判定や監査イベントのタイムスタンプで
//! `Utc::now()` を直接呼ばず、テストで固定時刻を注入可能にするための抽象化。

use chrono::{DateTime, Datelike, Utc};

/// 現在時刻を提供するトレイト
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// 現在の年月（`(year, month)`）
    ///
    /// カード有効期限は月単位で比較するため、日以下は切り捨てる。
    fn current_year_month(&self) -> (i32, u32) {
        let now = self.now();
        (now.year(), now.month())
    }
}

/// 実際のシステム時刻を返す実装
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定時刻を返すテスト用実装
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

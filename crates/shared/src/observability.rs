//! # Observability 基盤
//!
//! 各サービス（認証 / レンタル / 決済 / 通知 / サポート / 分析）が起動時に呼ぶ
//! トレーシング初期化を集約する。
//!
//! | 環境変数 | 既定値 | 内容 |
//! |---------|-------|------|
//! | `LOG_FORMAT` | `pretty` | `json`（本番）または `pretty`（開発） |
//! | `RUST_LOG` | `info,pedalhub=debug` | `EnvFilter` のディレクティブ |
//!
//! JSON 形式ではイベントのフィールドを平坦化して出力する。
//! `log_security_event!` の `event.kind` / `event.category` などはそのまま
//! トップレベルのキーになり、ログ基盤側で監査イベントを抽出できる。

/// `RUST_LOG` 未設定時のフィルタ
pub const DEFAULT_FILTER: &str = "info,pedalhub=debug";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON 形式（本番環境向け）
    Json,
    /// 人間が読みやすい形式（開発環境向け）
    #[default]
    Pretty,
}

impl LogFormat {
    /// 設定値を解釈する（大文字小文字は区別しない）
    ///
    /// 未知の値は `None`。
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// 任意の取得関数から `LOG_FORMAT` を読む
    ///
    /// 未設定・不正値はどちらも既定値になる。不正値は stderr に警告を出す
    /// （サブスクライバ初期化前なので tracing は使えない）。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let Some(value) = lookup("LOG_FORMAT") else {
            return Self::default();
        };
        Self::parse(&value).unwrap_or_else(|| {
            eprintln!("WARNING: unknown LOG_FORMAT={value:?}, falling back to pretty");
            Self::default()
        })
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// サービス名（`app` スパンの `service` フィールド）
    pub service_name:   String,
    pub log_format:     LogFormat,
    /// `RUST_LOG` 未設定時に使うフィルタ
    pub default_filter: String,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
        Self {
            service_name: service_name.into(),
            log_format,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }

    /// 環境変数から設定を読み取る
    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self::new(service_name, LogFormat::from_env())
    }

    /// `RUST_LOG` 未設定時のフィルタを差し替える
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }
}

/// `RUST_LOG` を優先し、なければ設定の既定フィルタを使う
#[cfg(feature = "observability")]
fn env_filter(config: &TracingConfig) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_filter))
}

/// トレーシングを初期化する
///
/// `ErrorLayer` を登録するので、infra 層のエラーは生成時点の `SpanTrace` を保持できる。
/// 戻り値のガードを保持している間、全ログに `app{service=...}` スパンが付く。
#[cfg(feature = "observability")]
pub fn init_tracing(config: TracingConfig) -> tracing::span::EnteredSpan {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter(&config))
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();

    tracing::info_span!("app", service = %config.service_name).entered()
}

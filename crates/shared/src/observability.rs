//! # Observability 基盤
//!
//! エンジンを組み込むサービス向けのトレーシング初期化。
//! `LOG_FORMAT` で JSON / Pretty を切り替え、`RUST_LOG` でフィルタを制御する。
//! [`event_log`](crate::event_log) のビジネスイベントを `jq` で調査できるよう、
//! JSON モードではイベントフィールドをトップレベルにフラット化する。

use std::str::FromStr;

/// ログ出力形式
///
/// 環境変数 `LOG_FORMAT` で切り替える。未設定・不正値は
/// [`Pretty`](LogFormat::Pretty) にフォールバックする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 本番環境向けの JSON 形式
    Json,
    /// 開発環境向けの可読形式
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(UnknownLogFormat(other.to_string())),
        }
    }
}

/// `LOG_FORMAT` に未知の値が指定された
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLogFormat(pub String);

impl std::fmt::Display for UnknownLogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "未知の LOG_FORMAT: {:?}", self.0)
    }
}

impl std::error::Error for UnknownLogFormat {}

impl LogFormat {
    /// 環境変数 `LOG_FORMAT` から読み取る
    ///
    /// 未知の値は stderr に警告を出して [`Pretty`](LogFormat::Pretty) に倒す。
    pub fn from_env() -> Self {
        let Ok(raw) = std::env::var("LOG_FORMAT") else {
            return Self::default();
        };
        raw.parse().unwrap_or_else(|e| {
            eprintln!("WARNING: {e}、pretty にフォールバックします");
            Self::default()
        })
    }
}

/// トレーシングを初期化する
///
/// `RUST_LOG` 未設定時は `"info,seisan=debug"` を使う。
/// サービス名は `app` スパンの `service` フィールドとして全ログに付与され、
/// JSON モードでは `span.service` として出力される。
///
/// # Panics
///
/// グローバルサブスクライバが既に設定されている場合はパニックする。
/// プロセス起動時に一度だけ呼ぶこと。
#[cfg(feature = "observability")]
pub fn init_tracing(service_name: &str, format: LogFormat) {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,seisan=debug".into());

    let fmt = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry().with(filter).with(fmt).init();

    tracing::info!(service = service_name, "トレーシングを初期化しました");
}

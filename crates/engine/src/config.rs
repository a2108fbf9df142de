//! # エンジン設定
//!
//! 環境変数からエンジンの設定を読み込む。閾値はすべて省略可能で、
//! 未設定の場合は規程のデフォルト値（説明 15% / エスカレーション 30% /
//! レベル上限 3）を使う。

use std::env;

use rust_decimal::Decimal;
use seisan_domain::policy::PolicyThresholds;
use thiserror::Error;

/// 設定読み込みエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 必須の環境変数が設定されていない
    #[error("環境変数 {0} が設定されていません")]
    Missing(&'static str),

    /// 環境変数の値が解釈できない
    #[error("環境変数 {name} の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
}

/// 承認エンジンの設定
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// データベース接続 URL
    pub database_url: String,
    /// 規程違反の閾値設定
    pub thresholds: PolicyThresholds,
}

impl EngineConfig {
    /// 環境変数から設定を読み込む
    ///
    /// `.env` ファイルがあれば先に読み込む（存在しなくてもエラーにしない）。
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の変数ソースから設定を構築する
    ///
    /// 環境変数に依存しないテストのために分離している。
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let defaults = PolicyThresholds::default();
        let thresholds = PolicyThresholds {
            special_approval_pct: parse_decimal(
                "POLICY_EXPLANATION_THRESHOLD_PCT",
                lookup("POLICY_EXPLANATION_THRESHOLD_PCT"),
                defaults.special_approval_pct,
            )?,
            escalation_pct: parse_decimal(
                "POLICY_ESCALATION_THRESHOLD_PCT",
                lookup("POLICY_ESCALATION_THRESHOLD_PCT"),
                defaults.escalation_pct,
            )?,
            escalation_level_cap: parse_u32(
                "ESCALATION_LEVEL_CAP",
                lookup("ESCALATION_LEVEL_CAP"),
                defaults.escalation_level_cap,
            )?,
        };

        Ok(Self {
            database_url,
            thresholds,
        })
    }
}

fn parse_decimal(
    name: &'static str,
    value: Option<String>,
    default: Decimal,
) -> Result<Decimal, ConfigError> {
    match value {
        Some(raw) => raw
            .parse::<Decimal>()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

fn parse_u32(
    name: &'static str,
    value: Option<String>,
    default: u32,
) -> Result<u32, ConfigError> {
    match value {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| map.get(name).map(|v| (*v).to_string())
    }

    #[test]
    fn test_database_urlは必須() {
        let result = EngineConfig::from_lookup(lookup_from(&[]));

        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_閾値未設定はデフォルト値() {
        let config = EngineConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://localhost/seisan",
        )]))
        .unwrap();

        assert_eq!(config.thresholds, PolicyThresholds::default());
    }

    #[test]
    fn test_閾値を環境変数で上書きできる() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/seisan"),
            ("POLICY_EXPLANATION_THRESHOLD_PCT", "10"),
            ("POLICY_ESCALATION_THRESHOLD_PCT", "25.5"),
            ("ESCALATION_LEVEL_CAP", "2"),
        ]))
        .unwrap();

        assert_eq!(config.thresholds.special_approval_pct, Decimal::from(10));
        assert_eq!(
            config.thresholds.escalation_pct,
            "25.5".parse::<Decimal>().unwrap()
        );
        assert_eq!(config.thresholds.escalation_level_cap, 2);
    }

    #[test]
    fn test_不正な閾値はエラー() {
        let result = EngineConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/seisan"),
            ("ESCALATION_LEVEL_CAP", "たくさん"),
        ]));

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "ESCALATION_LEVEL_CAP",
                ..
            })
        ));
    }
}

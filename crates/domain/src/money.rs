//! # 金額と費目
//!
//! 申請金額を表す値オブジェクトと費目カテゴリを定義する。
//!
//! ## 設計方針
//!
//! - **正確な10進演算**: 超過率（%）の計算で浮動小数点の誤差を許容しないため、
//!   `rust_decimal::Decimal` を使用する
//! - **非負の保証**: [`Amount`] は生成時に負数を拒否し、不正な金額の存在を
//!   型レベルで排除する
//! - **通貨換算は対象外**: 金額は組織の基準通貨で入力済みとみなす

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

// =========================================================================
// Amount（金額）
// =========================================================================

/// 金額（値オブジェクト）
///
/// # 不変条件
///
/// - 0 以上（負の金額は存在しない）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("{_0}")]
pub struct Amount(Decimal);

impl Amount {
    /// 金額を作成する
    ///
    /// # エラー
    ///
    /// 負数の場合は `DomainError::Validation` を返す。
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value.is_sign_negative() {
            return Err(DomainError::Validation(format!(
                "金額は 0 以上である必要があります: {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// ゼロ金額
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// 整数から金額を作成する（テスト・設定値用）
    pub fn from_i64(value: i64) -> Result<Self, DomainError> {
        Self::new(Decimal::from(value))
    }

    /// 内部の Decimal 値を取得する
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// 加算する
    pub fn add(&self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }

    /// 減算する（結果が負になる場合はエラー）
    pub fn subtract(&self, other: Amount) -> Result<Amount, DomainError> {
        Amount::new(self.0 - other.0)
    }

    /// 指定した単位数で割った1単位あたりの金額を返す
    ///
    /// 規程の単位（1泊あたり・1日あたり）への正規化に使用する。
    /// `units` が 0 の場合は 1 として扱う（出張日数未設定の経費精算など）。
    pub fn per_unit(&self, units: u32) -> Amount {
        let divisor = if units == 0 { 1 } else { units };
        Amount(self.0 / Decimal::from(divisor))
    }

    /// 他の金額に対する超過率（%）を返す
    ///
    /// `self` が超過分、`limit` が規程上限。`(self / limit) × 100` を
    /// 正確な10進演算で計算する。
    ///
    /// # エラー
    ///
    /// `limit` が 0 の場合は `DomainError::Validation` を返す。
    pub fn percentage_of(&self, limit: Amount) -> Result<Decimal, DomainError> {
        if limit.0.is_zero() {
            return Err(DomainError::Validation(
                "上限 0 に対する超過率は計算できません".to_string(),
            ));
        }
        Ok(self.0 / limit.0 * Decimal::from(100))
    }
}

// =========================================================================
// ExpenseCategory（費目カテゴリ）
// =========================================================================

/// 費目カテゴリ
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExpenseCategory {
    /// 航空券
    Flights,
    /// 宿泊
    Accommodation,
    /// 食費
    Food,
    /// 交通費
    Transportation,
    /// その他
    Misc,
}

impl std::str::FromStr for ExpenseCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flights" => Ok(Self::Flights),
            "accommodation" => Ok(Self::Accommodation),
            "food" => Ok(Self::Food),
            "transportation" => Ok(Self::Transportation),
            "misc" => Ok(Self::Misc),
            _ => Err(DomainError::Validation(format!("不正な費目: {}", s))),
        }
    }
}

// =========================================================================
// CategoryAmounts（費目別金額）
// =========================================================================

/// 費目別の申請金額
///
/// 申請・一部承認時の修正金額の両方で使用する。
/// 含まれない費目は「申請なし」を意味する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAmounts(BTreeMap<ExpenseCategory, Amount>);

impl CategoryAmounts {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// 費目の金額を設定した新しいインスタンスを返す
    pub fn with(mut self, category: ExpenseCategory, amount: Amount) -> Self {
        self.0.insert(category, amount);
        self
    }

    /// 費目の金額を取得する
    pub fn get(&self, category: ExpenseCategory) -> Option<Amount> {
        self.0.get(&category).copied()
    }

    /// 全費目を走査する
    pub fn iter(&self) -> impl Iterator<Item = (ExpenseCategory, Amount)> + '_ {
        self.0.iter().map(|(c, a)| (*c, *a))
    }

    /// 合計金額を返す
    pub fn total(&self) -> Amount {
        self.0.values().fold(Amount::zero(), |acc, a| acc.add(*a))
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 修正金額をマージした新しいインスタンスを返す
    ///
    /// 一部承認時、承認者が修正した費目は修正後の金額、
    /// 触れていない費目は申請時の金額を採用する。
    pub fn merged_with(&self, modified: &CategoryAmounts) -> CategoryAmounts {
        let mut merged = self.0.clone();
        for (category, amount) in modified.iter() {
            merged.insert(category, amount);
        }
        CategoryAmounts(merged)
    }
}

impl FromIterator<(ExpenseCategory, Amount)> for CategoryAmounts {
    fn from_iter<T: IntoIterator<Item = (ExpenseCategory, Amount)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

//! # 規程違反
//!
//! 申請額が上限を超えた事実を定量化した値オブジェクト。
//! 提出前は導出値として扱い、提出時に説明文とともに永続化される。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::{Amount, ExpenseCategory};

/// 規程違反
///
/// `requested` と `limit` は規程ルールの適用単位に正規化済みの金額。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    /// 違反したカテゴリ
    pub category: ExpenseCategory,
    /// 申請額（単位あたりに正規化済み）
    pub requested: Amount,
    /// 規程上限（単位あたり）
    pub limit: Amount,
    /// 超過額（`requested - limit`）
    pub overage: Amount,
    /// 超過率（%）
    pub overage_percentage: Decimal,
    /// 特別承認（追加の説明・審査）を要するか
    pub requires_special_approval: bool,
    /// 申請者による説明（提出時に必須となる）
    pub explanation: Option<String>,
}

impl PolicyViolation {
    /// 説明文が提出可能な内容（空白のみでない）か判定する
    pub fn has_explanation(&self) -> bool {
        self.explanation
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// 説明文を設定した新しいインスタンスを返す
    pub fn with_explanation(self, explanation: impl Into<String>) -> Self {
        Self {
            explanation: Some(explanation.into()),
            ..self
        }
    }
}

//! # 経費規程
//!
//! カテゴリ別の上限ルールと、申請額との突合結果（違反）を管理する。
//!
//! ## 概念モデル
//!
//! - **PolicyRule**: 組織スコープの上限ルール（カテゴリ × 渡航区分 × 等級）
//! - **PolicyViolation**: 申請額が上限を超えた場合の定量化された違反
//! - **PolicyComplianceEvaluator**: ルールと申請額から違反リストを導出する純粋関数

mod evaluator;
mod rule;
mod violation;

pub use evaluator::*;
pub use rule::*;
pub use violation::*;

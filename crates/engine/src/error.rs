//! # エンジンエラー定義
//!
//! ユースケース層で発生するエラーの分類。下位層のエラー
//! （`DomainError` / `InfraError` / `ChainResolutionError`）を
//! 呼び出し側が判別可能な粒度に写像する。

use itertools::Itertools;
use seisan_domain::{
    DomainError,
    chain::{ApproverKind, ChainResolutionError},
    employee::UserId,
    money::ExpenseCategory,
};
use seisan_infra::InfraError;
use thiserror::Error;

/// 承認エンジンで発生するエラー
#[derive(Debug, Error)]
pub enum EngineError {
    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 不正な入力
    ///
    /// 負の金額などの値検証はドメイン層（`DomainError::Validation`）で行われ、
    /// ここに写像される。専用の金額エラー型は持たない。
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 権限不足
    #[error("権限がありません: {0}")]
    Forbidden(String),

    /// 競合（楽観的ロック失敗）
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// 承認レコードは既に決裁済み（並行決裁の正常な敗北側）
    #[error("この承認レコードは既に決裁済みです")]
    AlreadyDecided,

    /// 適用可能な承認チェーンがない（割り当てもデフォルトも不在）
    #[error("適用可能な承認チェーンがありません")]
    NoApplicableChain,

    /// 申請者に上長が設定されていない
    #[error("申請者 {user_id} に上長が設定されていません")]
    NoManagerAssigned { user_id: UserId },

    /// チェーンが参照するユーザーが組織に在籍していない
    #[error("承認者 {user_id} は組織に在籍していません")]
    ReferencedUserMissing { user_id: UserId },

    /// 役職に該当者がいない
    #[error("役職 {role} に該当するユーザーがいません")]
    RoleUnoccupied { role: ApproverKind },

    /// 規程違反に従業員説明が不足している（全件を列挙）
    #[error(
        "規程違反に説明がありません: {}",
        .0.iter().map(ToString::to_string).join(", ")
    )]
    MissingViolationExplanation(Vec<ExpenseCategory>),

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(#[from] InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl From<DomainError> for EngineError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(msg) => Self::BadRequest(msg),
            DomainError::NotFound { entity_type, id } => {
                Self::NotFound(format!("{entity_type} ({id})"))
            }
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
        }
    }
}

impl From<ChainResolutionError> for EngineError {
    fn from(e: ChainResolutionError) -> Self {
        match e {
            ChainResolutionError::NoManagerAssigned { user_id } => {
                Self::NoManagerAssigned { user_id }
            }
            ChainResolutionError::ReferencedUserMissing { user_id } => {
                Self::ReferencedUserMissing { user_id }
            }
            ChainResolutionError::RoleUnoccupied { role } => Self::RoleUnoccupied { role },
        }
    }
}

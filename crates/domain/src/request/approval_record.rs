//! # 承認レコード
//!
//! (申請, レベル, 承認者) ごとに 1 件作成される決裁の記録。
//! 同一レベルに未決のレコードは常に 1 件以下で、終端状態からの再決裁は
//! 競合エラーとして拒否される。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    chain::ApproverKind,
    employee::UserId,
    money::CategoryAmounts,
    request::ExpenseRequestId,
};

define_uuid_id! {
    /// 承認レコード ID
    pub struct ApprovalRecordId;
}

/// 承認レコードステータス
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    /// 未決
    Pending,
    /// 承認
    Approved,
    /// 却下
    Rejected,
}

impl std::str::FromStr for ApprovalStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(DomainError::Validation(format!(
                "不正な承認レコードステータス: {}",
                s
            ))),
        }
    }
}

/// 承認レコードエンティティ
///
/// `escalated` は規程違反によって静的なチェーンの外に挿入されたレベルを示す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRecord {
    id: ApprovalRecordId,
    request_id: ExpenseRequestId,
    level_order: u32,
    approver: UserId,
    approver_kind: ApproverKind,
    status: ApprovalStatus,
    comment: Option<String>,
    modified_amounts: Option<CategoryAmounts>,
    escalated: bool,
    message: Option<String>,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

/// 承認レコードの新規作成パラメータ
pub struct NewApprovalRecord {
    pub id: ApprovalRecordId,
    pub request_id: ExpenseRequestId,
    pub level_order: u32,
    pub approver: UserId,
    pub approver_kind: ApproverKind,
    pub escalated: bool,
    pub message: Option<String>,
    pub now: DateTime<Utc>,
}

/// 承認レコードの DB 復元パラメータ
pub struct ApprovalRecordRecord {
    pub id: ApprovalRecordId,
    pub request_id: ExpenseRequestId,
    pub level_order: u32,
    pub approver: UserId,
    pub approver_kind: ApproverKind,
    pub status: ApprovalStatus,
    pub comment: Option<String>,
    pub modified_amounts: Option<CategoryAmounts>,
    pub escalated: bool,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    /// 未決の承認レコードを作成する
    pub fn new(params: NewApprovalRecord) -> Self {
        Self {
            id: params.id,
            request_id: params.request_id,
            level_order: params.level_order,
            approver: params.approver,
            approver_kind: params.approver_kind,
            status: ApprovalStatus::Pending,
            comment: None,
            modified_amounts: None,
            escalated: params.escalated,
            message: params.message,
            created_at: params.now,
            decided_at: None,
        }
    }

    /// 既存のデータから復元する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: ステータスと `decided_at` の有無が矛盾する場合
    pub fn from_db(record: ApprovalRecordRecord) -> Result<Self, DomainError> {
        match (record.status, record.decided_at) {
            (ApprovalStatus::Pending, Some(_)) => {
                return Err(DomainError::Validation(
                    "未決の承認レコードに decided_at は設定できません".to_string(),
                ));
            }
            (ApprovalStatus::Approved | ApprovalStatus::Rejected, None) => {
                return Err(DomainError::Validation(
                    "決裁済みの承認レコードには decided_at が必要です".to_string(),
                ));
            }
            _ => {}
        }
        Ok(Self {
            id: record.id,
            request_id: record.request_id,
            level_order: record.level_order,
            approver: record.approver,
            approver_kind: record.approver_kind,
            status: record.status,
            comment: record.comment,
            modified_amounts: record.modified_amounts,
            escalated: record.escalated,
            message: record.message,
            created_at: record.created_at,
            decided_at: record.decided_at,
        })
    }

    pub fn id(&self) -> &ApprovalRecordId {
        &self.id
    }

    pub fn request_id(&self) -> &ExpenseRequestId {
        &self.request_id
    }

    pub fn level_order(&self) -> u32 {
        self.level_order
    }

    pub fn approver(&self) -> &UserId {
        &self.approver
    }

    pub fn approver_kind(&self) -> ApproverKind {
        self.approver_kind
    }

    pub fn status(&self) -> ApprovalStatus {
        self.status
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn modified_amounts(&self) -> Option<&CategoryAmounts> {
        self.modified_amounts.as_ref()
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// 承認した新しいインスタンスを返す
    ///
    /// `modified_amounts` を指定した場合は減額承認として扱われる。
    ///
    /// # Errors
    ///
    /// - `DomainError::Conflict`: 既に決裁済みの場合
    pub fn approved(
        self,
        comment: Option<String>,
        modified_amounts: Option<CategoryAmounts>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if self.status != ApprovalStatus::Pending {
            return Err(DomainError::Conflict(
                "この承認レコードは既に決裁済みです".to_string(),
            ));
        }
        Ok(Self {
            status: ApprovalStatus::Approved,
            comment,
            modified_amounts,
            decided_at: Some(now),
            ..self
        })
    }

    /// 却下した新しいインスタンスを返す
    ///
    /// # Errors
    ///
    /// - `DomainError::Conflict`: 既に決裁済みの場合
    pub fn rejected(self, comment: Option<String>, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if self.status != ApprovalStatus::Pending {
            return Err(DomainError::Conflict(
                "この承認レコードは既に決裁済みです".to_string(),
            ));
        }
        Ok(Self {
            status: ApprovalStatus::Rejected,
            comment,
            modified_amounts: None,
            decided_at: Some(now),
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn pending(now: DateTime<Utc>) -> ApprovalRecord {
        ApprovalRecord::new(NewApprovalRecord {
            id: ApprovalRecordId::new(),
            request_id: ExpenseRequestId::new(),
            level_order: 1,
            approver: UserId::new(),
            approver_kind: ApproverKind::DirectManager,
            escalated: false,
            message: None,
            now,
        })
    }

    #[rstest]
    fn test_新規レコードは未決(now: DateTime<Utc>) {
        let record = pending(now);

        assert!(record.is_pending());
        assert_eq!(record.decided_at(), None);
    }

    #[rstest]
    fn test_承認で決裁日時とコメントが設定される(now: DateTime<Utc>) {
        let record = pending(now)
            .approved(Some("問題ありません".to_string()), None, now)
            .unwrap();

        assert_eq!(record.status(), ApprovalStatus::Approved);
        assert_eq!(record.comment(), Some("問題ありません"));
        assert_eq!(record.decided_at(), Some(now));
    }

    #[rstest]
    fn test_決裁済みレコードの再決裁は競合エラー(now: DateTime<Utc>) {
        let record = pending(now).approved(None, None, now).unwrap();

        let result = record.rejected(None, now);

        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[rstest]
    fn test_却下時は修正金額を持たない(now: DateTime<Utc>) {
        let record = pending(now)
            .rejected(Some("費目の根拠不足".to_string()), now)
            .unwrap();

        assert_eq!(record.status(), ApprovalStatus::Rejected);
        assert!(record.modified_amounts().is_none());
    }

    #[rstest]
    fn test_from_dbで未決にdecided_atがあるとエラー(now: DateTime<Utc>) {
        let result = ApprovalRecord::from_db(ApprovalRecordRecord {
            id: ApprovalRecordId::new(),
            request_id: ExpenseRequestId::new(),
            level_order: 1,
            approver: UserId::new(),
            approver_kind: ApproverKind::DirectManager,
            status: ApprovalStatus::Pending,
            comment: None,
            modified_amounts: None,
            escalated: false,
            message: None,
            created_at: now,
            decided_at: Some(now),
        });

        assert!(result.is_err());
    }

    #[rstest]
    fn test_from_dbで決裁済みにdecided_atがないとエラー(now: DateTime<Utc>) {
        let result = ApprovalRecord::from_db(ApprovalRecordRecord {
            id: ApprovalRecordId::new(),
            request_id: ExpenseRequestId::new(),
            level_order: 1,
            approver: UserId::new(),
            approver_kind: ApproverKind::DirectManager,
            status: ApprovalStatus::Approved,
            comment: None,
            modified_amounts: None,
            escalated: false,
            message: None,
            created_at: now,
            decided_at: None,
        });

        assert!(result.is_err());
    }
}

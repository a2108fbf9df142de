//! # 申請エンティティ
//!
//! 経費精算・出張申請のライフサイクルを管理する。
//! 状態遷移は ADT（代数的データ型）で表現し、不正な状態を型レベルで防止する。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    chain::ApprovalChainId,
    employee::UserId,
    money::{Amount, CategoryAmounts, ExpenseCategory},
    organization::OrganizationId,
    policy::{PolicyViolation, TripMeta},
    value_objects::Version,
};

define_uuid_id! {
    /// 申請 ID
    pub struct ExpenseRequestId;
}

/// 申請の種別
///
/// 却下後の再申請可否が種別で異なる（経費精算のみ再オープン可）。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    /// 経費精算
    ExpenseReport,
    /// 出張申請
    TravelRequest,
}

impl std::str::FromStr for RequestKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expense_report" => Ok(Self::ExpenseReport),
            "travel_request" => Ok(Self::TravelRequest),
            _ => Err(DomainError::Validation(format!("不正な申請種別: {}", s))),
        }
    }
}

/// 申請ステータス
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    /// 下書き
    Draft,
    /// 編集可能（却下後の再オープンを含む）
    Open,
    /// 承認待ち
    PendingApproval,
    /// 承認完了
    Approved,
    /// 減額承認
    PartiallyApproved,
    /// 却下
    Rejected,
    /// クローズ
    Closed,
}

impl std::str::FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "open" => Ok(Self::Open),
            "pending_approval" => Ok(Self::PendingApproval),
            "approved" => Ok(Self::Approved),
            "partially_approved" => Ok(Self::PartiallyApproved),
            "rejected" => Ok(Self::Rejected),
            "closed" => Ok(Self::Closed),
            _ => Err(DomainError::Validation(format!(
                "不正な申請ステータス: {}",
                s
            ))),
        }
    }
}

/// 申請の状態（ADT ベースステートマシン）
///
/// 各状態で有効なフィールドのみを持たせることで、不正な状態を型レベルで防止する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    /// 下書き
    Draft,
    /// 編集可能
    Open,
    /// 承認待ち
    PendingApproval(PendingApprovalState),
    /// 承認完了
    Approved(DecidedState),
    /// 減額承認
    PartiallyApproved(DecidedState),
    /// 却下
    Rejected(RejectedState),
    /// クローズ
    Closed(ClosedState),
}

/// PendingApproval 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApprovalState {
    /// 適用された承認チェーン
    pub chain_id:      ApprovalChainId,
    /// 現在の承認レベル（1 始まり）
    pub current_level: u32,
    /// 提出日時
    pub submitted_at:  DateTime<Utc>,
}

/// Approved/PartiallyApproved 共通の確定状態フィールド
///
/// 承認済み予算は確定時の金額から再計算され、元の申請額からは計算しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecidedState {
    pub chain_id: ApprovalChainId,
    pub submitted_at: DateTime<Utc>,
    /// 確定したカテゴリ別予算（減額承認時は修正後の金額）
    pub approved_amounts: CategoryAmounts,
    /// 確定した合計額
    pub approved_total: Amount,
    /// 最終確定日時
    pub final_decision_at: DateTime<Utc>,
}

/// Rejected 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedState {
    pub chain_id:     ApprovalChainId,
    pub submitted_at: DateTime<Utc>,
    pub rejected_at:  DateTime<Utc>,
}

/// Closed 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedState {
    pub closed_at: DateTime<Utc>,
}

/// 申請エンティティ
///
/// 共通フィールドを外側に、状態固有フィールドを `state` enum に分離する。
///
/// ## 楽観的ロック
///
/// `version` フィールドにより並行更新時の競合を検出する。
/// 更新操作時はリクエストの version と DB の version を比較し、
/// 一致しない場合は競合エラーを返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseRequest {
    id: ExpenseRequestId,
    organization_id: OrganizationId,
    requester: UserId,
    kind: RequestKind,
    title: String,
    amounts: CategoryAmounts,
    trip: Option<TripMeta>,
    violations: Vec<PolicyViolation>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: RequestState,
}

/// 申請の新規作成パラメータ
pub struct NewExpenseRequest {
    pub id: ExpenseRequestId,
    pub organization_id: OrganizationId,
    pub requester: UserId,
    pub kind: RequestKind,
    pub title: String,
    pub amounts: CategoryAmounts,
    pub trip: Option<TripMeta>,
    pub now: DateTime<Utc>,
}

/// 申請の DB 復元パラメータ
///
/// DB スキーマのフラット構造を表現する。`from_db()` で不変条件を検証して ADT に変換する。
pub struct ExpenseRequestRecord {
    pub id: ExpenseRequestId,
    pub organization_id: OrganizationId,
    pub requester: UserId,
    pub kind: RequestKind,
    pub title: String,
    pub amounts: CategoryAmounts,
    pub trip: Option<TripMeta>,
    pub violations: Vec<PolicyViolation>,
    pub status: RequestStatus,
    pub version: Version,
    pub chain_id: Option<ApprovalChainId>,
    pub current_level: Option<u32>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_amounts: Option<CategoryAmounts>,
    pub approved_total: Option<Amount>,
    pub final_decision_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExpenseRequest {
    /// 新しい申請を下書きとして作成する
    pub fn new(params: NewExpenseRequest) -> Self {
        Self {
            id: params.id,
            organization_id: params.organization_id,
            requester: params.requester,
            kind: params.kind,
            title: params.title,
            amounts: params.amounts,
            trip: params.trip,
            violations: Vec::new(),
            version: Version::initial(),
            created_at: params.now,
            updated_at: params.now,
            state: RequestState::Draft,
        }
    }

    /// 既存のデータから復元する
    ///
    /// DB のフラット構造から ADT に変換し、不変条件を検証する。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 不変条件違反（例: PendingApproval で chain_id が None）
    pub fn from_db(record: ExpenseRequestRecord) -> Result<Self, DomainError> {
        let state = match record.status {
            RequestStatus::Draft => RequestState::Draft,
            RequestStatus::Open => RequestState::Open,
            RequestStatus::PendingApproval => {
                let chain_id = record.chain_id.ok_or_else(|| {
                    DomainError::Validation(
                        "承認待ちの申請には chain_id が必要です".to_string(),
                    )
                })?;
                let current_level = record.current_level.ok_or_else(|| {
                    DomainError::Validation(
                        "承認待ちの申請には current_level が必要です".to_string(),
                    )
                })?;
                let submitted_at = record.submitted_at.ok_or_else(|| {
                    DomainError::Validation(
                        "承認待ちの申請には submitted_at が必要です".to_string(),
                    )
                })?;
                RequestState::PendingApproval(PendingApprovalState {
                    chain_id,
                    current_level,
                    submitted_at,
                })
            }
            RequestStatus::Approved | RequestStatus::PartiallyApproved => {
                let chain_id = record.chain_id.ok_or_else(|| {
                    DomainError::Validation(
                        "承認済みの申請には chain_id が必要です".to_string(),
                    )
                })?;
                let submitted_at = record.submitted_at.ok_or_else(|| {
                    DomainError::Validation(
                        "承認済みの申請には submitted_at が必要です".to_string(),
                    )
                })?;
                let approved_amounts = record.approved_amounts.ok_or_else(|| {
                    DomainError::Validation(
                        "承認済みの申請には approved_amounts が必要です".to_string(),
                    )
                })?;
                let approved_total = record.approved_total.ok_or_else(|| {
                    DomainError::Validation(
                        "承認済みの申請には approved_total が必要です".to_string(),
                    )
                })?;
                let final_decision_at = record.final_decision_at.ok_or_else(|| {
                    DomainError::Validation(
                        "承認済みの申請には final_decision_at が必要です".to_string(),
                    )
                })?;
                let decided = DecidedState {
                    chain_id,
                    submitted_at,
                    approved_amounts,
                    approved_total,
                    final_decision_at,
                };
                match record.status {
                    RequestStatus::Approved => RequestState::Approved(decided),
                    _ => RequestState::PartiallyApproved(decided),
                }
            }
            RequestStatus::Rejected => {
                let chain_id = record.chain_id.ok_or_else(|| {
                    DomainError::Validation(
                        "却下済みの申請には chain_id が必要です".to_string(),
                    )
                })?;
                let submitted_at = record.submitted_at.ok_or_else(|| {
                    DomainError::Validation(
                        "却下済みの申請には submitted_at が必要です".to_string(),
                    )
                })?;
                let rejected_at = record.final_decision_at.ok_or_else(|| {
                    DomainError::Validation(
                        "却下済みの申請には final_decision_at が必要です".to_string(),
                    )
                })?;
                RequestState::Rejected(RejectedState {
                    chain_id,
                    submitted_at,
                    rejected_at,
                })
            }
            RequestStatus::Closed => {
                let closed_at = record.final_decision_at.ok_or_else(|| {
                    DomainError::Validation(
                        "クローズ済みの申請には final_decision_at が必要です".to_string(),
                    )
                })?;
                RequestState::Closed(ClosedState { closed_at })
            }
        };

        Ok(Self {
            id: record.id,
            organization_id: record.organization_id,
            requester: record.requester,
            kind: record.kind,
            title: record.title,
            amounts: record.amounts,
            trip: record.trip,
            violations: record.violations,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            state,
        })
    }

    // Getter メソッド

    pub fn id(&self) -> &ExpenseRequestId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn requester(&self) -> &UserId {
        &self.requester
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn amounts(&self) -> &CategoryAmounts {
        &self.amounts
    }

    pub fn trip(&self) -> Option<&TripMeta> {
        self.trip.as_ref()
    }

    pub fn violations(&self) -> &[PolicyViolation] {
        &self.violations
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> RequestStatus {
        match &self.state {
            RequestState::Draft => RequestStatus::Draft,
            RequestState::Open => RequestStatus::Open,
            RequestState::PendingApproval(_) => RequestStatus::PendingApproval,
            RequestState::Approved(_) => RequestStatus::Approved,
            RequestState::PartiallyApproved(_) => RequestStatus::PartiallyApproved,
            RequestState::Rejected(_) => RequestStatus::Rejected,
            RequestState::Closed(_) => RequestStatus::Closed,
        }
    }

    /// 状態への直接アクセス（パターンマッチ用）
    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn chain_id(&self) -> Option<&ApprovalChainId> {
        match &self.state {
            RequestState::PendingApproval(s) => Some(&s.chain_id),
            RequestState::Approved(s) | RequestState::PartiallyApproved(s) => Some(&s.chain_id),
            RequestState::Rejected(s) => Some(&s.chain_id),
            RequestState::Draft | RequestState::Open | RequestState::Closed(_) => None,
        }
    }

    pub fn current_level(&self) -> Option<u32> {
        match &self.state {
            RequestState::PendingApproval(s) => Some(s.current_level),
            _ => None,
        }
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            RequestState::PendingApproval(s) => Some(s.submitted_at),
            RequestState::Approved(s) | RequestState::PartiallyApproved(s) => Some(s.submitted_at),
            RequestState::Rejected(s) => Some(s.submitted_at),
            RequestState::Draft | RequestState::Open | RequestState::Closed(_) => None,
        }
    }

    pub fn approved_amounts(&self) -> Option<&CategoryAmounts> {
        match &self.state {
            RequestState::Approved(s) | RequestState::PartiallyApproved(s) => {
                Some(&s.approved_amounts)
            }
            _ => None,
        }
    }

    pub fn approved_total(&self) -> Option<Amount> {
        match &self.state {
            RequestState::Approved(s) | RequestState::PartiallyApproved(s) => {
                Some(s.approved_total)
            }
            _ => None,
        }
    }

    pub fn final_decision_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            RequestState::Approved(s) | RequestState::PartiallyApproved(s) => {
                Some(s.final_decision_at)
            }
            RequestState::Rejected(s) => Some(s.rejected_at),
            RequestState::Closed(s) => Some(s.closed_at),
            _ => None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 申請額の合計
    pub fn total(&self) -> Amount {
        self.amounts.total()
    }

    // ビジネスロジックメソッド

    /// 申請が編集可能かチェックする
    pub fn can_edit(&self) -> Result<(), DomainError> {
        match &self.state {
            RequestState::Draft | RequestState::Open => Ok(()),
            _ => Err(DomainError::Validation(
                "下書きまたは編集可能状態でのみ編集できます".to_string(),
            )),
        }
    }

    /// 金額・出張情報を更新した新しいインスタンスを返す
    ///
    /// 金額が変わると過去の違反評価は無効になるため、違反リストはクリアされる。
    pub fn edited(
        self,
        amounts: CategoryAmounts,
        trip: Option<TripMeta>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        self.can_edit()?;
        Ok(Self {
            amounts,
            trip,
            violations: Vec::new(),
            updated_at: now,
            ..self
        })
    }

    /// 規程評価の結果を反映した新しいインスタンスを返す
    pub fn with_violations(
        self,
        violations: Vec<PolicyViolation>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        self.can_edit()?;
        Ok(Self {
            violations,
            updated_at: now,
            ..self
        })
    }

    /// 違反に申請者の説明を設定した新しいインスタンスを返す
    ///
    /// # Errors
    ///
    /// - `DomainError::NotFound`: 指定カテゴリの違反が存在しない場合
    pub fn explained(
        self,
        category: ExpenseCategory,
        explanation: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        self.can_edit()?;
        let explanation = explanation.into();
        let mut violations = self.violations;
        let target = violations
            .iter_mut()
            .find(|v| v.category == category)
            .ok_or(DomainError::NotFound {
                entity_type: "規程違反",
                id: category.to_string(),
            })?;
        target.explanation = Some(explanation);
        Ok(Self {
            violations,
            updated_at: now,
            ..self
        })
    }

    /// 説明が未入力の違反カテゴリを返す
    pub fn missing_explanations(&self) -> Vec<ExpenseCategory> {
        self.violations
            .iter()
            .filter(|v| !v.has_explanation())
            .map(|v| v.category)
            .collect()
    }

    /// 申請を提出した新しいインスタンスを返す
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 下書き・編集可能以外の状態、金額が空、
    ///   または説明未入力の違反が残っている場合
    pub fn submitted(
        self,
        chain_id: ApprovalChainId,
        first_level: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        match self.state {
            RequestState::Draft | RequestState::Open => {
                if self.amounts.is_empty() {
                    return Err(DomainError::Validation(
                        "金額が入力されていない申請は提出できません".to_string(),
                    ));
                }
                if !self.missing_explanations().is_empty() {
                    return Err(DomainError::Validation(
                        "説明未入力の規程違反があるため提出できません".to_string(),
                    ));
                }
                Ok(Self {
                    state: RequestState::PendingApproval(PendingApprovalState {
                        chain_id,
                        current_level: first_level,
                        submitted_at: now,
                    }),
                    version: self.version.next(),
                    updated_at: now,
                    ..self
                })
            }
            _ => Err(DomainError::Validation(format!(
                "提出は下書きまたは編集可能状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 次の承認レベルに進んだ新しいインスタンスを返す
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 承認待ち以外の状態で呼び出した場合
    pub fn advanced_to_level(self, next_level: u32, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            RequestState::PendingApproval(pending) => Ok(Self {
                state: RequestState::PendingApproval(PendingApprovalState {
                    current_level: next_level,
                    ..pending
                }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "レベル進行は承認待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 最終レベルの承認による完了処理
    ///
    /// 申請額がそのまま確定予算となる。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 承認待ち以外の状態で呼び出した場合
    pub fn approved(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            RequestState::PendingApproval(pending) => {
                let approved_amounts = self.amounts.clone();
                let approved_total = approved_amounts.total();
                Ok(Self {
                    state: RequestState::Approved(DecidedState {
                        chain_id: pending.chain_id,
                        submitted_at: pending.submitted_at,
                        approved_amounts,
                        approved_total,
                        final_decision_at: now,
                    }),
                    version: self.version.next(),
                    updated_at: now,
                    ..self
                })
            }
            _ => Err(DomainError::Validation(format!(
                "承認完了は承認待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 金額修正を伴う最終承認（減額承認）
    ///
    /// 確定予算は修正後の金額を申請額にマージして再計算する。
    /// 元の申請合計からは決して計算しない。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 承認待ち以外の状態で呼び出した場合
    pub fn partially_approved(
        self,
        modified: &CategoryAmounts,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        match self.state {
            RequestState::PendingApproval(pending) => {
                let approved_amounts = self.amounts.merged_with(modified);
                let approved_total = approved_amounts.total();
                Ok(Self {
                    state: RequestState::PartiallyApproved(DecidedState {
                        chain_id: pending.chain_id,
                        submitted_at: pending.submitted_at,
                        approved_amounts,
                        approved_total,
                        final_decision_at: now,
                    }),
                    version: self.version.next(),
                    updated_at: now,
                    ..self
                })
            }
            _ => Err(DomainError::Validation(format!(
                "減額承認は承認待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 却下による完了処理
    ///
    /// いずれのレベルの却下でも以降のレベルは参照されない。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 承認待ち以外の状態で呼び出した場合
    pub fn rejected(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            RequestState::PendingApproval(pending) => Ok(Self {
                state: RequestState::Rejected(RejectedState {
                    chain_id: pending.chain_id,
                    submitted_at: pending.submitted_at,
                    rejected_at: now,
                }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "却下は承認待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 却下済みの申請を再オープンした新しいインスタンスを返す
    ///
    /// 経費精算のみ再提出のために編集可能状態へ戻せる。出張申請の却下は終端。
    ///
    /// # Errors
    ///
    /// - `DomainError::Forbidden`: 出張申請を再オープンしようとした場合
    /// - `DomainError::Validation`: 却下以外の状態で呼び出した場合
    pub fn reopened(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            RequestState::Rejected(_) => {
                if self.kind != RequestKind::ExpenseReport {
                    return Err(DomainError::Forbidden(
                        "出張申請は却下後に再オープンできません".to_string(),
                    ));
                }
                Ok(Self {
                    state: RequestState::Open,
                    version: self.version.next(),
                    updated_at: now,
                    ..self
                })
            }
            _ => Err(DomainError::Validation(format!(
                "再オープンは却下状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 申請をクローズした新しいインスタンスを返す
    ///
    /// 承認を経ずに取り下げる場合に使う。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 下書き・編集可能以外の状態で呼び出した場合
    pub fn closed(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            RequestState::Draft | RequestState::Open => Ok(Self {
                state: RequestState::Closed(ClosedState { closed_at: now }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "クローズは下書きまたは編集可能状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use rust_decimal::Decimal;

    use super::*;

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn amount(n: i64) -> Amount {
        Amount::new(Decimal::from(n)).unwrap()
    }

    fn draft(kind: RequestKind, now: DateTime<Utc>) -> ExpenseRequest {
        ExpenseRequest::new(NewExpenseRequest {
            id: ExpenseRequestId::new(),
            organization_id: OrganizationId::new(),
            requester: UserId::new(),
            kind,
            title: "大阪出張".to_string(),
            amounts: CategoryAmounts::new()
                .with(ExpenseCategory::Flights, amount(800))
                .with(ExpenseCategory::Accommodation, amount(600)),
            trip: None,
            now,
        })
    }

    fn violation(category: ExpenseCategory) -> PolicyViolation {
        PolicyViolation {
            category,
            requested: amount(250),
            limit: amount(200),
            overage: amount(50),
            overage_percentage: Decimal::from(25),
            requires_special_approval: true,
            explanation: None,
        }
    }

    #[rstest]
    fn test_下書きから提出で承認待ちになる(now: DateTime<Utc>) {
        let chain_id = ApprovalChainId::new();
        let request = draft(RequestKind::ExpenseReport, now)
            .submitted(chain_id.clone(), 1, now)
            .unwrap();

        assert_eq!(request.status(), RequestStatus::PendingApproval);
        assert_eq!(request.current_level(), Some(1));
        assert_eq!(request.chain_id(), Some(&chain_id));
        assert_eq!(request.version(), Version::initial().next());
    }

    #[rstest]
    fn test_金額なしの提出はエラー(now: DateTime<Utc>) {
        let request = ExpenseRequest::new(NewExpenseRequest {
            id: ExpenseRequestId::new(),
            organization_id: OrganizationId::new(),
            requester: UserId::new(),
            kind: RequestKind::ExpenseReport,
            title: "空の申請".to_string(),
            amounts: CategoryAmounts::new(),
            trip: None,
            now,
        });

        let result = request.submitted(ApprovalChainId::new(), 1, now);

        assert!(result.is_err());
    }

    #[rstest]
    fn test_説明未入力の違反があると提出できない(now: DateTime<Utc>) {
        let request = draft(RequestKind::ExpenseReport, now)
            .with_violations(vec![violation(ExpenseCategory::Accommodation)], now)
            .unwrap();

        assert_eq!(
            request.missing_explanations(),
            vec![ExpenseCategory::Accommodation]
        );
        assert!(request.submitted(ApprovalChainId::new(), 1, now).is_err());
    }

    #[rstest]
    fn test_説明を入力すれば提出できる(now: DateTime<Utc>) {
        let request = draft(RequestKind::ExpenseReport, now)
            .with_violations(vec![violation(ExpenseCategory::Accommodation)], now)
            .unwrap()
            .explained(ExpenseCategory::Accommodation, "繁忙期で割高なため", now)
            .unwrap();

        assert!(request.missing_explanations().is_empty());
        assert!(request.submitted(ApprovalChainId::new(), 1, now).is_ok());
    }

    #[rstest]
    fn test_存在しない違反への説明はエラー(now: DateTime<Utc>) {
        let result =
            draft(RequestKind::ExpenseReport, now).explained(ExpenseCategory::Misc, "説明", now);

        assert!(result.is_err());
    }

    #[rstest]
    fn test_レベル進行で現在レベルが更新される(now: DateTime<Utc>) {
        let request = draft(RequestKind::ExpenseReport, now)
            .submitted(ApprovalChainId::new(), 1, now)
            .unwrap()
            .advanced_to_level(2, now)
            .unwrap();

        assert_eq!(request.current_level(), Some(2));
        assert_eq!(request.status(), RequestStatus::PendingApproval);
    }

    #[rstest]
    fn test_承認完了で申請額がそのまま確定する(now: DateTime<Utc>) {
        let request = draft(RequestKind::ExpenseReport, now)
            .submitted(ApprovalChainId::new(), 1, now)
            .unwrap()
            .approved(now)
            .unwrap();

        assert_eq!(request.status(), RequestStatus::Approved);
        assert_eq!(request.approved_total(), Some(amount(1400)));
        assert_eq!(request.final_decision_at(), Some(now));
    }

    #[rstest]
    fn test_減額承認は修正後の金額から合計を再計算する(now: DateTime<Utc>) {
        let modified =
            CategoryAmounts::new().with(ExpenseCategory::Accommodation, amount(400));
        let request = draft(RequestKind::ExpenseReport, now)
            .submitted(ApprovalChainId::new(), 1, now)
            .unwrap()
            .partially_approved(&modified, now)
            .unwrap();

        assert_eq!(request.status(), RequestStatus::PartiallyApproved);
        // 航空券 800 はそのまま、宿泊 600 → 400 に減額
        assert_eq!(request.approved_total(), Some(amount(1200)));
        assert_eq!(
            request
                .approved_amounts()
                .and_then(|a| a.get(ExpenseCategory::Accommodation)),
            Some(amount(400))
        );
    }

    #[rstest]
    fn test_却下後の経費精算は再オープンできる(now: DateTime<Utc>) {
        let request = draft(RequestKind::ExpenseReport, now)
            .submitted(ApprovalChainId::new(), 1, now)
            .unwrap()
            .rejected(now)
            .unwrap()
            .reopened(now)
            .unwrap();

        assert_eq!(request.status(), RequestStatus::Open);
        assert!(request.can_edit().is_ok());
    }

    #[rstest]
    fn test_却下後の出張申請は再オープンできない(now: DateTime<Utc>) {
        let request = draft(RequestKind::TravelRequest, now)
            .submitted(ApprovalChainId::new(), 1, now)
            .unwrap()
            .rejected(now)
            .unwrap();

        let result = request.reopened(now);

        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }

    #[rstest]
    fn test_承認待ちの申請は編集できない(now: DateTime<Utc>) {
        let request = draft(RequestKind::ExpenseReport, now)
            .submitted(ApprovalChainId::new(), 1, now)
            .unwrap();

        assert!(request.can_edit().is_err());
    }

    #[rstest]
    fn test_承認済みの申請は再度承認できない(now: DateTime<Utc>) {
        let request = draft(RequestKind::ExpenseReport, now)
            .submitted(ApprovalChainId::new(), 1, now)
            .unwrap()
            .approved(now)
            .unwrap();

        assert!(request.approved(now).is_err());
    }

    #[rstest]
    fn test_from_dbで承認待ちにchain_idがないとエラー(now: DateTime<Utc>) {
        let result = ExpenseRequest::from_db(ExpenseRequestRecord {
            id: ExpenseRequestId::new(),
            organization_id: OrganizationId::new(),
            requester: UserId::new(),
            kind: RequestKind::ExpenseReport,
            title: "不整合データ".to_string(),
            amounts: CategoryAmounts::new(),
            trip: None,
            violations: vec![],
            status: RequestStatus::PendingApproval,
            version: Version::initial(),
            chain_id: None,
            current_level: Some(1),
            submitted_at: Some(now),
            approved_amounts: None,
            approved_total: None,
            final_decision_at: None,
            created_at: now,
            updated_at: now,
        });

        assert!(result.is_err());
    }

    #[rstest]
    fn test_from_dbの往復で状態が保たれる(now: DateTime<Utc>) {
        let restored = ExpenseRequest::from_db(ExpenseRequestRecord {
            id: ExpenseRequestId::new(),
            organization_id: OrganizationId::new(),
            requester: UserId::new(),
            kind: RequestKind::TravelRequest,
            title: "海外出張".to_string(),
            amounts: CategoryAmounts::new().with(ExpenseCategory::Flights, amount(3000)),
            trip: None,
            violations: vec![],
            status: RequestStatus::PendingApproval,
            version: Version::initial().next(),
            chain_id: Some(ApprovalChainId::new()),
            current_level: Some(2),
            submitted_at: Some(now),
            approved_amounts: None,
            approved_total: None,
            final_decision_at: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

        assert_eq!(restored.status(), RequestStatus::PendingApproval);
        assert_eq!(restored.current_level(), Some(2));
    }
}

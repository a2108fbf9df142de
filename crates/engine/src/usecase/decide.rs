//! 承認レベルの決裁
//!
//! 条件付き UPDATE による決裁確定と、次レベルへの前進・エスカレーション
//! 挿入・終端遷移を単一トランザクションで行う。

use chrono::{DateTime, Utc};
use seisan_domain::{
    chain::{ApprovalChain, ApproverKind, ResolvedLevel},
    employee::UserId,
    money::CategoryAmounts,
    request::{
        ApprovalRecord,
        ApprovalRecordId,
        ApprovalStatus,
        ExpenseRequest,
        NewApprovalRecord,
        RequestStatus,
    },
};
use seisan_infra::notification::ApprovalEvent;
use seisan_shared::{event_log::event, log_business_event};

use crate::{
    context::EngineContext,
    error::EngineError,
    usecase::{
        ApprovalEngine,
        helpers::{FindResultExt, map_version_conflict},
    },
};

/// 決裁の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 承認（金額修正を伴う場合は減額承認）
    Approve,
    /// 却下
    Reject,
}

/// 決裁の入力
#[derive(Debug, Clone)]
pub struct DecideInput {
    pub decision: Decision,
    /// 承認者コメント（任意）
    pub comment: Option<String>,
    /// 承認者による修正後のカテゴリ別金額（減額承認時のみ）
    pub modified_amounts: Option<CategoryAmounts>,
}

/// 決裁の結果
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    /// 遷移後の申請
    pub request: ExpenseRequest,
    /// 確定した承認レコード
    pub record: ApprovalRecord,
    /// この決裁でエスカレーションレベルが挿入されたか
    pub escalated: bool,
}

impl ApprovalEngine {
    /// 承認レコードを決裁する
    ///
    /// ## 処理フロー
    ///
    /// 1. レコードと申請を取得し、担当承認者本人であることを確認
    /// 2. ドメイン層で決裁を適用（未決以外は `AlreadyDecided`）
    /// 3. 却下は即 `rejected`。承認は次レベルの有無とエスカレーション要否で分岐
    /// 4. レコードの条件付き確定・申請の更新・次レコードの作成を
    ///    単一トランザクションで実行
    /// 5. コミット後に通知（ベストエフォート）
    ///
    /// ## 並行性
    ///
    /// レコードの確定は `WHERE status = 'pending'` 付きの条件付き UPDATE で行う。
    /// 同一レコードへの並行決裁は正確に一件だけ成立し、敗北側は
    /// `AlreadyDecided` を受け取る。
    pub async fn decide(
        &self,
        record_id: &ApprovalRecordId,
        input: DecideInput,
        ctx: &EngineContext,
    ) -> Result<DecisionOutcome, EngineError> {
        let record = self
            .deps
            .record_repo
            .find_by_id(record_id)
            .await
            .or_not_found("承認レコード")?;

        if record.approver() != &ctx.acting_user_id {
            return Err(EngineError::Forbidden(
                "このレコードの決裁権限がありません".to_string(),
            ));
        }
        if record.status() != ApprovalStatus::Pending {
            return Err(EngineError::AlreadyDecided);
        }

        let request = self
            .deps
            .request_repo
            .find_by_id(record.request_id(), &ctx.organization_id)
            .await
            .or_not_found("申請")?;
        let expected_version = request.version();
        let now = self.deps.clock.now();

        let decided = match input.decision {
            Decision::Approve => record.approved(input.comment, input.modified_amounts, now),
            Decision::Reject => record.rejected(input.comment, now),
        }
        .map_err(|_| EngineError::AlreadyDecided)?;

        let (request, next_record, escalated) = match input.decision {
            Decision::Reject => (request.rejected(now)?, None, false),
            Decision::Approve => self.advance(request, &decided, ctx, now).await?,
        };

        let mut tx = self.begin_tx().await?;
        self.deps
            .record_repo
            .decide_if_pending(&decided, &mut tx)
            .await
            .map_err(|e| {
                if e.as_conflict().is_some() {
                    EngineError::AlreadyDecided
                } else {
                    e.into()
                }
            })?;
        self.deps
            .request_repo
            .update(&request, expected_version, &mut tx)
            .await
            .map_err(map_version_conflict)?;
        if let Some(next) = &next_record {
            self.deps.record_repo.insert(next, &mut tx).await?;
        }
        self.commit_tx(tx).await?;

        self.log_decision(&request, &decided, escalated, ctx);
        self.notify_decision(&request, next_record.as_ref()).await;

        Ok(DecisionOutcome {
            request,
            record: decided,
            escalated,
        })
    }

    /// 承認後の申請の前進先を決める
    ///
    /// 次の未スキップ静的レベルがあればそこへ。なければエスカレーション要否を
    /// 判定し、必要なら静的チェーンの末尾に 1 レベルを挿入（申請ごとに最大
    /// 1 回）。どちらもなければ終端遷移（承認 / 減額承認）。
    async fn advance(
        &self,
        request: ExpenseRequest,
        decided: &ApprovalRecord,
        ctx: &EngineContext,
        now: DateTime<Utc>,
    ) -> Result<(ExpenseRequest, Option<ApprovalRecord>, bool), EngineError> {
        let chain_id = request
            .chain_id()
            .cloned()
            .ok_or_else(|| EngineError::Internal("承認待ちの申請にチェーンがありません".to_string()))?;
        let chain = self
            .deps
            .chain_repo
            .find_by_id(&chain_id, &ctx.organization_id)
            .await
            .or_not_found("承認チェーン")?;
        let profile = self
            .deps
            .employee_repo
            .find_profile(request.requester(), &ctx.organization_id)
            .await
            .or_not_found("従業員プロフィール")?;
        let roster = self
            .deps
            .employee_repo
            .find_roster(&ctx.organization_id)
            .await?;

        let total = request.total();
        let resolved = self.resolve_approvers(&chain, &profile, &roster, total)?;
        let current = decided.level_order();

        // 違反が最初に観測されたレベル（チェーン先頭の未スキップレベル）
        let first_level = resolved.iter().find_map(|level| match level {
            ResolvedLevel::Assigned { order, .. } => Some(*order),
            ResolvedLevel::Skipped { .. } => None,
        });

        // 次の未スキップ静的レベル
        let next_assigned = resolved.iter().find_map(|level| match level {
            ResolvedLevel::Assigned {
                order,
                approver,
                kind,
                message,
                ..
            } if *order > current => Some((*order, approver.clone(), *kind, message.clone())),
            _ => None,
        });

        if let Some((order, approver, kind, message)) = next_assigned {
            let advanced = request.advanced_to_level(order, now)?;
            let next = ApprovalRecord::new(NewApprovalRecord {
                id: ApprovalRecordId::new(),
                request_id: advanced.id().clone(),
                level_order: order,
                approver,
                approver_kind: kind,
                escalated: false,
                message,
                now,
            });
            return Ok((advanced, Some(next), false));
        }

        // 静的チェーンの末端。エスカレーション要否を判定する
        if self
            .escalation_needed(&request, &chain, current, first_level)
            .await?
        {
            let org_admin =
                roster
                    .org_admin
                    .clone()
                    .ok_or(EngineError::RoleUnoccupied {
                        role: ApproverKind::OrgAdmin,
                    })?;
            let escalation_level = chain.max_order() + 1;
            let advanced = request.advanced_to_level(escalation_level, now)?;
            let next = ApprovalRecord::new(NewApprovalRecord {
                id: ApprovalRecordId::new(),
                request_id: advanced.id().clone(),
                level_order: escalation_level,
                approver: org_admin,
                approver_kind: ApproverKind::OrgAdmin,
                escalated: true,
                message: None,
                now,
            });
            return Ok((advanced, Some(next), true));
        }

        // 終端遷移。修正金額があれば減額承認
        let terminal = match decided.modified_amounts() {
            Some(modified) => request.partially_approved(modified, now)?,
            None => request.approved(now)?,
        };
        Ok((terminal, None, false))
    }

    /// エスカレーションレベルの挿入が必要か
    ///
    /// レベル上限との比較は違反がフローに入ったレベル（`violation_level`、
    /// チェーン先頭の未スキップレベル）で行う。静的チェーンの段数ではなく
    /// 違反が観測された位置が基準となるため、レベル 1 から始まる 3 段
    /// チェーンでも閾値超過はエスカレーションされ、スキップにより
    /// レベル 3 から始まったフローはされない。
    /// 挿入は申請ごとに最大 1 回。
    async fn escalation_needed(
        &self,
        request: &ExpenseRequest,
        chain: &ApprovalChain,
        current_level: u32,
        violation_level: Option<u32>,
    ) -> Result<bool, EngineError> {
        let Some(first_level) = violation_level else {
            return Ok(false);
        };
        if !self
            .evaluator
            .escalation_required(request.violations(), first_level)
        {
            return Ok(false);
        }
        // 既に挿入済みなら二重挿入しない（申請ごとに最大 1 回）
        if current_level > chain.max_order() {
            return Ok(false);
        }
        let records = self
            .deps
            .record_repo
            .find_by_request(request.id())
            .await?;
        Ok(!records.iter().any(ApprovalRecord::is_escalated))
    }

    fn log_decision(
        &self,
        request: &ExpenseRequest,
        decided: &ApprovalRecord,
        escalated: bool,
        ctx: &EngineContext,
    ) {
        let level_action = match decided.status() {
            ApprovalStatus::Approved => event::action::LEVEL_APPROVED,
            _ => event::action::LEVEL_REJECTED,
        };
        log_business_event!(
            event.category = event::category::APPROVAL,
            event.action = level_action,
            event.entity_type = event::entity_type::APPROVAL_RECORD,
            event.entity_id = %decided.id(),
            event.actor_id = %ctx.acting_user_id,
            event.organization_id = %ctx.organization_id,
            level_order = decided.level_order(),
            event.result = event::result::SUCCESS,
            "承認レベルを決裁"
        );
        if escalated {
            log_business_event!(
                event.category = event::category::APPROVAL,
                event.action = event::action::LEVEL_ESCALATED,
                event.entity_type = event::entity_type::EXPENSE_REQUEST,
                event.entity_id = %request.id(),
                event.organization_id = %ctx.organization_id,
                event.result = event::result::SUCCESS,
                "エスカレーションレベルを挿入"
            );
        }

        let terminal_action = match request.status() {
            RequestStatus::Approved => Some(event::action::REQUEST_APPROVED),
            RequestStatus::PartiallyApproved => Some(event::action::REQUEST_PARTIALLY_APPROVED),
            RequestStatus::Rejected => Some(event::action::REQUEST_REJECTED),
            _ => None,
        };
        if let Some(action) = terminal_action {
            log_business_event!(
                event.category = event::category::APPROVAL,
                event.action = action,
                event.entity_type = event::entity_type::EXPENSE_REQUEST,
                event.entity_id = %request.id(),
                event.organization_id = %ctx.organization_id,
                event.result = event::result::SUCCESS,
                "申請が終端状態に遷移"
            );
        }
    }

    /// 決裁後の通知。次レベルがあれば次の承認者、終端なら申請者へ
    async fn notify_decision(&self, request: &ExpenseRequest, next: Option<&ApprovalRecord>) {
        let (recipient, message): (UserId, Option<String>) = match next {
            Some(record) => (
                record.approver().clone(),
                record.message().map(ToOwned::to_owned),
            ),
            None => (request.requester().clone(), None),
        };
        self.notify(ApprovalEvent {
            request_id: request.id().clone(),
            status: request.status(),
            recipient,
            message,
        })
        .await;
    }
}

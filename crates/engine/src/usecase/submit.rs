//! 申請の提出
//!
//! 検証 → チェーン解決 → 規程評価 → 違反の永続化 → 最初の承認レコード作成 →
//! 通知、のパイプラインを単一の操作として提供する。

use seisan_domain::{
    chain::ResolvedLevel,
    employee::UserId,
    money::ExpenseCategory,
    request::{
        ApprovalRecord,
        ApprovalRecordId,
        ExpenseRequest,
        ExpenseRequestId,
        NewApprovalRecord,
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

/// 申請提出の入力
#[derive(Debug, Clone, Default)]
pub struct SubmitInput {
    /// 規程違反に対する従業員説明（カテゴリごと）
    pub explanations: Vec<(ExpenseCategory, String)>,
}

impl ApprovalEngine {
    /// 申請を提出する
    ///
    /// ## 処理フロー
    ///
    /// 1. 申請を取得し、申請者本人であることを確認
    /// 2. 規程評価を行い、違反を申請に添付
    /// 3. 入力された説明を違反に適用し、説明不足があれば全件を列挙して拒否
    /// 4. 等級・合計金額からチェーンを選択し、承認者を解決
    /// 5. 最初の未スキップレベルの承認レコードを作成して `pending_approval` に遷移。
    ///    全レベルがスキップされた場合は承認者を介さず自動承認
    /// 6. 申請とレコードを単一トランザクションで保存し、承認者に通知
    pub async fn submit(
        &self,
        request_id: &ExpenseRequestId,
        input: SubmitInput,
        ctx: &EngineContext,
    ) -> Result<ExpenseRequest, EngineError> {
        let request = self
            .deps
            .request_repo
            .find_by_id(request_id, &ctx.organization_id)
            .await
            .or_not_found("申請")?;

        if request.requester() != &ctx.acting_user_id {
            return Err(EngineError::Forbidden(
                "自分の申請のみ提出できます".to_string(),
            ));
        }

        let expected_version = request.version();
        let now = self.deps.clock.now();

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
        let rules = self
            .deps
            .policy_repo
            .find_active_by_organization(&ctx.organization_id)
            .await?;

        // 2. 規程評価と違反の添付
        let violations =
            self.evaluator
                .evaluate(request.amounts(), request.trip(), profile.grade_id.as_ref(), &rules)?;
        let violations_detected = !violations.is_empty();
        let mut request = request.with_violations(violations, now)?;

        // 3. 説明の適用と不足チェック（不足は最初の 1 件ではなく全件を列挙する）
        for (category, text) in input.explanations {
            request = request.explained(category, text, now)?;
        }
        let missing = request.missing_explanations();
        if !missing.is_empty() {
            return Err(EngineError::MissingViolationExplanation(missing));
        }

        // 4. チェーン選択と承認者解決
        let total = request.total();
        let chain = self
            .resolve_chain(ctx, profile.grade_id.as_ref(), total)
            .await?;
        let resolved = self.resolve_approvers(&chain, &profile, &roster, total)?;

        let first_assigned = resolved.iter().find_map(|level| match level {
            ResolvedLevel::Assigned {
                order,
                approver,
                kind,
                message,
                ..
            } => Some((*order, approver.clone(), *kind, message.clone())),
            ResolvedLevel::Skipped { .. } => None,
        });

        // 5. 状態遷移と最初の承認レコード
        let (request, first_record) = match first_assigned {
            Some((order, approver, kind, message)) => {
                let request = request.submitted(chain.id().clone(), order, now)?;
                let record = ApprovalRecord::new(NewApprovalRecord {
                    id: ApprovalRecordId::new(),
                    request_id: request.id().clone(),
                    level_order: order,
                    approver: approver.clone(),
                    approver_kind: kind,
                    escalated: false,
                    message,
                    now,
                });
                (request, Some((record, approver)))
            }
            None => {
                // 全レベルスキップ: 承認者を介さず自動承認
                let request = request
                    .submitted(chain.id().clone(), chain.max_order(), now)?
                    .approved(now)?;
                (request, None)
            }
        };

        // 6. 単一トランザクションで保存
        let mut tx = self.begin_tx().await?;
        self.deps
            .request_repo
            .update(&request, expected_version, &mut tx)
            .await
            .map_err(map_version_conflict)?;
        if let Some((record, _)) = &first_record {
            self.deps.record_repo.insert(record, &mut tx).await?;
        }
        self.commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::APPROVAL,
            event.action = event::action::REQUEST_SUBMITTED,
            event.entity_type = event::entity_type::EXPENSE_REQUEST,
            event.entity_id = %request.id(),
            event.actor_id = %ctx.acting_user_id,
            event.organization_id = %ctx.organization_id,
            event.result = event::result::SUCCESS,
            "申請を提出"
        );
        if violations_detected {
            log_business_event!(
                event.category = event::category::POLICY,
                event.action = event::action::POLICY_VIOLATION_DETECTED,
                event.entity_type = event::entity_type::EXPENSE_REQUEST,
                event.entity_id = %request.id(),
                event.organization_id = %ctx.organization_id,
                violation_count = request.violations().len(),
                event.result = event::result::SUCCESS,
                "規程違反を検出"
            );
        }

        if let Some((record, approver)) = first_record {
            self.notify_pending_level(&request, &record, approver).await;
        }

        Ok(request)
    }

    async fn notify_pending_level(
        &self,
        request: &ExpenseRequest,
        record: &ApprovalRecord,
        recipient: UserId,
    ) {
        self.notify(ApprovalEvent {
            request_id: request.id().clone(),
            status: request.status(),
            recipient,
            message: record.message().map(ToOwned::to_owned),
        })
        .await;
    }
}

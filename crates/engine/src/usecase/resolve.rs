//! 承認チェーンの選択と承認者の解決

use seisan_domain::{
    chain::{ApprovalChain, ResolvedLevel, resolve_levels, select_assignment},
    employee::{EmployeeProfile, GradeId},
    money::{Amount, CategoryAmounts},
    organization::OrganizationRoster,
    policy::{PolicyRule, PolicyViolation, TripMeta},
};

use crate::{context::EngineContext, error::EngineError, usecase::ApprovalEngine};

impl ApprovalEngine {
    /// 申請者の等級と合計金額から適用チェーンを選択する
    ///
    /// ## 処理フロー
    ///
    /// 1. 組織の等級チェーン割り当てから最も限定的な一致を選ぶ
    /// 2. 一致がなければ組織のデフォルトチェーンにフォールバック
    /// 3. どちらもなければ `NoApplicableChain`
    pub async fn resolve_chain(
        &self,
        ctx: &EngineContext,
        grade_id: Option<&GradeId>,
        total: Amount,
    ) -> Result<ApprovalChain, EngineError> {
        let assignments = self
            .deps
            .chain_repo
            .find_assignments_by_organization(&ctx.organization_id)
            .await?;

        if let Some(assignment) = select_assignment(&assignments, grade_id, total) {
            let chain = self
                .deps
                .chain_repo
                .find_by_id(assignment.chain_id(), &ctx.organization_id)
                .await?;
            if let Some(chain) = chain.filter(ApprovalChain::is_active) {
                return Ok(chain);
            }
        }

        self.deps
            .chain_repo
            .find_default_by_organization(&ctx.organization_id)
            .await?
            .ok_or(EngineError::NoApplicableChain)
    }

    /// チェーンの各レベルを実在の承認者に解決する
    ///
    /// 純粋な演算で I/O を行わない。スキップ条件（金額閾値）も
    /// ここで適用され、スキップされたレベルは `ResolvedLevel::Skipped` になる。
    pub fn resolve_approvers(
        &self,
        chain: &ApprovalChain,
        requester: &EmployeeProfile,
        roster: &OrganizationRoster,
        total: Amount,
    ) -> Result<Vec<ResolvedLevel>, EngineError> {
        resolve_levels(chain, requester, roster, total).map_err(Into::into)
    }

    /// 申請額を規程ルールと突合し違反リストを返す（純粋関数）
    pub fn evaluate_policy(
        &self,
        amounts: &CategoryAmounts,
        trip: Option<&TripMeta>,
        grade_id: Option<&GradeId>,
        rules: &[PolicyRule],
    ) -> Result<Vec<PolicyViolation>, EngineError> {
        self.evaluator
            .evaluate(amounts, trip, grade_id, rules)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use seisan_domain::{
        chain::{GradeChainAssignment, GradeChainAssignmentRecord, GradeChainAssignmentId},
        organization::OrganizationId,
    };

    use super::*;
    use crate::usecase::test_helpers::{MockSet, amount, build_sut, single_manager_chain};

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn assignment_for(
        chain: &ApprovalChain,
        min: i64,
        max: Option<i64>,
        now: DateTime<Utc>,
    ) -> GradeChainAssignment {
        GradeChainAssignment::new(GradeChainAssignmentRecord {
            id: GradeChainAssignmentId::new(),
            organization_id: chain.organization_id().clone(),
            chain_id: chain.id().clone(),
            grade_id: None,
            min_amount: amount(min),
            max_amount: max.map(amount),
            created_at: now,
        })
        .unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn test_割り当て一致でチェーンを返す(now: DateTime<Utc>) {
        let org = OrganizationId::new();
        let mocks = MockSet::new();
        let chain = single_manager_chain(&org, now);
        mocks.chain_repo.add_chain(chain.clone());
        mocks
            .chain_repo
            .add_assignment(assignment_for(&chain, 0, Some(10_000), now));

        let sut = build_sut(&mocks, now);
        let ctx = EngineContext::new(org, seisan_domain::employee::UserId::new());

        let resolved = sut.resolve_chain(&ctx, None, amount(5_000)).await.unwrap();

        assert_eq!(resolved.id(), chain.id());
    }

    #[rstest]
    #[tokio::test]
    async fn test_割り当てがなければデフォルトチェーン(now: DateTime<Utc>) {
        let org = OrganizationId::new();
        let mocks = MockSet::new();
        let chain = single_manager_chain(&org, now);
        mocks.chain_repo.add_chain(chain.clone());

        let sut = build_sut(&mocks, now);
        let ctx = EngineContext::new(org, seisan_domain::employee::UserId::new());

        let resolved = sut.resolve_chain(&ctx, None, amount(5_000)).await.unwrap();

        assert_eq!(resolved.id(), chain.id());
    }

    #[rstest]
    #[tokio::test]
    async fn test_割り当てもデフォルトもなければエラー(now: DateTime<Utc>) {
        let org = OrganizationId::new();
        let mocks = MockSet::new();

        let sut = build_sut(&mocks, now);
        let ctx = EngineContext::new(org, seisan_domain::employee::UserId::new());

        let err = sut
            .resolve_chain(&ctx, None, amount(5_000))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NoApplicableChain));
    }

    /// 金額境界 5000 は下限の大きい割り当て側に落ちる
    #[rstest]
    #[tokio::test]
    async fn test_金額境界は上位チェーンを選ぶ(now: DateTime<Utc>) {
        let org = OrganizationId::new();
        let mocks = MockSet::new();
        let low_chain = single_manager_chain(&org, now);
        let high_chain = single_manager_chain(&org, now);
        mocks.chain_repo.add_chain(low_chain.clone());
        mocks.chain_repo.add_chain(high_chain.clone());
        mocks
            .chain_repo
            .add_assignment(assignment_for(&low_chain, 0, Some(5_000), now));
        mocks
            .chain_repo
            .add_assignment(assignment_for(&high_chain, 5_000, None, now));

        let sut = build_sut(&mocks, now);
        let ctx = EngineContext::new(org, seisan_domain::employee::UserId::new());

        let resolved = sut.resolve_chain(&ctx, None, amount(5_000)).await.unwrap();

        assert_eq!(resolved.id(), high_chain.id());
    }
}

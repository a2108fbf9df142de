//! 申請ライフサイクルの補助操作
//!
//! 却下後の再オープン、承認前の取り下げ、承認者の未決一覧。

use seisan_domain::request::{ApprovalRecord, ExpenseRequest, ExpenseRequestId};
use seisan_shared::{event_log::event, log_business_event};

use crate::{
    context::EngineContext,
    error::EngineError,
    usecase::{
        ApprovalEngine,
        helpers::{FindResultExt, map_version_conflict},
    },
};

impl ApprovalEngine {
    /// 却下された申請を再オープンする
    ///
    /// 経費精算のみ編集可能状態に戻せる。出張申請の却下は終端であり、
    /// ドメイン層が `Forbidden` を返す。
    ///
    /// ## 処理フロー
    ///
    /// 1. 申請を取得し、申請者本人であることを確認
    /// 2. ドメイン層で再オープン遷移を適用
    /// 3. 楽観的ロック付きで更新
    pub async fn reopen(
        &self,
        request_id: &ExpenseRequestId,
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
                "自分の申請のみ再オープンできます".to_string(),
            ));
        }

        let expected_version = request.version();
        let now = self.deps.clock.now();
        let reopened = request.reopened(now)?;

        let mut tx = self.begin_tx().await?;
        self.deps
            .request_repo
            .update(&reopened, expected_version, &mut tx)
            .await
            .map_err(map_version_conflict)?;
        self.commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::APPROVAL,
            event.action = event::action::REQUEST_REOPENED,
            event.entity_type = event::entity_type::EXPENSE_REQUEST,
            event.entity_id = %reopened.id(),
            event.actor_id = %ctx.acting_user_id,
            event.organization_id = %ctx.organization_id,
            event.result = event::result::SUCCESS,
            "申請を再オープン"
        );

        Ok(reopened)
    }

    /// 提出前の申請を取り下げる
    ///
    /// 下書きまたは編集可能状態の申請のみクローズできる。
    pub async fn close(
        &self,
        request_id: &ExpenseRequestId,
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
                "自分の申請のみ取り下げできます".to_string(),
            ));
        }

        let expected_version = request.version();
        let now = self.deps.clock.now();
        let closed = request.closed(now)?;

        let mut tx = self.begin_tx().await?;
        self.deps
            .request_repo
            .update(&closed, expected_version, &mut tx)
            .await
            .map_err(map_version_conflict)?;
        self.commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::APPROVAL,
            event.action = event::action::REQUEST_CLOSED,
            event.entity_type = event::entity_type::EXPENSE_REQUEST,
            event.entity_id = %closed.id(),
            event.actor_id = %ctx.acting_user_id,
            event.organization_id = %ctx.organization_id,
            event.result = event::result::SUCCESS,
            "申請を取り下げ"
        );

        Ok(closed)
    }

    /// 実行ユーザーが担当する未決の承認レコードを作成日時順に返す
    pub async fn pending_approvals(
        &self,
        ctx: &EngineContext,
    ) -> Result<Vec<ApprovalRecord>, EngineError> {
        self.deps
            .record_repo
            .find_pending_by_approver(&ctx.acting_user_id)
            .await
            .map_err(Into::into)
    }
}

//! # ユースケース層
//!
//! 承認チェーン解決・規程評価・状態遷移を束ねるエンジンの実装。
//! リポジトリはトレイトオブジェクトで受け取り、テストではインメモリ
//! モックに差し替える。

mod decide;
mod helpers;
mod lifecycle;
mod resolve;
mod submit;

use std::sync::Arc;

pub use decide::{DecideInput, Decision, DecisionOutcome};
use seisan_domain::{clock::Clock, policy::{PolicyComplianceEvaluator, PolicyThresholds}};
use seisan_infra::{
    db::{TransactionManager, TxContext},
    notification::{ApprovalEvent, NotificationDispatcher},
    repository::{
        ApprovalChainRepository,
        ApprovalRecordRepository,
        EmployeeRepository,
        ExpenseRequestRepository,
        PolicyRuleRepository,
    },
};
pub use submit::SubmitInput;

use crate::error::EngineError;

/// エンジンが依存する外部コラボレータの束
pub struct EngineDeps {
    pub chain_repo: Arc<dyn ApprovalChainRepository>,
    pub record_repo: Arc<dyn ApprovalRecordRepository>,
    pub request_repo: Arc<dyn ExpenseRequestRepository>,
    pub policy_repo: Arc<dyn PolicyRuleRepository>,
    pub employee_repo: Arc<dyn EmployeeRepository>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub tx_manager: Arc<dyn TransactionManager>,
}

/// 承認エンジン
///
/// 申請の提出・決裁・再オープンを司る公開 API。全操作が
/// [`EngineContext`](crate::context::EngineContext) を明示的に受け取る。
pub struct ApprovalEngine {
    deps: EngineDeps,
    evaluator: PolicyComplianceEvaluator,
}

impl ApprovalEngine {
    pub fn new(deps: EngineDeps, thresholds: PolicyThresholds) -> Self {
        Self {
            deps,
            evaluator: PolicyComplianceEvaluator::new(thresholds),
        }
    }

    pub(crate) async fn begin_tx(&self) -> Result<TxContext, EngineError> {
        self.deps.tx_manager.begin().await.map_err(Into::into)
    }

    pub(crate) async fn commit_tx(&self, tx: TxContext) -> Result<(), EngineError> {
        tx.commit().await.map_err(Into::into)
    }

    /// 通知をベストエフォートで送信する
    ///
    /// 配送失敗は状態遷移を巻き戻さない。エラーはログに残すのみ。
    pub(crate) async fn notify(&self, event: ApprovalEvent) {
        if let Err(e) = self.deps.notifier.dispatch(&event).await {
            tracing::error!(
                error.category = seisan_shared::event_log::error::category::EXTERNAL_SERVICE,
                error.kind = seisan_shared::event_log::error::kind::NOTIFICATION_DISPATCH,
                request_id = %event.request_id,
                error = %e,
                "通知の送信に失敗しました"
            );
        }
    }
}

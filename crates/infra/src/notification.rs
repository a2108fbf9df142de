//! # 承認イベント通知
//!
//! 申請のライフサイクルイベント（提出・承認・却下など）を関係者に
//! 通知するディスパッチャ。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `NotificationDispatcher` でディスパッチ先を抽象化
//! - **ベストエフォート**: 通知の失敗は状態遷移を巻き戻さない。
//!   呼び出し側はエラーをログに残して処理を続行する

mod noop;
mod tracing;

use async_trait::async_trait;
pub use noop::NoopNotificationDispatcher;
pub use tracing::TracingNotificationDispatcher;
use seisan_domain::{
    employee::UserId,
    request::{ExpenseRequestId, RequestStatus},
};

use crate::error::InfraError;

/// 通知対象となる承認イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalEvent {
    /// 対象の申請 ID
    pub request_id: ExpenseRequestId,
    /// イベント後の申請ステータス
    pub status: RequestStatus,
    /// 通知の宛先（次レベルの承認者、または申請者）
    pub recipient: UserId,
    /// チェーンレベルに設定された通知メッセージ
    pub message: Option<String>,
}

/// 承認イベント通知トレイト
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// イベントを通知する
    async fn dispatch(&self, event: &ApprovalEvent) -> Result<(), InfraError>;
}

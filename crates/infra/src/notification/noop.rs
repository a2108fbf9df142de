//! Noop 通知実装
//!
//! 実際の配送は行わず、ログ出力のみ行う。
//! テスト環境や通知無効化時に使用する。

use async_trait::async_trait;

use super::{ApprovalEvent, NotificationDispatcher};
use crate::error::InfraError;

/// Noop 通知（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NoopNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for NoopNotificationDispatcher {
    async fn dispatch(&self, event: &ApprovalEvent) -> Result<(), InfraError> {
        tracing::info!(
            request_id = %event.request_id,
            status = %event.status,
            recipient = %event.recipient,
            "Noop: 通知送信をスキップ"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use seisan_domain::{
        employee::UserId,
        request::{ExpenseRequestId, RequestStatus},
    };

    use super::*;

    #[tokio::test]
    async fn dispatchがエラーを返さない() {
        let dispatcher = NoopNotificationDispatcher;
        let event = ApprovalEvent {
            request_id: ExpenseRequestId::new(),
            status:     RequestStatus::PendingApproval,
            recipient:  UserId::new(),
            message:    Some("一次承認をお願いします".to_string()),
        };

        let result = dispatcher.dispatch(&event).await;
        assert!(result.is_ok());
    }
}

//! 構造化ログ通知実装
//!
//! 外部の配送基盤を持たない環境向けに、通知をビジネスイベントログとして
//! 出力する。ログ収集側（CloudWatch / Loki 等）がこのイベントを拾って
//! 実際の配送にルーティングする運用を想定している。

use async_trait::async_trait;
use seisan_shared::{event_log::event, log_business_event};

use super::{ApprovalEvent, NotificationDispatcher};
use crate::error::InfraError;

/// 構造化ログ通知（`notification.sent` ビジネスイベントを出力）
#[derive(Debug, Clone)]
pub struct TracingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingNotificationDispatcher {
    async fn dispatch(&self, approval: &ApprovalEvent) -> Result<(), InfraError> {
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_SENT,
            event.entity_type = event::entity_type::EXPENSE_REQUEST,
            event.entity_id = %approval.request_id,
            event.recipient_id = %approval.recipient,
            event.status = %approval.status,
            event.result = event::result::SUCCESS,
            "承認イベントを通知"
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
        let dispatcher = TracingNotificationDispatcher;
        let event = ApprovalEvent {
            request_id: ExpenseRequestId::new(),
            status:     RequestStatus::Approved,
            recipient:  UserId::new(),
            message:    None,
        };

        let result = dispatcher.dispatch(&event).await;
        assert!(result.is_ok());
    }
}

//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! ログフィールドの命名規約とヘルパーマクロを提供し、`jq` による
//! 調査を効率化する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! 既存の `tracing::error!` に `error.category` + `error.kind` フィールドを直接追加する。
//! 定数は [`error`] モジュールで提供。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.organization_id`: 組織 ID
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: エンティティ種別（[`event::entity_type`] の定数を使用）
/// - `event.entity_id`: エンティティ ID
/// - `event.actor_id`: 操作者 ID
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const APPROVAL: &str = "approval";
        pub const POLICY: &str = "policy";
        pub const NOTIFICATION: &str = "notification";
    }

    /// イベントアクション
    pub mod action {
        // 申請ライフサイクル
        pub const REQUEST_SUBMITTED: &str = "request.submitted";
        pub const REQUEST_APPROVED: &str = "request.approved";
        pub const REQUEST_PARTIALLY_APPROVED: &str = "request.partially_approved";
        pub const REQUEST_REJECTED: &str = "request.rejected";
        pub const REQUEST_REOPENED: &str = "request.reopened";
        pub const REQUEST_CLOSED: &str = "request.closed";

        // 承認レベル
        pub const LEVEL_APPROVED: &str = "level.approved";
        pub const LEVEL_REJECTED: &str = "level.rejected";
        pub const LEVEL_ESCALATED: &str = "level.escalated";

        // 規程
        pub const POLICY_VIOLATION_DETECTED: &str = "policy.violation_detected";

        // 通知
        pub const NOTIFICATION_SENT: &str = "notification.sent";
        pub const NOTIFICATION_FAILED: &str = "notification.failed";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const EXPENSE_REQUEST: &str = "expense_request";
        pub const APPROVAL_RECORD: &str = "approval_record";
        pub const APPROVAL_CHAIN: &str = "approval_chain";
        pub const POLICY_RULE: &str = "policy_rule";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部コラボレータ（ID 基盤、通知配送）
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const SERIALIZATION: &str = "serialization";
        pub const INTERNAL: &str = "internal";
        pub const NOTIFICATION_DISPATCH: &str = "notification_dispatch";
    }
}

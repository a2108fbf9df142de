//! # 実行コンテキスト
//!
//! 全操作が受け取る明示的なコンテキスト。セッションやスレッドローカルの
//! ような暗黙のグローバル状態には依存しない。

use seisan_domain::{employee::UserId, organization::OrganizationId};

/// エンジン操作の実行コンテキスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineContext {
    /// 操作対象の組織
    pub organization_id: OrganizationId,
    /// 操作を行うユーザー（申請者または承認者）
    pub acting_user_id: UserId,
}

impl EngineContext {
    pub fn new(organization_id: OrganizationId, acting_user_id: UserId) -> Self {
        Self {
            organization_id,
            acting_user_id,
        }
    }
}

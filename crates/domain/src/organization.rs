//! # 組織
//!
//! 承認チェーン・規程・等級のスコープとなる組織の識別子と、
//! チェーン解決に必要な組織内ロール情報を定義する。
//!
//! ## ロール照会の抽象化
//!
//! エンジンはロールを直接照会しない。呼び出し側が事前に解決した
//! [`OrganizationRoster`]（組織管理者・経理責任者・在籍ユーザー）を受け取り、
//! その上で純粋にレベル解決を行う。セッション状態のようなプロセス全体の
//! 可変状態には依存しない。

use std::collections::HashSet;

use crate::employee::UserId;

define_uuid_id! {
    /// 組織 ID
    pub struct OrganizationId;
}

/// 組織内ロールの事前解決結果
///
/// チェーンレベル解決の入力。ロールの照会・権限判定そのものは
/// 外部コラボレータ（ID 基盤）の責務で、エンジンは結果のみを消費する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationRoster {
    /// 組織管理者（複数いる場合は先頭の一人を事前選択済み）
    pub org_admin:          Option<UserId>,
    /// 経理責任者
    pub accounting_manager: Option<UserId>,
    /// 在籍ユーザー ID の集合（specific_user の生存確認用）
    pub known_users:        HashSet<UserId>,
}

impl OrganizationRoster {
    /// ユーザーが在籍しているか
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.known_users.contains(user_id)
    }
}

//! # 承認レベルの解決
//!
//! チェーンの各レベルを具体的な承認者ユーザーに解決する純粋関数群。
//! 在籍情報と組織の役職情報のみを入力とし、副作用を持たない。

use crate::{
    chain::{ApprovalChain, ApprovalChainLevel, ApproverKind},
    employee::{EmployeeProfile, UserId},
    money::Amount,
    organization::OrganizationRoster,
};

/// 承認レベル解決時のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainResolutionError {
    /// 直属上長レベルだが申請者に上長が設定されていない
    #[error("申請者 {user_id} に直属上長が設定されていません")]
    NoManagerAssigned { user_id: UserId },

    /// 参照先ユーザーが組織に存在しない
    #[error("承認者として参照されたユーザー {user_id} が組織に存在しません")]
    ReferencedUserMissing { user_id: UserId },

    /// 役職ベースのレベルだが該当役職が空席
    #[error("役職 {role} に該当するユーザーがいません")]
    RoleUnoccupied { role: ApproverKind },
}

/// 解決結果のレベル
///
/// `skipped` なレベルは承認者を持たず、承認レコードも作成されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLevel {
    Assigned {
        order: u32,
        approver: UserId,
        kind: ApproverKind,
        required: bool,
        message: Option<String>,
    },
    Skipped {
        order: u32,
    },
}

impl ResolvedLevel {
    pub fn order(&self) -> u32 {
        match self {
            Self::Assigned { order, .. } | Self::Skipped { order } => *order,
        }
    }

    pub fn approver(&self) -> Option<&UserId> {
        match self {
            Self::Assigned { approver, .. } => Some(approver),
            Self::Skipped { .. } => None,
        }
    }
}

/// 1 レベルを承認者に解決する
///
/// 合計金額がレベルのスキップ閾値を下回る場合は `Skipped` を返す。
///
/// # エラー
///
/// - [`ChainResolutionError::NoManagerAssigned`]: 必須の直属上長レベルで上長未設定。
///   任意レベルの場合はエラーではなく `Skipped` に解決する
/// - [`ChainResolutionError::ReferencedUserMissing`]: 解決先ユーザーが組織外
/// - [`ChainResolutionError::RoleUnoccupied`]: 役職レベルで該当者不在
pub fn resolve_level(
    level: &ApprovalChainLevel,
    requester: &EmployeeProfile,
    roster: &OrganizationRoster,
    total: Amount,
) -> Result<ResolvedLevel, ChainResolutionError> {
    if let Some(threshold) = level.skip_if_amount_under()
        && total.as_decimal() < threshold.as_decimal()
    {
        return Ok(ResolvedLevel::Skipped {
            order: level.order(),
        });
    }

    let approver = match level.kind() {
        // 上長未設定は必須レベルのみエラー。任意レベルはスキップに解決する
        ApproverKind::DirectManager => match requester.manager_id.clone() {
            Some(manager) => manager,
            None if !level.is_required() => {
                return Ok(ResolvedLevel::Skipped {
                    order: level.order(),
                });
            }
            None => {
                return Err(ChainResolutionError::NoManagerAssigned {
                    user_id: requester.user_id.clone(),
                });
            }
        },
        ApproverKind::OrgAdmin => {
            roster
                .org_admin
                .clone()
                .ok_or(ChainResolutionError::RoleUnoccupied {
                    role: ApproverKind::OrgAdmin,
                })?
        }
        ApproverKind::AccountingManager => roster.accounting_manager.clone().ok_or(
            ChainResolutionError::RoleUnoccupied {
                role: ApproverKind::AccountingManager,
            },
        )?,
        ApproverKind::SpecificUser => match level.specific_user() {
            Some(user) => user.clone(),
            // 構築時の不変条件により到達しないが役職空席として扱う
            None => {
                return Err(ChainResolutionError::RoleUnoccupied {
                    role: ApproverKind::SpecificUser,
                });
            }
        },
    };

    if !roster.contains(&approver) {
        return Err(ChainResolutionError::ReferencedUserMissing { user_id: approver });
    }

    Ok(ResolvedLevel::Assigned {
        order: level.order(),
        approver,
        kind: level.kind(),
        required: level.is_required(),
        message: level.message().map(ToOwned::to_owned),
    })
}

/// チェーンの全レベルを順に解決する
///
/// いずれかのレベルで解決に失敗した場合は全体を失敗とする。
/// 全レベルがスキップされた結果も有効で、呼び出し側が自動承認として扱う。
pub fn resolve_levels(
    chain: &ApprovalChain,
    requester: &EmployeeProfile,
    roster: &OrganizationRoster,
    total: Amount,
) -> Result<Vec<ResolvedLevel>, ChainResolutionError> {
    chain
        .levels()
        .iter()
        .map(|level| resolve_level(level, requester, roster, total))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use rust_decimal::Decimal;

    use crate::{
        chain::{ApprovalChainId, NewApprovalChain},
        employee::GradeId,
        organization::OrganizationId,
        value_objects::ChainName,
    };

    use super::*;

    fn amount(n: i64) -> Amount {
        Amount::new(Decimal::from(n)).unwrap()
    }

    fn roster(
        org_admin: Option<UserId>,
        accounting_manager: Option<UserId>,
        extra: Vec<UserId>,
    ) -> OrganizationRoster {
        let mut known: Vec<UserId> = extra;
        known.extend(org_admin.clone());
        known.extend(accounting_manager.clone());
        OrganizationRoster {
            org_admin,
            accounting_manager,
            known_users: known.into_iter().collect(),
        }
    }

    fn requester(manager_id: Option<UserId>) -> EmployeeProfile {
        EmployeeProfile {
            user_id: UserId::new(),
            manager_id,
            grade_id: Some(GradeId::new()),
            organization_id: OrganizationId::new(),
        }
    }

    #[test]
    fn test_直属上長レベルは上長に解決される() {
        let manager = UserId::new();
        let requester = requester(Some(manager.clone()));
        let roster = roster(None, None, vec![manager.clone()]);
        let level = ApprovalChainLevel::direct_manager(1);

        let resolved = resolve_level(&level, &requester, &roster, amount(100)).unwrap();

        assert_eq!(resolved.approver(), Some(&manager));
    }

    #[test]
    fn test_上長未設定はエラー() {
        let requester = requester(None);
        let roster = roster(None, None, vec![]);
        let level = ApprovalChainLevel::direct_manager(1);

        let result = resolve_level(&level, &requester, &roster, amount(100));

        assert_eq!(
            result,
            Err(ChainResolutionError::NoManagerAssigned {
                user_id: requester.user_id.clone()
            })
        );
    }

    #[test]
    fn test_任意レベルの上長未設定はスキップに解決される() {
        let requester = requester(None);
        let roster = roster(None, None, vec![]);
        let level =
            ApprovalChainLevel::new(1, ApproverKind::DirectManager, None, false, None, None)
                .unwrap();

        let resolved = resolve_level(&level, &requester, &roster, amount(100));

        assert_eq!(resolved, Ok(ResolvedLevel::Skipped { order: 1 }));
    }

    #[test]
    fn test_組織外ユーザーへの解決はエラー() {
        let manager = UserId::new();
        let requester = requester(Some(manager.clone()));
        // 上長が名簿に存在しない
        let roster = roster(None, None, vec![]);
        let level = ApprovalChainLevel::direct_manager(1);

        let result = resolve_level(&level, &requester, &roster, amount(100));

        assert_eq!(
            result,
            Err(ChainResolutionError::ReferencedUserMissing { user_id: manager })
        );
    }

    #[rstest]
    #[case(ApproverKind::OrgAdmin)]
    #[case(ApproverKind::AccountingManager)]
    fn test_役職空席はエラー(#[case] kind: ApproverKind) {
        let requester = requester(None);
        let roster = roster(None, None, vec![]);
        let level = ApprovalChainLevel::new(1, kind, None, true, None, None).unwrap();

        let result = resolve_level(&level, &requester, &roster, amount(100));

        assert_eq!(result, Err(ChainResolutionError::RoleUnoccupied { role: kind }));
    }

    #[test]
    fn test_閾値未満の金額はレベルをスキップする() {
        let requester = requester(None);
        let roster = roster(None, None, vec![]);
        let level = ApprovalChainLevel::new(
            1,
            ApproverKind::DirectManager,
            None,
            false,
            Some(amount(10_000)),
            None,
        )
        .unwrap();

        let resolved = resolve_level(&level, &requester, &roster, amount(9_999)).unwrap();

        assert_eq!(resolved, ResolvedLevel::Skipped { order: 1 });
    }

    #[test]
    fn test_閾値ちょうどの金額はスキップしない() {
        let manager = UserId::new();
        let requester = requester(Some(manager.clone()));
        let roster = roster(None, None, vec![manager.clone()]);
        let level = ApprovalChainLevel::new(
            1,
            ApproverKind::DirectManager,
            None,
            false,
            Some(amount(10_000)),
            None,
        )
        .unwrap();

        let resolved = resolve_level(&level, &requester, &roster, amount(10_000)).unwrap();

        assert_eq!(resolved.approver(), Some(&manager));
    }

    #[test]
    fn test_全レベルを順に解決する() {
        let manager = UserId::new();
        let admin = UserId::new();
        let requester = requester(Some(manager.clone()));
        let roster = roster(Some(admin.clone()), None, vec![manager.clone()]);
        let chain = ApprovalChain::new(NewApprovalChain {
            id: ApprovalChainId::new(),
            organization_id: OrganizationId::new(),
            name: ChainName::new("二段階承認").unwrap(),
            is_default: false,
            levels: vec![
                ApprovalChainLevel::direct_manager(1),
                ApprovalChainLevel::new(2, ApproverKind::OrgAdmin, None, true, None, None)
                    .unwrap(),
            ],
            now: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        })
        .unwrap();

        let levels = resolve_levels(&chain, &requester, &roster, amount(100)).unwrap();

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].approver(), Some(&manager));
        assert_eq!(levels[1].approver(), Some(&admin));
    }
}

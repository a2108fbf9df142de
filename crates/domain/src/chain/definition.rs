//! # 承認チェーン定義
//!
//! 順序付き承認レベルのテンプレート。管理者が作成し、
//! 非アクティブ化は今後の割り当てから隠すだけで履歴は削除しない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    employee::UserId,
    money::Amount,
    organization::OrganizationId,
    value_objects::ChainName,
};

define_uuid_id! {
    /// 承認チェーン ID
    pub struct ApprovalChainId;
}

/// 承認レベルの種別
///
/// レベルが解決される承認者の決め方を表す。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApproverKind {
    /// 申請者の直属上長
    DirectManager,
    /// 組織管理者
    OrgAdmin,
    /// 経理責任者
    AccountingManager,
    /// 特定ユーザー
    SpecificUser,
}

impl std::str::FromStr for ApproverKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct_manager" => Ok(Self::DirectManager),
            "org_admin" => Ok(Self::OrgAdmin),
            "accounting_manager" => Ok(Self::AccountingManager),
            "specific_user" => Ok(Self::SpecificUser),
            _ => Err(DomainError::Validation(format!(
                "不正な承認レベル種別: {}",
                s
            ))),
        }
    }
}

/// 承認チェーンレベル
///
/// チェーン内の1ステップ。`order` は 1 始まりでチェーン内一意・連続。
///
/// # 不変条件
///
/// - `kind == SpecificUser` の場合のみ `specific_user` を持つ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalChainLevel {
    order: u32,
    kind: ApproverKind,
    specific_user: Option<UserId>,
    required: bool,
    skip_if_amount_under: Option<Amount>,
    message: Option<String>,
}

impl ApprovalChainLevel {
    /// 承認レベルを作成する
    ///
    /// # エラー
    ///
    /// - `DomainError::Validation`: `order` が 0、または `specific_user` の
    ///   有無が `kind` と矛盾する場合
    pub fn new(
        order: u32,
        kind: ApproverKind,
        specific_user: Option<UserId>,
        required: bool,
        skip_if_amount_under: Option<Amount>,
        message: Option<String>,
    ) -> Result<Self, DomainError> {
        if order == 0 {
            return Err(DomainError::Validation(
                "承認レベルの順序は 1 以上である必要があります".to_string(),
            ));
        }
        match (kind, &specific_user) {
            (ApproverKind::SpecificUser, None) => {
                return Err(DomainError::Validation(
                    "specific_user レベルには対象ユーザーの指定が必要です".to_string(),
                ));
            }
            (ApproverKind::SpecificUser, Some(_)) => {}
            (_, Some(_)) => {
                return Err(DomainError::Validation(
                    "specific_user 以外のレベルに対象ユーザーは指定できません".to_string(),
                ));
            }
            (_, None) => {}
        }
        Ok(Self {
            order,
            kind,
            specific_user,
            required,
            skip_if_amount_under,
            message,
        })
    }

    /// 直属上長レベルのショートカットコンストラクタ（必須・スキップなし）
    pub fn direct_manager(order: u32) -> Self {
        Self {
            order,
            kind: ApproverKind::DirectManager,
            specific_user: None,
            required: true,
            skip_if_amount_under: None,
            message: None,
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn kind(&self) -> ApproverKind {
        self.kind
    }

    pub fn specific_user(&self) -> Option<&UserId> {
        self.specific_user.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn skip_if_amount_under(&self) -> Option<Amount> {
        self.skip_if_amount_under
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// 承認チェーンエンティティ
///
/// 組織スコープの承認レベル順序列。
///
/// # 不変条件
///
/// - レベルの `order` は 1 から始まる連続した数列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalChain {
    id: ApprovalChainId,
    organization_id: OrganizationId,
    name: ChainName,
    active: bool,
    is_default: bool,
    levels: Vec<ApprovalChainLevel>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 承認チェーンの新規作成パラメータ
pub struct NewApprovalChain {
    pub id: ApprovalChainId,
    pub organization_id: OrganizationId,
    pub name: ChainName,
    pub is_default: bool,
    pub levels: Vec<ApprovalChainLevel>,
    pub now: DateTime<Utc>,
}

/// 承認チェーンの DB 復元パラメータ
pub struct ApprovalChainRecord {
    pub id: ApprovalChainId,
    pub organization_id: OrganizationId,
    pub name: ChainName,
    pub active: bool,
    pub is_default: bool,
    pub levels: Vec<ApprovalChainLevel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// レベル列が 1 始まりの連続列であることを検証する
fn validate_level_sequence(levels: &[ApprovalChainLevel]) -> Result<(), DomainError> {
    if levels.is_empty() {
        return Err(DomainError::Validation(
            "承認チェーンには少なくとも 1 つのレベルが必要です".to_string(),
        ));
    }
    for (index, level) in levels.iter().enumerate() {
        let expected = (index + 1) as u32;
        if level.order() != expected {
            return Err(DomainError::Validation(format!(
                "承認レベルの順序が連続していません: 位置 {} に order {} が指定されています",
                expected,
                level.order()
            )));
        }
    }
    Ok(())
}

impl ApprovalChain {
    /// 新しい承認チェーンを作成する
    ///
    /// # エラー
    ///
    /// - `DomainError::Validation`: レベル列が空、または順序が連続していない場合
    pub fn new(params: NewApprovalChain) -> Result<Self, DomainError> {
        validate_level_sequence(&params.levels)?;
        Ok(Self {
            id: params.id,
            organization_id: params.organization_id,
            name: params.name,
            active: true,
            is_default: params.is_default,
            levels: params.levels,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    /// 既存のデータから復元する
    ///
    /// レベル列の不変条件を再検証する。
    pub fn from_db(record: ApprovalChainRecord) -> Result<Self, DomainError> {
        validate_level_sequence(&record.levels)?;
        Ok(Self {
            id: record.id,
            organization_id: record.organization_id,
            name: record.name,
            active: record.active,
            is_default: record.is_default,
            levels: record.levels,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub fn id(&self) -> &ApprovalChainId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn name(&self) -> &ChainName {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn levels(&self) -> &[ApprovalChainLevel] {
        &self.levels
    }

    /// 指定順序のレベルを取得する
    pub fn level_at(&self, order: u32) -> Option<&ApprovalChainLevel> {
        self.levels.iter().find(|l| l.order() == order)
    }

    /// 最終レベルの順序を返す
    pub fn max_order(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// チェーンを非アクティブ化した新しいインスタンスを返す
    ///
    /// 今後の割り当てから隠れるが、既存申請の履歴には影響しない。
    pub fn deactivated(self, now: DateTime<Utc>) -> Self {
        Self {
            active: false,
            updated_at: now,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn two_level_chain(now: DateTime<Utc>) -> ApprovalChain {
        ApprovalChain::new(NewApprovalChain {
            id: ApprovalChainId::new(),
            organization_id: OrganizationId::new(),
            name: ChainName::new("二段階承認").unwrap(),
            is_default: false,
            levels: vec![
                ApprovalChainLevel::direct_manager(1),
                ApprovalChainLevel::new(2, ApproverKind::AccountingManager, None, true, None, None)
                    .unwrap(),
            ],
            now,
        })
        .unwrap()
    }

    #[rstest]
    fn test_新規作成はアクティブでレベルを保持する(now: DateTime<Utc>) {
        let chain = two_level_chain(now);

        assert!(chain.is_active());
        assert_eq!(chain.levels().len(), 2);
        assert_eq!(chain.max_order(), 2);
    }

    #[rstest]
    fn test_レベルなしはエラー(now: DateTime<Utc>) {
        let result = ApprovalChain::new(NewApprovalChain {
            id: ApprovalChainId::new(),
            organization_id: OrganizationId::new(),
            name: ChainName::new("空チェーン").unwrap(),
            is_default: false,
            levels: vec![],
            now,
        });

        assert!(result.is_err());
    }

    #[rstest]
    fn test_順序が連続しないレベル列はエラー(now: DateTime<Utc>) {
        let result = ApprovalChain::new(NewApprovalChain {
            id: ApprovalChainId::new(),
            organization_id: OrganizationId::new(),
            name: ChainName::new("不正チェーン").unwrap(),
            is_default: false,
            levels: vec![
                ApprovalChainLevel::direct_manager(1),
                ApprovalChainLevel::direct_manager(3),
            ],
            now,
        });

        assert!(result.is_err());
    }

    #[rstest]
    fn test_順序が1始まりでないレベル列はエラー(now: DateTime<Utc>) {
        let result = ApprovalChain::new(NewApprovalChain {
            id: ApprovalChainId::new(),
            organization_id: OrganizationId::new(),
            name: ChainName::new("不正チェーン").unwrap(),
            is_default: false,
            levels: vec![ApprovalChainLevel::direct_manager(2)],
            now,
        });

        assert!(result.is_err());
    }

    #[test]
    fn test_specific_userレベルに対象ユーザーなしはエラー() {
        let result =
            ApprovalChainLevel::new(1, ApproverKind::SpecificUser, None, true, None, None);

        assert!(result.is_err());
    }

    #[test]
    fn test_specific_user以外に対象ユーザー指定はエラー() {
        let result = ApprovalChainLevel::new(
            1,
            ApproverKind::DirectManager,
            Some(UserId::new()),
            true,
            None,
            None,
        );

        assert!(result.is_err());
    }

    #[rstest]
    fn test_非アクティブ化後の状態(now: DateTime<Utc>) {
        let chain = two_level_chain(now);
        let later = DateTime::from_timestamp(1_700_000_100, 0).unwrap();

        let deactivated = chain.deactivated(later);

        assert!(!deactivated.is_active());
        assert_eq!(deactivated.updated_at(), later);
    }

    #[rstest]
    fn test_level_atは順序でレベルを引く(now: DateTime<Utc>) {
        let chain = two_level_chain(now);

        assert_eq!(
            chain.level_at(2).map(|l| l.kind()),
            Some(ApproverKind::AccountingManager)
        );
        assert!(chain.level_at(3).is_none());
    }

    #[test]
    fn test_approver_kindのfrom_str往復() {
        let s: &str = ApproverKind::AccountingManager.into();
        assert_eq!(s, "accounting_manager");
        assert_eq!(
            s.parse::<ApproverKind>().unwrap(),
            ApproverKind::AccountingManager
        );
        assert!("unknown".parse::<ApproverKind>().is_err());
    }
}

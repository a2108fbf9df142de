//! # 規程ルール
//!
//! 組織スコープの上限ルール。上限なし（`max_amount` が `None`）のルールは
//! 注記のみを持つ参考情報として扱われ、違反を生まない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    employee::GradeId,
    money::{Amount, ExpenseCategory},
    organization::OrganizationId,
};

define_uuid_id! {
    /// 規程ルール ID
    pub struct PolicyRuleId;
}

/// ルールが適用される渡航区分
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DestinationType {
    Domestic,
    International,
    /// 渡航区分を問わず適用
    All,
}

/// 出張自体の渡航区分
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TripDestination {
    Domestic,
    International,
}

impl DestinationType {
    /// 渡航区分がこのルールの対象か判定する
    pub fn covers(&self, destination: TripDestination) -> bool {
        match self {
            Self::All => true,
            Self::Domestic => destination == TripDestination::Domestic,
            Self::International => destination == TripDestination::International,
        }
    }
}

/// 上限の適用単位
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PerType {
    /// 1 日（宿泊費は 1 泊）あたり
    PerDay,
    /// 出張 1 件あたり
    PerTrip,
    /// 明細 1 件あたり
    PerItem,
}

/// 規程ルールエンティティ
///
/// `grade_id` が `None` のルールは全等級に適用されるワイルドカード。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    id: PolicyRuleId,
    organization_id: OrganizationId,
    category: ExpenseCategory,
    max_amount: Option<Amount>,
    currency: Option<String>,
    destination_type: DestinationType,
    per_type: PerType,
    grade_id: Option<GradeId>,
    notes: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 規程ルールの新規作成パラメータ
pub struct NewPolicyRule {
    pub id: PolicyRuleId,
    pub organization_id: OrganizationId,
    pub category: ExpenseCategory,
    pub max_amount: Option<Amount>,
    pub currency: Option<String>,
    pub destination_type: DestinationType,
    pub per_type: PerType,
    pub grade_id: Option<GradeId>,
    pub notes: Option<String>,
    pub now: DateTime<Utc>,
}

/// 規程ルールの DB 復元パラメータ
pub struct PolicyRuleRecord {
    pub id: PolicyRuleId,
    pub organization_id: OrganizationId,
    pub category: ExpenseCategory,
    pub max_amount: Option<Amount>,
    pub currency: Option<String>,
    pub destination_type: DestinationType,
    pub per_type: PerType,
    pub grade_id: Option<GradeId>,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyRule {
    /// 新しい規程ルールを作成する
    ///
    /// # エラー
    ///
    /// - `DomainError::Validation`: `max_amount` があるのに通貨が未指定の場合
    pub fn new(params: NewPolicyRule) -> Result<Self, DomainError> {
        if params.max_amount.is_some() && params.currency.is_none() {
            return Err(DomainError::Validation(
                "上限額を設定する場合は通貨の指定が必要です".to_string(),
            ));
        }
        Ok(Self {
            id: params.id,
            organization_id: params.organization_id,
            category: params.category,
            max_amount: params.max_amount,
            currency: params.currency,
            destination_type: params.destination_type,
            per_type: params.per_type,
            grade_id: params.grade_id,
            notes: params.notes,
            active: true,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    /// 既存のデータから復元する
    pub fn from_db(record: PolicyRuleRecord) -> Self {
        Self {
            id: record.id,
            organization_id: record.organization_id,
            category: record.category,
            max_amount: record.max_amount,
            currency: record.currency,
            destination_type: record.destination_type,
            per_type: record.per_type,
            grade_id: record.grade_id,
            notes: record.notes,
            active: record.active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn id(&self) -> &PolicyRuleId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn category(&self) -> ExpenseCategory {
        self.category
    }

    pub fn max_amount(&self) -> Option<Amount> {
        self.max_amount
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    pub fn destination_type(&self) -> DestinationType {
        self.destination_type
    }

    pub fn per_type(&self) -> PerType {
        self.per_type
    }

    pub fn grade_id(&self) -> Option<&GradeId> {
        self.grade_id.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// ルールを非アクティブ化した新しいインスタンスを返す
    pub fn deactivated(self, now: DateTime<Utc>) -> Self {
        Self {
            active: false,
            updated_at: now,
            ..self
        }
    }

    /// カテゴリ・渡航区分・等級の組にこのルールが適用されるか判定する
    pub fn applies_to(
        &self,
        category: ExpenseCategory,
        destination: TripDestination,
        grade_id: Option<&GradeId>,
    ) -> bool {
        if !self.active || self.category != category {
            return false;
        }
        if !self.destination_type.covers(destination) {
            return false;
        }
        match &self.grade_id {
            None => true,
            Some(required) => grade_id == Some(required),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal::Decimal;

    use super::*;

    fn rule(
        grade_id: Option<GradeId>,
        destination_type: DestinationType,
    ) -> PolicyRule {
        PolicyRule::new(NewPolicyRule {
            id: PolicyRuleId::new(),
            organization_id: OrganizationId::new(),
            category: ExpenseCategory::Accommodation,
            max_amount: Some(Amount::new(Decimal::from(200)).unwrap()),
            currency: Some("JPY".to_string()),
            destination_type,
            per_type: PerType::PerDay,
            grade_id,
            notes: None,
            now: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn test_上限額ありで通貨なしはエラー() {
        let result = PolicyRule::new(NewPolicyRule {
            id: PolicyRuleId::new(),
            organization_id: OrganizationId::new(),
            category: ExpenseCategory::Flights,
            max_amount: Some(Amount::new(Decimal::from(1000)).unwrap()),
            currency: None,
            destination_type: DestinationType::All,
            per_type: PerType::PerTrip,
            grade_id: None,
            notes: None,
            now: Utc::now(),
        });

        assert!(result.is_err());
    }

    #[rstest]
    #[case(DestinationType::All, TripDestination::Domestic, true)]
    #[case(DestinationType::All, TripDestination::International, true)]
    #[case(DestinationType::Domestic, TripDestination::Domestic, true)]
    #[case(DestinationType::Domestic, TripDestination::International, false)]
    #[case(DestinationType::International, TripDestination::International, true)]
    #[case(DestinationType::International, TripDestination::Domestic, false)]
    fn test_渡航区分の適用判定(
        #[case] destination_type: DestinationType,
        #[case] destination: TripDestination,
        #[case] expected: bool,
    ) {
        let rule = rule(None, destination_type);

        assert_eq!(
            rule.applies_to(ExpenseCategory::Accommodation, destination, None),
            expected
        );
    }

    #[test]
    fn test_等級指定ルールは他の等級に適用されない() {
        let grade = GradeId::new();
        let other = GradeId::new();
        let rule = rule(Some(grade.clone()), DestinationType::All);

        assert!(rule.applies_to(
            ExpenseCategory::Accommodation,
            TripDestination::Domestic,
            Some(&grade)
        ));
        assert!(!rule.applies_to(
            ExpenseCategory::Accommodation,
            TripDestination::Domestic,
            Some(&other)
        ));
        assert!(!rule.applies_to(
            ExpenseCategory::Accommodation,
            TripDestination::Domestic,
            None
        ));
    }

    #[test]
    fn test_非アクティブなルールは適用されない() {
        let rule = rule(None, DestinationType::All).deactivated(Utc::now());

        assert!(!rule.applies_to(
            ExpenseCategory::Accommodation,
            TripDestination::Domestic,
            None
        ));
    }

    #[test]
    fn test_カテゴリ不一致は適用されない() {
        let rule = rule(None, DestinationType::All);

        assert!(!rule.applies_to(
            ExpenseCategory::Flights,
            TripDestination::Domestic,
            None
        ));
    }
}

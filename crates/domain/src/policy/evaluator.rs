//! # 規程適合性評価
//!
//! 申請額と規程ルールの突合。既に取得済みのデータのみを入力とする
//! 純粋関数で、I/O を一切行わない。

use rust_decimal::Decimal;

use crate::{
    DomainError,
    employee::GradeId,
    money::{Amount, CategoryAmounts, ExpenseCategory},
    policy::{PerType, PolicyRule, PolicyViolation, TripDestination},
};

/// 規程違反の深刻度を判定する閾値
///
/// 2 つの閾値は独立した定数で、一方が他方を含意しない。
/// `special_approval_pct` は提出時の特別承認フラグ、`escalation_pct` は
/// 承認チェーンへの追加レベル挿入の条件に使う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyThresholds {
    /// この超過率（%）を超えると `requires_special_approval` が立つ
    pub special_approval_pct: Decimal,
    /// この超過率（%）を超えるとチェーンにエスカレーションレベルを挿入する
    pub escalation_pct: Decimal,
    /// エスカレーションを挿入できる現在レベルの上限（このレベル以上では挿入しない）
    pub escalation_level_cap: u32,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            special_approval_pct: Decimal::from(15),
            escalation_pct: Decimal::from(30),
            escalation_level_cap: 3,
        }
    }
}

/// 出張のメタ情報
///
/// 経費精算のように出張情報を持たない申請では `None` を渡し、
/// 単位あたり正規化は行われない（単位数 1 として扱う）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TripMeta {
    /// 宿泊数（宿泊費の正規化単位）
    pub nights: u32,
    /// 日数（宿泊費以外の日割りルールの正規化単位）
    pub days: u32,
    pub destination: TripDestination,
}

/// 規程適合性の評価器
#[derive(Debug, Clone, Default)]
pub struct PolicyComplianceEvaluator {
    thresholds: PolicyThresholds,
}

impl PolicyComplianceEvaluator {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }

    /// 申請額を規程ルールと突合し違反リストを返す
    ///
    /// カテゴリごとに最も限定的な適用ルールを 1 つ選び、上限との比較を行う。
    /// 適用ルールがないカテゴリは違反なし（オープンデフォルト）。
    ///
    /// # エラー
    ///
    /// - `DomainError::Validation`: 上限 0 のルールに対する超過率計算
    pub fn evaluate(
        &self,
        amounts: &CategoryAmounts,
        trip: Option<&TripMeta>,
        grade_id: Option<&GradeId>,
        rules: &[PolicyRule],
    ) -> Result<Vec<PolicyViolation>, DomainError> {
        let destination = trip.map_or(TripDestination::Domestic, |t| t.destination);

        let mut violations = Vec::new();
        for (category, requested) in amounts.iter() {
            let Some(rule) = select_rule(rules, category, destination, grade_id) else {
                continue;
            };
            let Some(limit) = rule.max_amount() else {
                continue;
            };

            let normalized = normalize(requested, rule.per_type(), category, trip);
            if normalized.as_decimal() <= limit.as_decimal() {
                continue;
            }

            let overage = normalized.subtract(limit)?;
            let overage_percentage = overage.percentage_of(limit)?;
            violations.push(PolicyViolation {
                category,
                requested: normalized,
                limit,
                overage,
                overage_percentage,
                requires_special_approval: overage_percentage
                    > self.thresholds.special_approval_pct,
                explanation: None,
            });
        }
        Ok(violations)
    }

    /// 違反リストがチェーンへのエスカレーション挿入を要するか判定する
    ///
    /// いずれかの違反の超過率がエスカレーション閾値を超え、かつ現在の
    /// 承認レベルが上限未満の場合に真を返す。
    pub fn escalation_required(
        &self,
        violations: &[PolicyViolation],
        current_level: u32,
    ) -> bool {
        if current_level >= self.thresholds.escalation_level_cap {
            return false;
        }
        violations
            .iter()
            .any(|v| v.overage_percentage > self.thresholds.escalation_pct)
    }
}

/// カテゴリに適用されるルールのうち最も限定的なものを選ぶ
///
/// 優先順位: 等級指定あり > ワイルドカード、渡航区分指定あり > `all`、
/// 同条件なら作成が古い方。
fn select_rule<'a>(
    rules: &'a [PolicyRule],
    category: ExpenseCategory,
    destination: TripDestination,
    grade_id: Option<&GradeId>,
) -> Option<&'a PolicyRule> {
    rules
        .iter()
        .filter(|r| r.applies_to(category, destination, grade_id))
        .min_by_key(|r| {
            (
                u8::from(r.grade_id().is_none()),
                u8::from(r.destination_type() == super::DestinationType::All),
                r.created_at(),
            )
        })
}

/// 申請額をルールの適用単位に正規化する
///
/// 日割りルールは宿泊費なら泊数、それ以外は日数で割る。
/// 出張情報がない場合は単位数 1 として扱う。
fn normalize(
    requested: Amount,
    per_type: PerType,
    category: ExpenseCategory,
    trip: Option<&TripMeta>,
) -> Amount {
    match per_type {
        PerType::PerTrip | PerType::PerItem => requested,
        PerType::PerDay => {
            let units = match (category, trip) {
                (ExpenseCategory::Accommodation, Some(t)) => t.nights,
                (_, Some(t)) => t.days,
                (_, None) => 1,
            };
            requested.per_unit(units)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{
        organization::OrganizationId,
        policy::{DestinationType, NewPolicyRule, PolicyRuleId},
    };

    use super::*;

    fn amount(n: i64) -> Amount {
        Amount::new(Decimal::from(n)).unwrap()
    }

    fn rule_with(
        category: ExpenseCategory,
        max: i64,
        per_type: PerType,
        destination_type: DestinationType,
        grade_id: Option<GradeId>,
        created_at: DateTime<Utc>,
    ) -> PolicyRule {
        PolicyRule::new(NewPolicyRule {
            id: PolicyRuleId::new(),
            organization_id: OrganizationId::new(),
            category,
            max_amount: Some(amount(max)),
            currency: Some("JPY".to_string()),
            destination_type,
            per_type,
            grade_id,
            notes: None,
            now: created_at,
        })
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn trip(nights: u32, days: u32) -> TripMeta {
        TripMeta {
            nights,
            days,
            destination: TripDestination::Domestic,
        }
    }

    #[rstest]
    #[case(900, 0)]
    #[case(1000, 0)]
    #[case(1001, 1)]
    fn test_上限以下は違反なし上限超過は違反(
        #[case] requested: i64,
        #[case] expected_count: usize,
    ) {
        let evaluator = PolicyComplianceEvaluator::default();
        let rules = vec![rule_with(
            ExpenseCategory::Flights,
            1000,
            PerType::PerTrip,
            DestinationType::All,
            None,
            now(),
        )];
        let amounts = CategoryAmounts::new().with(ExpenseCategory::Flights, amount(requested));

        let violations = evaluator
            .evaluate(&amounts, Some(&trip(2, 3)), None, &rules)
            .unwrap();

        assert_eq!(violations.len(), expected_count);
    }

    #[test]
    fn test_宿泊費は泊数あたりに正規化される() {
        // 上限 200/泊、3 泊で合計 750（250/泊）の申請
        let evaluator = PolicyComplianceEvaluator::default();
        let rules = vec![rule_with(
            ExpenseCategory::Accommodation,
            200,
            PerType::PerDay,
            DestinationType::All,
            None,
            now(),
        )];
        let amounts =
            CategoryAmounts::new().with(ExpenseCategory::Accommodation, amount(750));

        let violations = evaluator
            .evaluate(&amounts, Some(&trip(3, 4)), None, &rules)
            .unwrap();

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].overage, amount(50));
        assert_eq!(violations[0].overage_percentage, Decimal::from(25));
        assert!(violations[0].requires_special_approval);
    }

    #[test]
    fn test_宿泊費以外の日割りは日数で正規化される() {
        let evaluator = PolicyComplianceEvaluator::default();
        let rules = vec![rule_with(
            ExpenseCategory::Food,
            50,
            PerType::PerDay,
            DestinationType::All,
            None,
            now(),
        )];
        // 4 日で 200 ちょうど（50/日）は違反なし
        let amounts = CategoryAmounts::new().with(ExpenseCategory::Food, amount(200));

        let violations = evaluator
            .evaluate(&amounts, Some(&trip(3, 4)), None, &rules)
            .unwrap();

        assert_eq!(violations, vec![]);
    }

    #[test]
    fn test_出張情報なしの日割りルールは合計額と比較する() {
        let evaluator = PolicyComplianceEvaluator::default();
        let rules = vec![rule_with(
            ExpenseCategory::Food,
            50,
            PerType::PerDay,
            DestinationType::All,
            None,
            now(),
        )];
        let amounts = CategoryAmounts::new().with(ExpenseCategory::Food, amount(80));

        let violations = evaluator.evaluate(&amounts, None, None, &rules).unwrap();

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].overage, amount(30));
    }

    #[test]
    fn test_ルールのないカテゴリは違反なし() {
        let evaluator = PolicyComplianceEvaluator::default();
        let amounts = CategoryAmounts::new().with(ExpenseCategory::Misc, amount(1_000_000));

        let violations = evaluator.evaluate(&amounts, None, None, &[]).unwrap();

        assert_eq!(violations, vec![]);
    }

    #[test]
    fn test_等級指定ルールがワイルドカードに優先する() {
        let grade = GradeId::new();
        let evaluator = PolicyComplianceEvaluator::default();
        let rules = vec![
            rule_with(
                ExpenseCategory::Flights,
                1000,
                PerType::PerTrip,
                DestinationType::All,
                None,
                now(),
            ),
            rule_with(
                ExpenseCategory::Flights,
                2000,
                PerType::PerTrip,
                DestinationType::All,
                Some(grade.clone()),
                now(),
            ),
        ];
        // ワイルドカードの上限 1000 は超えるが等級別の上限 2000 以下
        let amounts = CategoryAmounts::new().with(ExpenseCategory::Flights, amount(1500));

        let violations = evaluator
            .evaluate(&amounts, None, Some(&grade), &rules)
            .unwrap();

        assert_eq!(violations, vec![]);
    }

    #[test]
    fn test_渡航区分指定ルールがallに優先する() {
        let evaluator = PolicyComplianceEvaluator::default();
        let rules = vec![
            rule_with(
                ExpenseCategory::Flights,
                1000,
                PerType::PerTrip,
                DestinationType::All,
                None,
                now(),
            ),
            rule_with(
                ExpenseCategory::Flights,
                5000,
                PerType::PerTrip,
                DestinationType::International,
                None,
                now(),
            ),
        ];
        let amounts = CategoryAmounts::new().with(ExpenseCategory::Flights, amount(3000));
        let trip = TripMeta {
            nights: 2,
            days: 3,
            destination: TripDestination::International,
        };

        let violations = evaluator
            .evaluate(&amounts, Some(&trip), None, &rules)
            .unwrap();

        assert_eq!(violations, vec![]);
    }

    #[test]
    fn test_超過率が特別承認閾値以下ならフラグは立たない() {
        let evaluator = PolicyComplianceEvaluator::default();
        let rules = vec![rule_with(
            ExpenseCategory::Flights,
            1000,
            PerType::PerTrip,
            DestinationType::All,
            None,
            now(),
        )];
        // 超過率 10% は既定の特別承認閾値 15% 以下
        let amounts = CategoryAmounts::new().with(ExpenseCategory::Flights, amount(1100));

        let violations = evaluator.evaluate(&amounts, None, None, &rules).unwrap();

        assert_eq!(violations.len(), 1);
        assert!(!violations[0].requires_special_approval);
    }

    #[rstest]
    #[case(Decimal::from(31), 1, true)]
    #[case(Decimal::from(31), 3, false)]
    #[case(Decimal::from(30), 1, false)]
    fn test_エスカレーション判定(
        #[case] pct: Decimal,
        #[case] current_level: u32,
        #[case] expected: bool,
    ) {
        let evaluator = PolicyComplianceEvaluator::default();
        let violation = PolicyViolation {
            category: ExpenseCategory::Flights,
            requested: amount(131),
            limit: amount(100),
            overage: amount(31),
            overage_percentage: pct,
            requires_special_approval: true,
            explanation: None,
        };

        assert_eq!(
            evaluator.escalation_required(&[violation], current_level),
            expected
        );
    }
}

//! # 等級・金額帯の割り当てルール
//!
//! どのチェーンを申請に適用するかを決める割り当て。等級（ワイルドカード可）と
//! 金額帯（両端含む、上限なし可）の組で条件を表す。

use chrono::{DateTime, Utc};

use crate::{
    DomainError,
    chain::ApprovalChainId,
    employee::GradeId,
    money::Amount,
    organization::OrganizationId,
};

define_uuid_id! {
    /// 等級チェーン割り当て ID
    pub struct GradeChainAssignmentId;
}

/// 等級チェーン割り当て
///
/// `grade_id` が `None` の場合は全等級に一致するワイルドカード。
/// 金額帯は `[min_amount, max_amount]` の閉区間で、`max_amount` が `None` なら
/// 上限なし。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeChainAssignment {
    id: GradeChainAssignmentId,
    organization_id: OrganizationId,
    chain_id: ApprovalChainId,
    grade_id: Option<GradeId>,
    min_amount: Amount,
    max_amount: Option<Amount>,
    created_at: DateTime<Utc>,
}

/// 等級チェーン割り当ての作成・復元パラメータ
pub struct GradeChainAssignmentRecord {
    pub id: GradeChainAssignmentId,
    pub organization_id: OrganizationId,
    pub chain_id: ApprovalChainId,
    pub grade_id: Option<GradeId>,
    pub min_amount: Amount,
    pub max_amount: Option<Amount>,
    pub created_at: DateTime<Utc>,
}

impl GradeChainAssignment {
    /// 割り当てを作成する
    ///
    /// # エラー
    ///
    /// - `DomainError::Validation`: `max_amount < min_amount` の場合
    pub fn new(record: GradeChainAssignmentRecord) -> Result<Self, DomainError> {
        if let Some(max) = record.max_amount
            && max.as_decimal() < record.min_amount.as_decimal()
        {
            return Err(DomainError::Validation(
                "金額帯の上限が下限を下回っています".to_string(),
            ));
        }
        Ok(Self {
            id: record.id,
            organization_id: record.organization_id,
            chain_id: record.chain_id,
            grade_id: record.grade_id,
            min_amount: record.min_amount,
            max_amount: record.max_amount,
            created_at: record.created_at,
        })
    }

    pub fn id(&self) -> &GradeChainAssignmentId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn chain_id(&self) -> &ApprovalChainId {
        &self.chain_id
    }

    pub fn grade_id(&self) -> Option<&GradeId> {
        self.grade_id.as_ref()
    }

    pub fn min_amount(&self) -> Amount {
        self.min_amount
    }

    pub fn max_amount(&self) -> Option<Amount> {
        self.max_amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 指定の等級と合計金額に一致するか判定する
    ///
    /// 等級はワイルドカードまたは一致、金額は閉区間に含まれること。
    pub fn matches(&self, grade_id: Option<&GradeId>, total: Amount) -> bool {
        let grade_ok = match &self.grade_id {
            None => true,
            Some(required) => grade_id == Some(required),
        };
        if !grade_ok {
            return false;
        }
        if total.as_decimal() < self.min_amount.as_decimal() {
            return false;
        }
        if let Some(max) = self.max_amount
            && total.as_decimal() > max.as_decimal()
        {
            return false;
        }
        true
    }
}

/// 一致する割り当てのうち最も限定的なものを選ぶ
///
/// 優先順位は次のとおり。
///
/// 1. 等級指定あり > ワイルドカード
/// 2. 金額帯の下限が大きい方
/// 3. 金額帯の上限が小さい方（上限なしは最後）
/// 4. 作成日時が古い方
pub fn select_assignment<'a>(
    assignments: &'a [GradeChainAssignment],
    grade_id: Option<&GradeId>,
    total: Amount,
) -> Option<&'a GradeChainAssignment> {
    assignments
        .iter()
        .filter(|a| a.matches(grade_id, total))
        .min_by(|a, b| {
            let grade_rank = |x: &GradeChainAssignment| u8::from(x.grade_id.is_none());
            grade_rank(a)
                .cmp(&grade_rank(b))
                .then_with(|| b.min_amount.as_decimal().cmp(&a.min_amount.as_decimal()))
                .then_with(|| match (a.max_amount, b.max_amount) {
                    (Some(x), Some(y)) => x.as_decimal().cmp(&y.as_decimal()),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.created_at.cmp(&b.created_at))
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use rust_decimal::Decimal;

    use super::*;

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn amount(n: i64) -> Amount {
        Amount::new(Decimal::from(n)).unwrap()
    }

    fn assignment(
        grade_id: Option<GradeId>,
        min: i64,
        max: Option<i64>,
        created_at: DateTime<Utc>,
    ) -> GradeChainAssignment {
        GradeChainAssignment::new(GradeChainAssignmentRecord {
            id: GradeChainAssignmentId::new(),
            organization_id: OrganizationId::new(),
            chain_id: ApprovalChainId::new(),
            grade_id,
            min_amount: amount(min),
            max_amount: max.map(amount),
            created_at,
        })
        .unwrap()
    }

    #[rstest]
    fn test_上限が下限を下回る割り当てはエラー(now: DateTime<Utc>) {
        let result = GradeChainAssignment::new(GradeChainAssignmentRecord {
            id: GradeChainAssignmentId::new(),
            organization_id: OrganizationId::new(),
            chain_id: ApprovalChainId::new(),
            grade_id: None,
            min_amount: amount(1000),
            max_amount: Some(amount(500)),
            created_at: now,
        });

        assert!(result.is_err());
    }

    #[rstest]
    fn test_金額帯は両端を含む(now: DateTime<Utc>) {
        let a = assignment(None, 100, Some(500), now);

        assert!(a.matches(None, amount(100)));
        assert!(a.matches(None, amount(500)));
        assert!(!a.matches(None, amount(99)));
        assert!(!a.matches(None, amount(501)));
    }

    #[rstest]
    fn test_上限なしの金額帯(now: DateTime<Utc>) {
        let a = assignment(None, 5000, None, now);

        assert!(a.matches(None, amount(5000)));
        assert!(a.matches(None, amount(1_000_000)));
        assert!(!a.matches(None, amount(4999)));
    }

    #[rstest]
    fn test_等級指定はワイルドカードに優先する(now: DateTime<Utc>) {
        let grade = GradeId::new();
        let wildcard = assignment(None, 0, None, now);
        let exact = assignment(Some(grade.clone()), 0, None, now);
        let assignments = vec![wildcard, exact.clone()];

        let selected = select_assignment(&assignments, Some(&grade), amount(100));

        assert_eq!(selected, Some(&exact));
    }

    #[rstest]
    fn test_境界額では下限が大きい帯が勝つ(now: DateTime<Utc>) {
        // 5000 は [0, 5000] と [5000, なし] の両方に一致するが後者を選ぶ
        let low = assignment(None, 0, Some(5000), now);
        let high = assignment(None, 5000, None, now);
        let assignments = vec![low, high.clone()];

        let selected = select_assignment(&assignments, None, amount(5000));

        assert_eq!(selected, Some(&high));
    }

    #[rstest]
    fn test_下限が同じなら上限が小さい帯が勝つ(now: DateTime<Utc>) {
        let narrow = assignment(None, 0, Some(1000), now);
        let wide = assignment(None, 0, None, now);
        let assignments = vec![wide, narrow.clone()];

        let selected = select_assignment(&assignments, None, amount(500));

        assert_eq!(selected, Some(&narrow));
    }

    #[rstest]
    fn test_同条件なら作成が古い方が勝つ(now: DateTime<Utc>) {
        let later = DateTime::from_timestamp(1_700_000_100, 0).unwrap();
        let older = assignment(None, 0, None, now);
        let newer = assignment(None, 0, None, later);
        let assignments = vec![newer, older.clone()];

        let selected = select_assignment(&assignments, None, amount(100));

        assert_eq!(selected, Some(&older));
    }

    #[rstest]
    fn test_一致なしはnone(now: DateTime<Utc>) {
        let a = assignment(None, 1000, Some(2000), now);
        let assignments = vec![a];

        assert!(select_assignment(&assignments, None, amount(500)).is_none());
    }
}

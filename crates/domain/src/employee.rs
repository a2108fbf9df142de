//! # 従業員と等級
//!
//! 従業員のプロフィール（上長・等級・所属組織）と、
//! チェーン・規程の選択に使用する等級（Grade）を定義する。
//!
//! 組織階層の管理そのものは対象外で、このエンジンは供給された
//! 上長リンクと等級リンクのみを消費する。

use chrono::{DateTime, Utc};

use crate::{DomainError, organization::OrganizationId, value_objects::GradeName};

define_uuid_id! {
    /// ユーザー ID
    pub struct UserId;
}

define_uuid_id! {
    /// 等級 ID
    pub struct GradeId;
}

/// 従業員等級エンティティ
///
/// 組織スコープの序列。`level` の昇順が低い順（1 = 最も低い）。
/// 非アクティブ化した等級は新規の割り当てから隠れるが、履歴は残る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeGrade {
    id: GradeId,
    organization_id: OrganizationId,
    name: GradeName,
    level: u32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 従業員等級の新規作成パラメータ
pub struct NewEmployeeGrade {
    pub id: GradeId,
    pub organization_id: OrganizationId,
    pub name: GradeName,
    pub level: u32,
    pub now: DateTime<Utc>,
}

/// 従業員等級の DB 復元パラメータ
pub struct EmployeeGradeRecord {
    pub id: GradeId,
    pub organization_id: OrganizationId,
    pub name: GradeName,
    pub level: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeGrade {
    /// 新しい等級を作成する
    ///
    /// # エラー
    ///
    /// - `DomainError::Validation`: `level` が 0 の場合
    pub fn new(params: NewEmployeeGrade) -> Result<Self, DomainError> {
        if params.level == 0 {
            return Err(DomainError::Validation(
                "等級レベルは 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self {
            id: params.id,
            organization_id: params.organization_id,
            name: params.name,
            level: params.level,
            active: true,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    /// 既存のデータから復元する
    pub fn from_db(record: EmployeeGradeRecord) -> Self {
        Self {
            id: record.id,
            organization_id: record.organization_id,
            name: record.name,
            level: record.level,
            active: record.active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn id(&self) -> &GradeId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn name(&self) -> &GradeName {
        &self.name
    }

    pub fn level(&self) -> u32 {
        self.level
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

    /// 等級を非アクティブ化した新しいインスタンスを返す
    pub fn deactivated(self, now: DateTime<Utc>) -> Self {
        Self {
            active: false,
            updated_at: now,
            ..self
        }
    }
}

/// 従業員プロフィール
///
/// チェーンレベル解決の入力。上長・等級・所属組織のリンクのみを持ち、
/// 認証や在籍管理はこのエンジンの対象外。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeProfile {
    pub user_id:         UserId,
    pub manager_id:      Option<UserId>,
    pub grade_id:        Option<GradeId>,
    pub organization_id: OrganizationId,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn test_grade() -> EmployeeGrade {
        EmployeeGrade::new(NewEmployeeGrade {
            id: GradeId::new(),
            organization_id: OrganizationId::new(),
            name: GradeName::new("一般").unwrap(),
            level: 1,
            now: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn test_新規作成はアクティブ() {
        let grade = test_grade();
        assert!(grade.is_active());
        assert_eq!(grade.level(), 1);
    }

    #[test]
    fn test_レベル0はエラー() {
        let result = EmployeeGrade::new(NewEmployeeGrade {
            id: GradeId::new(),
            organization_id: OrganizationId::new(),
            name: GradeName::new("不正").unwrap(),
            level: 0,
            now: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_非アクティブ化後の状態() {
        let now = Utc::now();
        let grade = test_grade().deactivated(now);

        assert!(!grade.is_active());
        assert_eq!(grade.updated_at(), now);
    }
}

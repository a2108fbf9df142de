//! # EmployeeRepository
//!
//! 従業員プロフィール・等級・組織内ロール情報の読み書きを担当するリポジトリ。
//!
//! 認証・在籍管理は外部の ID 基盤の責務で、ここでは上長リンク・等級リンク・
//! 役職マーカーのみを扱う。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seisan_domain::{
    employee::{
        EmployeeGrade,
        EmployeeGradeRecord,
        EmployeeProfile,
        GradeId,
        NewEmployeeGrade,
        UserId,
    },
    organization::{OrganizationId, OrganizationRoster},
    value_objects::GradeName,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// 従業員リポジトリトレイト
#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    /// ユーザーのプロフィール（上長・等級・所属）を取得する
    async fn find_profile(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<EmployeeProfile>, InfraError>;

    /// 組織内ロールの事前解決結果を取得する
    ///
    /// 役職保持者が複数いる場合は作成が最も古い一人を選ぶ。
    async fn find_roster(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationRoster, InfraError>;

    /// 等級を新規保存する
    async fn insert_grade(
        &self,
        grade: &EmployeeGrade,
        tx: &mut TxContext,
    ) -> Result<(), InfraError>;

    /// 等級の属性（アクティブフラグ等）を更新する
    async fn update_grade(
        &self,
        grade: &EmployeeGrade,
        tx: &mut TxContext,
    ) -> Result<(), InfraError>;

    /// ID で等級を取得する
    async fn find_grade_by_id(
        &self,
        id: &GradeId,
        organization_id: &OrganizationId,
    ) -> Result<Option<EmployeeGrade>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    organization_id: Uuid,
    manager_id: Option<Uuid>,
    grade_id: Option<Uuid>,
}

impl From<ProfileRow> for EmployeeProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id:         UserId::from_uuid(row.user_id),
            manager_id:      row.manager_id.map(UserId::from_uuid),
            grade_id:        row.grade_id.map(GradeId::from_uuid),
            organization_id: OrganizationId::from_uuid(row.organization_id),
        }
    }
}

#[derive(sqlx::FromRow)]
struct RosterRow {
    user_id: Uuid,
    role: Option<String>,
}

#[derive(sqlx::FromRow)]
struct GradeRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    level: i32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GradeRow> for EmployeeGrade {
    type Error = InfraError;

    fn try_from(row: GradeRow) -> Result<Self, Self::Error> {
        Ok(EmployeeGrade::from_db(EmployeeGradeRecord {
            id: GradeId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            name: GradeName::new(row.name).map_err(|e| InfraError::unexpected(e.to_string()))?,
            level: row.level as u32,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

/// PostgreSQL 実装
pub struct PostgresEmployeeRepository {
    pool: PgPool,
}

impl PostgresEmployeeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeRepository for PostgresEmployeeRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%user_id, %organization_id))]
    async fn find_profile(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<EmployeeProfile>, InfraError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, organization_id, manager_id, grade_id
            FROM employee_profiles
            WHERE user_id = $1 AND organization_id = $2 AND active = TRUE
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(organization_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EmployeeProfile::from))
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%organization_id))]
    async fn find_roster(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationRoster, InfraError> {
        let rows = sqlx::query_as::<_, RosterRow>(
            r#"
            SELECT user_id, role
            FROM employee_profiles
            WHERE organization_id = $1 AND active = TRUE
            ORDER BY created_at
            "#,
        )
        .bind(organization_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut roster = OrganizationRoster::default();
        for row in rows {
            let user_id = UserId::from_uuid(row.user_id);
            match row.role.as_deref() {
                Some("org_admin") if roster.org_admin.is_none() => {
                    roster.org_admin = Some(user_id.clone());
                }
                Some("accounting_manager") if roster.accounting_manager.is_none() => {
                    roster.accounting_manager = Some(user_id.clone());
                }
                _ => {}
            }
            roster.known_users.insert(user_id);
        }
        Ok(roster)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert_grade(
        &self,
        grade: &EmployeeGrade,
        tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO employee_grades (
                id, organization_id, name, level, active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(grade.id().as_uuid())
        .bind(grade.organization_id().as_uuid())
        .bind(grade.name().as_str())
        .bind(grade.level() as i32)
        .bind(grade.is_active())
        .bind(grade.created_at())
        .bind(grade.updated_at())
        .execute(&mut *tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn update_grade(
        &self,
        grade: &EmployeeGrade,
        tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            UPDATE employee_grades SET
                name = $1,
                level = $2,
                active = $3,
                updated_at = $4
            WHERE id = $5 AND organization_id = $6
            "#,
        )
        .bind(grade.name().as_str())
        .bind(grade.level() as i32)
        .bind(grade.is_active())
        .bind(grade.updated_at())
        .bind(grade.id().as_uuid())
        .bind(grade.organization_id().as_uuid())
        .execute(&mut *tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, %organization_id))]
    async fn find_grade_by_id(
        &self,
        id: &GradeId,
        organization_id: &OrganizationId,
    ) -> Result<Option<EmployeeGrade>, InfraError> {
        let row = sqlx::query_as::<_, GradeRow>(
            r#"
            SELECT id, organization_id, name, level, active, created_at, updated_at
            FROM employee_grades
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(organization_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(EmployeeGrade::try_from).transpose()
    }
}

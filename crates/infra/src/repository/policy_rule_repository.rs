//! # PolicyRuleRepository
//!
//! 規程ルールの永続化を担当するリポジトリ。
//!
//! 規程評価は純粋関数のため、読み取りは「組織のアクティブなルール一式」の
//! 一括取得が基本となる。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use seisan_domain::{
    employee::GradeId,
    money::{Amount, ExpenseCategory},
    organization::OrganizationId,
    policy::{DestinationType, PerType, PolicyRule, PolicyRuleId, PolicyRuleRecord},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// 規程ルールリポジトリトレイト
#[async_trait]
pub trait PolicyRuleRepository: Send + Sync {
    /// ルールを新規保存する
    async fn insert(&self, rule: &PolicyRule, tx: &mut TxContext) -> Result<(), InfraError>;

    /// ルールの属性（アクティブフラグ等）を更新する
    async fn update(&self, rule: &PolicyRule, tx: &mut TxContext) -> Result<(), InfraError>;

    /// 組織のアクティブなルール一覧を取得する
    async fn find_active_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<PolicyRule>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct PolicyRuleRow {
    id: Uuid,
    organization_id: Uuid,
    category: String,
    max_amount: Option<Decimal>,
    currency: Option<String>,
    destination_type: String,
    per_type: String,
    grade_id: Option<Uuid>,
    notes: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PolicyRuleRow> for PolicyRule {
    type Error = InfraError;

    fn try_from(row: PolicyRuleRow) -> Result<Self, Self::Error> {
        Ok(PolicyRule::from_db(PolicyRuleRecord {
            id: PolicyRuleId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            category: row
                .category
                .parse::<ExpenseCategory>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            max_amount: row
                .max_amount
                .map(Amount::new)
                .transpose()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            currency: row.currency,
            destination_type: parse_destination_type(&row.destination_type)?,
            per_type: parse_per_type(&row.per_type)?,
            grade_id: row.grade_id.map(GradeId::from_uuid),
            notes: row.notes,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

fn parse_destination_type(s: &str) -> Result<DestinationType, InfraError> {
    match s {
        "domestic" => Ok(DestinationType::Domestic),
        "international" => Ok(DestinationType::International),
        "all" => Ok(DestinationType::All),
        other => Err(InfraError::unexpected(format!(
            "不正な渡航区分: {}",
            other
        ))),
    }
}

fn parse_per_type(s: &str) -> Result<PerType, InfraError> {
    match s {
        "per_day" => Ok(PerType::PerDay),
        "per_trip" => Ok(PerType::PerTrip),
        "per_item" => Ok(PerType::PerItem),
        other => Err(InfraError::unexpected(format!(
            "不正な適用単位: {}",
            other
        ))),
    }
}

/// PostgreSQL 実装
pub struct PostgresPolicyRuleRepository {
    pool: PgPool,
}

impl PostgresPolicyRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyRuleRepository for PostgresPolicyRuleRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert(&self, rule: &PolicyRule, tx: &mut TxContext) -> Result<(), InfraError> {
        let category: &str = rule.category().into();
        let destination_type: &str = rule.destination_type().into();
        let per_type: &str = rule.per_type().into();
        sqlx::query(
            r#"
            INSERT INTO policy_rules (
                id, organization_id, category, max_amount, currency,
                destination_type, per_type, grade_id, notes, active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(rule.id().as_uuid())
        .bind(rule.organization_id().as_uuid())
        .bind(category)
        .bind(rule.max_amount().map(|a| a.as_decimal()))
        .bind(rule.currency())
        .bind(destination_type)
        .bind(per_type)
        .bind(rule.grade_id().map(|g| g.as_uuid()))
        .bind(rule.notes())
        .bind(rule.is_active())
        .bind(rule.created_at())
        .bind(rule.updated_at())
        .execute(&mut *tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn update(&self, rule: &PolicyRule, tx: &mut TxContext) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            UPDATE policy_rules SET
                max_amount = $1,
                currency = $2,
                notes = $3,
                active = $4,
                updated_at = $5
            WHERE id = $6 AND organization_id = $7
            "#,
        )
        .bind(rule.max_amount().map(|a| a.as_decimal()))
        .bind(rule.currency())
        .bind(rule.notes())
        .bind(rule.is_active())
        .bind(rule.updated_at())
        .bind(rule.id().as_uuid())
        .bind(rule.organization_id().as_uuid())
        .execute(&mut *tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%organization_id))]
    async fn find_active_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<PolicyRule>, InfraError> {
        let rows = sqlx::query_as::<_, PolicyRuleRow>(
            r#"
            SELECT id, organization_id, category, max_amount, currency,
                   destination_type, per_type, grade_id, notes, active,
                   created_at, updated_at
            FROM policy_rules
            WHERE organization_id = $1 AND active = TRUE
            ORDER BY created_at
            "#,
        )
        .bind(organization_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PolicyRule::try_from).collect()
    }
}

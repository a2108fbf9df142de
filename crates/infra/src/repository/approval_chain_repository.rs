//! # ApprovalChainRepository
//!
//! 承認チェーンと等級チェーン割り当ての永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **組織分離**: すべてのクエリで組織 ID を考慮
//! - **レベルの整合性**: チェーンとレベルは常に一括で読み書きし、
//!   連続性の不変条件は `from_db` で再検証する

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use seisan_domain::{
    chain::{
        ApprovalChain,
        ApprovalChainId,
        ApprovalChainLevel,
        ApprovalChainRecord,
        ApproverKind,
        GradeChainAssignment,
        GradeChainAssignmentId,
        GradeChainAssignmentRecord,
    },
    employee::{GradeId, UserId},
    money::Amount,
    organization::OrganizationId,
    value_objects::ChainName,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// 承認チェーンリポジトリトレイト
#[async_trait]
pub trait ApprovalChainRepository: Send + Sync {
    /// チェーンをレベルごと新規保存する
    async fn insert(&self, chain: &ApprovalChain, tx: &mut TxContext) -> Result<(), InfraError>;

    /// チェーンの属性（アクティブフラグ等）を更新する
    ///
    /// レベル構成は不変として扱い、更新しない。
    async fn update(&self, chain: &ApprovalChain, tx: &mut TxContext) -> Result<(), InfraError>;

    /// ID でチェーンを取得する
    async fn find_by_id(
        &self,
        id: &ApprovalChainId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ApprovalChain>, InfraError>;

    /// 組織のデフォルトチェーンを取得する
    ///
    /// アクティブなチェーンのうち `is_default` が立っているものを返す。
    async fn find_default_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<ApprovalChain>, InfraError>;

    /// 組織の等級チェーン割り当て一覧を取得する
    async fn find_assignments_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<GradeChainAssignment>, InfraError>;

    /// 等級チェーン割り当てを新規保存する
    async fn insert_assignment(
        &self,
        assignment: &GradeChainAssignment,
        tx: &mut TxContext,
    ) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct ChainRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    active: bool,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct LevelRow {
    level_order: i32,
    kind: String,
    specific_user: Option<Uuid>,
    required: bool,
    skip_if_amount_under: Option<Decimal>,
    message: Option<String>,
}

impl TryFrom<LevelRow> for ApprovalChainLevel {
    type Error = InfraError;

    fn try_from(row: LevelRow) -> Result<Self, Self::Error> {
        ApprovalChainLevel::new(
            row.level_order as u32,
            row.kind
                .parse::<ApproverKind>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            row.specific_user.map(UserId::from_uuid),
            row.required,
            row.skip_if_amount_under
                .map(Amount::new)
                .transpose()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            row.message,
        )
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

fn chain_from_rows(
    row: ChainRow,
    levels: Vec<ApprovalChainLevel>,
) -> Result<ApprovalChain, InfraError> {
    ApprovalChain::from_db(ApprovalChainRecord {
        id: ApprovalChainId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        name: ChainName::new(row.name).map_err(|e| InfraError::unexpected(e.to_string()))?,
        active: row.active,
        is_default: row.is_default,
        levels,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
    .map_err(|e| InfraError::unexpected(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: Uuid,
    organization_id: Uuid,
    chain_id: Uuid,
    grade_id: Option<Uuid>,
    min_amount: Decimal,
    max_amount: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AssignmentRow> for GradeChainAssignment {
    type Error = InfraError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        GradeChainAssignment::new(GradeChainAssignmentRecord {
            id: GradeChainAssignmentId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            chain_id: ApprovalChainId::from_uuid(row.chain_id),
            grade_id: row.grade_id.map(GradeId::from_uuid),
            min_amount: Amount::new(row.min_amount)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            max_amount: row
                .max_amount
                .map(Amount::new)
                .transpose()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            created_at: row.created_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

/// PostgreSQL 実装
pub struct PostgresApprovalChainRepository {
    pool: PgPool,
}

impl PostgresApprovalChainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_levels(
        &self,
        chain_id: &ApprovalChainId,
    ) -> Result<Vec<ApprovalChainLevel>, InfraError> {
        let rows = sqlx::query_as::<_, LevelRow>(
            r#"
            SELECT level_order, kind, specific_user, required,
                   skip_if_amount_under, message
            FROM approval_chain_levels
            WHERE chain_id = $1
            ORDER BY level_order
            "#,
        )
        .bind(chain_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ApprovalChainLevel::try_from).collect()
    }
}

#[async_trait]
impl ApprovalChainRepository for PostgresApprovalChainRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert(&self, chain: &ApprovalChain, tx: &mut TxContext) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO approval_chains (
                id, organization_id, name, active, is_default, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(chain.id().as_uuid())
        .bind(chain.organization_id().as_uuid())
        .bind(chain.name().as_str())
        .bind(chain.is_active())
        .bind(chain.is_default())
        .bind(chain.created_at())
        .bind(chain.updated_at())
        .execute(&mut *tx.conn())
        .await?;

        for level in chain.levels() {
            let kind: &str = level.kind().into();
            sqlx::query(
                r#"
                INSERT INTO approval_chain_levels (
                    chain_id, level_order, kind, specific_user, required,
                    skip_if_amount_under, message
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(chain.id().as_uuid())
            .bind(level.order() as i32)
            .bind(kind)
            .bind(level.specific_user().map(|u| u.as_uuid()))
            .bind(level.is_required())
            .bind(level.skip_if_amount_under().map(|a| a.as_decimal()))
            .bind(level.message())
            .execute(&mut *tx.conn())
            .await?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn update(&self, chain: &ApprovalChain, tx: &mut TxContext) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            UPDATE approval_chains SET
                name = $1,
                active = $2,
                is_default = $3,
                updated_at = $4
            WHERE id = $5 AND organization_id = $6
            "#,
        )
        .bind(chain.name().as_str())
        .bind(chain.is_active())
        .bind(chain.is_default())
        .bind(chain.updated_at())
        .bind(chain.id().as_uuid())
        .bind(chain.organization_id().as_uuid())
        .execute(&mut *tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, %organization_id))]
    async fn find_by_id(
        &self,
        id: &ApprovalChainId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ApprovalChain>, InfraError> {
        let row = sqlx::query_as::<_, ChainRow>(
            r#"
            SELECT id, organization_id, name, active, is_default, created_at, updated_at
            FROM approval_chains
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(organization_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let levels = self.find_levels(id).await?;
        chain_from_rows(row, levels).map(Some)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%organization_id))]
    async fn find_default_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<ApprovalChain>, InfraError> {
        let row = sqlx::query_as::<_, ChainRow>(
            r#"
            SELECT id, organization_id, name, active, is_default, created_at, updated_at
            FROM approval_chains
            WHERE organization_id = $1 AND is_default = TRUE AND active = TRUE
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(organization_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let chain_id = ApprovalChainId::from_uuid(row.id);
        let levels = self.find_levels(&chain_id).await?;
        chain_from_rows(row, levels).map(Some)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%organization_id))]
    async fn find_assignments_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<GradeChainAssignment>, InfraError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT a.id, a.organization_id, a.chain_id, a.grade_id,
                   a.min_amount, a.max_amount, a.created_at
            FROM grade_chain_assignments a
            JOIN approval_chains c ON c.id = a.chain_id
            WHERE a.organization_id = $1 AND c.active = TRUE
            ORDER BY a.created_at
            "#,
        )
        .bind(organization_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GradeChainAssignment::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert_assignment(
        &self,
        assignment: &GradeChainAssignment,
        tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO grade_chain_assignments (
                id, organization_id, chain_id, grade_id, min_amount, max_amount, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(assignment.id().as_uuid())
        .bind(assignment.organization_id().as_uuid())
        .bind(assignment.chain_id().as_uuid())
        .bind(assignment.grade_id().map(|g| g.as_uuid()))
        .bind(assignment.min_amount().as_decimal())
        .bind(assignment.max_amount().map(|a| a.as_decimal()))
        .bind(assignment.created_at())
        .execute(&mut *tx.conn())
        .await?;

        Ok(())
    }
}

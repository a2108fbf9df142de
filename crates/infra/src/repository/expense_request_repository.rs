//! # ExpenseRequestRepository
//!
//! 申請（経費精算・出張申請）の永続化を担当するリポジトリ。
//!
//! ## 楽観的ロック
//!
//! 更新は `WHERE version = 期待値` 付きで実行し、影響行数が 0 の場合は
//! 他の更新と競合したとみなして `InfraError::Conflict` を返す。
//!
//! ## JSONB カラム
//!
//! カテゴリ別金額・出張メタ情報・違反リストは JSONB で保存する。
//! 金額の合計や違反判定はドメイン層で再計算するため、正規化はしない。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use seisan_domain::{
    chain::ApprovalChainId,
    employee::UserId,
    money::{Amount, CategoryAmounts},
    organization::OrganizationId,
    policy::{PolicyViolation, TripMeta},
    request::{ExpenseRequest, ExpenseRequestId, ExpenseRequestRecord, RequestKind, RequestStatus},
    value_objects::Version,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// 申請リポジトリトレイト
#[async_trait]
pub trait ExpenseRequestRepository: Send + Sync {
    /// 申請を新規保存する
    async fn insert(
        &self,
        request: &ExpenseRequest,
        tx: &mut TxContext,
    ) -> Result<(), InfraError>;

    /// 申請を楽観的ロック付きで更新する
    ///
    /// # エラー
    ///
    /// - `InfraError::Conflict`: `expected_version` が DB 上のバージョンと
    ///   一致しない（他の更新が先行した）場合
    async fn update(
        &self,
        request: &ExpenseRequest,
        expected_version: Version,
        tx: &mut TxContext,
    ) -> Result<(), InfraError>;

    /// ID で申請を取得する
    async fn find_by_id(
        &self,
        id: &ExpenseRequestId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ExpenseRequest>, InfraError>;

    /// 申請者の申請一覧を取得する（作成日時の降順）
    async fn find_by_requester(
        &self,
        organization_id: &OrganizationId,
        requester: &UserId,
    ) -> Result<Vec<ExpenseRequest>, InfraError>;
}

/// DB の expense_requests テーブルの行を表す中間構造体
#[derive(sqlx::FromRow)]
struct ExpenseRequestRow {
    id: Uuid,
    organization_id: Uuid,
    requester: Uuid,
    kind: String,
    title: String,
    amounts: serde_json::Value,
    trip: Option<serde_json::Value>,
    violations: serde_json::Value,
    status: String,
    version: i32,
    chain_id: Option<Uuid>,
    current_level: Option<i32>,
    submitted_at: Option<DateTime<Utc>>,
    approved_amounts: Option<serde_json::Value>,
    approved_total: Option<Decimal>,
    final_decision_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExpenseRequestRow> for ExpenseRequest {
    type Error = InfraError;

    fn try_from(row: ExpenseRequestRow) -> Result<Self, Self::Error> {
        let amounts: CategoryAmounts = serde_json::from_value(row.amounts)?;
        let trip: Option<TripMeta> = row.trip.map(serde_json::from_value).transpose()?;
        let violations: Vec<PolicyViolation> = serde_json::from_value(row.violations)?;
        let approved_amounts: Option<CategoryAmounts> = row
            .approved_amounts
            .map(serde_json::from_value)
            .transpose()?;
        let approved_total = row
            .approved_total
            .map(Amount::new)
            .transpose()
            .map_err(|e| InfraError::unexpected(e.to_string()))?;

        ExpenseRequest::from_db(ExpenseRequestRecord {
            id: ExpenseRequestId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            requester: UserId::from_uuid(row.requester),
            kind: row
                .kind
                .parse::<RequestKind>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            title: row.title,
            amounts,
            trip,
            violations,
            status: row
                .status
                .parse::<RequestStatus>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            version: Version::new(row.version as u32)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            chain_id: row.chain_id.map(ApprovalChainId::from_uuid),
            current_level: row.current_level.map(|l| l as u32),
            submitted_at: row.submitted_at,
            approved_amounts,
            approved_total,
            final_decision_at: row.final_decision_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

/// PostgreSQL 実装
pub struct PostgresExpenseRequestRepository {
    pool: PgPool,
}

impl PostgresExpenseRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpenseRequestRepository for PostgresExpenseRequestRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(request_id = %request.id()))]
    async fn insert(
        &self,
        request: &ExpenseRequest,
        tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        let amounts = serde_json::to_value(request.amounts())?;
        let trip = request.trip().map(serde_json::to_value).transpose()?;
        let violations = serde_json::to_value(request.violations())?;

        sqlx::query(
            r#"
            INSERT INTO expense_requests (
                id, organization_id, requester, kind, title,
                amounts, trip, violations, status, version,
                chain_id, current_level, submitted_at,
                approved_amounts, approved_total, final_decision_at,
                created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10,
                $11, $12, $13,
                $14, $15, $16,
                $17, $18
            )
            "#,
        )
        .bind(request.id().as_uuid())
        .bind(request.organization_id().as_uuid())
        .bind(request.requester().as_uuid())
        .bind(request.kind().to_string())
        .bind(request.title())
        .bind(amounts)
        .bind(trip)
        .bind(violations)
        .bind(request.status().to_string())
        .bind(request.version().as_i32())
        .bind(request.chain_id().map(|id| *id.as_uuid()))
        .bind(request.current_level().map(|l| l as i32))
        .bind(request.submitted_at())
        .bind(
            request
                .approved_amounts()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(request.approved_total().map(|a| a.as_decimal()))
        .bind(request.final_decision_at())
        .bind(request.created_at())
        .bind(request.updated_at())
        .execute(&mut *tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(request_id = %request.id(), expected_version = expected_version.as_i32())
    )]
    async fn update(
        &self,
        request: &ExpenseRequest,
        expected_version: Version,
        tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        let amounts = serde_json::to_value(request.amounts())?;
        let trip = request.trip().map(serde_json::to_value).transpose()?;
        let violations = serde_json::to_value(request.violations())?;

        let result = sqlx::query(
            r#"
            UPDATE expense_requests SET
                title = $1,
                amounts = $2,
                trip = $3,
                violations = $4,
                status = $5,
                version = $6,
                chain_id = $7,
                current_level = $8,
                submitted_at = $9,
                approved_amounts = $10,
                approved_total = $11,
                final_decision_at = $12,
                updated_at = $13
            WHERE id = $14 AND organization_id = $15 AND version = $16
            "#,
        )
        .bind(request.title())
        .bind(amounts)
        .bind(trip)
        .bind(violations)
        .bind(request.status().to_string())
        .bind(request.version().as_i32())
        .bind(request.chain_id().map(|id| *id.as_uuid()))
        .bind(request.current_level().map(|l| l as i32))
        .bind(request.submitted_at())
        .bind(
            request
                .approved_amounts()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(request.approved_total().map(|a| a.as_decimal()))
        .bind(request.final_decision_at())
        .bind(request.updated_at())
        .bind(request.id().as_uuid())
        .bind(request.organization_id().as_uuid())
        .bind(expected_version.as_i32())
        .execute(&mut *tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict(
                "ExpenseRequest",
                request.id().to_string(),
            ));
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, %organization_id))]
    async fn find_by_id(
        &self,
        id: &ExpenseRequestId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ExpenseRequest>, InfraError> {
        let row = sqlx::query_as::<_, ExpenseRequestRow>(
            r#"
            SELECT
                id, organization_id, requester, kind, title,
                amounts, trip, violations, status, version,
                chain_id, current_level, submitted_at,
                approved_amounts, approved_total, final_decision_at,
                created_at, updated_at
            FROM expense_requests
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(organization_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ExpenseRequest::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%organization_id, %requester))]
    async fn find_by_requester(
        &self,
        organization_id: &OrganizationId,
        requester: &UserId,
    ) -> Result<Vec<ExpenseRequest>, InfraError> {
        let rows = sqlx::query_as::<_, ExpenseRequestRow>(
            r#"
            SELECT
                id, organization_id, requester, kind, title,
                amounts, trip, violations, status, version,
                chain_id, current_level, submitted_at,
                approved_amounts, approved_total, final_decision_at,
                created_at, updated_at
            FROM expense_requests
            WHERE organization_id = $1 AND requester = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(requester.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ExpenseRequest::try_from).collect()
    }
}

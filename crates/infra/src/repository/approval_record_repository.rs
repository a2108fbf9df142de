//! # ApprovalRecordRepository
//!
//! 承認レコード（チェーンの各レベルにおける承認者の判断単位）の永続化を
//! 担当するリポジトリ。
//!
//! ## 二重判断の防止
//!
//! 判断の確定は `WHERE status = 'pending'` 付きの条件付き UPDATE で行う。
//! 影響行数が 0 の場合は既に判断済みとみなして `InfraError::Conflict` を
//! 返し、同一レコードへの並行判断を正確に一件だけ成立させる。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seisan_domain::{
    chain::ApproverKind,
    employee::UserId,
    money::CategoryAmounts,
    request::{
        ApprovalRecord,
        ApprovalRecordId,
        ApprovalRecordRecord,
        ApprovalStatus,
        ExpenseRequestId,
    },
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// 承認レコードリポジトリトレイト
#[async_trait]
pub trait ApprovalRecordRepository: Send + Sync {
    /// 承認レコードを新規保存する
    async fn insert(
        &self,
        record: &ApprovalRecord,
        tx: &mut TxContext,
    ) -> Result<(), InfraError>;

    /// ID で承認レコードを取得する
    async fn find_by_id(
        &self,
        id: &ApprovalRecordId,
    ) -> Result<Option<ApprovalRecord>, InfraError>;

    /// 申請に紐づく承認レコード一覧を取得する（レベル順）
    async fn find_by_request(
        &self,
        request_id: &ExpenseRequestId,
    ) -> Result<Vec<ApprovalRecord>, InfraError>;

    /// 承認者の未決レコード一覧を取得する（作成日時の昇順）
    async fn find_pending_by_approver(
        &self,
        approver: &UserId,
    ) -> Result<Vec<ApprovalRecord>, InfraError>;

    /// 判断済みの内容を未決レコードに対して確定する
    ///
    /// `record` はドメイン層で判断を適用済みのレコード。DB 上で対応する行が
    /// まだ `pending` である場合のみ書き込む。
    ///
    /// # エラー
    ///
    /// - `InfraError::Conflict`: 行が既に判断済み（または存在しない）場合
    async fn decide_if_pending(
        &self,
        record: &ApprovalRecord,
        tx: &mut TxContext,
    ) -> Result<(), InfraError>;
}

/// DB の approval_records テーブルの行を表す中間構造体
#[derive(sqlx::FromRow)]
struct ApprovalRecordRow {
    id: Uuid,
    request_id: Uuid,
    level_order: i32,
    approver: Uuid,
    approver_kind: String,
    status: String,
    comment: Option<String>,
    modified_amounts: Option<serde_json::Value>,
    escalated: bool,
    message: Option<String>,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

impl TryFrom<ApprovalRecordRow> for ApprovalRecord {
    type Error = InfraError;

    fn try_from(row: ApprovalRecordRow) -> Result<Self, Self::Error> {
        let modified_amounts: Option<CategoryAmounts> = row
            .modified_amounts
            .map(serde_json::from_value)
            .transpose()?;

        ApprovalRecord::from_db(ApprovalRecordRecord {
            id: ApprovalRecordId::from_uuid(row.id),
            request_id: ExpenseRequestId::from_uuid(row.request_id),
            level_order: row.level_order as u32,
            approver: UserId::from_uuid(row.approver),
            approver_kind: row
                .approver_kind
                .parse::<ApproverKind>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            status: row
                .status
                .parse::<ApprovalStatus>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            comment: row.comment,
            modified_amounts,
            escalated: row.escalated,
            message: row.message,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

const SELECT_COLUMNS: &str = r#"
    id, request_id, level_order, approver, approver_kind,
    status, comment, modified_amounts, escalated, message,
    created_at, decided_at
"#;

/// PostgreSQL 実装
pub struct PostgresApprovalRecordRepository {
    pool: PgPool,
}

impl PostgresApprovalRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalRecordRepository for PostgresApprovalRecordRepository {
    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(record_id = %record.id(), request_id = %record.request_id())
    )]
    async fn insert(
        &self,
        record: &ApprovalRecord,
        tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        let modified_amounts = record
            .modified_amounts()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO approval_records (
                id, request_id, level_order, approver, approver_kind,
                status, comment, modified_amounts, escalated, message,
                created_at, decided_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id().as_uuid())
        .bind(record.request_id().as_uuid())
        .bind(record.level_order() as i32)
        .bind(record.approver().as_uuid())
        .bind(record.approver_kind().to_string())
        .bind(record.status().to_string())
        .bind(record.comment())
        .bind(modified_amounts)
        .bind(record.is_escalated())
        .bind(record.message())
        .bind(record.created_at())
        .bind(record.decided_at())
        .execute(&mut *tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(
        &self,
        id: &ApprovalRecordId,
    ) -> Result<Option<ApprovalRecord>, InfraError> {
        let row = sqlx::query_as::<_, ApprovalRecordRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM approval_records WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ApprovalRecord::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%request_id))]
    async fn find_by_request(
        &self,
        request_id: &ExpenseRequestId,
    ) -> Result<Vec<ApprovalRecord>, InfraError> {
        let rows = sqlx::query_as::<_, ApprovalRecordRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM approval_records
            WHERE request_id = $1
            ORDER BY level_order, created_at
            "#
        ))
        .bind(request_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ApprovalRecord::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%approver))]
    async fn find_pending_by_approver(
        &self,
        approver: &UserId,
    ) -> Result<Vec<ApprovalRecord>, InfraError> {
        let rows = sqlx::query_as::<_, ApprovalRecordRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM approval_records
            WHERE approver = $1 AND status = 'pending'
            ORDER BY created_at
            "#
        ))
        .bind(approver.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ApprovalRecord::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(record_id = %record.id()))]
    async fn decide_if_pending(
        &self,
        record: &ApprovalRecord,
        tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        let modified_amounts = record
            .modified_amounts()
            .map(serde_json::to_value)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE approval_records SET
                status = $1,
                comment = $2,
                modified_amounts = $3,
                decided_at = $4
            WHERE id = $5 AND status = 'pending'
            "#,
        )
        .bind(record.status().to_string())
        .bind(record.comment())
        .bind(modified_amounts)
        .bind(record.decided_at())
        .bind(record.id().as_uuid())
        .execute(&mut *tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict(
                "ApprovalRecord",
                record.id().to_string(),
            ));
        }

        Ok(())
    }
}

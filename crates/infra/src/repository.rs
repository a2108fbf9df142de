//! # リポジトリ実装
//!
//! ドメイン層のエンティティの永続化を担当するリポジトリトレイトと
//! PostgreSQL 実装を提供する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: トレイトをここで定義し、ユースケース層はトレイト経由で使用
//! - **データベース抽象化**: sqlx を使用し、PostgreSQL 固有の処理をカプセル化
//! - **テスタビリティ**: トレイト経由でモック可能な設計
//! - **条件付き更新**: 決裁・状態更新は `WHERE` 条件付き UPDATE で行い、
//!   0 行更新を競合として報告する

pub mod approval_chain_repository;
pub mod approval_record_repository;
pub mod employee_repository;
pub mod expense_request_repository;
pub mod policy_rule_repository;

pub use approval_chain_repository::{ApprovalChainRepository, PostgresApprovalChainRepository};
pub use approval_record_repository::{
    ApprovalRecordRepository,
    PostgresApprovalRecordRepository,
};
pub use employee_repository::{EmployeeRepository, PostgresEmployeeRepository};
pub use expense_request_repository::{
    ExpenseRequestRepository,
    PostgresExpenseRequestRepository,
};
pub use policy_rule_repository::{PolicyRuleRepository, PostgresPolicyRuleRepository};

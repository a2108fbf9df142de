//! # Seisan ドメイン層
//!
//! 承認チェーン解決・規程適合性評価エンジンの中核を担うドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! このクレートは DDD（ドメイン駆動設計）の原則に従い、以下を提供する:
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: ApprovalChain,
//!   ExpenseRequest）
//! - **値オブジェクト**: 識別子を持たない不変オブジェクト（例: Amount,
//!   PolicyViolation）
//! - **ドメインサービス**: エンティティに属さない純粋なロジック
//!   （チェーン選択・レベル解決・規程評価）
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! engine → infra → domain → shared
//! ```
//!
//! ドメイン層はインフラ層（DB、外部サービス）に一切依存しない。
//! チェーン解決と規程評価は取得済みデータ上の純粋関数で、I/O は
//! 呼び出し側の事前フェッチとして行われる。
//!
//! ## モジュール構成
//!
//! - [`error`] - ドメイン層で発生するエラーの定義
//! - [`chain`] - 承認チェーンの定義・割り当て・レベル解決
//! - [`policy`] - 規程ルールと適合性評価
//! - [`request`] - 申請の状態遷移と承認レコード
//!
//! ## 使用例
//!
//! ```rust
//! use seisan_domain::{DomainError, request::ExpenseRequestId};
//!
//! // 申請 ID の生成
//! let request_id = ExpenseRequestId::new();
//!
//! // ドメインエラーの生成
//! let error = DomainError::NotFound {
//!     entity_type: "ExpenseRequest",
//!     id:          "req-123".to_string(),
//! };
//! ```

#[macro_use]
mod macros;

pub mod chain;
pub mod clock;
pub mod employee;
pub mod error;
pub mod money;
pub mod organization;
pub mod policy;
pub mod request;
pub mod value_objects;

pub use error::DomainError;

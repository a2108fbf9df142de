//! # Seisan インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 設計方針
//!
//! このクレートはドメイン層のエンティティの永続化と外部への通知を担当する。
//! 外部システムの詳細をカプセル化し、ドメイン層をインフラの変更から保護する。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理とトランザクション制御
//! - **リポジトリ実装**: 申請・承認レコード・チェーン・規程・従業員の永続化
//! - **通知送信**: 承認イベントの関係者への通知（ベストエフォート）
//!
//! ## 依存関係
//!
//! ```text
//! engine → infra → domain → shared
//!             ↘      ↓
//!               shared
//! ```
//!
//! インフラ層は `domain` と `shared` に依存する。
//! ドメイン層はインフラ層に依存しない（依存性逆転の原則）。
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続・トランザクション管理
//! - [`error`] - インフラ層エラー定義
//! - [`repository`] - リポジトリ実装
//! - [`notification`] - 承認イベント通知
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use seisan_infra::{db, repository::ExpenseRequestRepository};
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::create_pool("postgres://localhost/seisan").await?;
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod notification;
pub mod repository;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::InfraError;

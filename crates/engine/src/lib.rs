//! # Seisan 承認エンジン
//!
//! 経費精算・出張申請の承認チェーン解決と規程準拠評価を担うエンジン層。
//!
//! ## 責務
//!
//! - **チェーン解決**: 申請者の等級と金額から適用する承認チェーンを選択し、
//!   各レベルの承認者を具体的なユーザーに解決する
//! - **規程評価**: カテゴリ別上限との照合、違反の検出と説明の要求
//! - **状態遷移の調停**: 提出・決裁・エスカレーション・再オープンを
//!   楽観的ロックと条件付き UPDATE の下で直列化する
//!
//! ## 依存関係
//!
//! ```text
//! engine → infra → domain → shared
//! ```
//!
//! エンジンはリポジトリと通知をトレイトオブジェクトとして受け取るため、
//! テストではインメモリモックに差し替えられる。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use seisan_engine::{ApprovalEngine, EngineContext, EngineError, SubmitInput};
//!
//! async fn submit(engine: &ApprovalEngine, ctx: &EngineContext) -> Result<(), EngineError> {
//!     let request_id = todo!();
//!     engine.submit(&request_id, SubmitInput::default(), ctx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod usecase;

pub use config::EngineConfig;
pub use context::EngineContext;
pub use error::EngineError;
pub use usecase::{
    ApprovalEngine,
    DecideInput,
    Decision,
    DecisionOutcome,
    EngineDeps,
    SubmitInput,
};

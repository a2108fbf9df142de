//! # 承認チェーン
//!
//! 申請に適用される承認レベルの順序列（チェーン）と、
//! その選択・解決ロジックを管理する。
//!
//! ## 概念モデル
//!
//! - **ApprovalChain**: 順序付き承認レベルのテンプレート（組織スコープ）
//! - **GradeChainAssignment**: 等級 × 金額レンジ → チェーンの割り当てルール
//! - **ChainLevelResolver**: チェーンの各レベルを具体的な承認者に解決する
//!
//! ## 使用例
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use seisan_domain::chain::{
//!     ApprovalChain, ApprovalChainId, ApprovalChainLevel, ApproverKind, NewApprovalChain,
//! };
//! use seisan_domain::{organization::OrganizationId, value_objects::ChainName};
//!
//! let chain = ApprovalChain::new(NewApprovalChain {
//!     id: ApprovalChainId::new(),
//!     organization_id: OrganizationId::new(),
//!     name: ChainName::new("標準承認チェーン")?,
//!     is_default: true,
//!     levels: vec![ApprovalChainLevel::direct_manager(1)],
//!     now: chrono::Utc::now(),
//! })?;
//! assert!(chain.is_default());
//! # Ok(())
//! # }
//! ```

mod assignment;
mod definition;
mod resolver;

pub use assignment::*;
pub use definition::*;
pub use resolver::*;

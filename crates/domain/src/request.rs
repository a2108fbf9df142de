//! # 申請
//!
//! 経費精算・出張申請の状態遷移と、レベルごとの承認レコードを管理する。
//!
//! ## 状態遷移
//!
//! ```text
//! draft ──┬─> pending_approval ──┬─> approved
//!         │         │           ├─> partially_approved
//! open ───┤         │           └─> rejected ──> open（経費精算のみ）
//!         │         └─（次レベルへ進行）
//!         └─> closed
//! ```
//!
//! 遷移表にない組み合わせは `DomainError::Conflict` として拒否される。

mod approval_record;
mod expense_request;

pub use approval_record::*;
pub use expense_request::*;

//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリモックリポジトリと
//! モックトランザクションマネージャー。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! seisan-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use seisan_domain::{
    chain::{ApprovalChain, ApprovalChainId, GradeChainAssignment},
    employee::{EmployeeGrade, EmployeeProfile, GradeId, UserId},
    organization::{OrganizationId, OrganizationRoster},
    policy::PolicyRule,
    request::{
        ApprovalRecord,
        ApprovalRecordId,
        ApprovalStatus,
        ExpenseRequest,
        ExpenseRequestId,
    },
    value_objects::Version,
};

use crate::{
    db::{TransactionManager, TxContext},
    error::InfraError,
    notification::{ApprovalEvent, NotificationDispatcher},
    repository::{
        ApprovalChainRepository,
        ApprovalRecordRepository,
        EmployeeRepository,
        ExpenseRequestRepository,
        PolicyRuleRepository,
    },
};

// ===== MockTransactionManager =====

/// モックトランザクションマネージャー
///
/// 実際の DB 接続を持たない `TxContext` を払い出す。
#[derive(Clone, Default)]
pub struct MockTransactionManager;

#[async_trait]
impl TransactionManager for MockTransactionManager {
    async fn begin(&self) -> Result<TxContext, InfraError> {
        Ok(TxContext::mock())
    }
}

// ===== MockApprovalChainRepository =====

#[derive(Clone, Default)]
pub struct MockApprovalChainRepository {
    chains: Arc<Mutex<Vec<ApprovalChain>>>,
    assignments: Arc<Mutex<Vec<GradeChainAssignment>>>,
}

impl MockApprovalChainRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chain(&self, chain: ApprovalChain) {
        self.chains.lock().unwrap().push(chain);
    }

    pub fn add_assignment(&self, assignment: GradeChainAssignment) {
        self.assignments.lock().unwrap().push(assignment);
    }
}

#[async_trait]
impl ApprovalChainRepository for MockApprovalChainRepository {
    async fn insert(&self, chain: &ApprovalChain, _tx: &mut TxContext) -> Result<(), InfraError> {
        self.chains.lock().unwrap().push(chain.clone());
        Ok(())
    }

    async fn update(&self, chain: &ApprovalChain, _tx: &mut TxContext) -> Result<(), InfraError> {
        let mut chains = self.chains.lock().unwrap();
        if let Some(pos) = chains.iter().position(|c| c.id() == chain.id()) {
            chains[pos] = chain.clone();
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ApprovalChainId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ApprovalChain>, InfraError> {
        Ok(self
            .chains
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id() == id && c.organization_id() == organization_id)
            .cloned())
    }

    async fn find_default_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<ApprovalChain>, InfraError> {
        Ok(self
            .chains
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.organization_id() == organization_id && c.is_active() && c.is_default())
            .min_by_key(|c| c.created_at())
            .cloned())
    }

    async fn find_assignments_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<GradeChainAssignment>, InfraError> {
        let chains = self.chains.lock().unwrap();
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.organization_id() == organization_id
                    && chains
                        .iter()
                        .any(|c| c.id() == a.chain_id() && c.is_active())
            })
            .cloned()
            .collect())
    }

    async fn insert_assignment(
        &self,
        assignment: &GradeChainAssignment,
        _tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        self.assignments.lock().unwrap().push(assignment.clone());
        Ok(())
    }
}

// ===== MockPolicyRuleRepository =====

#[derive(Clone, Default)]
pub struct MockPolicyRuleRepository {
    rules: Arc<Mutex<Vec<PolicyRule>>>,
}

impl MockPolicyRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&self, rule: PolicyRule) {
        self.rules.lock().unwrap().push(rule);
    }
}

#[async_trait]
impl PolicyRuleRepository for MockPolicyRuleRepository {
    async fn insert(&self, rule: &PolicyRule, _tx: &mut TxContext) -> Result<(), InfraError> {
        self.rules.lock().unwrap().push(rule.clone());
        Ok(())
    }

    async fn update(&self, rule: &PolicyRule, _tx: &mut TxContext) -> Result<(), InfraError> {
        let mut rules = self.rules.lock().unwrap();
        if let Some(pos) = rules.iter().position(|r| r.id() == rule.id()) {
            rules[pos] = rule.clone();
        }
        Ok(())
    }

    async fn find_active_by_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<PolicyRule>, InfraError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.organization_id() == organization_id && r.is_active())
            .cloned()
            .collect())
    }
}

// ===== MockEmployeeRepository =====

#[derive(Clone, Default)]
pub struct MockEmployeeRepository {
    profiles: Arc<Mutex<Vec<EmployeeProfile>>>,
    roster: Arc<Mutex<OrganizationRoster>>,
    grades: Arc<Mutex<Vec<EmployeeGrade>>>,
}

impl MockEmployeeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, profile: EmployeeProfile) {
        self.profiles.lock().unwrap().push(profile);
    }

    pub fn set_roster(&self, roster: OrganizationRoster) {
        *self.roster.lock().unwrap() = roster;
    }
}

#[async_trait]
impl EmployeeRepository for MockEmployeeRepository {
    async fn find_profile(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<EmployeeProfile>, InfraError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| &p.user_id == user_id && &p.organization_id == organization_id)
            .cloned())
    }

    async fn find_roster(
        &self,
        _organization_id: &OrganizationId,
    ) -> Result<OrganizationRoster, InfraError> {
        Ok(self.roster.lock().unwrap().clone())
    }

    async fn insert_grade(
        &self,
        grade: &EmployeeGrade,
        _tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        self.grades.lock().unwrap().push(grade.clone());
        Ok(())
    }

    async fn update_grade(
        &self,
        grade: &EmployeeGrade,
        _tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        let mut grades = self.grades.lock().unwrap();
        if let Some(pos) = grades.iter().position(|g| g.id() == grade.id()) {
            grades[pos] = grade.clone();
        }
        Ok(())
    }

    async fn find_grade_by_id(
        &self,
        id: &GradeId,
        organization_id: &OrganizationId,
    ) -> Result<Option<EmployeeGrade>, InfraError> {
        Ok(self
            .grades
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id() == id && g.organization_id() == organization_id)
            .cloned())
    }
}

// ===== MockExpenseRequestRepository =====

#[derive(Clone, Default)]
pub struct MockExpenseRequestRepository {
    requests: Arc<Mutex<Vec<ExpenseRequest>>>,
}

impl MockExpenseRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&self, request: ExpenseRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

#[async_trait]
impl ExpenseRequestRepository for MockExpenseRequestRepository {
    async fn insert(
        &self,
        request: &ExpenseRequest,
        _tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn update(
        &self,
        request: &ExpenseRequest,
        expected_version: Version,
        _tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        let mut requests = self.requests.lock().unwrap();
        match requests.iter().position(|r| r.id() == request.id()) {
            Some(pos) if requests[pos].version() == expected_version => {
                requests[pos] = request.clone();
                Ok(())
            }
            _ => Err(InfraError::conflict(
                "ExpenseRequest",
                request.id().to_string(),
            )),
        }
    }

    async fn find_by_id(
        &self,
        id: &ExpenseRequestId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ExpenseRequest>, InfraError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id() == id && r.organization_id() == organization_id)
            .cloned())
    }

    async fn find_by_requester(
        &self,
        organization_id: &OrganizationId,
        requester: &UserId,
    ) -> Result<Vec<ExpenseRequest>, InfraError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.organization_id() == organization_id && r.requester() == requester)
            .cloned()
            .collect())
    }
}

// ===== MockApprovalRecordRepository =====

#[derive(Clone, Default)]
pub struct MockApprovalRecordRepository {
    records: Arc<Mutex<Vec<ApprovalRecord>>>,
}

impl MockApprovalRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&self, record: ApprovalRecord) {
        self.records.lock().unwrap().push(record);
    }
}

#[async_trait]
impl ApprovalRecordRepository for MockApprovalRecordRepository {
    async fn insert(&self, record: &ApprovalRecord, _tx: &mut TxContext) -> Result<(), InfraError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ApprovalRecordId,
    ) -> Result<Option<ApprovalRecord>, InfraError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id() == id)
            .cloned())
    }

    async fn find_by_request(
        &self,
        request_id: &ExpenseRequestId,
    ) -> Result<Vec<ApprovalRecord>, InfraError> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.request_id() == request_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.level_order(), r.created_at()));
        Ok(records)
    }

    async fn find_pending_by_approver(
        &self,
        approver: &UserId,
    ) -> Result<Vec<ApprovalRecord>, InfraError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.approver() == approver && r.status() == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn decide_if_pending(
        &self,
        record: &ApprovalRecord,
        _tx: &mut TxContext,
    ) -> Result<(), InfraError> {
        let mut records = self.records.lock().unwrap();
        match records.iter().position(|r| r.id() == record.id()) {
            Some(pos) if records[pos].status() == ApprovalStatus::Pending => {
                records[pos] = record.clone();
                Ok(())
            }
            _ => Err(InfraError::conflict(
                "ApprovalRecord",
                record.id().to_string(),
            )),
        }
    }
}

// ===== MockNotificationDispatcher =====

/// 通知イベントを記録するだけのモックディスパッチャ
#[derive(Clone, Default)]
pub struct MockNotificationDispatcher {
    events: Arc<Mutex<Vec<ApprovalEvent>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockNotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録されたイベントを取得する
    pub fn events(&self) -> Vec<ApprovalEvent> {
        self.events.lock().unwrap().clone()
    }

    /// 以後の `dispatch` を失敗させる
    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl NotificationDispatcher for MockNotificationDispatcher {
    async fn dispatch(&self, event: &ApprovalEvent) -> Result<(), InfraError> {
        if *self.fail.lock().unwrap() {
            return Err(InfraError::notification_dispatch(
                "モックに失敗が指示されています".to_string(),
            ));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

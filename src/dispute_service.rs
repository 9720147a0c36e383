//! Dispute Engine - owns dispute filing, messaging, escalation, resolution
//!
//! A dispute binds to exactly one escrow and at most one dispute per
//! escrow may be active (`OPEN`/`INVESTIGATING`) at a time; the
//! check-then-insert runs under the dispute store write lock. Creating a
//! dispute flips the parent escrow to `DISPUTED`, and resolving one maps
//! the chosen outcome back onto the escrow.

use crate::error::EscrowError;
use crate::escrow_service::EscrowService;
use crate::identity::UserDirectory;
use crate::models::{
    derive_priority, derive_risk, Dispute, DisputeContext, DisputeFlags, DisputeInfo,
    DisputeMessage, DisputeStatus, DisputeTimeline, DisputeType, Evidence, Resolution,
    ResolutionType, SenderRole,
};
use crate::{validation, EscrowResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Configuration for the dispute engine
#[derive(Debug, Clone)]
pub struct DisputeServiceConfig {
    pub max_subject_len: usize,
    pub max_description_len: usize,
    pub max_message_len: usize,
    pub max_evidence_notes_len: usize,
    pub max_resolution_description_len: usize,
    pub max_additional_terms_len: usize,
}

impl Default for DisputeServiceConfig {
    fn default() -> Self {
        Self {
            max_subject_len: 200,
            max_description_len: 2000,
            max_message_len: 2000,
            max_evidence_notes_len: 1000,
            max_resolution_description_len: 1000,
            max_additional_terms_len: 500,
        }
    }
}

/// Dispute filing request
#[derive(Debug, Clone)]
pub struct CreateDisputeRequest {
    pub escrow_id: String,
    pub initiator_id: String,
    pub dispute_type: DisputeType,
    pub subject: String,
    pub description: String,
    pub evidence: Option<Evidence>,
}

/// Dispute resolution request
#[derive(Debug, Clone)]
pub struct ResolveDisputeRequest {
    pub dispute_id: String,
    pub resolver_id: String,
    pub resolution_type: ResolutionType,
    pub description: String,
    pub refund_amount: Option<String>,
    pub additional_terms: Option<String>,
}

/// Outcome of the `can_user_create_dispute` predicate: a rejection carries
/// a reason string instead of an error, for UI gating
#[derive(Debug, Clone)]
pub struct DisputeEligibility {
    pub can_create: bool,
    pub reason: Option<String>,
}

impl DisputeEligibility {
    fn allowed() -> Self {
        Self {
            can_create: true,
            reason: None,
        }
    }

    fn rejected<S: Into<String>>(reason: S) -> Self {
        Self {
            can_create: false,
            reason: Some(reason.into()),
        }
    }
}

/// Main dispute engine
pub struct DisputeService {
    config: DisputeServiceConfig,
    disputes: Arc<RwLock<HashMap<String, Dispute>>>,
    escrows: Arc<EscrowService>,
    users: Arc<UserDirectory>,
}

impl DisputeService {
    pub fn new(
        config: DisputeServiceConfig,
        escrows: Arc<EscrowService>,
        users: Arc<UserDirectory>,
    ) -> Self {
        Self {
            config,
            disputes: Arc::new(RwLock::new(HashMap::new())),
            escrows,
            users,
        }
    }

    /// File a dispute against a funded (or already disputed) escrow
    pub async fn create_dispute(&self, request: CreateDisputeRequest) -> EscrowResult<Dispute> {
        validation::validate_text("Subject", &request.subject, self.config.max_subject_len)?;
        validation::validate_text(
            "Description",
            &request.description,
            self.config.max_description_len,
        )?;
        let evidence = request.evidence.unwrap_or_default();
        validation::validate_optional_text(
            "Evidence notes",
            &evidence.notes,
            self.config.max_evidence_notes_len,
        )?;

        let escrow = self.escrows.load(&request.escrow_id).await?;
        if escrow.status == crate::models::EscrowStatus::Completed {
            return Err(EscrowError::invalid_state(
                format!("escrow {}", escrow.escrow_id),
                escrow.status.to_string(),
                "cannot dispute completed escrows".to_string(),
            ));
        }
        if escrow.status == crate::models::EscrowStatus::Created {
            return Err(EscrowError::invalid_state(
                format!("escrow {}", escrow.escrow_id),
                escrow.status.to_string(),
                "cannot dispute unfunded escrows".to_string(),
            ));
        }

        self.users.find_user(&request.initiator_id).await?;
        let initiator_role = escrow.role_of(&request.initiator_id).ok_or_else(|| {
            EscrowError::forbidden("Only escrow participants can create disputes")
        })?;
        let respondent_role = initiator_role.counterpart();
        let respondent = escrow
            .counterpart_of(&request.initiator_id)
            .unwrap_or_default()
            .to_string();

        let amount = validation::parse_amount(&escrow.amount)?;
        let now = Utc::now();
        let dispute_id = validation::new_dispute_id();

        // Check-then-insert under the write lock so concurrent filings on
        // the same escrow cannot both pass the uniqueness check.
        let dispute = {
            let mut disputes = self.disputes.write().await;

            if disputes
                .values()
                .any(|d| d.escrow_id == request.escrow_id && d.status.is_active())
            {
                return Err(EscrowError::conflict(
                    "An active dispute already exists for this escrow",
                ));
            }

            let previous_disputes = disputes
                .values()
                .filter(|d| d.is_participant(&request.initiator_id))
                .count();

            let (priority, amount_requires_admin) = derive_priority(amount);
            let (risk_level, history_requires_admin) = derive_risk(previous_disputes);

            let mut dispute = Dispute {
                dispute_id: dispute_id.clone(),
                escrow_id: request.escrow_id.clone(),
                initiator: request.initiator_id.clone(),
                initiator_role,
                respondent,
                respondent_role,
                dispute_type: request.dispute_type,
                status: DisputeStatus::Open,
                priority,
                subject: request.subject.clone(),
                description: request.description,
                evidence,
                timeline: DisputeTimeline {
                    created_at: now,
                    first_response_at: None,
                    escalated_at: None,
                    resolved_at: None,
                    closed_at: None,
                    last_activity_at: now,
                },
                resolution: None,
                messages: Vec::new(),
                context: DisputeContext {
                    transaction_amount: escrow.amount.clone(),
                    escrow_status: escrow.status,
                    communication_history: escrow.messages.len(),
                    previous_disputes,
                    risk_level,
                },
                flags: DisputeFlags {
                    urgent: priority == crate::models::DisputePriority::Urgent,
                    escalated: false,
                    requires_admin: amount_requires_admin || history_requires_admin,
                    fraud_suspected: false,
                    auto_resolvable: request.dispute_type == DisputeType::CommunicationIssue,
                },
            };

            dispute.push_message(DisputeMessage {
                sender: request.initiator_id.clone(),
                sender_role: initiator_role.into(),
                message: format!("Dispute created: {}", request.subject),
                attachments: vec![],
                timestamp: now,
                is_internal: false,
            });

            disputes.insert(dispute_id.clone(), dispute.clone());
            dispute
        };

        // Flip the parent escrow; on a lost race (escrow completed in the
        // meantime) withdraw the dispute so no partial mutation survives.
        let mark = self
            .escrows
            .mark_disputed(
                &request.escrow_id,
                DisputeInfo {
                    dispute_id: dispute_id.clone(),
                    reason: request.subject,
                    initiator: initiator_role,
                    status: DisputeStatus::Open,
                    created_at: now,
                },
            )
            .await;
        if let Err(err) = mark {
            self.disputes.write().await.remove(&dispute_id);
            return Err(err);
        }

        self.users
            .record_disputed_transaction(&escrow.buyer, &escrow.seller)
            .await?;

        info!(
            dispute_id = %dispute.dispute_id,
            escrow_id = %dispute.escrow_id,
            initiator = %dispute.initiator_role,
            priority = ?dispute.priority,
            "Dispute created"
        );
        Ok(dispute)
    }

    /// Append a message to an active dispute
    pub async fn add_message(
        &self,
        dispute_id: &str,
        sender_id: &str,
        text: &str,
        attachments: Vec<String>,
        is_internal: bool,
    ) -> EscrowResult<Dispute> {
        validation::validate_text("Message", text, self.config.max_message_len)?;

        let mut disputes = self.disputes.write().await;
        let dispute = disputes
            .get_mut(dispute_id)
            .ok_or_else(|| EscrowError::not_found(format!("Dispute {} not found", dispute_id)))?;

        if dispute.status.is_terminal() {
            return Err(EscrowError::invalid_state(
                format!("dispute {}", dispute_id),
                dispute.status.to_string(),
                "cannot add messages to resolved or closed disputes".to_string(),
            ));
        }

        let sender_role = dispute
            .sender_role_of(sender_id)
            .ok_or_else(|| EscrowError::forbidden("Only dispute participants can add messages"))?;

        dispute.push_message(DisputeMessage {
            sender: sender_id.to_string(),
            sender_role,
            message: text.to_string(),
            attachments,
            timestamp: Utc::now(),
            is_internal,
        });

        Ok(dispute.clone())
    }

    /// Resolve a dispute, mapping the outcome onto the parent escrow:
    /// favor-buyer/partial-refund refund it, favor-seller/mediated-agreement
    /// complete it, no-resolution leaves it disputed.
    pub async fn resolve_dispute(&self, request: ResolveDisputeRequest) -> EscrowResult<Dispute> {
        validation::validate_text(
            "Resolution description",
            &request.description,
            self.config.max_resolution_description_len,
        )?;
        if let Some(refund) = request.refund_amount.as_deref() {
            validation::parse_amount(refund)?;
        }
        if let Some(terms) = request.additional_terms.as_deref() {
            validation::validate_optional_text(
                "Additional terms",
                terms,
                self.config.max_additional_terms_len,
            )?;
        }
        self.users.find_user(&request.resolver_id).await?;

        let now = Utc::now();
        let (resolved, escrow_id) = {
            let mut disputes = self.disputes.write().await;
            let dispute = disputes.get_mut(&request.dispute_id).ok_or_else(|| {
                EscrowError::not_found(format!("Dispute {} not found", request.dispute_id))
            })?;

            if dispute.status.is_terminal() {
                return Err(EscrowError::invalid_state(
                    format!("dispute {}", request.dispute_id),
                    dispute.status.to_string(),
                    "dispute is already resolved or closed".to_string(),
                ));
            }

            dispute.status = DisputeStatus::Resolved;
            dispute.resolution = Some(Resolution {
                resolution_type: request.resolution_type,
                description: request.description.clone(),
                refund_amount: request.refund_amount.clone(),
                additional_terms: request.additional_terms.clone(),
                resolved_by: request.resolver_id.clone(),
                resolved_at: now,
            });
            dispute.timeline.resolved_at = Some(now);
            dispute.push_message(DisputeMessage {
                sender: request.resolver_id.clone(),
                sender_role: SenderRole::Admin,
                message: format!(
                    "Dispute resolved: {:?} - {}",
                    request.resolution_type, request.description
                ),
                attachments: vec![],
                timestamp: now,
                is_internal: false,
            });

            (dispute.clone(), dispute.escrow_id.clone())
        };

        self.escrows
            .apply_resolution(&escrow_id, request.resolution_type.escrow_outcome())
            .await?;

        info!(
            dispute_id = %resolved.dispute_id,
            resolution = ?request.resolution_type,
            "Dispute resolved"
        );
        Ok(resolved)
    }

    /// Escalate a dispute: priority is raised to at least high, admin
    /// review becomes mandatory
    pub async fn escalate_dispute(
        &self,
        dispute_id: &str,
        caller_id: &str,
        reason: &str,
    ) -> EscrowResult<Dispute> {
        validation::validate_text("Escalation reason", reason, self.config.max_message_len)?;

        let mut disputes = self.disputes.write().await;
        let dispute = disputes
            .get_mut(dispute_id)
            .ok_or_else(|| EscrowError::not_found(format!("Dispute {} not found", dispute_id)))?;

        let sender_role = dispute
            .sender_role_of(caller_id)
            .ok_or_else(|| EscrowError::forbidden("Only dispute participants can escalate"))?;

        if dispute.flags.escalated {
            return Err(EscrowError::invalid_state(
                format!("dispute {}", dispute_id),
                dispute.status.to_string(),
                "dispute is already escalated".to_string(),
            ));
        }

        let now = Utc::now();
        dispute.flags.escalated = true;
        dispute.flags.requires_admin = true;
        dispute.priority = dispute.priority.max(crate::models::DisputePriority::High);
        dispute.timeline.escalated_at = Some(now);
        dispute.push_message(DisputeMessage {
            sender: caller_id.to_string(),
            sender_role,
            message: format!("Dispute escalated: {}", reason),
            attachments: vec![],
            timestamp: now,
            is_internal: false,
        });

        info!(dispute_id, priority = ?dispute.priority, "Dispute escalated");
        Ok(dispute.clone())
    }

    /// Pure predicate mirroring `create_dispute`'s preconditions, for UI
    /// gating; rejections come back as a reason string, not an error
    pub async fn can_user_create_dispute(
        &self,
        escrow_id: &str,
        user_id: &str,
    ) -> DisputeEligibility {
        let escrow = match self.escrows.load(escrow_id).await {
            Ok(escrow) => escrow,
            Err(_) => return DisputeEligibility::rejected("Escrow not found"),
        };

        if !escrow.is_participant(user_id) {
            return DisputeEligibility::rejected("Only escrow participants can create disputes");
        }
        if escrow.status == crate::models::EscrowStatus::Completed {
            return DisputeEligibility::rejected("Cannot dispute completed escrows");
        }
        if escrow.status == crate::models::EscrowStatus::Created {
            return DisputeEligibility::rejected("Cannot dispute unfunded escrows");
        }

        let disputes = self.disputes.read().await;
        if disputes
            .values()
            .any(|d| d.escrow_id == escrow_id && d.status.is_active())
        {
            return DisputeEligibility::rejected(
                "An active dispute already exists for this escrow",
            );
        }

        DisputeEligibility::allowed()
    }

    /// Fetch a dispute by id
    pub async fn get_dispute(&self, dispute_id: &str) -> EscrowResult<Dispute> {
        self.disputes
            .read()
            .await
            .get(dispute_id)
            .cloned()
            .ok_or_else(|| EscrowError::not_found(format!("Dispute {} not found", dispute_id)))
    }

    /// All disputes a user participates in, most recently active first
    pub async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<DisputeStatus>,
    ) -> Vec<Dispute> {
        let disputes = self.disputes.read().await;
        let mut matching: Vec<Dispute> = disputes
            .values()
            .filter(|d| d.is_participant(user_id))
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timeline.last_activity_at.cmp(&a.timeline.last_activity_at));
        matching
    }

    /// All disputes ever filed against an escrow, newest first
    pub async fn list_for_escrow(&self, escrow_id: &str) -> Vec<Dispute> {
        let disputes = self.disputes.read().await;
        let mut matching: Vec<Dispute> = disputes
            .values()
            .filter(|d| d.escrow_id == escrow_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timeline.created_at.cmp(&a.timeline.created_at));
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainClient;
    use crate::escrow_service::{CreateEscrowRequest, EscrowServiceConfig};
    use crate::identity::UserProfile;
    use crate::models::{DisputePriority, EscrowStatus, RiskLevel};

    struct Fixture {
        escrows: Arc<EscrowService>,
        disputes: DisputeService,
    }

    async fn setup() -> Fixture {
        let users = Arc::new(UserDirectory::new());
        for (id, seed) in [("buyer", "b"), ("seller", "s"), ("arbiter", "d"), ("other", "o")] {
            users
                .register(UserProfile::new(
                    id.to_string(),
                    format!("user_{}", id),
                    format!("lsk{}", seed.repeat(38)),
                    "cd".repeat(32),
                ))
                .await
                .unwrap();
        }
        let escrows = Arc::new(EscrowService::new(
            EscrowServiceConfig::default(),
            users.clone(),
            Arc::new(ChainClient::default()),
        ));
        let disputes = DisputeService::new(
            DisputeServiceConfig::default(),
            escrows.clone(),
            users.clone(),
        );
        Fixture { escrows, disputes }
    }

    async fn funded_escrow(fixture: &Fixture, amount: &str) -> String {
        let escrow = fixture
            .escrows
            .create_escrow(CreateEscrowRequest {
                buyer_id: "buyer".to_string(),
                seller_id: "seller".to_string(),
                amount: amount.to_string(),
                description: "A widget".to_string(),
                terms: "Ship soon".to_string(),
                product_info: None,
                delivery_info: None,
                auto_release_hours: None,
            })
            .await
            .unwrap();
        fixture
            .escrows
            .fund_escrow(&escrow.escrow_id, "buyer")
            .await
            .unwrap();
        escrow.escrow_id
    }

    fn dispute_request(escrow_id: &str, initiator: &str) -> CreateDisputeRequest {
        CreateDisputeRequest {
            escrow_id: escrow_id.to_string(),
            initiator_id: initiator.to_string(),
            dispute_type: DisputeType::DeliveryIssue,
            subject: "Item never arrived".to_string(),
            description: "Two weeks past the delivery window".to_string(),
            evidence: None,
        }
    }

    #[tokio::test]
    async fn test_create_dispute_flips_escrow() {
        let fixture = setup().await;
        let escrow_id = funded_escrow(&fixture, "100000000").await;

        let dispute = fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "buyer"))
            .await
            .unwrap();

        assert!(validation::is_valid_dispute_id(&dispute.dispute_id));
        assert_eq!(dispute.status, DisputeStatus::Open);
        assert_eq!(dispute.initiator_role, crate::models::Role::Buyer);
        assert_eq!(dispute.respondent, "seller");
        assert_eq!(dispute.priority, DisputePriority::Low);
        assert_eq!(dispute.context.risk_level, RiskLevel::Low);
        assert_eq!(dispute.messages.len(), 1);
        assert!(dispute.messages[0].message.starts_with("Dispute created"));

        let escrow = fixture.escrows.load(&escrow_id).await.unwrap();
        assert_eq!(escrow.status, EscrowStatus::Disputed);
        assert!(escrow.timeline.disputed_at.is_some());
        let info = escrow.dispute_info.unwrap();
        assert_eq!(info.dispute_id, dispute.dispute_id);
        assert_eq!(info.initiator, crate::models::Role::Buyer);
    }

    #[tokio::test]
    async fn test_second_active_dispute_conflicts() {
        let fixture = setup().await;
        let escrow_id = funded_escrow(&fixture, "100000000").await;

        fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "buyer"))
            .await
            .unwrap();

        assert!(matches!(
            fixture
                .disputes
                .create_dispute(dispute_request(&escrow_id, "seller"))
                .await
                .unwrap_err(),
            EscrowError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_dispute_rejects_wrong_states_and_outsiders() {
        let fixture = setup().await;

        // unfunded
        let created = fixture
            .escrows
            .create_escrow(CreateEscrowRequest {
                buyer_id: "buyer".to_string(),
                seller_id: "seller".to_string(),
                amount: "100".to_string(),
                description: "d".to_string(),
                terms: "t".to_string(),
                product_info: None,
                delivery_info: None,
                auto_release_hours: None,
            })
            .await
            .unwrap();
        assert!(matches!(
            fixture
                .disputes
                .create_dispute(dispute_request(&created.escrow_id, "buyer"))
                .await
                .unwrap_err(),
            EscrowError::InvalidState { .. }
        ));

        // completed
        let escrow_id = funded_escrow(&fixture, "100").await;
        fixture
            .escrows
            .release_escrow(&escrow_id, "buyer", None)
            .await
            .unwrap();
        assert!(matches!(
            fixture
                .disputes
                .create_dispute(dispute_request(&escrow_id, "buyer"))
                .await
                .unwrap_err(),
            EscrowError::InvalidState { .. }
        ));

        // outsider
        let escrow_id = funded_escrow(&fixture, "100").await;
        assert!(matches!(
            fixture
                .disputes
                .create_dispute(dispute_request(&escrow_id, "other"))
                .await
                .unwrap_err(),
            EscrowError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn test_priority_follows_amount() {
        let fixture = setup().await;

        let escrow_id = funded_escrow(&fixture, "20000000000000").await; // > 10^13
        let dispute = fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "buyer"))
            .await
            .unwrap();
        assert_eq!(dispute.priority, DisputePriority::Urgent);
        assert!(dispute.flags.urgent);
        assert!(dispute.flags.requires_admin);
    }

    #[tokio::test]
    async fn test_resolution_outcomes() {
        let fixture = setup().await;

        // favor_buyer refunds
        let escrow_id = funded_escrow(&fixture, "100000000").await;
        let dispute = fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "buyer"))
            .await
            .unwrap();
        let resolved = fixture
            .disputes
            .resolve_dispute(ResolveDisputeRequest {
                dispute_id: dispute.dispute_id.clone(),
                resolver_id: "arbiter".to_string(),
                resolution_type: ResolutionType::FavorBuyer,
                description: "Seller never shipped".to_string(),
                refund_amount: Some("100000000".to_string()),
                additional_terms: None,
            })
            .await
            .unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert!(resolved.resolution.is_some());
        assert!(resolved
            .messages
            .last()
            .unwrap()
            .message
            .starts_with("Dispute resolved"));
        let escrow = fixture.escrows.load(&escrow_id).await.unwrap();
        assert_eq!(escrow.status, EscrowStatus::Refunded);
        assert!(escrow.timeline.refunded_at.is_some());
        assert_eq!(
            escrow.dispute_info.unwrap().status,
            DisputeStatus::Resolved
        );

        // favor_seller completes
        let escrow_id = funded_escrow(&fixture, "100000000").await;
        let dispute = fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "seller"))
            .await
            .unwrap();
        fixture
            .disputes
            .resolve_dispute(ResolveDisputeRequest {
                dispute_id: dispute.dispute_id.clone(),
                resolver_id: "arbiter".to_string(),
                resolution_type: ResolutionType::FavorSeller,
                description: "Buyer confirmed delivery".to_string(),
                refund_amount: None,
                additional_terms: None,
            })
            .await
            .unwrap();
        let escrow = fixture.escrows.load(&escrow_id).await.unwrap();
        assert_eq!(escrow.status, EscrowStatus::Completed);

        // double-resolve is InvalidState
        assert!(matches!(
            fixture
                .disputes
                .resolve_dispute(ResolveDisputeRequest {
                    dispute_id: dispute.dispute_id,
                    resolver_id: "arbiter".to_string(),
                    resolution_type: ResolutionType::FavorBuyer,
                    description: "again".to_string(),
                    refund_amount: None,
                    additional_terms: None,
                })
                .await
                .unwrap_err(),
            EscrowError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn test_no_resolution_leaves_escrow_disputed() {
        let fixture = setup().await;
        let escrow_id = funded_escrow(&fixture, "100000000").await;
        let dispute = fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "buyer"))
            .await
            .unwrap();

        fixture
            .disputes
            .resolve_dispute(ResolveDisputeRequest {
                dispute_id: dispute.dispute_id,
                resolver_id: "arbiter".to_string(),
                resolution_type: ResolutionType::NoResolution,
                description: "Parties stopped responding".to_string(),
                refund_amount: None,
                additional_terms: None,
            })
            .await
            .unwrap();

        let escrow = fixture.escrows.load(&escrow_id).await.unwrap();
        assert_eq!(escrow.status, EscrowStatus::Disputed);

        // the first dispute is terminal, so a fresh one may be filed
        let second = fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "seller"))
            .await
            .unwrap();
        assert_eq!(second.context.previous_disputes, 1);
        assert_eq!(second.context.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_messages_on_disputes() {
        let fixture = setup().await;
        let escrow_id = funded_escrow(&fixture, "100000000").await;
        let dispute = fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "buyer"))
            .await
            .unwrap();
        assert!(dispute.timeline.first_response_at.is_none());

        assert!(matches!(
            fixture
                .disputes
                .add_message(&dispute.dispute_id, "other", "hi", vec![], false)
                .await
                .unwrap_err(),
            EscrowError::Forbidden(_)
        ));

        let updated = fixture
            .disputes
            .add_message(
                &dispute.dispute_id,
                "seller",
                "The courier lost it",
                vec!["https://example.com/receipt.png".to_string()],
                false,
            )
            .await
            .unwrap();
        assert_eq!(updated.messages.len(), 2);
        assert!(updated.timeline.first_response_at.is_some());

        fixture
            .disputes
            .resolve_dispute(ResolveDisputeRequest {
                dispute_id: dispute.dispute_id.clone(),
                resolver_id: "arbiter".to_string(),
                resolution_type: ResolutionType::FavorBuyer,
                description: "refund".to_string(),
                refund_amount: None,
                additional_terms: None,
            })
            .await
            .unwrap();

        // closed to new messages once resolved
        assert!(matches!(
            fixture
                .disputes
                .add_message(&dispute.dispute_id, "buyer", "thanks", vec![], false)
                .await
                .unwrap_err(),
            EscrowError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn test_escalation() {
        let fixture = setup().await;
        let escrow_id = funded_escrow(&fixture, "100000000").await;
        let dispute = fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "buyer"))
            .await
            .unwrap();
        assert_eq!(dispute.priority, DisputePriority::Low);

        assert!(matches!(
            fixture
                .disputes
                .escalate_dispute(&dispute.dispute_id, "other", "hurry up")
                .await
                .unwrap_err(),
            EscrowError::Forbidden(_)
        ));

        let escalated = fixture
            .disputes
            .escalate_dispute(&dispute.dispute_id, "buyer", "No reply for a week")
            .await
            .unwrap();
        assert!(escalated.flags.escalated);
        assert!(escalated.flags.requires_admin);
        assert_eq!(escalated.priority, DisputePriority::High);
        assert!(escalated.timeline.escalated_at.is_some());

        assert!(matches!(
            fixture
                .disputes
                .escalate_dispute(&dispute.dispute_id, "buyer", "again")
                .await
                .unwrap_err(),
            EscrowError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn test_eligibility_predicate() {
        let fixture = setup().await;
        let escrow_id = funded_escrow(&fixture, "100000000").await;

        let ok = fixture
            .disputes
            .can_user_create_dispute(&escrow_id, "buyer")
            .await;
        assert!(ok.can_create);
        assert!(ok.reason.is_none());

        let outsider = fixture
            .disputes
            .can_user_create_dispute(&escrow_id, "other")
            .await;
        assert!(!outsider.can_create);

        let missing = fixture
            .disputes
            .can_user_create_dispute("ESC_ZZZZZZZZ", "buyer")
            .await;
        assert_eq!(missing.reason.as_deref(), Some("Escrow not found"));

        fixture
            .disputes
            .create_dispute(dispute_request(&escrow_id, "buyer"))
            .await
            .unwrap();
        let blocked = fixture
            .disputes
            .can_user_create_dispute(&escrow_id, "seller")
            .await;
        assert_eq!(
            blocked.reason.as_deref(),
            Some("An active dispute already exists for this escrow")
        );
    }

    #[tokio::test]
    async fn test_concurrent_filings_one_wins() {
        let fixture = setup().await;
        let escrow_id = funded_escrow(&fixture, "100000000").await;
        let disputes = Arc::new(fixture.disputes);

        let a = {
            let disputes = disputes.clone();
            let req = dispute_request(&escrow_id, "buyer");
            tokio::spawn(async move { disputes.create_dispute(req).await })
        };
        let b = {
            let disputes = disputes.clone();
            let req = dispute_request(&escrow_id, "seller");
            tokio::spawn(async move { disputes.create_dispute(req).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EscrowError::Conflict(_)))));
    }
}

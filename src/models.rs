//! Core data models for the escrow platform
//!
//! This module contains the entity types, status state machines, and the
//! pure derivation functions (transition validation, dispute priority and
//! risk scoring, reputation tier thresholds) shared by the services.

use crate::error::EscrowError;
use crate::EscrowResult;
use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Escrow state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Agreement recorded, awaiting buyer funding
    Created,
    /// Buyer payment locked in escrow
    Funded,
    /// An active dispute suspends release
    Disputed,
    /// Funds released to the seller
    Completed,
    /// Funds returned to the buyer via dispute resolution
    Refunded,
    /// Expired without completion (time-based sweep, external)
    Expired,
}

impl EscrowStatus {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded | Self::Expired)
    }

    /// Check if this state allows funding
    pub fn can_fund(&self) -> bool {
        matches!(self, Self::Created)
    }

    /// Check if this state allows releasing
    pub fn can_release(&self) -> bool {
        matches!(self, Self::Funded)
    }

    /// Check if this state allows opening a dispute
    pub fn can_dispute(&self) -> bool {
        matches!(self, Self::Funded | Self::Disputed)
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Funded => "funded",
            Self::Disputed => "disputed",
            Self::Completed => "completed",
            Self::Refunded => "refunded",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Participant role within an escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    /// The counterpart role
    pub fn counterpart(&self) -> Role {
        match self {
            Self::Buyer => Self::Seller,
            Self::Seller => Self::Buyer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyer => f.write_str("buyer"),
            Self::Seller => f.write_str("seller"),
        }
    }
}

/// Author of a dispute message (participants plus the platform arbiter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Buyer,
    Seller,
    Admin,
}

impl From<Role> for SenderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Buyer => Self::Buyer,
            Role::Seller => Self::Seller,
        }
    }
}

/// Release conditions attached to an escrow at creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConditions {
    pub requires_buyer_approval: bool,
    pub requires_seller_confirmation: bool,
    pub auto_release_after_hours: Option<u32>,
    pub delivery_confirmation_required: bool,
}

/// Escrow lifecycle timestamps (append-only audit trail)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTimeline {
    pub created_at: DateTime<Utc>,
    pub funded_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Back-reference from an escrow to its open/resolved dispute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeInfo {
    pub dispute_id: String,
    pub reason: String,
    pub initiator: Role,
    pub status: DisputeStatus,
    pub created_at: DateTime<Utc>,
}

/// Entry in the escrow communication log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowMessage {
    pub sender: Role,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Optional product details captured at creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Optional delivery details captured at creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub method: String,
    pub address: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Escrow agreement between a buyer and a seller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    pub escrow_id: String,
    pub buyer: String,
    pub seller: String,

    // Amounts are decimal-digit strings in beddows
    pub amount: String,
    pub fee: String,

    pub status: EscrowStatus,
    pub description: String,
    pub terms: String,

    // Chain references (mock)
    pub contract_address: String,
    pub chain_transaction_id: Option<String>,

    pub release_conditions: ReleaseConditions,
    pub timeline: EscrowTimeline,
    pub dispute_info: Option<DisputeInfo>,

    pub product_info: Option<ProductInfo>,
    pub delivery_info: Option<DeliveryInfo>,
    pub messages: Vec<EscrowMessage>,
}

impl Escrow {
    /// Check whether a user is a party to this escrow
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.buyer == user_id || self.seller == user_id
    }

    /// The role a user plays in this escrow, if any
    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        if self.buyer == user_id {
            Some(Role::Buyer)
        } else if self.seller == user_id {
            Some(Role::Seller)
        } else {
            None
        }
    }

    /// The counterpart of a participant
    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        match self.role_of(user_id)? {
            Role::Buyer => Some(&self.seller),
            Role::Seller => Some(&self.buyer),
        }
    }

    /// Validate a status transition, returning `InvalidState` on any edge
    /// outside the state machine
    pub fn validate_transition(&self, to: EscrowStatus) -> EscrowResult<()> {
        if escrow_transition_allowed(self.status, to) {
            Ok(())
        } else {
            Err(EscrowError::invalid_state(
                format!("escrow {}", self.escrow_id),
                self.status.to_string(),
                format!("cannot transition to {}", to),
            ))
        }
    }
}

/// The escrow state machine:
/// `CREATED -> FUNDED -> {DISPUTED, COMPLETED}`,
/// `DISPUTED -> {COMPLETED, REFUNDED}`, any non-terminal state may expire.
pub fn escrow_transition_allowed(from: EscrowStatus, to: EscrowStatus) -> bool {
    use EscrowStatus::*;
    matches!(
        (from, to),
        (Created, Funded)
            | (Funded, Disputed)
            | (Funded, Completed)
            | (Disputed, Completed)
            | (Disputed, Refunded)
            | (Created, Expired)
            | (Funded, Expired)
            | (Disputed, Expired)
    )
}

/// Dispute state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl DisputeStatus {
    /// Active disputes block new ones on the same escrow
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::Investigating)
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Dispute category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    DeliveryIssue,
    ProductMismatch,
    PaymentDispute,
    CommunicationIssue,
    QualityIssue,
    Other,
}

/// Dispute priority, derived from transaction amount (never caller-set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputePriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Initiator risk band, derived from prior-dispute count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Outcome chosen when a dispute is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    FavorBuyer,
    FavorSeller,
    PartialRefund,
    MediatedAgreement,
    NoResolution,
}

impl ResolutionType {
    /// The escrow status implied by this outcome. `None` leaves the escrow
    /// disputed (no-resolution outcomes).
    pub fn escrow_outcome(&self) -> Option<EscrowStatus> {
        match self {
            Self::FavorBuyer | Self::PartialRefund => Some(EscrowStatus::Refunded),
            Self::FavorSeller | Self::MediatedAgreement => Some(EscrowStatus::Completed),
            Self::NoResolution => None,
        }
    }
}

/// Evidence bundle attached to a dispute
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// Entry in the dispute message log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeMessage {
    pub sender: String,
    pub sender_role: SenderRole,
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub is_internal: bool,
}

/// Dispute lifecycle timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeTimeline {
    pub created_at: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

/// Resolution block, written once on the RESOLVED transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(rename = "type")]
    pub resolution_type: ResolutionType,
    pub description: String,
    pub refund_amount: Option<String>,
    pub additional_terms: Option<String>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

/// Context snapshot taken when the dispute is filed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeContext {
    /// Escrow amount at filing time, beddows
    pub transaction_amount: String,
    /// Escrow status at filing time
    pub escrow_status: EscrowStatus,
    /// Number of escrow-log messages exchanged before the dispute
    pub communication_history: usize,
    /// Disputes the initiator was involved in before this one
    pub previous_disputes: usize,
    pub risk_level: RiskLevel,
}

/// Dispute flags, partly auto-set by priority/risk rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeFlags {
    pub urgent: bool,
    pub escalated: bool,
    pub requires_admin: bool,
    pub fraud_suspected: bool,
    pub auto_resolvable: bool,
}

/// Structured disagreement between the two participants of one escrow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub dispute_id: String,
    pub escrow_id: String,

    pub initiator: String,
    pub initiator_role: Role,
    pub respondent: String,
    pub respondent_role: Role,

    #[serde(rename = "type")]
    pub dispute_type: DisputeType,
    pub status: DisputeStatus,
    pub priority: DisputePriority,

    pub subject: String,
    pub description: String,
    pub evidence: Evidence,

    pub timeline: DisputeTimeline,
    pub resolution: Option<Resolution>,
    pub messages: Vec<DisputeMessage>,

    pub context: DisputeContext,
    pub flags: DisputeFlags,
}

impl Dispute {
    /// Check whether a user is a party to this dispute
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.initiator == user_id || self.respondent == user_id
    }

    /// The role a participant plays in this dispute's message log
    pub fn sender_role_of(&self, user_id: &str) -> Option<SenderRole> {
        if self.initiator == user_id {
            Some(self.initiator_role.into())
        } else if self.respondent == user_id {
            Some(self.respondent_role.into())
        } else {
            None
        }
    }

    /// Append a message, touching activity and first-response timestamps
    pub fn push_message(&mut self, message: DisputeMessage) {
        let now = message.timestamp;
        if self.timeline.first_response_at.is_none()
            && message.sender_role != SenderRole::from(self.initiator_role)
        {
            self.timeline.first_response_at = Some(now);
        }
        self.timeline.last_activity_at = now;
        self.messages.push(message);
    }
}

/// Priority thresholds on the transaction amount, beddows
const URGENT_AMOUNT: u64 = 10_000_000_000_000;
const HIGH_AMOUNT: u64 = 1_000_000_000_000;
const MEDIUM_AMOUNT: u64 = 100_000_000_000;

/// Derive dispute priority from the transaction amount. Returns the
/// priority and whether the amount alone forces admin review.
pub fn derive_priority(amount: U256) -> (DisputePriority, bool) {
    if amount > U256::from(URGENT_AMOUNT) {
        (DisputePriority::Urgent, true)
    } else if amount > U256::from(HIGH_AMOUNT) {
        (DisputePriority::High, false)
    } else if amount > U256::from(MEDIUM_AMOUNT) {
        (DisputePriority::Medium, false)
    } else {
        (DisputePriority::Low, false)
    }
}

/// Derive the initiator risk band from prior-dispute count. Returns the
/// band and whether the history alone forces admin review.
pub fn derive_risk(previous_disputes: usize) -> (RiskLevel, bool) {
    if previous_disputes > 2 {
        (RiskLevel::High, true)
    } else if previous_disputes > 0 {
        (RiskLevel::Medium, false)
    } else {
        (RiskLevel::Low, false)
    }
}

/// Which role rated which
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingDirection {
    BuyerToSeller,
    SellerToBuyer,
}

impl RatingDirection {
    /// Direction implied by the rater's escrow role
    pub fn from_rater_role(role: Role) -> Self {
        match role {
            Role::Buyer => Self::BuyerToSeller,
            Role::Seller => Self::SellerToBuyer,
        }
    }
}

/// Immutable ledger record of one counterparty rating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub escrow_id: String,
    pub rater: String,
    pub rated: String,
    pub direction: RatingDirection,
    /// Integer stars, 1..=5
    pub score: u8,
    pub comment: Option<String>,
    /// Escrow amount captured at rating time, beddows
    pub transaction_amount: String,
    pub created_at: DateTime<Utc>,
}

/// Named reputation band, a pure function of average rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReputationTier {
    Newcomer,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Elite,
}

impl ReputationTier {
    /// Tier thresholds on the 0-5 average, evaluated high to low
    pub fn for_average(average: f64) -> Self {
        if average >= 4.8 {
            Self::Elite
        } else if average >= 4.5 {
            Self::Diamond
        } else if average >= 4.2 {
            Self::Platinum
        } else if average >= 3.8 {
            Self::Gold
        } else if average >= 3.0 {
            Self::Silver
        } else if average >= 2.0 {
            Self::Bronze
        } else {
            Self::Newcomer
        }
    }
}

impl fmt::Display for ReputationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Newcomer => "Newcomer",
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Platinum => "Platinum",
            Self::Diamond => "Diamond",
            Self::Elite => "Elite",
        };
        f.write_str(s)
    }
}

/// Counts per star value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBreakdown {
    pub five: usize,
    pub four: usize,
    pub three: usize,
    pub two: usize,
    pub one: usize,
}

impl RatingBreakdown {
    /// Bump the bucket for a 1-5 score
    pub fn record(&mut self, score: u8) {
        match score {
            5 => self.five += 1,
            4 => self.four += 1,
            3 => self.three += 1,
            2 => self.two += 1,
            1 => self.one += 1,
            _ => {}
        }
    }
}

/// Average/count/value aggregate for one side of the trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAggregate {
    pub average_rating: f64,
    pub total_ratings: usize,
    /// Sum of rated transaction amounts, beddows
    pub total_transaction_value: String,
}

impl Default for RoleAggregate {
    fn default() -> Self {
        Self {
            average_rating: 0.0,
            total_ratings: 0,
            total_transaction_value: "0".to_string(),
        }
    }
}

/// Per-user reputation summary, recomputed in full on every rating insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationSummary {
    pub user_id: String,
    /// 0-5 average rounded to two decimals
    pub average_rating: f64,
    pub total_ratings: usize,
    pub total_transaction_value: String,
    pub rating_breakdown: RatingBreakdown,
    pub as_buyer: RoleAggregate,
    pub as_seller: RoleAggregate,
    pub level: ReputationTier,
    pub last_updated: DateTime<Utc>,
}

impl ReputationSummary {
    /// Empty summary for a user with no ratings yet
    pub fn empty(user_id: String) -> Self {
        Self {
            user_id,
            average_rating: 0.0,
            total_ratings: 0,
            total_transaction_value: "0".to_string(),
            rating_breakdown: RatingBreakdown::default(),
            as_buyer: RoleAggregate::default(),
            as_seller: RoleAggregate::default(),
            level: ReputationTier::Newcomer,
            last_updated: Utc::now(),
        }
    }
}

/// Round a 0-5 average to two decimals for storage/display
pub fn round_average(average: f64) -> f64 {
    (average * 100.0).round() / 100.0
}

/// Per-user escrow activity projection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowStats {
    pub total: usize,
    pub created: usize,
    pub funded: usize,
    pub disputed: usize,
    pub completed: usize,
    pub refunded: usize,
    pub expired: usize,
    /// Sum of escrow amounts the user participates in, beddows
    pub total_value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_state_machine_edges() {
        use EscrowStatus::*;
        assert!(escrow_transition_allowed(Created, Funded));
        assert!(escrow_transition_allowed(Funded, Completed));
        assert!(escrow_transition_allowed(Funded, Disputed));
        assert!(escrow_transition_allowed(Disputed, Completed));
        assert!(escrow_transition_allowed(Disputed, Refunded));

        // unreachable edges
        assert!(!escrow_transition_allowed(Created, Completed));
        assert!(!escrow_transition_allowed(Created, Disputed));
        assert!(!escrow_transition_allowed(Funded, Refunded));
        assert!(!escrow_transition_allowed(Completed, Funded));
        assert!(!escrow_transition_allowed(Refunded, Completed));
        assert!(!escrow_transition_allowed(Expired, Funded));
    }

    #[test]
    fn test_derive_priority_thresholds() {
        let at = |v: u64| derive_priority(U256::from(v));
        assert_eq!(at(10_000_000_000_001), (DisputePriority::Urgent, true));
        assert_eq!(at(10_000_000_000_000), (DisputePriority::High, false));
        assert_eq!(at(1_000_000_000_001), (DisputePriority::High, false));
        assert_eq!(at(1_000_000_000_000), (DisputePriority::Medium, false));
        assert_eq!(at(100_000_000_001), (DisputePriority::Medium, false));
        assert_eq!(at(100_000_000_000), (DisputePriority::Low, false));
        assert_eq!(at(1), (DisputePriority::Low, false));
    }

    #[test]
    fn test_derive_risk_thresholds() {
        assert_eq!(derive_risk(0), (RiskLevel::Low, false));
        assert_eq!(derive_risk(1), (RiskLevel::Medium, false));
        assert_eq!(derive_risk(2), (RiskLevel::Medium, false));
        assert_eq!(derive_risk(3), (RiskLevel::High, true));
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(ReputationTier::for_average(5.0), ReputationTier::Elite);
        assert_eq!(ReputationTier::for_average(4.8), ReputationTier::Elite);
        assert_eq!(ReputationTier::for_average(4.79), ReputationTier::Diamond);
        assert_eq!(ReputationTier::for_average(4.5), ReputationTier::Diamond);
        assert_eq!(ReputationTier::for_average(4.2), ReputationTier::Platinum);
        assert_eq!(ReputationTier::for_average(3.8), ReputationTier::Gold);
        assert_eq!(ReputationTier::for_average(3.0), ReputationTier::Silver);
        assert_eq!(ReputationTier::for_average(2.0), ReputationTier::Bronze);
        assert_eq!(ReputationTier::for_average(1.99), ReputationTier::Newcomer);
        assert_eq!(ReputationTier::for_average(0.0), ReputationTier::Newcomer);
    }

    #[test]
    fn test_resolution_outcome_mapping() {
        assert_eq!(
            ResolutionType::FavorBuyer.escrow_outcome(),
            Some(EscrowStatus::Refunded)
        );
        assert_eq!(
            ResolutionType::PartialRefund.escrow_outcome(),
            Some(EscrowStatus::Refunded)
        );
        assert_eq!(
            ResolutionType::FavorSeller.escrow_outcome(),
            Some(EscrowStatus::Completed)
        );
        assert_eq!(
            ResolutionType::MediatedAgreement.escrow_outcome(),
            Some(EscrowStatus::Completed)
        );
        assert_eq!(ResolutionType::NoResolution.escrow_outcome(), None);
    }

    #[test]
    fn test_first_response_tracking() {
        let now = Utc::now();
        let mut dispute = Dispute {
            dispute_id: "DSP_AAAAAAAA".into(),
            escrow_id: "ESC_AAAAAAAA".into(),
            initiator: "u1".into(),
            initiator_role: Role::Buyer,
            respondent: "u2".into(),
            respondent_role: Role::Seller,
            dispute_type: DisputeType::Other,
            status: DisputeStatus::Open,
            priority: DisputePriority::Low,
            subject: "s".into(),
            description: "d".into(),
            evidence: Evidence::default(),
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
                transaction_amount: "1".into(),
                escrow_status: EscrowStatus::Funded,
                communication_history: 0,
                previous_disputes: 0,
                risk_level: RiskLevel::Low,
            },
            flags: DisputeFlags {
                urgent: false,
                escalated: false,
                requires_admin: false,
                fraud_suspected: false,
                auto_resolvable: false,
            },
        };

        // initiator messages never set first_response_at
        dispute.push_message(DisputeMessage {
            sender: "u1".into(),
            sender_role: SenderRole::Buyer,
            message: "hello".into(),
            attachments: vec![],
            timestamp: Utc::now(),
            is_internal: false,
        });
        assert!(dispute.timeline.first_response_at.is_none());

        dispute.push_message(DisputeMessage {
            sender: "u2".into(),
            sender_role: SenderRole::Seller,
            message: "reply".into(),
            attachments: vec![],
            timestamp: Utc::now(),
            is_internal: false,
        });
        assert!(dispute.timeline.first_response_at.is_some());
    }
}

//! Escrow Engine - owns escrow creation, funding, release, and messaging
//!
//! Operations run to completion against an in-memory store; every
//! conditional state check happens under the store write lock so that
//! racing mutations (double-fund, double-release) lose with a typed
//! `InvalidState` instead of silently double-applying. Chain submission
//! is best-effort: a stub failure is logged and never surfaced.

use crate::chain::{ChainClient, ChainTransactionType};
use crate::error::EscrowError;
use crate::identity::UserDirectory;
use crate::models::{
    DeliveryInfo, DisputeInfo, DisputeStatus, Escrow, EscrowMessage, EscrowStats, EscrowStatus,
    EscrowTimeline, ProductInfo, ReleaseConditions, Role,
};
use crate::{validation, EscrowResult};
use chrono::{Duration, Utc};
use primitive_types::U256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Configuration for the escrow engine
#[derive(Debug, Clone)]
pub struct EscrowServiceConfig {
    /// Platform fee in basis points of the escrow amount
    pub fee_bps: u64,
    /// Default expiry window when no auto-release is requested, hours
    pub dispute_timeout_hours: u32,
    /// Upper bound on the auto-release window, hours (one year)
    pub max_auto_release_hours: u32,
    /// Maximum escrow description length
    pub max_description_len: usize,
    /// Maximum terms length
    pub max_terms_len: usize,
    /// Maximum communication-log message length
    pub max_message_len: usize,
}

impl Default for EscrowServiceConfig {
    fn default() -> Self {
        Self {
            fee_bps: 150, // 1.5%
            dispute_timeout_hours: 72,
            max_auto_release_hours: 8760,
            max_description_len: 1000,
            max_terms_len: 2000,
            max_message_len: 1000,
        }
    }
}

/// Escrow creation request
#[derive(Debug, Clone)]
pub struct CreateEscrowRequest {
    pub buyer_id: String,
    pub seller_id: String,
    /// Decimal-digit string in beddows
    pub amount: String,
    pub description: String,
    pub terms: String,
    pub product_info: Option<ProductInfo>,
    pub delivery_info: Option<DeliveryInfo>,
    pub auto_release_hours: Option<u32>,
}

/// Main escrow engine
pub struct EscrowService {
    config: EscrowServiceConfig,
    escrows: Arc<RwLock<HashMap<String, Escrow>>>,
    users: Arc<UserDirectory>,
    chain: Arc<ChainClient>,
}

impl EscrowService {
    pub fn new(
        config: EscrowServiceConfig,
        users: Arc<UserDirectory>,
        chain: Arc<ChainClient>,
    ) -> Self {
        Self {
            config,
            escrows: Arc::new(RwLock::new(HashMap::new())),
            users,
            chain,
        }
    }

    /// Create a new escrow agreement in `CREATED` state
    pub async fn create_escrow(&self, request: CreateEscrowRequest) -> EscrowResult<Escrow> {
        if request.buyer_id == request.seller_id {
            return Err(EscrowError::validation(
                "Buyer and seller cannot be the same user",
            ));
        }

        let buyer = self.users.find_user(&request.buyer_id).await?;
        if !self.users.contains(&request.seller_id).await {
            return Err(EscrowError::not_found(format!(
                "User {} not found",
                request.seller_id
            )));
        }

        let amount = validation::parse_positive_amount(&request.amount)?;
        validation::validate_text("Description", &request.description, self.config.max_description_len)?;
        validation::validate_text("Terms", &request.terms, self.config.max_terms_len)?;
        if let Some(product) = &request.product_info {
            validation::validate_text("Product name", &product.name, 200)?;
            validation::validate_optional_text("Product description", &product.description, 1000)?;
            validation::validate_optional_text("Category", &product.category, 50)?;
        }
        if let Some(delivery) = &request.delivery_info {
            validation::validate_text("Delivery method", &delivery.method, 100)?;
            if let Some(address) = delivery.address.as_deref() {
                validation::validate_optional_text("Address", address, 500)?;
            }
            if let Some(tracking) = delivery.tracking_number.as_deref() {
                validation::validate_optional_text("Tracking number", tracking, 100)?;
            }
        }
        if let Some(hours) = request.auto_release_hours {
            if hours == 0 || hours > self.config.max_auto_release_hours {
                return Err(EscrowError::validation(format!(
                    "Auto-release window must be between 1 and {} hours",
                    self.config.max_auto_release_hours
                )));
            }
        }

        let fee = amount * U256::from(self.config.fee_bps) / U256::from(10_000u64);
        let escrow_id = validation::new_escrow_id();
        let now = Utc::now();
        let expiry_hours = request
            .auto_release_hours
            .unwrap_or(self.config.dispute_timeout_hours);

        let mut escrow = Escrow {
            escrow_id: escrow_id.clone(),
            buyer: request.buyer_id,
            seller: request.seller_id,
            amount: request.amount.clone(),
            fee: fee.to_string(),
            status: EscrowStatus::Created,
            description: request.description,
            terms: request.terms,
            contract_address: validation::new_contract_address(),
            chain_transaction_id: None,
            release_conditions: ReleaseConditions {
                requires_buyer_approval: true,
                requires_seller_confirmation: true,
                auto_release_after_hours: request.auto_release_hours,
                delivery_confirmation_required: true,
            },
            timeline: EscrowTimeline {
                created_at: now,
                funded_at: None,
                disputed_at: None,
                completed_at: None,
                refunded_at: None,
                expires_at: Some(now + Duration::hours(i64::from(expiry_hours))),
            },
            dispute_info: None,
            product_info: request.product_info,
            delivery_info: request.delivery_info,
            messages: Vec::new(),
        };

        // Best-effort chain submission; escrow state is the source of truth
        match self
            .chain
            .submit_transaction(
                ChainTransactionType::CreateEscrow,
                &buyer.public_key,
                &escrow_id,
                &request.amount,
            )
            .await
        {
            Ok(tx_id) => escrow.chain_transaction_id = Some(tx_id),
            Err(err) => warn!(escrow_id = %escrow_id, %err, "Chain submission failed, continuing"),
        }

        self.escrows
            .write()
            .await
            .insert(escrow_id.clone(), escrow.clone());

        info!(escrow_id = %escrow_id, amount = %escrow.amount, fee = %escrow.fee, "Escrow created");
        Ok(escrow)
    }

    /// Move a `CREATED` escrow to `FUNDED`; only the buyer may fund
    pub async fn fund_escrow(&self, escrow_id: &str, caller_id: &str) -> EscrowResult<Escrow> {
        let mut escrows = self.escrows.write().await;
        let escrow = escrows
            .get_mut(escrow_id)
            .ok_or_else(|| EscrowError::not_found(format!("Escrow {} not found", escrow_id)))?;

        if !escrow.status.can_fund() {
            return Err(EscrowError::invalid_state(
                format!("escrow {}", escrow_id),
                escrow.status.to_string(),
                "only created escrows can be funded".to_string(),
            ));
        }
        if escrow.buyer != caller_id {
            return Err(EscrowError::forbidden("Only the buyer can fund the escrow"));
        }

        escrow.status = EscrowStatus::Funded;
        escrow.timeline.funded_at = Some(Utc::now());

        info!(escrow_id, "Escrow funded");
        Ok(escrow.clone())
    }

    /// Move a `FUNDED` escrow to `COMPLETED`; either party may release.
    /// Completion makes the escrow eligible for counterparty ratings.
    pub async fn release_escrow(
        &self,
        escrow_id: &str,
        caller_id: &str,
        reason: Option<&str>,
    ) -> EscrowResult<Escrow> {
        let released = {
            let mut escrows = self.escrows.write().await;
            let escrow = escrows
                .get_mut(escrow_id)
                .ok_or_else(|| EscrowError::not_found(format!("Escrow {} not found", escrow_id)))?;

            if !escrow.status.can_release() {
                return Err(EscrowError::invalid_state(
                    format!("escrow {}", escrow_id),
                    escrow.status.to_string(),
                    "only funded escrows can be released".to_string(),
                ));
            }
            let role = escrow.role_of(caller_id).ok_or_else(|| {
                EscrowError::forbidden("Only the buyer or seller can release the escrow")
            })?;

            escrow.status = EscrowStatus::Completed;
            escrow.timeline.completed_at = Some(Utc::now());

            info!(escrow_id, released_by = %role, reason = reason.unwrap_or(""), "Escrow released");
            escrow.clone()
        };

        self.users
            .record_completed_transaction(&released.buyer, &released.seller)
            .await?;

        let caller = self.users.find_user(caller_id).await?;
        if let Err(err) = self
            .chain
            .submit_transaction(
                ChainTransactionType::ReleaseEscrow,
                &caller.public_key,
                escrow_id,
                &released.amount,
            )
            .await
        {
            warn!(escrow_id, %err, "Chain release submission failed, continuing");
        }

        Ok(released)
    }

    /// Append a message to the escrow communication log
    pub async fn add_message(
        &self,
        escrow_id: &str,
        sender_id: &str,
        text: &str,
    ) -> EscrowResult<Escrow> {
        validation::validate_text("Message", text, self.config.max_message_len)?;

        let mut escrows = self.escrows.write().await;
        let escrow = escrows
            .get_mut(escrow_id)
            .ok_or_else(|| EscrowError::not_found(format!("Escrow {} not found", escrow_id)))?;

        let sender = escrow
            .role_of(sender_id)
            .ok_or_else(|| EscrowError::forbidden("Only the buyer or seller can add messages"))?;

        escrow.messages.push(EscrowMessage {
            sender,
            message: text.to_string(),
            timestamp: Utc::now(),
            read: false,
        });

        Ok(escrow.clone())
    }

    /// Fetch an escrow; only its participants may view the detail
    pub async fn get_escrow(&self, escrow_id: &str, caller_id: &str) -> EscrowResult<Escrow> {
        let escrow = self.load(escrow_id).await?;
        if !escrow.is_participant(caller_id) {
            return Err(EscrowError::forbidden(
                "Only the buyer or seller can view this escrow",
            ));
        }
        Ok(escrow)
    }

    /// All escrows a user participates in, newest first
    pub async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<EscrowStatus>,
    ) -> Vec<Escrow> {
        let escrows = self.escrows.read().await;
        let mut matching: Vec<Escrow> = escrows
            .values()
            .filter(|e| e.is_participant(user_id))
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timeline.created_at.cmp(&a.timeline.created_at));
        matching
    }

    /// Per-status counts and total value of a user's escrows
    pub async fn stats_for_user(&self, user_id: &str) -> EscrowStats {
        let escrows = self.escrows.read().await;
        let mut stats = EscrowStats::default();
        let mut total_value = U256::zero();

        for escrow in escrows.values().filter(|e| e.is_participant(user_id)) {
            stats.total += 1;
            match escrow.status {
                EscrowStatus::Created => stats.created += 1,
                EscrowStatus::Funded => stats.funded += 1,
                EscrowStatus::Disputed => stats.disputed += 1,
                EscrowStatus::Completed => stats.completed += 1,
                EscrowStatus::Refunded => stats.refunded += 1,
                EscrowStatus::Expired => stats.expired += 1,
            }
            // amounts were validated at creation
            total_value += U256::from_dec_str(&escrow.amount).unwrap_or_default();
        }

        stats.total_value = total_value.to_string();
        stats
    }

    /// Fetch without caller access control, for the sibling engines
    pub(crate) async fn load(&self, escrow_id: &str) -> EscrowResult<Escrow> {
        self.escrows
            .read()
            .await
            .get(escrow_id)
            .cloned()
            .ok_or_else(|| EscrowError::not_found(format!("Escrow {} not found", escrow_id)))
    }

    /// Flip an escrow to `DISPUTED` and write the dispute back-reference.
    /// Called by the dispute engine after it has admitted the dispute.
    pub(crate) async fn mark_disputed(
        &self,
        escrow_id: &str,
        dispute_info: DisputeInfo,
    ) -> EscrowResult<Escrow> {
        let mut escrows = self.escrows.write().await;
        let escrow = escrows
            .get_mut(escrow_id)
            .ok_or_else(|| EscrowError::not_found(format!("Escrow {} not found", escrow_id)))?;

        if !escrow.status.can_dispute() {
            return Err(EscrowError::invalid_state(
                format!("escrow {}", escrow_id),
                escrow.status.to_string(),
                "escrow can no longer be disputed".to_string(),
            ));
        }

        escrow.status = EscrowStatus::Disputed;
        escrow.timeline.disputed_at = Some(Utc::now());
        escrow.dispute_info = Some(dispute_info);
        Ok(escrow.clone())
    }

    /// Apply a dispute resolution outcome to the parent escrow. `None`
    /// outcome leaves the escrow `DISPUTED`; either way the back-reference
    /// is stamped resolved.
    pub(crate) async fn apply_resolution(
        &self,
        escrow_id: &str,
        outcome: Option<EscrowStatus>,
    ) -> EscrowResult<Escrow> {
        let mut escrows = self.escrows.write().await;
        let escrow = escrows
            .get_mut(escrow_id)
            .ok_or_else(|| EscrowError::not_found(format!("Escrow {} not found", escrow_id)))?;

        if let Some(status) = outcome {
            escrow.validate_transition(status)?;
            escrow.status = status;
            let now = Utc::now();
            match status {
                EscrowStatus::Completed => escrow.timeline.completed_at = Some(now),
                EscrowStatus::Refunded => escrow.timeline.refunded_at = Some(now),
                _ => {}
            }
        }
        if let Some(info) = escrow.dispute_info.as_mut() {
            info.status = DisputeStatus::Resolved;
        }

        info!(escrow_id, status = %escrow.status, "Dispute resolution applied to escrow");
        Ok(escrow.clone())
    }
}

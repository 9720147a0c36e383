//! Reputation Engine - counterparty star ratings and per-user summaries
//!
//! One rating per escrow per direction, enforced by the composite
//! `(escrow_id, direction)` key under the ratings write lock. Every accepted
//! rating triggers a full recompute of the rated user's summary while the
//! lock is still held, so summaries can never interleave out of order. The
//! flat 0-100 score pushed back to the identity directory is derived from
//! the same recompute as `round(average * 20)`.

use crate::error::EscrowError;
use crate::escrow_service::EscrowService;
use crate::identity::UserDirectory;
use crate::models::{
    round_average, Rating, RatingBreakdown, RatingDirection, ReputationSummary, ReputationTier,
    Role, RoleAggregate,
};
use crate::{validation, EscrowResult};
use chrono::Utc;
use primitive_types::U256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Configuration for the reputation engine
#[derive(Debug, Clone)]
pub struct ReputationServiceConfig {
    pub max_comment_len: usize,
    /// Ratings returned in a reputation view
    pub recent_ratings_limit: usize,
    /// Default page size for rating history
    pub history_limit: usize,
}

impl Default for ReputationServiceConfig {
    fn default() -> Self {
        Self {
            max_comment_len: 500,
            recent_ratings_limit: 10,
            history_limit: 20,
        }
    }
}

/// Rating submission
#[derive(Debug, Clone)]
pub struct CreateRatingRequest {
    pub escrow_id: String,
    pub rater_id: String,
    pub rated_id: String,
    /// Integer stars, 1..=5
    pub score: u8,
    pub comment: Option<String>,
}

/// Reputation view: the summary plus the most recent ratings received
#[derive(Debug, Clone)]
pub struct ReputationView {
    pub summary: ReputationSummary,
    pub recent_ratings: Vec<Rating>,
}

/// Outcome of the `can_user_rate` predicate; when rating is possible the
/// counterparty to be rated is named
#[derive(Debug, Clone)]
pub struct RatingEligibility {
    pub can_rate: bool,
    pub counterpart: Option<String>,
    pub reason: Option<String>,
}

impl RatingEligibility {
    fn allowed(counterpart: String) -> Self {
        Self {
            can_rate: true,
            counterpart: Some(counterpart),
            reason: None,
        }
    }

    fn rejected<S: Into<String>>(reason: S) -> Self {
        Self {
            can_rate: false,
            counterpart: None,
            reason: Some(reason.into()),
        }
    }
}

/// Main reputation engine
pub struct ReputationService {
    config: ReputationServiceConfig,
    ratings: Arc<RwLock<HashMap<(String, RatingDirection), Rating>>>,
    summaries: Arc<RwLock<HashMap<String, ReputationSummary>>>,
    escrows: Arc<EscrowService>,
    users: Arc<UserDirectory>,
}

impl ReputationService {
    pub fn new(
        config: ReputationServiceConfig,
        escrows: Arc<EscrowService>,
        users: Arc<UserDirectory>,
    ) -> Self {
        Self {
            config,
            ratings: Arc::new(RwLock::new(HashMap::new())),
            summaries: Arc::new(RwLock::new(HashMap::new())),
            escrows,
            users,
        }
    }

    /// Rate the counterparty of a completed escrow
    pub async fn create_rating(&self, request: CreateRatingRequest) -> EscrowResult<Rating> {
        if !(1..=5).contains(&request.score) {
            return Err(EscrowError::validation("Rating must be between 1 and 5"));
        }
        if request.rater_id == request.rated_id {
            return Err(EscrowError::validation("Users cannot rate themselves"));
        }
        if let Some(comment) = request.comment.as_deref() {
            validation::validate_optional_text("Comment", comment, self.config.max_comment_len)?;
        }

        let escrow = self.escrows.load(&request.escrow_id).await?;
        if escrow.status != crate::models::EscrowStatus::Completed {
            return Err(EscrowError::invalid_state(
                format!("escrow {}", escrow.escrow_id),
                escrow.status.to_string(),
                "only completed escrows can be rated".to_string(),
            ));
        }

        let rater_role = escrow
            .role_of(&request.rater_id)
            .ok_or_else(|| EscrowError::forbidden("Only escrow participants can rate"))?;
        let counterpart = escrow
            .counterpart_of(&request.rater_id)
            .unwrap_or_default()
            .to_string();
        if request.rated_id != counterpart {
            return Err(EscrowError::validation(
                "Buyers rate sellers and sellers rate buyers; the rated user must be the escrow counterpart",
            ));
        }
        let rated = request.rated_id.clone();
        self.users.find_user(&request.rater_id).await?;
        self.users.find_user(&rated).await?;

        let direction = RatingDirection::from_rater_role(rater_role);
        let rating = Rating {
            escrow_id: request.escrow_id.clone(),
            rater: request.rater_id.clone(),
            rated: rated.clone(),
            direction,
            score: request.score,
            comment: request.comment,
            transaction_amount: escrow.amount.clone(),
            created_at: Utc::now(),
        };

        // Duplicate check, insert, and the rated user's full recompute all
        // happen under the one write lock so two raters cannot interleave.
        let summary = {
            let mut ratings = self.ratings.write().await;
            let key = (request.escrow_id.clone(), direction);
            if ratings.contains_key(&key) {
                return Err(EscrowError::conflict(
                    "This escrow has already been rated in this direction",
                ));
            }
            ratings.insert(key, rating.clone());
            self.recompute_summary(&ratings, &rated).await
        };

        self.users
            .set_reputation_score(&rated, (summary.average_rating * 20.0).round() as u32)
            .await?;

        info!(
            escrow_id = %rating.escrow_id,
            rated = %rated,
            score = rating.score,
            average = summary.average_rating,
            tier = %summary.level,
            "Rating recorded"
        );
        Ok(rating)
    }

    /// Rebuild a user's summary from every rating they have received.
    /// Caller holds the ratings write lock.
    async fn recompute_summary(
        &self,
        ratings: &HashMap<(String, RatingDirection), Rating>,
        user_id: &str,
    ) -> ReputationSummary {
        let received: Vec<&Rating> = ratings.values().filter(|r| r.rated == user_id).collect();

        let mut breakdown = RatingBreakdown::default();
        let mut score_sum = 0u64;
        let mut total_value = U256::zero();
        let mut as_buyer = RoleAggregate::default();
        let mut as_seller = RoleAggregate::default();
        let mut buyer_sum = 0u64;
        let mut seller_sum = 0u64;
        let mut buyer_value = U256::zero();
        let mut seller_value = U256::zero();

        for rating in &received {
            breakdown.record(rating.score);
            score_sum += rating.score as u64;
            let amount =
                U256::from_dec_str(&rating.transaction_amount).unwrap_or_else(|_| U256::zero());
            total_value += amount;
            match rating.direction {
                // The rated user acted as seller when the buyer rated them
                RatingDirection::BuyerToSeller => {
                    as_seller.total_ratings += 1;
                    seller_sum += rating.score as u64;
                    seller_value += amount;
                }
                RatingDirection::SellerToBuyer => {
                    as_buyer.total_ratings += 1;
                    buyer_sum += rating.score as u64;
                    buyer_value += amount;
                }
            }
        }

        let average = if received.is_empty() {
            0.0
        } else {
            round_average(score_sum as f64 / received.len() as f64)
        };
        if as_buyer.total_ratings > 0 {
            as_buyer.average_rating =
                round_average(buyer_sum as f64 / as_buyer.total_ratings as f64);
        }
        if as_seller.total_ratings > 0 {
            as_seller.average_rating =
                round_average(seller_sum as f64 / as_seller.total_ratings as f64);
        }
        as_buyer.total_transaction_value = buyer_value.to_string();
        as_seller.total_transaction_value = seller_value.to_string();

        let summary = ReputationSummary {
            user_id: user_id.to_string(),
            average_rating: average,
            total_ratings: received.len(),
            total_transaction_value: total_value.to_string(),
            rating_breakdown: breakdown,
            as_buyer,
            as_seller,
            level: ReputationTier::for_average(average),
            last_updated: Utc::now(),
        };

        self.summaries
            .write()
            .await
            .insert(user_id.to_string(), summary.clone());
        summary
    }

    /// A user's summary plus their most recent received ratings. Users who
    /// were never rated get the empty summary rather than an error.
    pub async fn get_user_reputation(&self, user_id: &str) -> EscrowResult<ReputationView> {
        self.users.find_user(user_id).await?;

        let summary = self
            .summaries
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| ReputationSummary::empty(user_id.to_string()));

        let ratings = self.ratings.read().await;
        let mut received: Vec<Rating> = ratings
            .values()
            .filter(|r| r.rated == user_id)
            .cloned()
            .collect();
        received.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        received.truncate(self.config.recent_ratings_limit);

        Ok(ReputationView {
            summary,
            recent_ratings: received,
        })
    }

    /// Ratings received by a user, newest first
    pub async fn rating_history(&self, user_id: &str, limit: Option<usize>) -> Vec<Rating> {
        let ratings = self.ratings.read().await;
        let mut received: Vec<Rating> = ratings
            .values()
            .filter(|r| r.rated == user_id)
            .cloned()
            .collect();
        received.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        received.truncate(limit.unwrap_or(self.config.history_limit));
        received
    }

    /// Both directions of rating for one escrow, if present
    pub async fn escrow_ratings(&self, escrow_id: &str) -> Vec<Rating> {
        let ratings = self.ratings.read().await;
        let mut matching: Vec<Rating> = ratings
            .values()
            .filter(|r| r.escrow_id == escrow_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| match r.direction {
            RatingDirection::BuyerToSeller => 0,
            RatingDirection::SellerToBuyer => 1,
        });
        matching
    }

    /// Pure predicate mirroring `create_rating`'s preconditions, naming
    /// the counterpart the user would rate
    pub async fn can_user_rate(&self, escrow_id: &str, user_id: &str) -> RatingEligibility {
        let escrow = match self.escrows.load(escrow_id).await {
            Ok(escrow) => escrow,
            Err(_) => return RatingEligibility::rejected("Escrow not found"),
        };

        let role = match escrow.role_of(user_id) {
            Some(role) => role,
            None => return RatingEligibility::rejected("Only escrow participants can rate"),
        };
        if escrow.status != crate::models::EscrowStatus::Completed {
            return RatingEligibility::rejected("Only completed escrows can be rated");
        }

        let direction = RatingDirection::from_rater_role(role);
        let ratings = self.ratings.read().await;
        if ratings.contains_key(&(escrow_id.to_string(), direction)) {
            return RatingEligibility::rejected("You have already rated this escrow");
        }

        let counterpart = match role {
            Role::Buyer => escrow.seller.clone(),
            Role::Seller => escrow.buyer.clone(),
        };
        RatingEligibility::allowed(counterpart)
    }
}

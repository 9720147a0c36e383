//! Identity store collaborator
//!
//! The core consumes user records read-only for participant validation and
//! writes back two things the engines own: the flat `reputation_score`
//! (0-100) and the transaction counters. Real registration/authentication
//! lives outside the core; this directory models only what the engines
//! touch, backed by an in-memory map.

use crate::error::EscrowError;
use crate::{validation, EscrowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// User profile as seen by the core engines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub wallet_address: String,
    /// 64 lowercase hex characters
    pub public_key: String,
    /// Flat score on the 0-100 scale, maintained as `round(average * 20)`
    pub reputation_score: u32,
    pub total_transactions: u32,
    pub completed_transactions: u32,
    pub disputed_transactions: u32,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Build a fresh profile with zeroed counters
    pub fn new(user_id: String, username: String, wallet_address: String, public_key: String) -> Self {
        Self {
            user_id,
            username,
            wallet_address,
            public_key,
            reputation_score: 0,
            total_transactions: 0,
            completed_transactions: 0,
            disputed_transactions: 0,
            created_at: Utc::now(),
        }
    }
}

/// In-memory identity directory shared by the engines
#[derive(Default)]
pub struct UserDirectory {
    users: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile, validating wallet address and public key formats
    pub async fn register(&self, profile: UserProfile) -> EscrowResult<UserProfile> {
        if !validation::is_valid_wallet_address(&profile.wallet_address) {
            return Err(EscrowError::validation(format!(
                "Invalid wallet address format: {}",
                profile.wallet_address
            )));
        }
        if !validation::is_valid_hex_key(&profile.public_key) {
            return Err(EscrowError::validation(
                "Public key must be 64 lowercase hex characters",
            ));
        }

        let mut users = self.users.write().await;
        if users.contains_key(&profile.user_id) {
            return Err(EscrowError::conflict(format!(
                "User {} already registered",
                profile.user_id
            )));
        }
        users.insert(profile.user_id.clone(), profile.clone());
        Ok(profile)
    }

    /// Look up a user by id
    pub async fn find_user(&self, user_id: &str) -> EscrowResult<UserProfile> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| EscrowError::not_found(format!("User {} not found", user_id)))
    }

    /// Check existence without cloning
    pub async fn contains(&self, user_id: &str) -> bool {
        self.users.read().await.contains_key(user_id)
    }

    /// Overwrite a user's flat reputation score (0-100)
    pub async fn set_reputation_score(&self, user_id: &str, score: u32) -> EscrowResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| EscrowError::not_found(format!("User {} not found", user_id)))?;
        user.reputation_score = score;
        Ok(())
    }

    /// Increment total+completed counters for both parties of a released escrow
    pub async fn record_completed_transaction(
        &self,
        buyer_id: &str,
        seller_id: &str,
    ) -> EscrowResult<()> {
        let mut users = self.users.write().await;
        for user_id in [buyer_id, seller_id] {
            let user = users
                .get_mut(user_id)
                .ok_or_else(|| EscrowError::not_found(format!("User {} not found", user_id)))?;
            user.total_transactions += 1;
            user.completed_transactions += 1;
        }
        Ok(())
    }

    /// Increment disputed counters for both parties of a disputed escrow
    pub async fn record_disputed_transaction(
        &self,
        buyer_id: &str,
        seller_id: &str,
    ) -> EscrowResult<()> {
        let mut users = self.users.write().await;
        for user_id in [buyer_id, seller_id] {
            let user = users
                .get_mut(user_id)
                .ok_or_else(|| EscrowError::not_found(format!("User {} not found", user_id)))?;
            user.disputed_transactions += 1;
        }
        Ok(())
    }
}

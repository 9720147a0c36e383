//! Marketplace escrow core for a Lisk-style chain
//!
//! This crate implements the three engines behind a peer-to-peer
//! marketplace backend:
//! - Escrow lifecycle: create, fund, release, message, expire
//! - Disputes: filing, evidence, escalation, admin resolution
//! - Reputation: counterparty star ratings and tiered summaries
//!
//! State lives in in-memory stores shared across the engines; chain
//! submissions go through a mock client and are best-effort.

pub mod chain;
pub mod dispute_service;
pub mod error;
pub mod escrow_service;
pub mod identity;
pub mod models;
pub mod reputation_service;
pub mod validation;

use error::EscrowError;

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;

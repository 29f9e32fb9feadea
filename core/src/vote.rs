use crate::{utils::milliseconds_since_epoch, BlockHash, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Opaque vote signature. Creating and checking signatures is done outside of this crate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const fn new() -> Self {
        Self([0; 64])
    }

    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::write_hex_bytes(&self.0, f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub voting_account: PublicKey,
    /// Milliseconds since epoch, or `FINAL_TIMESTAMP` for final votes
    pub timestamp: u64,
    pub hashes: Vec<BlockHash>,
    pub signature: Signature,
}

impl Vote {
    pub const FINAL_TIMESTAMP: u64 = u64::MAX;
    pub const MAX_HASHES: usize = 255;

    pub fn new(voting_account: PublicKey, timestamp: u64, hashes: Vec<BlockHash>) -> Self {
        debug_assert!(hashes.len() <= Self::MAX_HASHES);
        Self {
            voting_account,
            timestamp,
            hashes,
            signature: Signature::new(),
        }
    }

    pub fn new_final(voting_account: PublicKey, hashes: Vec<BlockHash>) -> Self {
        Self::new(voting_account, Self::FINAL_TIMESTAMP, hashes)
    }

    /// A non-final vote stamped with the current time
    pub fn new_now(voting_account: PublicKey, hashes: Vec<BlockHash>) -> Self {
        Self::new(voting_account, milliseconds_since_epoch(), hashes)
    }

    pub fn new_test_instance() -> Self {
        Self::new(PublicKey::from(42), 1, vec![BlockHash::from(5)])
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == Self::FINAL_TIMESTAMP
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, FromPrimitive)]
#[serde(rename_all = "snake_case")]
pub enum VoteCode {
    /// Signature or content of the vote is not valid
    Invalid,
    /// Vote is not newer than what we already have, or the block is already confirmed
    Replay,
    /// Vote has the highest timestamp and was applied to an election
    Vote,
    /// Unknown if replay or vote: no election exists for the hash
    Indeterminate,
    /// Vote is valid but was ignored, for example because of cooldown
    Ignored,
}

impl VoteCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteCode::Invalid => "invalid",
            VoteCode::Replay => "replay",
            VoteCode::Vote => "vote",
            VoteCode::Indeterminate => "indeterminate",
            VoteCode::Ignored => "ignored",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, FromPrimitive)]
#[serde(rename_all = "snake_case")]
pub enum VoteSource {
    Live,
    Rebroadcast,
    Cache,
}

impl VoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteSource::Live => "live",
            VoteSource::Rebroadcast => "rebroadcast",
            VoteSource::Cache => "cache",
        }
    }
}

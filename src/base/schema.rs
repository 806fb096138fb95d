// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.


//! Chain data as fetched from the node.
//!
//! These are read-only views handed to the worker and to the modules. The
//! persisted representation lives in [crate::db::models].

use crate::{base::serialize, Result};

/// Unit of chain progress. Height 0 is reserved to the genesis state.
pub type Height = u64;

/// Amount of a given denomination.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: &str, amount: &str) -> Self {
        Coin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }
    }
}

/// Single entry of a block commit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommitSig {
    /// Raw consensus address of the signer.
    pub validator_address: Vec<u8>,
    /// RFC3339 signature timestamp.
    pub timestamp: String,
    /// Absent or empty when the validator did not sign.
    pub signature: Option<Vec<u8>>,
}

impl CommitSig {
    /// Returns true if the entry carries a non-empty signature.
    pub fn is_signed(&self) -> bool {
        matches!(&self.signature, Some(sig) if !sig.is_empty())
    }
}

/// Commit for the previous block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Commit {
    pub height: Height,
    pub signatures: Vec<CommitSig>,
}

/// Finalized block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    /// Block height.
    pub height: Height,
    /// Block hash, uppercase hex.
    pub hash: String,
    /// Chain identifier.
    pub chain_id: String,
    /// Raw consensus address of the proposer.
    pub proposer_address: Vec<u8>,
    /// RFC3339 block timestamp.
    pub timestamp: String,
    /// Raw transactions, in block order.
    pub txs: Vec<Vec<u8>>,
    /// Commit of the previous block.
    pub last_commit: Commit,
}

/// Execution outcome of a single transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TxResult {
    pub code: u32,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub log: String,
}

/// Execution outcome of a whole block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockResults {
    pub height: Height,
    pub txs_results: Vec<TxResult>,
}

impl BlockResults {
    /// Gas used by all the block transactions.
    pub fn total_gas(&self) -> u64 {
        self.txs_results
            .iter()
            .fold(0u64, |acc, res| acc.saturating_add(res.gas_used))
    }
}

/// Validator as reported by the consensus engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainValidator {
    /// Raw consensus address.
    pub address: Vec<u8>,
    /// Raw consensus public key.
    pub pub_key: Vec<u8>,
    pub voting_power: i64,
    pub proposer_priority: i64,
}

/// Validator set active at a given height.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidatorSet {
    pub height: Height,
    pub validators: Vec<ChainValidator>,
}

impl ValidatorSet {
    /// Look for a validator by raw consensus address.
    pub fn find_by_address(&self, address: &[u8]) -> Option<&ChainValidator> {
        self.validators.iter().find(|val| val.address == address)
    }
}

/// Genesis document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GenesisDoc {
    pub chain_id: String,
    pub genesis_time: String,
    #[serde(deserialize_with = "serialize::str_or_num", default = "default_initial_height")]
    pub initial_height: Height,
    /// Raw application state, one entry per chain module.
    #[serde(default)]
    pub app_state: serde_json::Map<String, serde_json::Value>,
}

fn default_initial_height() -> Height {
    1
}

impl GenesisDoc {
    /// Parse a Tendermint genesis json document.
    pub fn from_json(buf: &[u8]) -> Result<Self> {
        serialize::json_deserialize(buf)
    }
}

/// Notification of a freshly committed block.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewBlockEvent {
    pub height: Height,
}

/// Staking pool values reported by the chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct StakingPoolValues {
    pub bonded_tokens: String,
    pub not_bonded_tokens: String,
}

/// IBC transfer parameters reported by the chain.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IbcTransferParams {
    pub send_enabled: bool,
    pub receive_enabled: bool,
}

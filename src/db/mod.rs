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


//! Persistence port.
//!
//! Every save operation is idempotent:
//! - an empty batch is a no-op;
//! - append-only entities (blocks, transactions, commit signatures) are
//!   inserted only when their natural key is absent;
//! - "latest wins" entities are updated only when the incoming height is
//!   greater or equal to the stored one.
//!
//! A batch is applied as a whole or not at all. Any error returned by a save
//! aborts the height that was being processed.

use crate::{base::schema::Height, crypto::ConsensusAddress, error::*};
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

pub mod memory;
pub mod models;

pub use memory::MemoryDb;
pub use models::*;

#[cfg_attr(test, automock)]
pub trait Db: Send + Sync + 'static {
    /// Check if the block at `height` has been completely stored.
    fn has_block(&self, height: Height) -> Result<bool>;

    /// Store a block row. The block row is the height completion marker.
    fn save_block(&self, block: &BlockRecord) -> Result<()>;

    /// Most recent stored block height.
    fn get_last_block_height(&self) -> Result<Option<Height>>;

    /// Most recent stored block row.
    fn get_last_block(&self) -> Result<Option<BlockRecord>>;

    /// Lowest stored block whose timestamp is not before `time`.
    fn get_block_since(&self, time: DateTime<Utc>) -> Result<Option<BlockRecord>>;

    /// Store a transaction using its hash as the key.
    fn save_tx(&self, tx: &Transaction) -> Result<()>;

    /// Store transaction messages, keyed by (transaction hash, index).
    fn save_messages(&self, messages: &[Message]) -> Result<()>;

    /// Store validators, keyed by consensus address.
    fn save_validators(&self, validators: &[Validator]) -> Result<()>;

    /// Load the latest known validator row for a consensus address.
    fn get_validator(&self, address: &ConsensusAddress) -> Result<Option<Validator>>;

    fn save_validator_descriptions(&self, descriptions: &[ValidatorDescription]) -> Result<()>;

    fn save_validator_commissions(&self, commissions: &[ValidatorCommission]) -> Result<()>;

    fn save_validators_status(&self, statuses: &[ValidatorStatus]) -> Result<()>;

    fn save_validators_voting_power(&self, powers: &[ValidatorVotingPower]) -> Result<()>;

    /// Store commit signatures, keyed by (validator address, timestamp).
    fn save_commit_signatures(&self, signatures: &[CommitSignature]) -> Result<()>;

    /// Store the genesis singleton, overwriting the previous one.
    fn save_genesis(&self, genesis: &Genesis) -> Result<()>;

    fn get_genesis(&self) -> Result<Option<Genesis>>;

    fn save_staking_pool(&self, pool: &StakingPool) -> Result<()>;

    fn save_supply(&self, supply: &Supply) -> Result<()>;

    fn save_inflation(&self, inflation: &Inflation) -> Result<()>;

    fn save_ibc_params(&self, params: &IbcParams) -> Result<()>;

    /// Store account balances, keyed by address.
    fn save_account_balances(&self, balances: &[AccountBalance]) -> Result<()>;

    /// Store an average block time, keyed by period.
    fn save_average_block_time(&self, average: &AverageBlockTime) -> Result<()>;

    /// Remove height indexed history strictly below `height`.
    fn prune(&self, height: Height) -> Result<()>;

    /// Store the pruning watermark. Never moves backwards.
    fn store_last_pruned(&self, height: Height) -> Result<()>;

    fn get_last_pruned(&self) -> Result<Option<Height>>;

    /// Release the backend resources. Further operations fail.
    fn close(&self) -> Result<()>;
}

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


//! Staking data: validators commissions, voting power, status and the pool.

use super::BlockData;
use crate::{
    base::{schema::GenesisDoc, serialize},
    crypto::ConsensusAddress,
    db::{Db, StakingPool, ValidatorCommission, ValidatorStatus, ValidatorVotingPower},
    node::Node,
    Result,
};

#[derive(Deserialize)]
struct CommissionRates {
    rate: String,
}

#[derive(Deserialize)]
struct Commission {
    commission_rates: CommissionRates,
}

#[derive(Deserialize)]
struct GenesisValidator {
    operator_address: String,
    commission: Commission,
    #[serde(default)]
    min_self_delegation: String,
}

#[derive(Deserialize)]
struct GenesisStaking {
    #[serde(default)]
    validators: Vec<GenesisValidator>,
}

/// Store the commissions of the validators defined at genesis.
pub fn handle_genesis<D: Db>(genesis: &GenesisDoc, db: &D) -> Result<()> {
    let staking: GenesisStaking = match genesis.app_state.get("staking") {
        Some(state) => serialize::json_from_value(state.clone())
            .map_err(|err| err.context("bad staking genesis state"))?,
        None => {
            debug!("[staking] no staking genesis state");
            return Ok(());
        }
    };

    let commissions: Vec<_> = staking
        .validators
        .into_iter()
        .map(|val| ValidatorCommission {
            operator_address: val.operator_address,
            commission: val.commission.commission_rates.rate,
            min_self_delegation: val.min_self_delegation,
            height: genesis.initial_height,
        })
        .collect();
    db.save_validator_commissions(&commissions)
}

/// Store the staking pool and the validators voting power and status.
/// The validator set only tells the active set membership, so the jailed and
/// tombstoned flags are left unknown.
pub fn handle_block<N: Node, D: Db>(data: &BlockData, node: &N, db: &D) -> Result<()> {
    let height = data.height();

    let pool = node
        .staking_pool(height)
        .map_err(|err| err.context("failed to get staking pool"))?;
    db.save_staking_pool(&StakingPool {
        bonded_tokens: pool.bonded_tokens,
        not_bonded_tokens: pool.not_bonded_tokens,
        height,
    })?;

    let mut powers = Vec::new();
    let mut statuses = Vec::new();
    for val in &data.validators.validators {
        let consensus_address = ConsensusAddress::from_raw(&val.address);
        // Only validators known to the operator registry have been stored.
        let stored = match db.get_validator(&consensus_address)? {
            Some(stored) => stored,
            None => continue,
        };
        powers.push(ValidatorVotingPower {
            consensus_address: consensus_address.clone(),
            operator_address: stored.operator_address.clone(),
            voting_power: val.voting_power,
            height,
        });
        statuses.push(ValidatorStatus {
            consensus_address,
            operator_address: stored.operator_address,
            in_active_set: true,
            jailed: None,
            tombstoned: None,
            height,
        });
    }

    db.save_validators_voting_power(&powers)?;
    db.save_validators_status(&statuses)
}

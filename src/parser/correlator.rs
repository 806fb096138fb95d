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


//! Validator correlation.
//!
//! Chain validators are matched against the operator registry by consensus
//! address. The registry is a curated allow-list: validators missing from it
//! are left out.

use crate::{
    base::schema::ValidatorSet,
    config::{ValidatorEntry, ValidatorsList},
    crypto::ConsensusAddress,
    db::{Validator, ValidatorDescription},
};

/// Validators enriched with their operator information.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Correlated {
    pub validators: Vec<Validator>,
    pub descriptions: Vec<ValidatorDescription>,
}

pub struct Correlator {
    entries: Vec<ValidatorEntry>,
}

impl Correlator {
    pub fn new(list: ValidatorsList) -> Self {
        Correlator {
            entries: list.entries,
        }
    }

    /// Registry entry for a consensus address. The first matching entry wins.
    pub fn find(&self, address: &ConsensusAddress) -> Option<&ValidatorEntry> {
        self.entries
            .iter()
            .find(|entry| address.matches_hex(&entry.raw_address))
    }

    /// Produce the validator and description rows for the given set.
    pub fn correlate(&self, set: &ValidatorSet) -> Correlated {
        let mut correlated = Correlated::default();

        for val in &set.validators {
            let consensus_address = ConsensusAddress::from_raw(&val.address);
            let entry = match self.find(&consensus_address) {
                Some(entry) => entry,
                None => {
                    trace!(
                        "[worker] validator {} not in registry, skipped",
                        consensus_address
                    );
                    continue;
                }
            };

            correlated.validators.push(Validator {
                consensus_address: consensus_address.clone(),
                consensus_pubkey: hex::encode(&val.pub_key),
                operator_address: entry.operator_address.clone(),
                height: set.height,
            });
            correlated.descriptions.push(ValidatorDescription {
                operator_address: entry.operator_address.clone(),
                consensus_address,
                moniker: entry.moniker.clone(),
                identity: entry.identity.clone(),
                avatar_url: entry.avatar_url.clone(),
                details: entry.description.clone(),
                height: set.height,
            });
        }

        correlated
    }
}

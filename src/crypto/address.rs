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


//! Validator consensus address.

use super::hash::sha256;
use std::fmt::{Display, Formatter};

/// Number of digest bytes forming a consensus address.
const ADDRESS_LEN: usize = 20;

/// Consensus address of a validator, uppercase hex of the raw 20 bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConsensusAddress(String);

impl ConsensusAddress {
    /// Build from the raw address bytes reported by the consensus engine.
    pub fn from_raw(raw: &[u8]) -> Self {
        ConsensusAddress(hex::encode_upper(raw))
    }

    /// Derive the address from a raw ed25519 consensus public key.
    pub fn from_pub_key(pub_key: &[u8]) -> Self {
        let hash = sha256(pub_key);
        Self::from_raw(&hash[..ADDRESS_LEN])
    }

    /// Case-insensitive comparison against a hex string.
    pub fn matches_hex(&self, hex: &str) -> bool {
        self.0.eq_ignore_ascii_case(hex.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConsensusAddress {
    fn from(hex: &str) -> Self {
        ConsensusAddress(hex.to_uppercase())
    }
}

impl Display for ConsensusAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

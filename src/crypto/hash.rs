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


//! Hashing utilities.

use ring::digest;

/// Length of a SHA-256 digest.
pub const SHA256_LEN: usize = 32;

/// Computes the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; SHA256_LEN] {
    let digest = digest::digest(&digest::SHA256, data);
    let mut hash = [0u8; SHA256_LEN];
    hash.copy_from_slice(digest.as_ref());
    hash
}

/// Transaction identifier: uppercase hex of the SHA-256 of the raw bytes.
pub fn tx_hash(raw_tx: &[u8]) -> String {
    hex::encode_upper(sha256(raw_tx))
}

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


//! Transactions decoding.
//!
//! Every raw transaction is decoded on its own. When the content cannot be
//! decoded the transaction is still reported, keyed by its own hash, with the
//! `decoded` flag unset.

use crate::{
    base::{
        schema::{Block, Height},
        serialize,
    },
    crypto::tx_hash,
    db::{Transaction, TxFee, TxMessage, TxSignature},
};

/// Json layout of a chain transaction.
#[derive(Deserialize)]
struct RawTx {
    #[serde(default)]
    fee: TxFee,
    #[serde(default)]
    memo: String,
    #[serde(default)]
    msg: Vec<TxMessage>,
    #[serde(default)]
    signatures: Vec<TxSignature>,
}

/// Decode a single raw transaction included in the block at `height`.
pub fn decode_tx(raw: &[u8], height: Height) -> Transaction {
    let hash = tx_hash(raw);
    match serialize::json_deserialize::<RawTx>(raw) {
        Ok(tx) => Transaction {
            hash,
            height,
            fee: tx.fee,
            memo: tx.memo,
            messages: tx.msg,
            signatures: tx.signatures,
            decoded: true,
        },
        Err(err) => {
            warn!(
                "[node] cannot decode tx {} at height {}: {}",
                hash,
                height,
                err.to_string_full()
            );
            Transaction::undecoded(hash, height)
        }
    }
}

/// Decode all the transactions of a block, preserving the block order.
pub fn decode_txs(block: &Block) -> Vec<Transaction> {
    block
        .txs
        .iter()
        .map(|raw| decode_tx(raw, block.height))
        .collect()
}

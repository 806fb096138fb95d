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


//! Persisted entities.
//!
//! Each entity is either append-only (written once per natural key) or a
//! "latest wins" projection carrying the height of the observation. The
//! latter implement [HeightStamped] so that backends can guard writes.

use crate::{
    base::schema::{Block, Coin, Height},
    crypto::ConsensusAddress,
};

/// Entity versioned by the height at which it was observed.
pub trait HeightStamped {
    fn height(&self) -> Height;
}

macro_rules! impl_height_stamped {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl HeightStamped for $ty {
                fn height(&self) -> Height {
                    self.height
                }
            }
        )+
    };
}

impl_height_stamped!(
    BlockRecord,
    Transaction,
    Validator,
    ValidatorDescription,
    ValidatorCommission,
    ValidatorStatus,
    ValidatorVotingPower,
    CommitSignature,
    Message,
    AccountBalance,
    AverageBlockTime,
    StakingPool,
    Supply,
    Inflation,
    IbcParams,
);

/// Stored block row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub height: Height,
    pub hash: String,
    pub num_txs: u64,
    pub total_gas: u64,
    pub proposer_address: ConsensusAddress,
    pub timestamp: String,
}

impl BlockRecord {
    pub fn new(block: &Block, total_gas: u64) -> Self {
        BlockRecord {
            height: block.height,
            hash: block.hash.clone(),
            num_txs: block.txs.len() as u64,
            total_gas,
            proposer_address: ConsensusAddress::from_raw(&block.proposer_address),
            timestamp: block.timestamp.clone(),
        }
    }
}

/// Transaction fee.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TxFee {
    #[serde(default)]
    pub amount: Vec<Coin>,
    #[serde(default)]
    pub gas: String,
}

/// Single transaction message, the value is kept as raw json.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxSignature {
    pub signature: String,
}

/// Stored transaction row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Uppercase hex SHA-256 of the raw bytes.
    pub hash: String,
    pub height: Height,
    pub fee: TxFee,
    pub memo: String,
    pub messages: Vec<TxMessage>,
    pub signatures: Vec<TxSignature>,
    /// False if the raw bytes could not be decoded.
    pub decoded: bool,
}

impl Transaction {
    /// Row for a transaction whose content could not be decoded.
    pub fn undecoded(hash: String, height: Height) -> Self {
        Transaction {
            hash,
            height,
            fee: TxFee::default(),
            memo: String::new(),
            messages: vec![],
            signatures: vec![],
            decoded: false,
        }
    }

    /// One row per message, in transaction order.
    pub fn message_rows(&self) -> Vec<Message> {
        self.messages
            .iter()
            .enumerate()
            .map(|(index, msg)| Message {
                tx_hash: self.hash.clone(),
                index,
                height: self.height,
                msg_type: msg.msg_type.clone(),
                value: msg.value.clone(),
                involved_accounts: involved_accounts(&msg.value),
            })
            .collect()
    }
}

/// Account addresses referenced by a message value.
/// Every string found under a key ending in `address` is collected, except
/// validator operator addresses. Duplicates are removed, first seen first.
pub fn involved_accounts(value: &serde_json::Value) -> Vec<String> {
    fn walk(value: &serde_json::Value, accounts: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map {
                    match val {
                        serde_json::Value::String(addr)
                            if key.ends_with("address")
                                && !addr.is_empty()
                                && !addr.contains("valoper") =>
                        {
                            if !accounts.contains(addr) {
                                accounts.push(addr.clone());
                            }
                        }
                        _ => walk(val, accounts),
                    }
                }
            }
            serde_json::Value::Array(items) => {
                items.iter().for_each(|item| walk(item, accounts));
            }
            _ => (),
        }
    }

    let mut accounts = Vec::new();
    walk(value, &mut accounts);
    accounts
}

/// Single message of a stored transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub tx_hash: String,
    /// Position inside the transaction.
    pub index: usize,
    pub height: Height,
    pub msg_type: String,
    pub value: serde_json::Value,
    pub involved_accounts: Vec<String>,
}

/// Balances of an account as observed at `height`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub address: String,
    pub balances: Vec<Coin>,
    pub height: Height,
}

/// Window over which an average block time is computed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockTimePeriod {
    /// Since the chain genesis.
    Genesis,
    Day,
    Hour,
    Minute,
}

/// Average seconds between two blocks over a period ending at `height`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AverageBlockTime {
    pub period: BlockTimePeriod,
    pub average_time: f64,
    pub height: Height,
}

/// Validator identity as known at `height`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub consensus_address: ConsensusAddress,
    /// Hex encoded consensus public key.
    pub consensus_pubkey: String,
    pub operator_address: String,
    pub height: Height,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidatorDescription {
    pub operator_address: String,
    pub consensus_address: ConsensusAddress,
    pub moniker: String,
    pub identity: String,
    pub avatar_url: Option<String>,
    pub details: String,
    pub height: Height,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidatorCommission {
    pub operator_address: String,
    /// Decimal commission rate, as reported by the chain.
    pub commission: String,
    pub min_self_delegation: String,
    pub height: Height,
}

/// Only the active set membership is observed from the validator set.
/// `jailed` and `tombstoned` are `None` when the chain did not report them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidatorStatus {
    pub consensus_address: ConsensusAddress,
    pub operator_address: String,
    pub in_active_set: bool,
    pub jailed: Option<bool>,
    pub tombstoned: Option<bool>,
    pub height: Height,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidatorVotingPower {
    pub consensus_address: ConsensusAddress,
    pub operator_address: String,
    pub voting_power: i64,
    pub height: Height,
}

/// Signature of a validator over a block commit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommitSignature {
    pub validator_address: ConsensusAddress,
    pub voting_power: i64,
    pub proposer_priority: i64,
    pub height: Height,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StakingPool {
    pub bonded_tokens: String,
    pub not_bonded_tokens: String,
    pub height: Height,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Supply {
    pub coins: Vec<Coin>,
    pub height: Height,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Inflation {
    pub value: String,
    pub height: Height,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IbcParams {
    pub send_enabled: bool,
    pub receive_enabled: bool,
    pub height: Height,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Genesis {
    pub chain_id: String,
    /// RFC3339 genesis time.
    pub time: String,
    pub initial_height: Height,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::schema::tests::create_test_block;

    #[test]
    fn block_record_from_block() {
        let mut block = create_test_block(7, 1, &[1, 2]);
        block.txs = vec![vec![1], vec![2], vec![3]];

        let record = BlockRecord::new(&block, 900);

        assert_eq!(record.height, 7);
        assert_eq!(record.num_txs, 3);
        assert_eq!(record.total_gas, 900);
        assert_eq!(record.proposer_address, ConsensusAddress::from_raw(&[1; 20]));
    }

    #[test]
    fn undecoded_transaction() {
        let tx = Transaction::undecoded("AB".to_string(), 4);

        assert!(!tx.decoded);
        assert_eq!(tx.height(), 4);
        assert!(tx.messages.is_empty());
        assert!(tx.message_rows().is_empty());
    }

    #[test]
    fn message_rows_keep_order_and_accounts() {
        let mut tx = Transaction::undecoded("AB".to_string(), 4);
        tx.messages = vec![
            TxMessage {
                msg_type: "cosmos-sdk/MsgSend".to_string(),
                value: serde_json::json!({
                    "from_address": "nomic1from",
                    "to_address": "nomic1to",
                    "amount": [{ "denom": "unom", "amount": "5" }]
                }),
            },
            TxMessage {
                msg_type: "cosmos-sdk/MsgDelegate".to_string(),
                value: serde_json::json!({
                    "delegator_address": "nomic1from",
                    "validator_address": "nomicvaloper1abc"
                }),
            },
        ];

        let rows = tx.message_rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].tx_hash, "AB");
        assert_eq!(rows[0].involved_accounts, vec!["nomic1from", "nomic1to"]);
        assert_eq!(rows[1].involved_accounts, vec!["nomic1from"]);
    }

    #[test]
    fn nested_accounts_are_deduplicated() {
        let value = serde_json::json!({
            "inputs": [{ "address": "nomic1a" }, { "address": "nomic1b" }],
            "outputs": [{ "address": "nomic1a" }]
        });

        assert_eq!(involved_accounts(&value), vec!["nomic1a", "nomic1b"]);
    }
}

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


//! In-memory persistence backend.
//!
//! Tables are ordered maps guarded by a single read-write lock. Each save
//! operation takes the write lock once, so a batch is never observed half
//! applied. "Latest wins" rows go through a compare-and-swap by height.

use super::{models::*, Db};
use crate::{
    base::{schema::Height, serialize::parse_timestamp, RwLock},
    crypto::ConsensusAddress,
    Error, ErrorKind, Result,
};
use chrono::{DateTime, Utc};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

/// Insert or update `row` unless the stored row is more recent.
/// Returns true if the table has been modified.
fn upsert_latest<K: Ord, T: HeightStamped>(table: &mut BTreeMap<K, T>, key: K, row: T) -> bool {
    match table.get(&key) {
        Some(stored) if stored.height() > row.height() => false,
        _ => {
            table.insert(key, row);
            true
        }
    }
}

/// Singleton flavour of [upsert_latest].
fn replace_latest<T: HeightStamped>(slot: &mut Option<T>, row: T) -> bool {
    match slot {
        Some(stored) if stored.height() > row.height() => false,
        _ => {
            *slot = Some(row);
            true
        }
    }
}

/// Insert `row` only if `key` is not there yet.
fn insert_absent<K: Ord, T>(table: &mut BTreeMap<K, T>, key: K, row: T) -> bool {
    if table.contains_key(&key) {
        return false;
    }
    table.insert(key, row);
    true
}

#[derive(Default)]
struct Tables {
    blocks: BTreeMap<Height, BlockRecord>,
    txs: BTreeMap<String, Transaction>,
    validators: BTreeMap<ConsensusAddress, Validator>,
    descriptions: BTreeMap<String, ValidatorDescription>,
    commissions: BTreeMap<String, ValidatorCommission>,
    statuses: BTreeMap<String, ValidatorStatus>,
    voting_powers: BTreeMap<String, ValidatorVotingPower>,
    commit_signatures: BTreeMap<(ConsensusAddress, String), CommitSignature>,
    messages: BTreeMap<(String, usize), Message>,
    balances: BTreeMap<String, AccountBalance>,
    average_block_times: BTreeMap<BlockTimePeriod, AverageBlockTime>,
    genesis: Option<Genesis>,
    staking_pool: Option<StakingPool>,
    supply: Option<Supply>,
    inflation: Option<Inflation>,
    ibc_params: Option<IbcParams>,
    last_pruned: Option<Height>,
}

/// Persistence port kept in memory.
#[derive(Default)]
pub struct MemoryDb {
    tables: RwLock<Tables>,
    closed: AtomicBool,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::new_ext(ErrorKind::DatabaseFault, "database closed"));
        }
        Ok(())
    }

    /// Apply `op` under a single write lock.
    fn write<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut Tables),
    {
        self.check_open()?;
        let mut tables = self.tables.write();
        op(&mut tables);
        Ok(())
    }

    /// Apply a non-empty batch under a single write lock.
    fn write_batch<T, F>(&self, rows: &[T], op: F) -> Result<()>
    where
        F: FnOnce(&mut Tables, &[T]),
    {
        if rows.is_empty() {
            return Ok(());
        }
        self.write(|tables| op(tables, rows))
    }

    pub fn block(&self, height: Height) -> Option<BlockRecord> {
        self.tables.read().blocks.get(&height).cloned()
    }

    pub fn blocks_count(&self) -> usize {
        self.tables.read().blocks.len()
    }

    pub fn transaction(&self, hash: &str) -> Option<Transaction> {
        self.tables.read().txs.get(hash).cloned()
    }

    /// Transactions belonging to the block at `height`.
    pub fn transactions_at(&self, height: Height) -> Vec<Transaction> {
        self.tables
            .read()
            .txs
            .values()
            .filter(|tx| tx.height == height)
            .cloned()
            .collect()
    }

    pub fn validator(&self, address: &ConsensusAddress) -> Option<Validator> {
        self.tables.read().validators.get(address).cloned()
    }

    pub fn validators_count(&self) -> usize {
        self.tables.read().validators.len()
    }

    pub fn validator_description(&self, operator_address: &str) -> Option<ValidatorDescription> {
        self.tables.read().descriptions.get(operator_address).cloned()
    }

    pub fn descriptions_count(&self) -> usize {
        self.tables.read().descriptions.len()
    }

    pub fn validator_commission(&self, operator_address: &str) -> Option<ValidatorCommission> {
        self.tables.read().commissions.get(operator_address).cloned()
    }

    pub fn validator_status(&self, operator_address: &str) -> Option<ValidatorStatus> {
        self.tables.read().statuses.get(operator_address).cloned()
    }

    pub fn validator_voting_power(&self, operator_address: &str) -> Option<ValidatorVotingPower> {
        self.tables.read().voting_powers.get(operator_address).cloned()
    }

    /// Commit signatures stored for the block at `height`.
    pub fn commit_signatures(&self, height: Height) -> Vec<CommitSignature> {
        self.tables
            .read()
            .commit_signatures
            .values()
            .filter(|sig| sig.height == height)
            .cloned()
            .collect()
    }

    /// Messages of a transaction, in transaction order.
    pub fn messages(&self, tx_hash: &str) -> Vec<Message> {
        self.tables
            .read()
            .messages
            .values()
            .filter(|msg| msg.tx_hash == tx_hash)
            .cloned()
            .collect()
    }

    pub fn messages_count(&self) -> usize {
        self.tables.read().messages.len()
    }

    pub fn account_balance(&self, address: &str) -> Option<AccountBalance> {
        self.tables.read().balances.get(address).cloned()
    }

    pub fn average_block_time(&self, period: BlockTimePeriod) -> Option<AverageBlockTime> {
        self.tables.read().average_block_times.get(&period).copied()
    }

    pub fn commit_signatures_count(&self) -> usize {
        self.tables.read().commit_signatures.len()
    }

    pub fn staking_pool(&self) -> Option<StakingPool> {
        self.tables.read().staking_pool.clone()
    }

    pub fn supply(&self) -> Option<Supply> {
        self.tables.read().supply.clone()
    }

    pub fn inflation(&self) -> Option<Inflation> {
        self.tables.read().inflation.clone()
    }

    pub fn ibc_params(&self) -> Option<IbcParams> {
        self.tables.read().ibc_params
    }
}

impl Db for MemoryDb {
    fn has_block(&self, height: Height) -> Result<bool> {
        self.check_open()?;
        Ok(self.tables.read().blocks.contains_key(&height))
    }

    fn save_block(&self, block: &BlockRecord) -> Result<()> {
        self.write(|tables| {
            insert_absent(&mut tables.blocks, block.height, block.clone());
        })
    }

    fn get_last_block_height(&self) -> Result<Option<Height>> {
        self.check_open()?;
        Ok(self.tables.read().blocks.keys().next_back().copied())
    }

    fn get_last_block(&self) -> Result<Option<BlockRecord>> {
        self.check_open()?;
        Ok(self.tables.read().blocks.values().next_back().cloned())
    }

    fn get_block_since(&self, time: DateTime<Utc>) -> Result<Option<BlockRecord>> {
        self.check_open()?;
        let tables = self.tables.read();
        for block in tables.blocks.values() {
            match parse_timestamp(&block.timestamp) {
                Ok(block_time) if block_time >= time => return Ok(Some(block.clone())),
                Ok(_) => (),
                Err(err) => warn!("[db] block {} skipped: {}", block.height, err.to_string_full()),
            }
        }
        Ok(None)
    }

    fn save_tx(&self, tx: &Transaction) -> Result<()> {
        self.write(|tables| {
            insert_absent(&mut tables.txs, tx.hash.clone(), tx.clone());
        })
    }

    fn save_messages(&self, messages: &[Message]) -> Result<()> {
        self.write_batch(messages, |tables, rows| {
            for row in rows {
                let key = (row.tx_hash.clone(), row.index);
                insert_absent(&mut tables.messages, key, row.clone());
            }
        })
    }

    fn save_validators(&self, validators: &[Validator]) -> Result<()> {
        self.write_batch(validators, |tables, rows| {
            for row in rows {
                let key = row.consensus_address.clone();
                upsert_latest(&mut tables.validators, key, row.clone());
            }
        })
    }

    fn get_validator(&self, address: &ConsensusAddress) -> Result<Option<Validator>> {
        self.check_open()?;
        Ok(self.validator(address))
    }

    fn save_validator_descriptions(&self, descriptions: &[ValidatorDescription]) -> Result<()> {
        self.write_batch(descriptions, |tables, rows| {
            for row in rows {
                let key = row.operator_address.clone();
                upsert_latest(&mut tables.descriptions, key, row.clone());
            }
        })
    }

    fn save_validator_commissions(&self, commissions: &[ValidatorCommission]) -> Result<()> {
        self.write_batch(commissions, |tables, rows| {
            for row in rows {
                let key = row.operator_address.clone();
                upsert_latest(&mut tables.commissions, key, row.clone());
            }
        })
    }

    fn save_validators_status(&self, statuses: &[ValidatorStatus]) -> Result<()> {
        self.write_batch(statuses, |tables, rows| {
            for row in rows {
                let key = row.operator_address.clone();
                upsert_latest(&mut tables.statuses, key, row.clone());
            }
        })
    }

    fn save_validators_voting_power(&self, powers: &[ValidatorVotingPower]) -> Result<()> {
        self.write_batch(powers, |tables, rows| {
            for row in rows {
                let key = row.operator_address.clone();
                upsert_latest(&mut tables.voting_powers, key, row.clone());
            }
        })
    }

    fn save_commit_signatures(&self, signatures: &[CommitSignature]) -> Result<()> {
        self.write_batch(signatures, |tables, rows| {
            for row in rows {
                let key = (row.validator_address.clone(), row.timestamp.clone());
                insert_absent(&mut tables.commit_signatures, key, row.clone());
            }
        })
    }

    fn save_genesis(&self, genesis: &Genesis) -> Result<()> {
        self.write(|tables| tables.genesis = Some(genesis.clone()))
    }

    fn get_genesis(&self) -> Result<Option<Genesis>> {
        self.check_open()?;
        Ok(self.tables.read().genesis.clone())
    }

    fn save_staking_pool(&self, pool: &StakingPool) -> Result<()> {
        self.write(|tables| {
            replace_latest(&mut tables.staking_pool, pool.clone());
        })
    }

    fn save_supply(&self, supply: &Supply) -> Result<()> {
        self.write(|tables| {
            replace_latest(&mut tables.supply, supply.clone());
        })
    }

    fn save_inflation(&self, inflation: &Inflation) -> Result<()> {
        self.write(|tables| {
            replace_latest(&mut tables.inflation, inflation.clone());
        })
    }

    fn save_ibc_params(&self, params: &IbcParams) -> Result<()> {
        self.write(|tables| {
            replace_latest(&mut tables.ibc_params, *params);
        })
    }

    fn save_account_balances(&self, balances: &[AccountBalance]) -> Result<()> {
        self.write_batch(balances, |tables, rows| {
            for row in rows {
                upsert_latest(&mut tables.balances, row.address.clone(), row.clone());
            }
        })
    }

    fn save_average_block_time(&self, average: &AverageBlockTime) -> Result<()> {
        self.write(|tables| {
            upsert_latest(&mut tables.average_block_times, average.period, *average);
        })
    }

    fn prune(&self, height: Height) -> Result<()> {
        self.write(|tables| {
            tables.blocks = tables.blocks.split_off(&height);
            tables.txs.retain(|_, tx| tx.height >= height);
            tables.commit_signatures.retain(|_, sig| sig.height >= height);
            tables.messages.retain(|_, msg| msg.height >= height);
        })?;
        debug!("[db] pruned history below height {}", height);
        Ok(())
    }

    fn store_last_pruned(&self, height: Height) -> Result<()> {
        self.write(|tables| match tables.last_pruned {
            Some(stored) if stored > height => (),
            _ => tables.last_pruned = Some(height),
        })
    }

    fn get_last_pruned(&self) -> Result<Option<Height>> {
        self.check_open()?;
        Ok(self.tables.read().last_pruned)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::schema::Coin;
    use std::{sync::Arc, thread};

    const OPERATOR: &str = "nomicvaloper1abc";

    fn address(byte: u8) -> ConsensusAddress {
        ConsensusAddress::from_raw(&[byte; 20])
    }

    fn create_block_record(height: Height) -> BlockRecord {
        BlockRecord {
            height,
            hash: format!("{:064X}", height),
            num_txs: 0,
            total_gas: 0,
            proposer_address: address(1),
            timestamp: format!("2021-06-01T15:00:{:02}Z", height % 60),
        }
    }

    fn create_message(tx_hash: &str, index: usize, height: Height) -> Message {
        Message {
            tx_hash: tx_hash.to_string(),
            index,
            height,
            msg_type: "cosmos-sdk/MsgSend".to_string(),
            value: serde_json::Value::Null,
            involved_accounts: vec![],
        }
    }

    fn create_description(moniker: &str, height: Height) -> ValidatorDescription {
        ValidatorDescription {
            operator_address: OPERATOR.to_string(),
            consensus_address: address(1),
            moniker: moniker.to_string(),
            identity: String::new(),
            avatar_url: None,
            details: String::new(),
            height,
        }
    }

    fn create_voting_power(power: i64, height: Height) -> ValidatorVotingPower {
        ValidatorVotingPower {
            consensus_address: address(1),
            operator_address: OPERATOR.to_string(),
            voting_power: power,
            height,
        }
    }

    fn create_commit_signature(addr: u8, height: Height) -> CommitSignature {
        CommitSignature {
            validator_address: address(addr),
            voting_power: 10,
            proposer_priority: 0,
            height,
            timestamp: format!("2021-06-01T15:{:02}:{:02}Z", height % 60, addr),
        }
    }

    fn create_staking_pool(height: Height) -> StakingPool {
        StakingPool {
            bonded_tokens: (height * 1000).to_string(),
            not_bonded_tokens: height.to_string(),
            height,
        }
    }

    fn create_tx(hash: &str, height: Height) -> Transaction {
        Transaction::undecoded(hash.to_string(), height)
    }

    /// Apply the "current state" writes of a height.
    fn apply_height(db: &MemoryDb, height: Height) {
        db.save_validators_voting_power(&[create_voting_power(height as i64, height)])
            .unwrap();
        db.save_validator_descriptions(&[create_description(&format!("M{}", height), height)])
            .unwrap();
        db.save_staking_pool(&create_staking_pool(height)).unwrap();
    }

    #[test]
    fn block_presence() {
        let db = MemoryDb::new();
        assert!(!db.has_block(3).unwrap());

        db.save_block(&create_block_record(3)).unwrap();

        assert!(db.has_block(3).unwrap());
        assert!(!db.has_block(4).unwrap());
    }

    #[test]
    fn duplicated_block_is_noop() {
        let db = MemoryDb::new();
        let first = create_block_record(3);
        let mut second = create_block_record(3);
        second.total_gas = 42;

        db.save_block(&first).unwrap();
        db.save_block(&second).unwrap();

        assert_eq!(db.blocks_count(), 1);
        assert_eq!(db.block(3).unwrap(), first);
    }

    #[test]
    fn duplicated_tx_is_noop() {
        let db = MemoryDb::new();

        db.save_tx(&create_tx("AA", 3)).unwrap();
        db.save_tx(&create_tx("AA", 3)).unwrap();
        db.save_tx(&create_tx("BB", 3)).unwrap();

        assert_eq!(db.transactions_at(3).len(), 2);
    }

    #[test]
    fn empty_batches_are_noop() {
        let db = MemoryDb::new();

        db.save_validators(&[]).unwrap();
        db.save_validator_descriptions(&[]).unwrap();
        db.save_commit_signatures(&[]).unwrap();

        assert_eq!(db.validators_count(), 0);
        assert_eq!(db.descriptions_count(), 0);
        assert_eq!(db.commit_signatures_count(), 0);
    }

    #[test]
    fn older_description_never_overwrites_newer() {
        let db = MemoryDb::new();

        db.save_validator_descriptions(&[create_description("A", 100)])
            .unwrap();
        db.save_validator_descriptions(&[create_description("B", 90)])
            .unwrap();

        let stored = db.validator_description(OPERATOR).unwrap();
        assert_eq!(stored.moniker, "A");
        assert_eq!(stored.height, 100);
    }

    #[test]
    fn newer_description_overwrites_older() {
        let db = MemoryDb::new();

        db.save_validator_descriptions(&[create_description("B", 90)])
            .unwrap();
        db.save_validator_descriptions(&[create_description("A", 100)])
            .unwrap();

        let stored = db.validator_description(OPERATOR).unwrap();
        assert_eq!(stored.moniker, "A");
        assert_eq!(stored.height, 100);
    }

    #[test]
    fn same_height_overwrites() {
        let db = MemoryDb::new();

        db.save_validators_voting_power(&[create_voting_power(1, 50)])
            .unwrap();
        db.save_validators_voting_power(&[create_voting_power(2, 50)])
            .unwrap();

        assert_eq!(db.validator_voting_power(OPERATOR).unwrap().voting_power, 2);
    }

    #[test]
    fn out_of_order_heights_converge() {
        let ordered = MemoryDb::new();
        let shuffled = MemoryDb::new();

        for height in [3, 4, 5] {
            apply_height(&ordered, height);
        }
        for height in [5, 3, 4] {
            apply_height(&shuffled, height);
        }

        assert_eq!(
            ordered.validator_voting_power(OPERATOR),
            shuffled.validator_voting_power(OPERATOR)
        );
        assert_eq!(
            ordered.validator_description(OPERATOR),
            shuffled.validator_description(OPERATOR)
        );
        assert_eq!(ordered.staking_pool(), shuffled.staking_pool());
        assert_eq!(shuffled.staking_pool().unwrap().height, 5);
    }

    #[test]
    fn singletons_are_height_guarded() {
        let db = MemoryDb::new();
        let supply = |amount: &str, height| Supply {
            coins: vec![Coin::new("unom", amount)],
            height,
        };

        db.save_supply(&supply("200", 20)).unwrap();
        db.save_supply(&supply("100", 10)).unwrap();
        db.save_inflation(&Inflation {
            value: "0.1".to_string(),
            height: 20,
        })
        .unwrap();
        db.save_inflation(&Inflation {
            value: "0.2".to_string(),
            height: 10,
        })
        .unwrap();

        assert_eq!(db.supply().unwrap().coins[0].amount, "200");
        assert_eq!(db.inflation().unwrap().value, "0.1");
    }

    #[test]
    fn validators_latest_wins_by_consensus_address() {
        let db = MemoryDb::new();
        let validator = |operator: &str, height| Validator {
            consensus_address: address(1),
            consensus_pubkey: "00".to_string(),
            operator_address: operator.to_string(),
            height,
        };

        db.save_validators(&[validator("new", 10)]).unwrap();
        db.save_validators(&[validator("old", 5)]).unwrap();

        let stored = db.get_validator(&address(1)).unwrap().unwrap();
        assert_eq!(stored.operator_address, "new");
        assert_eq!(db.validators_count(), 1);
    }

    #[test]
    fn commit_signatures_are_append_only() {
        let db = MemoryDb::new();
        let batch = vec![create_commit_signature(1, 7), create_commit_signature(2, 7)];

        db.save_commit_signatures(&batch).unwrap();
        db.save_commit_signatures(&batch).unwrap();

        assert_eq!(db.commit_signatures(7).len(), 2);
    }

    #[test]
    fn prune_removes_history_strictly_below() {
        let db = MemoryDb::new();
        for height in 1..=5 {
            db.save_block(&create_block_record(height)).unwrap();
            db.save_tx(&create_tx(&format!("{:02X}", height), height))
                .unwrap();
            db.save_commit_signatures(&[create_commit_signature(1, height)])
                .unwrap();
            db.save_messages(&[create_message(&format!("{:02X}", height), 0, height)])
                .unwrap();
            apply_height(&db, height);
        }

        db.prune(3).unwrap();

        assert!(!db.has_block(2).unwrap());
        assert!(db.has_block(3).unwrap());
        assert_eq!(db.blocks_count(), 3);
        assert!(db.transactions_at(2).is_empty());
        assert_eq!(db.transactions_at(3).len(), 1);
        assert!(db.commit_signatures(1).is_empty());
        assert_eq!(db.commit_signatures_count(), 3);
        assert_eq!(db.messages_count(), 3);
        assert!(db.messages("02").is_empty());
        assert_eq!(db.staking_pool().unwrap().height, 5);
        assert!(db.validator_description(OPERATOR).is_some());
    }

    #[test]
    fn messages_are_append_only() {
        let db = MemoryDb::new();
        let batch = vec![create_message("AA", 0, 3), create_message("AA", 1, 3)];
        let mut changed = create_message("AA", 0, 3);
        changed.msg_type = "other".to_string();

        db.save_messages(&batch).unwrap();
        db.save_messages(&[changed]).unwrap();
        db.save_messages(&[]).unwrap();

        let stored = db.messages("AA");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].msg_type, "cosmos-sdk/MsgSend");
        assert_eq!(stored[1].index, 1);
    }

    #[test]
    fn account_balances_are_height_guarded() {
        let db = MemoryDb::new();
        let balance = |amount: &str, height| AccountBalance {
            address: "nomic1abc".to_string(),
            balances: vec![Coin::new("unom", amount)],
            height,
        };

        db.save_account_balances(&[balance("50", 20)]).unwrap();
        db.save_account_balances(&[balance("10", 10)]).unwrap();

        let stored = db.account_balance("nomic1abc").unwrap();
        assert_eq!(stored.balances[0].amount, "50");
        assert_eq!(stored.height, 20);
    }

    #[test]
    fn average_block_time_per_period() {
        let db = MemoryDb::new();
        let average = |period, average_time, height| AverageBlockTime {
            period,
            average_time,
            height,
        };

        db.save_average_block_time(&average(BlockTimePeriod::Hour, 6.0, 20))
            .unwrap();
        db.save_average_block_time(&average(BlockTimePeriod::Hour, 5.0, 10))
            .unwrap();
        db.save_average_block_time(&average(BlockTimePeriod::Minute, 4.0, 10))
            .unwrap();

        assert_eq!(db.average_block_time(BlockTimePeriod::Hour).unwrap().average_time, 6.0);
        assert_eq!(db.average_block_time(BlockTimePeriod::Minute).unwrap().height, 10);
        assert!(db.average_block_time(BlockTimePeriod::Day).is_none());
    }

    #[test]
    fn last_block_and_block_since() {
        let db = MemoryDb::new();
        assert_eq!(db.get_last_block_height().unwrap(), None);
        for height in [4, 9, 6] {
            db.save_block(&create_block_record(height)).unwrap();
        }

        assert_eq!(db.get_last_block_height().unwrap(), Some(9));
        assert_eq!(db.get_last_block().unwrap().unwrap().height, 9);

        let since = parse_timestamp("2021-06-01T15:00:05Z").unwrap();
        assert_eq!(db.get_block_since(since).unwrap().unwrap().height, 6);
        let since = parse_timestamp("2021-06-01T15:00:10Z").unwrap();
        assert!(db.get_block_since(since).unwrap().is_none());
    }

    #[test]
    fn last_pruned_never_goes_backwards() {
        let db = MemoryDb::new();
        assert_eq!(db.get_last_pruned().unwrap(), None);

        db.store_last_pruned(100).unwrap();
        db.store_last_pruned(50).unwrap();

        assert_eq!(db.get_last_pruned().unwrap(), Some(100));

        db.store_last_pruned(150).unwrap();
        assert_eq!(db.get_last_pruned().unwrap(), Some(150));
    }

    #[test]
    fn genesis_is_overwritten() {
        let db = MemoryDb::new();
        let genesis = |chain_id: &str| Genesis {
            chain_id: chain_id.to_string(),
            time: "2021-06-01T15:00:00Z".to_string(),
            initial_height: 1,
        };

        db.save_genesis(&genesis("first")).unwrap();
        db.save_genesis(&genesis("second")).unwrap();

        assert_eq!(db.get_genesis().unwrap().unwrap().chain_id, "second");
    }

    #[test]
    fn closed_database_fails() {
        let db = MemoryDb::new();

        db.close().unwrap();

        let err = db.save_block(&create_block_record(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DatabaseFault);
        assert_eq!(db.has_block(1).unwrap_err().kind, ErrorKind::DatabaseFault);
    }

    #[test]
    fn concurrent_writers_keep_latest() {
        let db = Arc::new(MemoryDb::new());

        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let db = db.clone();
                thread::spawn(move || {
                    for height in (1..=50u64).rev().filter(|h| h % 4 == i) {
                        apply_height(&db, height);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(db.validator_voting_power(OPERATOR).unwrap().height, 50);
        assert_eq!(db.validator_description(OPERATOR).unwrap().moniker, "M50");
        assert_eq!(db.staking_pool().unwrap().height, 50);
    }
}

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


//! Total supply and account balances.
//!
//! Balances are refreshed for the accounts involved in the block messages.

use super::BlockData;
use crate::{
    db::{AccountBalance, Db, Supply},
    node::Node,
    Result,
};

/// Accounts involved in the block messages, first seen first.
fn block_accounts(data: &BlockData) -> Vec<String> {
    let mut accounts: Vec<String> = Vec::new();
    for msg in data.txs.iter().flat_map(|tx| tx.message_rows()) {
        for account in msg.involved_accounts {
            if !accounts.contains(&account) {
                accounts.push(account);
            }
        }
    }
    accounts
}

pub fn handle_block<N: Node, D: Db>(data: &BlockData, node: &N, db: &D) -> Result<()> {
    let height = data.height();
    let coins = node
        .supply(height)
        .map_err(|err| err.context("failed to get supply"))?;
    db.save_supply(&Supply { coins, height })?;

    let balances = block_accounts(data)
        .into_iter()
        .map(|address| -> Result<AccountBalance> {
            let balances = node.account_balance(&address, height)?;
            Ok(AccountBalance {
                address,
                balances,
                height,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    db.save_account_balances(&balances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::schema::{
            tests::{create_test_block, create_test_validator_set},
            BlockResults, Coin,
        },
        db::{MemoryDb, Transaction, TxMessage},
        node::MockNode,
        Error, ErrorKind,
    };
    use mockall::predicate::{always, eq};

    fn create_send_tx(hash: &str, from: &str, to: &str) -> Transaction {
        let mut tx = Transaction::undecoded(hash.to_string(), 10);
        tx.decoded = true;
        tx.messages = vec![TxMessage {
            msg_type: "cosmos-sdk/MsgSend".to_string(),
            value: serde_json::json!({ "from_address": from, "to_address": to }),
        }];
        tx
    }

    fn create_node_mock() -> MockNode {
        let mut node = MockNode::new();
        node.expect_supply()
            .returning(|_| Ok(vec![Coin::new("unom", "1000")]));
        node
    }

    #[test]
    fn balances_of_involved_accounts() {
        let mut node = create_node_mock();
        node.expect_account_balance()
            .with(always(), eq(10))
            .times(3)
            .returning(|address, _| Ok(vec![Coin::new("unom", &address.len().to_string())]));
        let db = MemoryDb::new();
        let block = create_test_block(10, 1, &[]);
        let results = BlockResults::default();
        let validators = create_test_validator_set(10, &[1]);
        let txs = vec![
            create_send_tx("AA", "nomic1a", "nomic1bb"),
            create_send_tx("BB", "nomic1bb", "nomic1ccc"),
        ];
        let data = BlockData {
            block: &block,
            results: &results,
            validators: &validators,
            txs: &txs,
        };

        handle_block(&data, &node, &db).unwrap();

        assert_eq!(db.supply().unwrap().height, 10);
        let stored = db.account_balance("nomic1ccc").unwrap();
        assert_eq!(stored.balances[0].amount, "9");
        assert_eq!(stored.height, 10);
        assert!(db.account_balance("nomic1a").is_some());
    }

    #[test]
    fn balance_failure_fails_the_module() {
        let mut node = create_node_mock();
        node.expect_account_balance()
            .returning(|_, _| Err(Error::new_ext(ErrorKind::NodeFault, "timeout")));
        let db = MemoryDb::new();
        let block = create_test_block(10, 1, &[]);
        let results = BlockResults::default();
        let validators = create_test_validator_set(10, &[1]);
        let txs = vec![create_send_tx("AA", "nomic1a", "nomic1b")];
        let data = BlockData {
            block: &block,
            results: &results,
            validators: &validators,
            txs: &txs,
        };

        let err = handle_block(&data, &node, &db).unwrap_err();

        assert_eq!(err.kind, ErrorKind::NodeFault);
        assert!(db.account_balance("nomic1a").is_none());
    }
}

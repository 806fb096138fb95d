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


//! Chain node client.
//!
//! The [Node] trait is the capability set consumed by the parser. Every
//! operation surfaces its errors, retrying is a caller concern.

use crate::{
    base::schema::{
        Block, BlockResults, Coin, GenesisDoc, Height, IbcTransferParams, NewBlockEvent,
        StakingPoolValues, ValidatorSet,
    },
    db::Transaction,
    Result,
};
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;

mod decode;
#[cfg(feature = "remote")]
mod remote;

pub use decode::{decode_tx, decode_txs};
#[cfg(feature = "remote")]
pub use remote::RemoteNode;

/// Lazy sequence of new block notifications.
pub type NewBlockStream = BoxStream<'static, Result<NewBlockEvent>>;

#[cfg_attr(test, automock)]
pub trait Node: Send + Sync + 'static {
    /// Chain genesis document.
    fn genesis(&self) -> Result<GenesisDoc>;

    /// Height of the most recent committed block.
    fn latest_height(&self) -> Result<Height>;

    fn block(&self, height: Height) -> Result<Block>;

    fn block_results(&self, height: Height) -> Result<BlockResults>;

    /// Complete validator set at `height`, all the pages are drained.
    fn validators(&self, height: Height) -> Result<ValidatorSet>;

    /// Decoded transactions of a block.
    fn txs(&self, block: &Block) -> Result<Vec<Transaction>> {
        Ok(decode_txs(block))
    }

    /// Subscribe to new block events. Subscribing again restarts the sequence
    /// from the current chain tip.
    fn subscribe_new_blocks(&self, subscriber: &str) -> Result<NewBlockStream>;

    fn staking_pool(&self, height: Height) -> Result<StakingPoolValues>;

    fn supply(&self, height: Height) -> Result<Vec<Coin>>;

    /// Balances of an account at `height`.
    fn account_balance(&self, address: &str, height: Height) -> Result<Vec<Coin>>;

    fn inflation(&self, height: Height) -> Result<String>;

    fn ibc_params(&self, height: Height) -> Result<IbcTransferParams>;

    /// Release the node connection. Active subscriptions terminate.
    fn stop(&self);
}

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


//! Per-height processing.
//!
//! A height goes through the following stages:
//! `Fetching -> Correlating -> Resolving -> Persisting -> Dispatching -> Done`.
//!
//! Everything that can reject a height (fetch, correlation, proposer and
//! signers resolution) happens before the first write. The block row is the
//! completion marker and is written last, so a height that failed halfway is
//! still reported as missing and is redone in full. Every write is idempotent
//! thus redoing a height is harmless.

use super::{genesis::read_genesis, ParserContext, Stats};
use crate::{
    base::schema::{Block, Height, ValidatorSet},
    channel::{HeightReceiver, HeightSender, Shutdown},
    crypto::ConsensusAddress,
    db::{BlockRecord, CommitSignature, Db, Transaction},
    logging,
    modules::BlockData,
    node::Node,
    Error, ErrorKind, Result,
};
use async_std::task;
use futures::future::{self, Either};
use std::{fmt::Display, sync::Arc};

/// Processing stage of a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Correlating,
    Resolving,
    Persisting,
    Dispatching,
    Done,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Stage::Fetching => "fetching",
            Stage::Correlating => "correlating",
            Stage::Resolving => "resolving",
            Stage::Persisting => "persisting",
            Stage::Dispatching => "dispatching",
            Stage::Done => "done",
        };
        write!(f, "{}", stage)
    }
}

/// Commit signatures of `block` resolved against the validator set.
/// Entries without a signature are skipped, an unknown signer fails the whole commit.
fn resolve_commit(block: &Block, validators: &ValidatorSet) -> Result<Vec<CommitSignature>> {
    let commit = &block.last_commit;
    commit
        .signatures
        .iter()
        .filter(|sig| sig.is_signed())
        .map(|sig| -> Result<CommitSignature> {
            let val = validators
                .find_by_address(&sig.validator_address)
                .ok_or_else(|| {
                    Error::new_ext(
                        ErrorKind::UnknownValidator,
                        format!(
                            "commit signer {} not found",
                            ConsensusAddress::from_raw(&sig.validator_address)
                        ),
                    )
                })?;
            Ok(CommitSignature {
                validator_address: ConsensusAddress::from_raw(&sig.validator_address),
                voting_power: val.voting_power,
                proposer_priority: val.proposer_priority,
                height: commit.height,
                timestamp: sig.timestamp.clone(),
            })
        })
        .collect()
}

pub struct Worker<N: Node, D: Db> {
    /// Worker identifier, used in logs and gauges.
    index: usize,
    /// Shared collaborators.
    ctx: ParserContext<N, D>,
    /// Used to re-enqueue failed heights.
    tx_chan: HeightSender,
    /// Heights to process.
    rx_chan: HeightReceiver,
    /// Pool gauges.
    stats: Arc<Stats>,
}

impl<N: Node, D: Db> Worker<N, D> {
    pub fn new(
        index: usize,
        ctx: ParserContext<N, D>,
        tx_chan: HeightSender,
        rx_chan: HeightReceiver,
        stats: Arc<Stats>,
    ) -> Self {
        Worker {
            index,
            ctx,
            tx_chan,
            rx_chan,
            stats,
        }
    }

    /// Process `height` unless its block is already stored.
    /// The genesis height is always processed.
    pub fn process_if_not_exists(&self, height: Height) -> Result<()> {
        if height != 0 {
            let exists = self
                .ctx
                .db
                .has_block(height)
                .map_err(|err| err.context("error while searching for block"))?;
            if exists {
                debug!("[worker-{}] skipping already exported block {}", self.index, height);
                return Ok(());
            }
        }
        self.process(height)
    }

    /// Process `height` without checking if it has been already stored.
    pub fn process(&self, height: Height) -> Result<()> {
        if height == 0 {
            return self.process_genesis();
        }

        let mut stage = Stage::Fetching;
        self.process_block(height, &mut stage)
            .map_err(|err| err.context(&format!("height {} failed while {}", height, stage)))
    }

    /// Fetch the block at `height` and store its transactions only.
    pub fn process_transactions(&self, height: Height) -> Result<()> {
        let block = self
            .ctx
            .node
            .block(height)
            .map_err(|err| err.context("failed to get block from node"))?;
        let txs = self
            .ctx
            .node
            .txs(&block)
            .map_err(|err| err.context("failed to get transactions for block"))?;
        self.export_txs(height, &txs)
    }

    /// Call the genesis handlers, their failures are logged only.
    fn process_genesis(&self) -> Result<()> {
        let path = self.ctx.genesis_file_path.as_deref();
        let genesis = read_genesis(path, self.ctx.node.as_ref())
            .map_err(|err| err.context("failed to get genesis"))?;

        info!(
            "[worker-{}] handling genesis of chain {}",
            self.index, genesis.chain_id
        );
        let failures =
            self.ctx
                .registry
                .dispatch_genesis(&genesis, self.ctx.node.as_ref(), self.ctx.db.as_ref());
        if failures > 0 {
            warn!("[worker-{}] {} genesis handlers failed", self.index, failures);
        }
        Ok(())
    }

    fn process_block(&self, height: Height, stage: &mut Stage) -> Result<()> {
        let node = self.ctx.node.as_ref();
        let db = self.ctx.db.as_ref();
        debug!("[worker-{}] processing block {}", self.index, height);

        *stage = Stage::Fetching;
        let block = node
            .block(height)
            .map_err(|err| err.context("failed to get block from node"))?;
        let results = node
            .block_results(height)
            .map_err(|err| err.context("failed to get block results from node"))?;
        let txs = node
            .txs(&block)
            .map_err(|err| err.context("failed to get transactions for block"))?;
        let validators = node
            .validators(height)
            .map_err(|err| err.context("failed to get validators for block"))?;

        *stage = Stage::Correlating;
        let correlated = self.ctx.correlator.correlate(&validators);

        *stage = Stage::Resolving;
        if validators.find_by_address(&block.proposer_address).is_none() {
            return Err(Error::new_ext(
                ErrorKind::UnknownValidator,
                format!(
                    "proposer {} not found",
                    ConsensusAddress::from_raw(&block.proposer_address)
                ),
            ));
        }
        let signatures = resolve_commit(&block, &validators)?;

        *stage = Stage::Persisting;
        db.save_validators(&correlated.validators)
            .map_err(|err| err.context("error while saving validators"))?;
        db.save_validator_descriptions(&correlated.descriptions)
            .map_err(|err| err.context("error while saving validators description"))?;
        db.save_commit_signatures(&signatures)
            .map_err(|err| err.context("error while saving commit signatures"))?;
        self.export_txs(height, &txs)?;

        *stage = Stage::Dispatching;
        let data = BlockData {
            block: &block,
            results: &results,
            validators: &validators,
            txs: &txs,
        };
        let failures = self.ctx.registry.dispatch_block(&data, node, db);
        if failures > 0 {
            warn!(
                "[worker-{}] {} block handlers failed at height {}",
                self.index, failures, height
            );
        }

        *stage = Stage::Done;
        db.save_block(&BlockRecord::new(&block, results.total_gas()))
            .map_err(|err| err.context("failed to persist block"))?;
        debug!(
            "[worker-{}] exported block {} ({} txs, {} signatures)",
            self.index,
            height,
            txs.len(),
            signatures.len()
        );
        Ok(())
    }

    fn export_txs(&self, height: Height, txs: &[Transaction]) -> Result<()> {
        for tx in txs {
            let res = self
                .ctx
                .db
                .save_tx(tx)
                .and_then(|_| self.ctx.db.save_messages(&tx.message_rows()));
            if let Err(err) = res {
                logging::tx_error(height, &tx.hash, &err);
                return Err(err.context(&format!("failed to handle transaction {}", tx.hash)));
            }
        }
        Ok(())
    }

    /// Drain the heights queue until shutdown or queue closure.
    /// Failed heights are re-enqueued without delay nor retry limit.
    pub async fn run(&mut self, shutdown: Shutdown) {
        self.stats.worker_started();
        debug!("[worker-{}] started", self.index);

        loop {
            let recv = Box::pin(self.rx_chan.recv());
            let stop = Box::pin(shutdown.wait());
            let height = match future::select(recv, stop).await {
                Either::Left((Ok(height), _)) => height,
                Either::Left((Err(_), _)) => {
                    debug!("[worker-{}] heights queue closed", self.index);
                    break;
                }
                Either::Right(_) => break,
            };

            let res = self.process_if_not_exists(height);
            if let Err(ref err) = res {
                error!(
                    "[worker-{}] re-enqueueing failed block {}: {}",
                    self.index,
                    height,
                    err.to_string_full()
                );
                if let Err(err) = self.tx_chan.send(height) {
                    warn!(
                        "[worker-{}] block {} dropped: {}",
                        self.index, height, err
                    );
                }
            }
            self.stats.record(self.index, height, res.is_ok());
        }

        self.stats.worker_stopped();
        debug!("[worker-{}] stopped", self.index);
    }

    pub fn run_sync(&mut self, shutdown: Shutdown) {
        task::block_on(self.run(shutdown));
    }
}

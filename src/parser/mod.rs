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


//! Ingestion pipeline.
//!
//! Producers push heights into an unbounded queue drained by a pool of
//! workers. Each worker runs the per-height state machine to completion and
//! re-enqueues the heights that failed.

use crate::{
    base::{schema::Height, RwLock},
    config::Config,
    db::Db,
    modules::Registry,
    node::Node,
    Result,
};
use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

pub mod correlator;
pub mod genesis;
pub mod producer;
pub mod service;
pub mod worker;

pub use correlator::{Correlated, Correlator};
pub use service::ParserService;
pub use worker::{Stage, Worker};

/// Collaborators shared by all the workers.
pub struct ParserContext<N: Node, D: Db> {
    /// Chain node shared reference.
    pub node: Arc<N>,
    /// Persistence port shared reference.
    pub db: Arc<D>,
    /// Enabled modules, in invocation order.
    pub registry: Arc<Registry>,
    /// Operator registry lookup.
    pub correlator: Arc<Correlator>,
    /// Genesis file to use instead of asking the node.
    pub genesis_file_path: Option<PathBuf>,
}

impl<N: Node, D: Db> Clone for ParserContext<N, D> {
    fn clone(&self) -> Self {
        ParserContext {
            node: self.node.clone(),
            db: self.db.clone(),
            registry: self.registry.clone(),
            correlator: self.correlator.clone(),
            genesis_file_path: self.genesis_file_path.clone(),
        }
    }
}

impl<N: Node, D: Db> ParserContext<N, D> {
    /// Build the context, failing on unknown modules.
    pub fn new(config: &Config, node: N, db: D) -> Result<Self> {
        Self::with_shared(config, Arc::new(node), Arc::new(db))
    }

    /// Build the context around already shared collaborators.
    pub fn with_shared(config: &Config, node: Arc<N>, db: Arc<D>) -> Result<Self> {
        let registry = Registry::from_config(config)?;
        info!("[parser] enabled modules: {:?}", registry.names());
        Ok(ParserContext {
            node,
            db,
            registry: Arc::new(registry),
            correlator: Arc::new(Correlator::new(config.validators.clone())),
            genesis_file_path: config.parser.genesis_file_path.clone(),
        })
    }
}

/// Pool gauges.
#[derive(Default, Debug)]
pub struct Stats {
    workers: AtomicUsize,
    processed: AtomicU64,
    failed: AtomicU64,
    heights: RwLock<BTreeMap<usize, Height>>,
}

impl Stats {
    /// Number of running workers.
    pub fn active_workers(&self) -> usize {
        self.workers.load(Ordering::Relaxed)
    }

    /// Last height handled by a worker.
    pub fn worker_height(&self, index: usize) -> Option<Height> {
        self.heights.read().get(&index).copied()
    }

    /// Heights completed so far, skipped ones included.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Failed attempts so far.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub(crate) fn worker_started(&self) {
        self.workers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_stopped(&self) {
        self.workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, index: usize, height: Height, success: bool) {
        match success {
            true => self.processed.fetch_add(1, Ordering::Relaxed),
            false => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        self.heights.write().insert(index, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::MockDb, node::MockNode, ErrorKind};

    #[test]
    fn context_with_unknown_module() {
        let mut config = Config::default();
        config.chain.modules = vec!["oracle".to_string()];

        let err = ParserContext::new(&config, MockNode::new(), MockDb::new())
            .err()
            .unwrap();

        assert_eq!(err.kind, ErrorKind::BadConfig);
    }

    #[test]
    fn stats_gauges() {
        let stats = Stats::default();

        stats.worker_started();
        stats.record(0, 10, true);
        stats.record(0, 11, false);
        stats.record(1, 7, true);

        assert_eq!(stats.active_workers(), 1);
        assert_eq!(stats.worker_height(0), Some(11));
        assert_eq!(stats.worker_height(1), Some(7));
        assert_eq!(stats.worker_height(2), None);
        assert_eq!(stats.processed(), 2);
        assert_eq!(stats.failed(), 1);

        stats.worker_stopped();
        assert_eq!(stats.active_workers(), 0);
    }
}

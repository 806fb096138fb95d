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


use super::{
    producer::{backfill, listen_new_blocks},
    ParserContext, Stats, Worker,
};
use crate::{
    base::schema::Height,
    channel::{height_channel, shutdown_channel, HeightReceiver, HeightSender, ShutdownTrigger},
    config::{Config, ParserConfig},
    db::Db,
    node::Node,
    Error, ErrorKind, Result,
};
use async_std::task;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// Workers pool together with its heights producers.
pub struct ParserService<N: Node, D: Db> {
    /// Parser configuration.
    config: ParserConfig,
    /// Resubscription delay of the live producer.
    retry_interval: Duration,
    /// Collaborators shared with the workers.
    ctx: ParserContext<N, D>,
    /// Heights queue producer side.
    tx_chan: HeightSender,
    /// Heights queue consumer side.
    rx_chan: HeightReceiver,
    /// Pool gauges.
    stats: Arc<Stats>,
    /// Shutdown signal owner, present while running.
    shutdown: Option<ShutdownTrigger>,
    /// Long running threads (workers and live producer).
    handlers: Vec<JoinHandle<()>>,
    /// One shot threads (backfill producer), not watched by the canary.
    oneshots: Vec<JoinHandle<()>>,
    /// Set once stopped, the node and the database are released on stop.
    stopped: bool,
    /// To check if the long running threads are still alive.
    canary: Arc<()>,
}

impl<N: Node, D: Db> ParserService<N, D> {
    /// Create a new parser service instance.
    pub fn new(config: &Config, ctx: ParserContext<N, D>) -> Self {
        let (tx_chan, rx_chan) = height_channel();
        ParserService {
            config: config.parser.clone(),
            retry_interval: Duration::from_secs(config.node.poll_interval_secs.max(1)),
            ctx,
            tx_chan,
            rx_chan,
            stats: Arc::new(Stats::default()),
            shutdown: None,
            handlers: Vec::new(),
            oneshots: Vec::new(),
            stopped: false,
            canary: Arc::new(()),
        }
    }

    fn spawn<F>(&self, name: String, long_running: bool, job: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let canary = long_running.then(|| Arc::clone(&self.canary));
        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let _canary = canary;
                job();
            })
            .map_err(|err| Error::new_ext(ErrorKind::Other, err))
    }

    /// Start the workers and the producers.
    /// Fails if the chain node cannot be reached.
    pub fn start(&mut self) -> Result<()> {
        if self.stopped {
            return Err(Error::new_ext(ErrorKind::Other, "parser service stopped"));
        }
        if self.shutdown.is_some() {
            warn!("[parser] service was already running");
            return Ok(());
        }

        let latest: Height = self
            .ctx
            .node
            .latest_height()
            .map_err(|err| err.context("cannot reach the chain node"))?;
        info!(
            "[parser] starting {} workers, chain tip at height {}",
            self.config.workers, latest
        );
        match self.ctx.db.get_last_block() {
            Ok(Some(block)) => info!(
                "[parser] last stored block {} produced at {}",
                block.height, block.timestamp
            ),
            Ok(None) => info!("[parser] no block stored yet"),
            Err(err) => warn!("[parser] cannot read last stored block: {}", err.to_string_full()),
        }

        let (trigger, shutdown) = shutdown_channel();

        for index in 0..self.config.workers {
            let mut worker = Worker::new(
                index,
                self.ctx.clone(),
                self.tx_chan.clone(),
                self.rx_chan.clone(),
                self.stats.clone(),
            );
            let shutdown = shutdown.clone();
            let handle = self.spawn(format!("worker-{}", index), true, move || {
                worker.run_sync(shutdown)
            })?;
            self.handlers.push(handle);
        }

        if self.config.parse_genesis || self.config.parse_old_blocks {
            let config = self.config.clone();
            let queue = self.tx_chan.clone();
            let shutdown = shutdown.clone();
            let handle = self.spawn("backfill".to_string(), false, move || {
                if let Err(err) = backfill(&config, latest, &queue, &shutdown) {
                    error!("[producer] backfill failed: {}", err.to_string_full());
                }
            })?;
            self.oneshots.push(handle);
        }

        if self.config.listen_new_blocks {
            let node = self.ctx.node.clone();
            let queue = self.tx_chan.clone();
            let shutdown = shutdown.clone();
            let retry_interval = self.retry_interval;
            let handle = self.spawn("new-blocks".to_string(), true, move || {
                task::block_on(listen_new_blocks(
                    node.as_ref(),
                    &queue,
                    &shutdown,
                    retry_interval,
                    latest,
                ));
            })?;
            self.handlers.push(handle);
        }

        self.shutdown = Some(trigger);
        Ok(())
    }

    /// Stop the producers and the workers, then release the node and the database.
    /// In-flight heights are completed or failed before returning.
    pub fn stop(&mut self) {
        let trigger = match self.shutdown.take() {
            Some(trigger) => trigger,
            None => {
                debug!("[parser] service was not running");
                return;
            }
        };
        debug!("[parser] stopping service");
        trigger.trigger();

        for handle in self.oneshots.drain(..).chain(self.handlers.drain(..)) {
            if handle.join().is_err() {
                error!("[parser] thread terminated abnormally");
            }
        }
        let pending = self.tx_chan.pending();
        if pending > 0 {
            info!("[parser] {} heights left in queue", pending);
        }
        self.tx_chan.close();
        self.ctx.node.stop();
        if let Err(err) = self.ctx.db.close() {
            error!("[parser] error closing database: {}", err.to_string_full());
        }
        self.stopped = true;
        info!("[parser] service stopped");
    }

    /// Check if service is running.
    pub fn is_running(&self) -> bool {
        self.shutdown.is_some() && Arc::strong_count(&self.canary) == self.handlers.len() + 1
    }

    /// Get a clone of the heights queue producer side.
    pub fn queue(&self) -> HeightSender {
        self.tx_chan.clone()
    }

    /// Get the pool gauges.
    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }
}

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


//! Heights producers.
//!
//! The backfill producer enqueues the already produced heights in ascending
//! order. The live producer follows the chain tip through the node new blocks
//! subscription, resubscribing whenever the sequence ends.

use crate::{
    base::schema::Height,
    channel::{HeightSender, Shutdown},
    config::ParserConfig,
    node::Node,
    Result,
};
use futures::{
    future::{self, Either},
    StreamExt,
};
use std::time::Duration;

/// Subscriber name announced to the node.
pub const SUBSCRIBER: &str = "trinci-indexer";

/// Heights enqueued by the backfill producer, in order.
pub fn backfill_heights(config: &ParserConfig, latest: Height) -> impl Iterator<Item = Height> {
    let old_blocks = if config.parse_old_blocks {
        config.start_height.max(1)..=latest
    } else {
        1..=0
    };
    config.parse_genesis.then_some(0).into_iter().chain(old_blocks)
}

/// Enqueue the backfill heights. Stops early on shutdown.
/// Returns the number of enqueued heights.
pub fn backfill(
    config: &ParserConfig,
    latest: Height,
    queue: &HeightSender,
    shutdown: &Shutdown,
) -> Result<usize> {
    let mut count = 0;
    for height in backfill_heights(config, latest) {
        if shutdown.is_triggered() {
            debug!("[producer] backfill interrupted at height {}", height);
            break;
        }
        queue.send(height)?;
        count += 1;
    }
    info!("[producer] enqueued {} heights to backfill", count);
    Ok(count)
}

/// Follow the chain tip until shutdown, starting after `last_seen`.
/// Heights skipped between two notifications (e.g. across a resubscription)
/// are enqueued as well.
pub async fn listen_new_blocks<N: Node>(
    node: &N,
    queue: &HeightSender,
    shutdown: &Shutdown,
    retry_interval: Duration,
    mut last_seen: Height,
) {
    'subscribe: loop {
        if shutdown.is_triggered() {
            break;
        }
        let mut events = match node.subscribe_new_blocks(SUBSCRIBER) {
            Ok(events) => events,
            Err(err) => {
                error!(
                    "[producer] cannot subscribe to new blocks: {}",
                    err.to_string_full()
                );
                if shutdown.sleep(retry_interval).await {
                    break;
                }
                continue;
            }
        };

        loop {
            let next = Box::pin(events.next());
            let stop = Box::pin(shutdown.wait());
            let event = match future::select(next, stop).await {
                Either::Left((event, _)) => event,
                Either::Right(_) => break 'subscribe,
            };
            match event {
                Some(Ok(event)) => {
                    if event.height <= last_seen {
                        continue;
                    }
                    debug!("[producer] enqueueing new block {}", event.height);
                    if let Err(err) = queue.send_range((last_seen + 1)..=event.height) {
                        warn!("[producer] heights queue unavailable: {}", err);
                        break 'subscribe;
                    }
                    last_seen = event.height;
                }
                Some(Err(err)) => {
                    warn!("[producer] new blocks error: {}", err.to_string_full());
                }
                None => {
                    debug!("[producer] new blocks subscription ended");
                    break;
                }
            }
        }

        if shutdown.sleep(retry_interval).await {
            break;
        }
    }
    debug!("[producer] stopped listening at height {}", last_seen);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::schema::NewBlockEvent,
        channel::{height_channel, shutdown_channel},
        node::MockNode,
        Error, ErrorKind,
    };
    use async_std::task;
    use futures::stream;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    const RETRY: Duration = Duration::from_millis(10);

    fn create_config(parse_genesis: bool, parse_old_blocks: bool, start_height: u64) -> ParserConfig {
        ParserConfig {
            parse_genesis,
            parse_old_blocks,
            start_height,
            ..Default::default()
        }
    }

    fn drain(rx: &crate::channel::HeightReceiver) -> Vec<Height> {
        let mut heights = Vec::new();
        while let Ok(Some(height)) = rx.try_recv() {
            heights.push(height);
        }
        heights
    }

    #[test]
    fn backfill_with_genesis() {
        let heights = backfill_heights(&create_config(true, true, 0), 4).collect::<Vec<_>>();

        assert_eq!(heights, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn backfill_from_start_height() {
        let heights = backfill_heights(&create_config(false, true, 3), 5).collect::<Vec<_>>();

        assert_eq!(heights, vec![3, 4, 5]);
    }

    #[test]
    fn backfill_genesis_only() {
        let heights = backfill_heights(&create_config(true, false, 1), 5).collect::<Vec<_>>();

        assert_eq!(heights, vec![0]);
    }

    #[test]
    fn backfill_start_beyond_tip() {
        let mut heights = backfill_heights(&create_config(false, true, 10), 5);

        assert_eq!(heights.next(), None);
    }

    #[test]
    fn backfill_long_chain_is_lazy() {
        let mut heights = backfill_heights(&create_config(true, true, 1), u64::MAX);

        assert_eq!(heights.size_hint(), (usize::MAX, None));
        assert_eq!(heights.next(), Some(0));
        assert_eq!(heights.next(), Some(1));
        assert_eq!(heights.nth(997), Some(999));
    }

    #[test]
    fn backfill_enqueues_in_order() {
        let (tx, rx) = height_channel();
        let (_trigger, shutdown) = shutdown_channel();

        let count = backfill(&create_config(true, true, 1), 3, &tx, &shutdown).unwrap();

        assert_eq!(count, 4);
        assert_eq!(drain(&rx), vec![0, 1, 2, 3]);
    }

    #[test]
    fn backfill_stops_on_shutdown() {
        let (tx, rx) = height_channel();
        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();

        let count = backfill(&create_config(true, true, 1), 3, &tx, &shutdown).unwrap();

        assert_eq!(count, 0);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn live_heights_fill_gaps_and_resubscribe() {
        let (tx, rx) = height_channel();
        let (trigger, shutdown) = shutdown_channel();
        let subscriptions = Arc::new(AtomicUsize::new(0));
        let counter = subscriptions.clone();
        let mut node = MockNode::new();
        node.expect_subscribe_new_blocks().returning(move |_| {
            let events = match counter.fetch_add(1, Ordering::SeqCst) {
                0 => vec![
                    Ok(NewBlockEvent { height: 11 }),
                    Ok(NewBlockEvent { height: 12 }),
                    Err(Error::new_ext(ErrorKind::NodeFault, "poll failed")),
                ],
                1 => vec![Ok(NewBlockEvent { height: 12 }), Ok(NewBlockEvent { height: 15 })],
                _ => vec![],
            };
            Ok(stream::iter(events).boxed())
        });

        let handle = std::thread::spawn(move || {
            task::block_on(listen_new_blocks(&node, &tx, &shutdown, RETRY, 10));
        });
        for _ in 0..100 {
            if subscriptions.load(Ordering::SeqCst) > 2 {
                break;
            }
            std::thread::sleep(RETRY);
        }
        trigger.trigger();
        handle.join().unwrap();

        assert_eq!(drain(&rx), vec![11, 12, 13, 14, 15]);
    }

    #[test]
    fn subscription_failure_is_retried() {
        let (tx, rx) = height_channel();
        let (trigger, shutdown) = shutdown_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let mut node = MockNode::new();
        node.expect_subscribe_new_blocks().returning(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(Error::new(ErrorKind::NodeFault)),
                _ => Ok(stream::iter(vec![Ok(NewBlockEvent { height: 1 })]).boxed()),
            }
        });

        let handle = std::thread::spawn(move || {
            task::block_on(listen_new_blocks(&node, &tx, &shutdown, RETRY, 0));
        });
        for _ in 0..100 {
            if attempts.load(Ordering::SeqCst) > 1 {
                break;
            }
            std::thread::sleep(RETRY);
        }
        trigger.trigger();
        handle.join().unwrap();

        assert_eq!(drain(&rx), vec![1]);
    }
}

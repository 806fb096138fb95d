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

//! Channels used by the ingestion pipeline.
//!
//! The height queue is built on top of an unbounded async-std channel: every
//! producer (backfill range, live subscription, failed heights) owns a clone
//! of the [HeightSender] and every worker owns a clone of the
//! [HeightReceiver]. Sending never blocks, thus re-enqueueing a failed height
//! can be done from anywhere without waiting for a consumer.
//!
//! The shutdown channel is a broadcast-by-closing channel: nothing is ever
//! sent through it, the [ShutdownTrigger] closes it and every [Shutdown]
//! clone observes the closure.

use crate::{base::schema::Height, Error, ErrorKind};
use async_std::channel::{
    self as async_channel, Receiver as AsyncReceiver, Sender as AsyncSender, TryRecvError,
};
use std::{fmt::Display, time::Duration};

/// Errors which can be triggered by a channel.
#[derive(Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// Error during send. Broken channel.
    SendError,
    /// Error during receive. Broken channel.
    RecvError,
}

impl std::error::Error for ChannelError {}

impl Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ChannelError::SendError => "channel send error",
            ChannelError::RecvError => "channel recv error",
        };
        write!(f, "{}", msg)
    }
}

impl From<ChannelError> for Error {
    fn from(err: ChannelError) -> Self {
        Error::new_ext(ErrorKind::ChannelFault, err)
    }
}

/// Creates the heights queue shared by producers and workers.
pub fn height_channel() -> (HeightSender, HeightReceiver) {
    let (sender, receiver) = async_channel::unbounded::<Height>();
    (HeightSender(sender), HeightReceiver(receiver))
}

/// Producer side of the heights queue.
#[derive(Clone, Debug)]
pub struct HeightSender(AsyncSender<Height>);

impl HeightSender {
    /// Enqueue a height.
    /// Never blocks since the queue is unbounded.
    pub fn send(&self, height: Height) -> Result<(), ChannelError> {
        self.0.try_send(height).map_err(|_| ChannelError::SendError)
    }

    /// Enqueue a whole range of heights preserving the ascending order.
    pub fn send_range(&self, heights: std::ops::RangeInclusive<Height>) -> Result<(), ChannelError> {
        for height in heights {
            self.send(height)?;
        }
        Ok(())
    }

    /// Closes the channel.
    /// Returns true if this call has closed the channel and it was not closed already.
    /// The remaining heights can still be received.
    pub fn close(&self) -> bool {
        self.0.close()
    }

    /// Number of heights waiting to be processed.
    pub fn pending(&self) -> usize {
        self.0.len()
    }
}

/// Consumer side of the heights queue.
#[derive(Clone, Debug)]
pub struct HeightReceiver(AsyncReceiver<Height>);

impl HeightReceiver {
    /// Wait for the next height.
    /// Fails once the channel is closed and drained.
    pub async fn recv(&self) -> Result<Height, ChannelError> {
        self.0.recv().await.map_err(|_| ChannelError::RecvError)
    }

    /// Get the next height if one is immediately available.
    pub fn try_recv(&self) -> Result<Option<Height>, ChannelError> {
        match self.0.try_recv() {
            Ok(height) => Ok(Some(height)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(ChannelError::RecvError),
        }
    }
}

/// Creates a shutdown signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = async_channel::bounded::<()>(1);
    (ShutdownTrigger(sender), Shutdown(receiver))
}

/// Owner side of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger(AsyncSender<()>);

impl ShutdownTrigger {
    /// Raise the shutdown signal.
    /// Returns false if the signal was already raised.
    pub fn trigger(&self) -> bool {
        self.0.close()
    }

    /// Returns true if the signal has been raised.
    pub fn is_triggered(&self) -> bool {
        self.0.is_closed()
    }
}

impl Drop for ShutdownTrigger {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Observer side of the shutdown signal.
#[derive(Clone, Debug)]
pub struct Shutdown(AsyncReceiver<()>);

impl Shutdown {
    /// Returns true if the signal has been raised.
    pub fn is_triggered(&self) -> bool {
        self.0.is_closed()
    }

    /// Resolves as soon as the signal is raised.
    pub async fn wait(&self) {
        while self.0.recv().await.is_ok() {}
    }

    /// Sleep for `duration` or until the signal is raised.
    /// Returns true if the signal has been raised.
    pub async fn sleep(&self, duration: Duration) -> bool {
        async_std::future::timeout(duration, self.wait())
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;

    const TIMEOUT_DURATION: Duration = Duration::from_millis(200);

    #[test]
    fn send_recv() {
        let (tx_chan, rx_chan) = height_channel();

        tx_chan.send(3).unwrap();
        let val = task::block_on(rx_chan.recv()).unwrap();

        assert_eq!(val, 3);
    }

    #[test]
    fn send_range_keeps_order() {
        let (tx_chan, rx_chan) = height_channel();

        tx_chan.send_range(5..=8).unwrap();

        let heights: Vec<_> = (0..4).map(|_| task::block_on(rx_chan.recv()).unwrap()).collect();
        assert_eq!(heights, vec![5, 6, 7, 8]);
    }

    #[test]
    fn duplicated_heights_are_allowed() {
        let (tx_chan, rx_chan) = height_channel();

        tx_chan.send(4).unwrap();
        tx_chan.send(4).unwrap();

        assert_eq!(tx_chan.pending(), 2);
        assert_eq!(task::block_on(rx_chan.recv()).unwrap(), 4);
        assert_eq!(task::block_on(rx_chan.recv()).unwrap(), 4);
    }

    #[test]
    fn send_closed_receiver() {
        let (tx_chan, _) = height_channel();

        let err = tx_chan.send(1).unwrap_err();

        assert_eq!(err, ChannelError::SendError);
    }

    #[test]
    fn recv_closed_sender() {
        let (_, rx_chan) = height_channel();

        let err = task::block_on(rx_chan.recv()).unwrap_err();

        assert_eq!(err, ChannelError::RecvError);
    }

    #[test]
    fn recv_drains_after_close() {
        let (tx_chan, rx_chan) = height_channel();
        tx_chan.send(1).unwrap();

        tx_chan.close();

        assert_eq!(task::block_on(rx_chan.recv()).unwrap(), 1);
        assert_eq!(task::block_on(rx_chan.recv()).unwrap_err(), ChannelError::RecvError);
    }

    #[test]
    fn try_recv_empty() {
        let (_tx_chan, rx_chan) = height_channel();

        assert_eq!(rx_chan.try_recv().unwrap(), None);
    }

    #[test]
    fn try_recv_drained_and_closed() {
        let (tx_chan, rx_chan) = height_channel();
        tx_chan.send(2).unwrap();
        tx_chan.close();

        assert_eq!(rx_chan.try_recv().unwrap(), Some(2));
        assert_eq!(rx_chan.try_recv().unwrap_err(), ChannelError::RecvError);
    }

    #[test]
    fn shutdown_signal() {
        let (trigger, shutdown) = shutdown_channel();
        let observer = shutdown.clone();
        assert!(!observer.is_triggered());

        assert!(trigger.trigger());
        assert!(!trigger.trigger());

        assert!(observer.is_triggered());
        task::block_on(observer.wait());
    }

    #[test]
    fn shutdown_interrupts_sleep() {
        let (trigger, shutdown) = shutdown_channel();

        assert!(!task::block_on(shutdown.sleep(TIMEOUT_DURATION)));

        drop(trigger);
        assert!(task::block_on(shutdown.sleep(Duration::from_secs(60))));
    }
}

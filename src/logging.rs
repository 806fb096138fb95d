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


//! Logging helpers.
//!
//! The crate logs through the `log` facade, installing a backend is up to the
//! embedding binary. Failures are reported as `key=value` pairs so that they
//! stay greppable.

use crate::{base::schema::Height, config::LoggingConfig, Error, Result};

pub const LOG_KEY_MODULE: &str = "module";
pub const LOG_KEY_HEIGHT: &str = "height";
pub const LOG_KEY_TX_HASH: &str = "tx_hash";

/// Apply the configured max log level.
pub fn init_level(config: &LoggingConfig) -> Result<()> {
    let level = config.level_filter()?;
    log::set_max_level(level);
    Ok(())
}

pub fn genesis_error_message(module: &str, err: &Error) -> String {
    format!(
        "[module] error while handling genesis {}={} err={}",
        LOG_KEY_MODULE,
        module,
        err.to_string_full()
    )
}

pub fn block_error_message(module: &str, height: Height, err: &Error) -> String {
    format!(
        "[module] error while handling block {}={} {}={} err={}",
        LOG_KEY_MODULE,
        module,
        LOG_KEY_HEIGHT,
        height,
        err.to_string_full()
    )
}

pub fn tx_error_message(height: Height, tx_hash: &str, err: &Error) -> String {
    format!(
        "[worker] error while handling tx {}={} {}={} err={}",
        LOG_KEY_HEIGHT,
        height,
        LOG_KEY_TX_HASH,
        tx_hash,
        err.to_string_full()
    )
}

/// Report a genesis handler failure.
pub fn genesis_error(module: &str, err: &Error) {
    error!("{}", genesis_error_message(module, err));
}

/// Report a block handler failure.
pub fn block_error(module: &str, height: Height, err: &Error) {
    error!("{}", block_error_message(module, height, err));
}

/// Report a transaction write failure.
pub fn tx_error(height: Height, tx_hash: &str, err: &Error) {
    error!("{}", tx_error_message(height, tx_hash, err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn block_error_carries_module_and_height() {
        let err = Error::new_ext(ErrorKind::NodeFault, "timeout");

        let msg = block_error_message("bank", 12, &err);

        assert_eq!(
            msg,
            "[module] error while handling block module=bank height=12 err=node fault: timeout"
        );
    }

    #[test]
    fn genesis_error_carries_module() {
        let err = Error::new(ErrorKind::MalformedData);

        let msg = genesis_error_message("staking", &err);

        assert!(msg.contains("module=staking"));
        assert!(msg.ends_with("err=malformed data"));
    }

    #[test]
    fn tx_error_carries_hash() {
        let err = Error::new(ErrorKind::DatabaseFault);

        let msg = tx_error_message(3, "ABCD", &err);

        assert!(msg.contains("tx_hash=ABCD"));
    }

    #[test]
    fn bad_level() {
        let config = LoggingConfig {
            level: "verbose".to_string(),
        };

        assert!(init_level(&config).is_err());
    }

    #[test]
    fn apply_level() {
        let config = LoggingConfig {
            level: "warn".to_string(),
        };

        init_level(&config).unwrap();

        assert_eq!(log::max_level(), log::LevelFilter::Warn);
        log::set_max_level(log::LevelFilter::Trace);
    }
}

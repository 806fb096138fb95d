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


//! Indexer configuration.
//!
//! Loaded from a json document. Every section is optional and falls back to
//! its defaults.

use crate::{base::serialize, Error, ErrorKind, Result};
use log::LevelFilter;
use std::path::{Path, PathBuf};

/// Chain modules to enable, in invocation order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ChainConfig {
    pub modules: Vec<String>,
}

/// Chain node endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// Tendermint RPC endpoint.
    pub rpc_address: String,
    /// Cosmos REST endpoint.
    pub api_address: String,
    /// Max concurrent connections towards each endpoint.
    pub max_connections: usize,
    /// Single request timeout.
    pub request_timeout_secs: u64,
    /// Chain tip polling period used by the new blocks subscription.
    pub poll_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            rpc_address: "http://localhost:26657".to_string(),
            api_address: "http://localhost:1317".to_string(),
            max_connections: 20,
            request_timeout_secs: 30,
            poll_interval_secs: 1,
        }
    }
}

/// Parser behaviour.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Follow the chain tip.
    pub listen_new_blocks: bool,
    /// Backfill the heights already produced by the chain.
    pub parse_old_blocks: bool,
    /// Process the genesis state (height 0).
    pub parse_genesis: bool,
    /// First height to backfill.
    pub start_height: u64,
    /// Genesis file to use instead of asking the node.
    pub genesis_file_path: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            workers: 1,
            listen_new_blocks: true,
            parse_old_blocks: true,
            parse_genesis: true,
            start_height: 1,
            genesis_file_path: None,
        }
    }
}

/// History retention.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PruningConfig {
    /// Number of recent heights to keep. Zero disables pruning.
    pub keep_recent: u64,
    /// Pruning period, in heights.
    pub interval: u64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        PruningConfig {
            keep_recent: 100,
            interval: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of "off", "error", "warn", "info", "debug", "trace".
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "debug".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level.parse::<LevelFilter>().map_err(|_| {
            Error::new_ext(
                ErrorKind::BadConfig,
                format!("invalid log level '{}'", self.level),
            )
        })
    }
}

/// Operator registry entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidatorEntry {
    /// Hex consensus address, as reported by the consensus engine.
    pub raw_address: String,
    pub operator_address: String,
    pub moniker: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Curated list of known validators.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ValidatorsList {
    pub entries: Vec<ValidatorEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub node: NodeConfig,
    pub parser: ParserConfig,
    pub pruning: PruningConfig,
    pub logging: LoggingConfig,
    pub validators: ValidatorsList,
}

impl Config {
    /// Parse and validate a json configuration.
    pub fn from_json(buf: &[u8]) -> Result<Self> {
        let config: Config = serialize::json_deserialize(buf)
            .map_err(|err| Error::new_ext(ErrorKind::BadConfig, err.to_string_full()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a json configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read(path).map_err(|err| {
            Error::new_ext(
                ErrorKind::BadConfig,
                format!("cannot read {}: {}", path.display(), err),
            )
        })?;
        Self::from_json(&buf)
    }

    pub fn validate(&self) -> Result<()> {
        if self.parser.workers == 0 {
            return Err(Error::new_ext(
                ErrorKind::BadConfig,
                "at least one worker is required",
            ));
        }
        if self.pruning.interval == 0 {
            return Err(Error::new_ext(
                ErrorKind::BadConfig,
                "pruning interval must be greater than zero",
            ));
        }
        self.logging.level_filter()?;
        Ok(())
    }
}

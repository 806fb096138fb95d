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


//! TRINCI chain indexer.
//!
//! Walks the heights of a Tendermint based chain, fetches every block together
//! with its derived state and stores a normalized representation through an
//! idempotent persistence port. Heights can be processed concurrently, out of
//! order and more than once without corrupting the stored state.

// External crates macros.
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// Public modules.
pub mod base;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod logging;
pub mod modules;
pub mod node;
pub mod parser;

pub use base::schema::{Block, BlockResults, GenesisDoc, Height, ValidatorSet};
pub use config::Config;
pub use db::{Db, MemoryDb};
pub use error::{Error, ErrorKind, Result};
pub use modules::{Module, Registry};
pub use node::Node;
#[cfg(feature = "remote")]
pub use node::RemoteNode;
pub use parser::{ParserContext, ParserService};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
pub const VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
pub const VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");
pub const VERSION_PRE: &str = env!("CARGO_PKG_VERSION_PRE");

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


//! Chain modules.
//!
//! Modules are a closed set. Each one declares the hooks it implements through
//! its [Capabilities] and performs its own writes. The [Registry] calls them in
//! configuration order and isolates their failures: a failing module is
//! logged and never stops the others nor the height being processed.

use crate::{
    base::schema::{Block, BlockResults, GenesisDoc, Height, ValidatorSet},
    config::{Config, PruningConfig},
    db::{Db, Transaction},
    logging,
    node::Node,
    Error, ErrorKind, Result,
};

mod bank;
mod consensus;
mod ibc;
mod mint;
mod pruning;
mod staking;

bitflags::bitflags! {
    /// Hooks implemented by a module.
    pub struct Capabilities: u8 {
        /// Handles the genesis state.
        const GENESIS = 1 << 0;
        /// Handles every processed block.
        const BLOCK = 1 << 1;
    }
}

/// Chain data handed to the block handlers.
#[derive(Clone, Copy, Debug)]
pub struct BlockData<'a> {
    pub block: &'a Block,
    pub results: &'a BlockResults,
    pub validators: &'a ValidatorSet,
    /// Decoded block transactions, in block order.
    pub txs: &'a [Transaction],
}

impl<'a> BlockData<'a> {
    pub fn height(&self) -> Height {
        self.block.height
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Module {
    /// Genesis chain information and average block times.
    Consensus,
    /// Validators commissions, voting power, status and the staking pool.
    Staking,
    /// Total supply and balances of the accounts involved in the block.
    Bank,
    /// Inflation rate.
    Mint,
    /// IBC transfer parameters.
    Ibc,
    /// History retention.
    Pruning(PruningConfig),
}

impl Module {
    /// Build a module from its configuration name.
    pub fn from_name(name: &str, config: &Config) -> Result<Self> {
        let module = match name {
            "consensus" => Module::Consensus,
            "staking" => Module::Staking,
            "bank" => Module::Bank,
            "mint" => Module::Mint,
            "ibc" => Module::Ibc,
            "pruning" => Module::Pruning(config.pruning),
            _ => {
                return Err(Error::new_ext(
                    ErrorKind::BadConfig,
                    format!("unknown module '{}'", name),
                ))
            }
        };
        Ok(module)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Module::Consensus => "consensus",
            Module::Staking => "staking",
            Module::Bank => "bank",
            Module::Mint => "mint",
            Module::Ibc => "ibc",
            Module::Pruning(_) => "pruning",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Module::Consensus | Module::Staking => Capabilities::GENESIS | Capabilities::BLOCK,
            Module::Bank | Module::Mint | Module::Ibc | Module::Pruning(_) => Capabilities::BLOCK,
        }
    }

    /// Run the genesis hook.
    /// Only called on modules with the [Capabilities::GENESIS] capability.
    fn handle_genesis<N: Node, D: Db>(&self, genesis: &GenesisDoc, _node: &N, db: &D) -> Result<()> {
        match self {
            Module::Consensus => consensus::handle_genesis(genesis, db),
            Module::Staking => staking::handle_genesis(genesis, db),
            _ => Ok(()),
        }
    }

    /// Run the block hook.
    /// Only called on modules with the [Capabilities::BLOCK] capability.
    fn handle_block<N: Node, D: Db>(&self, data: &BlockData, node: &N, db: &D) -> Result<()> {
        let height = data.height();
        match self {
            Module::Consensus => consensus::handle_block(data.block, db),
            Module::Staking => staking::handle_block(data, node, db),
            Module::Bank => bank::handle_block(data, node, db),
            Module::Mint => mint::handle_block(height, node, db),
            Module::Ibc => ibc::handle_block(height, node, db),
            Module::Pruning(config) => pruning::handle_block(config, height, db),
        }
    }
}

/// Wrap a handler failure, keeping the underlying cause in the message.
fn module_fault(module: &Module, err: Error) -> Error {
    Error::new_ext(
        ErrorKind::ModuleFault,
        format!("{}: {}", module.name(), err.to_string_full()),
    )
}

/// Ordered list of the enabled modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    modules: Vec<Module>,
}

impl Registry {
    pub fn new(modules: Vec<Module>) -> Self {
        Registry { modules }
    }

    /// Build the registry from the configured module names, keeping their order.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut modules: Vec<Module> = Vec::with_capacity(config.chain.modules.len());
        for name in &config.chain.modules {
            let module = Module::from_name(name, config)?;
            if modules.iter().any(|m| m.name() == module.name()) {
                return Err(Error::new_ext(
                    ErrorKind::BadConfig,
                    format!("module '{}' registered twice", name),
                ));
            }
            modules.push(module);
        }
        Ok(Registry { modules })
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(Module::name).collect()
    }

    /// Call every genesis handler. Returns the number of failed modules.
    pub fn dispatch_genesis<N: Node, D: Db>(&self, genesis: &GenesisDoc, node: &N, db: &D) -> usize {
        let mut failures = 0;
        for module in &self.modules {
            if !module.capabilities().contains(Capabilities::GENESIS) {
                continue;
            }
            if let Err(err) = module.handle_genesis(genesis, node, db) {
                logging::genesis_error(module.name(), &module_fault(module, err));
                failures += 1;
            }
        }
        failures
    }

    /// Call every block handler. Returns the number of failed modules.
    pub fn dispatch_block<N: Node, D: Db>(&self, data: &BlockData, node: &N, db: &D) -> usize {
        let mut failures = 0;
        for module in &self.modules {
            if !module.capabilities().contains(Capabilities::BLOCK) {
                continue;
            }
            if let Err(err) = module.handle_block(data, node, db) {
                logging::block_error(module.name(), data.height(), &module_fault(module, err));
                failures += 1;
            }
        }
        failures
    }
}

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


//! Genesis chain information and average block times.
//!
//! The average block time over a period is the elapsed time between the
//! oldest stored block of the period and the current one, divided by the
//! number of heights in between.

use crate::{
    base::{
        schema::{Block, GenesisDoc, Height},
        serialize::parse_timestamp,
    },
    db::{AverageBlockTime, BlockTimePeriod, Db, Genesis},
    Result,
};
use chrono::{DateTime, Duration, Utc};

const PERIODS: [(BlockTimePeriod, i64); 3] = [
    (BlockTimePeriod::Day, 86_400),
    (BlockTimePeriod::Hour, 3_600),
    (BlockTimePeriod::Minute, 60),
];

fn average_block_time(
    time: DateTime<Utc>,
    height: Height,
    from_time: DateTime<Utc>,
    from_height: Height,
) -> Option<f64> {
    if height <= from_height {
        return None;
    }
    let elapsed = (time - from_time).num_milliseconds() as f64 / 1000.0;
    Some(elapsed / (height - from_height) as f64)
}

pub fn handle_genesis<D: Db>(genesis: &GenesisDoc, db: &D) -> Result<()> {
    debug!("[consensus] storing genesis of chain {}", genesis.chain_id);
    db.save_genesis(&Genesis {
        chain_id: genesis.chain_id.clone(),
        time: genesis.genesis_time.clone(),
        initial_height: genesis.initial_height,
    })
}

/// Store the average block times ending at `block`.
pub fn handle_block<D: Db>(block: &Block, db: &D) -> Result<()> {
    let time = parse_timestamp(&block.timestamp)?;
    let save = |period, average_time| {
        db.save_average_block_time(&AverageBlockTime {
            period,
            average_time,
            height: block.height,
        })
    };

    if let Some(genesis) = db.get_genesis()? {
        let genesis_time = parse_timestamp(&genesis.time)?;
        if let Some(average) =
            average_block_time(time, block.height, genesis_time, genesis.initial_height)
        {
            save(BlockTimePeriod::Genesis, average)?;
        }
    }

    for (period, secs) in PERIODS {
        let reference = match db.get_block_since(time - Duration::seconds(secs))? {
            Some(reference) => reference,
            None => continue,
        };
        let reference_time = parse_timestamp(&reference.timestamp)?;
        if let Some(average) = average_block_time(time, block.height, reference_time, reference.height)
        {
            save(period, average)?;
        }
    }
    Ok(())
}

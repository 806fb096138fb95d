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


//! History retention.

use crate::{base::schema::Height, config::PruningConfig, db::Db, Result};

/// Every `interval` heights drop the history older than `keep_recent` heights.
pub fn handle_block<D: Db>(config: &PruningConfig, height: Height, db: &D) -> Result<()> {
    if config.keep_recent == 0 || config.interval == 0 {
        return Ok(());
    }
    if height % config.interval != 0 || height <= config.keep_recent {
        return Ok(());
    }

    let boundary = height - config.keep_recent;
    db.prune(boundary)
        .map_err(|err| err.context(&format!("failed to prune below {}", boundary)))?;
    db.store_last_pruned(height)?;
    info!("[pruning] pruned heights below {}", boundary);
    Ok(())
}

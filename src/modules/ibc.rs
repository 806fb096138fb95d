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


//! IBC transfer parameters.

use crate::{
    base::schema::Height,
    db::{Db, IbcParams},
    node::Node,
    Result,
};

pub fn handle_block<N: Node, D: Db>(height: Height, node: &N, db: &D) -> Result<()> {
    let params = node
        .ibc_params(height)
        .map_err(|err| err.context("failed to get ibc params"))?;
    db.save_ibc_params(&IbcParams {
        send_enabled: params.send_enabled,
        receive_enabled: params.receive_enabled,
        height,
    })
}

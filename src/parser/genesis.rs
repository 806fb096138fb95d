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


//! Genesis document source.

use crate::{base::schema::GenesisDoc, node::Node, Error, ErrorKind, Result};
use std::path::Path;

/// Read the genesis from `path` when given, otherwise ask the node.
pub fn read_genesis<N: Node>(path: Option<&Path>, node: &N) -> Result<GenesisDoc> {
    match path {
        Some(path) => {
            debug!("[worker] reading genesis from {}", path.display());
            let buf = std::fs::read(path).map_err(|err| {
                Error::new_ext(
                    ErrorKind::ResourceNotFound,
                    format!("cannot read {}: {}", path.display(), err),
                )
            })?;
            GenesisDoc::from_json(&buf)
        }
        None => node.genesis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{base::schema::tests::GENESIS_JSON, node::MockNode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn genesis_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(GENESIS_JSON.as_bytes()).unwrap();
        // No expectation set: asking the node would panic.
        let node = MockNode::new();

        let genesis = read_genesis(Some(file.path()), &node).unwrap();

        assert_eq!(genesis.chain_id, "nomic-testnet-2");
    }

    #[test]
    fn genesis_from_node() {
        let mut node = MockNode::new();
        node.expect_genesis()
            .times(1)
            .returning(|| GenesisDoc::from_json(GENESIS_JSON.as_bytes()));

        let genesis = read_genesis(None, &node).unwrap();

        assert_eq!(genesis.initial_height, 1);
    }

    #[test]
    fn missing_genesis_file() {
        let dir = tempfile::tempdir().unwrap();
        let node = MockNode::new();

        let path = dir.path().join("genesis.json");

        let err = read_genesis(Some(path.as_path()), &node).unwrap_err();

        assert_eq!(err.kind, ErrorKind::ResourceNotFound);
    }

    #[test]
    fn malformed_genesis_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let node = MockNode::new();

        let err = read_genesis(Some(file.path()), &node).unwrap_err();

        assert_eq!(err.kind, ErrorKind::MalformedData);
    }
}

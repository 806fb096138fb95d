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


//! Remote chain node reached over HTTP.
//!
//! Consensus data comes from the Tendermint RPC endpoint, application data
//! from the Cosmos REST endpoint queried at a given height through the
//! `x-cosmos-block-height` header.

use super::{Node, NewBlockStream};
use crate::{
    base::{
        schema::{
            Block, BlockResults, ChainValidator, Coin, Commit, CommitSig, GenesisDoc, Height,
            IbcTransferParams, NewBlockEvent, StakingPoolValues, TxResult, ValidatorSet,
        },
        serialize::{self, str_or_num},
    },
    config::NodeConfig,
    Error, ErrorKind, Result,
};
use async_std::task;
use base64::{engine::general_purpose::STANDARD, Engine};
use futures::{stream, AsyncReadExt, StreamExt};
use isahc::{config::Configurable, HttpClient, ReadResponseExt, Request};
use serde::de::DeserializeOwned;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

const COSMOS_HEIGHT_HEADER: &str = "x-cosmos-block-height";

/// Validators page size, the max allowed by Tendermint.
const VALIDATORS_PER_PAGE: usize = 100;

/// Fragment of the error returned by `/genesis` on big documents.
const GENESIS_TOO_LARGE: &str = "genesis_chunked";

const MAX_ERROR_BODY_LEN: usize = 256;

fn node_fault<E>(err: E) -> Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Error::new_ext(ErrorKind::NodeFault, err)
}

fn malformed<E>(err: E) -> Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Error::new_ext(ErrorKind::MalformedData, err)
}

fn decode_hex(data: &str) -> Result<Vec<u8>> {
    hex::decode(data).map_err(malformed)
}

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(malformed)
}

fn truncate(body: &str) -> &str {
    let mut end = body.len().min(MAX_ERROR_BODY_LEN);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[derive(Deserialize, Debug)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize, Debug)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

impl<T> RpcResponse<T> {
    fn into_result(self) -> Result<T> {
        match (self.result, self.error) {
            (_, Some(err)) => Err(node_fault(format!("{}: {}", err.message, err.data))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(malformed("empty rpc response")),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SyncInfo {
    #[serde(deserialize_with = "str_or_num")]
    latest_block_height: Height,
}

#[derive(Deserialize, Debug)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Deserialize, Debug)]
struct BlockId {
    hash: String,
}

#[derive(Deserialize, Debug)]
struct RpcHeader {
    chain_id: String,
    #[serde(deserialize_with = "str_or_num")]
    height: Height,
    time: String,
    proposer_address: String,
}

#[derive(Deserialize, Debug)]
struct RpcData {
    txs: Option<Vec<String>>,
}

#[derive(Deserialize, Debug)]
struct RpcCommitSig {
    #[serde(default)]
    validator_address: String,
    #[serde(default)]
    timestamp: String,
    signature: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RpcCommit {
    #[serde(deserialize_with = "str_or_num")]
    height: Height,
    #[serde(default)]
    signatures: Vec<RpcCommitSig>,
}

#[derive(Deserialize, Debug)]
struct RpcBlock {
    header: RpcHeader,
    data: RpcData,
    last_commit: Option<RpcCommit>,
}

#[derive(Deserialize, Debug)]
struct BlockResult {
    block_id: BlockId,
    block: RpcBlock,
}

impl BlockResult {
    fn into_block(self) -> Result<Block> {
        let RpcBlock {
            header,
            data,
            last_commit,
        } = self.block;

        let txs = data
            .txs
            .unwrap_or_default()
            .iter()
            .map(|tx| decode_base64(tx))
            .collect::<Result<Vec<_>>>()?;

        let last_commit = match last_commit {
            Some(commit) => {
                let signatures = commit
                    .signatures
                    .into_iter()
                    // Absent validators have no address.
                    .filter(|sig| !sig.validator_address.is_empty())
                    .map(|sig| -> Result<CommitSig> {
                        let signature = match sig.signature {
                            Some(ref sig) => Some(decode_base64(sig)?),
                            None => None,
                        };
                        Ok(CommitSig {
                            validator_address: decode_hex(&sig.validator_address)?,
                            timestamp: sig.timestamp,
                            signature,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Commit {
                    height: commit.height,
                    signatures,
                }
            }
            None => Commit::default(),
        };

        Ok(Block {
            height: header.height,
            hash: self.block_id.hash.to_uppercase(),
            chain_id: header.chain_id,
            proposer_address: decode_hex(&header.proposer_address)?,
            timestamp: header.time,
            txs,
            last_commit,
        })
    }
}

#[derive(Deserialize, Debug)]
struct RpcTxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(deserialize_with = "str_or_num", default)]
    gas_wanted: u64,
    #[serde(deserialize_with = "str_or_num", default)]
    gas_used: u64,
}

#[derive(Deserialize, Debug)]
struct BlockResultsResult {
    #[serde(deserialize_with = "str_or_num")]
    height: Height,
    txs_results: Option<Vec<RpcTxResult>>,
}

impl From<BlockResultsResult> for BlockResults {
    fn from(res: BlockResultsResult) -> Self {
        BlockResults {
            height: res.height,
            txs_results: res
                .txs_results
                .unwrap_or_default()
                .into_iter()
                .map(|tx| TxResult {
                    code: tx.code,
                    gas_wanted: tx.gas_wanted,
                    gas_used: tx.gas_used,
                    log: tx.log,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct RpcPubKey {
    value: String,
}

#[derive(Deserialize, Debug)]
struct RpcValidator {
    address: String,
    pub_key: RpcPubKey,
    #[serde(deserialize_with = "str_or_num")]
    voting_power: i64,
    #[serde(deserialize_with = "str_or_num")]
    proposer_priority: i64,
}

impl RpcValidator {
    fn into_validator(self) -> Result<ChainValidator> {
        Ok(ChainValidator {
            address: decode_hex(&self.address)?,
            pub_key: decode_base64(&self.pub_key.value)?,
            voting_power: self.voting_power,
            proposer_priority: self.proposer_priority,
        })
    }
}

#[derive(Deserialize, Debug)]
struct ValidatorsResult {
    validators: Vec<RpcValidator>,
    #[serde(deserialize_with = "str_or_num")]
    total: usize,
}

#[derive(Deserialize, Debug)]
struct GenesisResult {
    genesis: GenesisDoc,
}

#[derive(Deserialize, Debug)]
struct GenesisChunkResult {
    #[serde(deserialize_with = "str_or_num")]
    total: usize,
    data: String,
}

#[derive(Deserialize, Debug)]
struct PoolResponse {
    pool: StakingPoolValues,
}

#[derive(Deserialize, Debug)]
struct SupplyResponse {
    supply: Vec<Coin>,
}

#[derive(Deserialize, Debug)]
struct BalancesResponse {
    balances: Vec<Coin>,
}

#[derive(Deserialize, Debug)]
struct InflationResponse {
    inflation: String,
}

#[derive(Deserialize, Debug)]
struct IbcParamsResponse {
    params: IbcTransferParams,
}

/// Node reached through the Tendermint RPC and Cosmos REST endpoints.
pub struct RemoteNode {
    client: HttpClient,
    rpc_address: String,
    api_address: String,
    poll_interval: Duration,
    stopped: Arc<AtomicBool>,
}

impl RemoteNode {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .max_connections_per_host(config.max_connections)
            .build()
            .map_err(node_fault)?;

        Ok(RemoteNode {
            client,
            rpc_address: config.rpc_address.trim_end_matches('/').to_string(),
            api_address: config.api_address.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    fn check_running(&self) -> Result<()> {
        if self.stopped.load(Ordering::Relaxed) {
            return Err(node_fault("node client stopped"));
        }
        Ok(())
    }

    /// Perform a GET and decode the json body.
    fn get<T: DeserializeOwned>(&self, url: &str, height: Option<Height>) -> Result<T> {
        self.check_running()?;
        debug!("[node] GET {}", url);

        let mut builder = Request::get(url);
        if let Some(height) = height {
            builder = builder.header(COSMOS_HEIGHT_HEADER, height.to_string());
        }
        let request = builder.body(()).map_err(node_fault)?;

        let mut response = self.client.send(request).map_err(node_fault)?;
        let body = response.text().map_err(node_fault)?;
        // Tendermint reports rpc errors with a json body and a 500 status.
        if !response.status().is_success() && !body.trim_start().starts_with('{') {
            return Err(node_fault(format!(
                "{} returned {}: {}",
                url,
                response.status(),
                truncate(&body)
            )));
        }
        serialize::json_deserialize(body.as_bytes())
    }

    fn rpc<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.rpc_address, path);
        self.get::<RpcResponse<T>>(&url, None)?.into_result()
    }

    fn api<T: DeserializeOwned>(&self, path: &str, height: Height) -> Result<T> {
        let url = format!("{}{}", self.api_address, path);
        self.get(&url, Some(height))
    }

    /// Reassemble a genesis too big to be served in one piece.
    fn genesis_chunked(&self) -> Result<GenesisDoc> {
        let mut buf = Vec::new();
        let mut chunk = 0;
        loop {
            let res: GenesisChunkResult = self.rpc(&format!("/genesis_chunked?chunk={}", chunk))?;
            buf.extend(decode_base64(&res.data)?);
            chunk += 1;
            if chunk >= res.total {
                break;
            }
        }
        GenesisDoc::from_json(&buf)
    }
}

async fn poll_latest_height(client: &HttpClient, url: &str) -> Result<Height> {
    let mut response = client.get_async(url).await.map_err(node_fault)?;
    let mut body = Vec::new();
    response
        .body_mut()
        .read_to_end(&mut body)
        .await
        .map_err(node_fault)?;
    let res: RpcResponse<StatusResult> = serialize::json_deserialize(&body)?;
    Ok(res.into_result()?.sync_info.latest_block_height)
}

struct PollState {
    client: HttpClient,
    url: String,
    interval: Duration,
    stopped: Arc<AtomicBool>,
    /// Next height to notify.
    next: Height,
    /// Latest height known to be committed.
    tip: Height,
    failed: bool,
}

impl Node for RemoteNode {
    fn genesis(&self) -> Result<GenesisDoc> {
        match self.rpc::<GenesisResult>("/genesis") {
            Ok(res) => Ok(res.genesis),
            Err(err) if err.to_string_full().contains(GENESIS_TOO_LARGE) => {
                debug!("[node] genesis too large, switching to chunked download");
                self.genesis_chunked()
            }
            Err(err) => Err(err.context("failed to get genesis")),
        }
    }

    fn latest_height(&self) -> Result<Height> {
        let status: StatusResult = self.rpc("/status")?;
        Ok(status.sync_info.latest_block_height)
    }

    fn block(&self, height: Height) -> Result<Block> {
        let res: BlockResult = self
            .rpc(&format!("/block?height={}", height))
            .map_err(|err| err.context(&format!("failed to get block {}", height)))?;
        res.into_block()
    }

    fn block_results(&self, height: Height) -> Result<BlockResults> {
        let res: BlockResultsResult = self
            .rpc(&format!("/block_results?height={}", height))
            .map_err(|err| err.context(&format!("failed to get block results {}", height)))?;
        Ok(res.into())
    }

    fn validators(&self, height: Height) -> Result<ValidatorSet> {
        let mut validators = Vec::new();
        let mut page = 1;
        loop {
            let res: ValidatorsResult = self
                .rpc(&format!(
                    "/validators?height={}&page={}&per_page={}",
                    height, page, VALIDATORS_PER_PAGE
                ))
                .map_err(|err| err.context(&format!("failed to get validators {}", height)))?;
            let count = res.validators.len();
            for val in res.validators {
                validators.push(val.into_validator()?);
            }
            if count == 0 || validators.len() >= res.total {
                break;
            }
            page += 1;
        }
        Ok(ValidatorSet { height, validators })
    }

    fn subscribe_new_blocks(&self, subscriber: &str) -> Result<NewBlockStream> {
        let tip = self.latest_height()?;
        info!(
            "[node] {} subscribed to new blocks after height {}",
            subscriber, tip
        );

        let state = PollState {
            client: self.client.clone(),
            url: format!("{}/status", self.rpc_address),
            interval: self.poll_interval,
            stopped: self.stopped.clone(),
            next: tip + 1,
            tip,
            failed: false,
        };

        let stream = stream::unfold(state, |mut state| async move {
            loop {
                if state.failed || state.stopped.load(Ordering::Relaxed) {
                    return None;
                }
                if state.next <= state.tip {
                    let event = NewBlockEvent { height: state.next };
                    state.next += 1;
                    return Some((Ok(event), state));
                }
                task::sleep(state.interval).await;
                match poll_latest_height(&state.client, &state.url).await {
                    Ok(height) => state.tip = state.tip.max(height),
                    Err(err) => {
                        // The sequence ends after reporting the failure.
                        state.failed = true;
                        return Some((Err(err), state));
                    }
                }
            }
        });
        Ok(stream.boxed())
    }

    fn staking_pool(&self, height: Height) -> Result<StakingPoolValues> {
        let res: PoolResponse = self.api("/cosmos/staking/v1beta1/pool", height)?;
        Ok(res.pool)
    }

    fn supply(&self, height: Height) -> Result<Vec<Coin>> {
        let res: SupplyResponse = self.api("/cosmos/bank/v1beta1/supply", height)?;
        Ok(res.supply)
    }

    fn account_balance(&self, address: &str, height: Height) -> Result<Vec<Coin>> {
        let res: BalancesResponse = self
            .api(&format!("/cosmos/bank/v1beta1/balances/{}", address), height)
            .map_err(|err| err.context(&format!("failed to get balance of {}", address)))?;
        Ok(res.balances)
    }

    fn inflation(&self, height: Height) -> Result<String> {
        let res: InflationResponse = self.api("/cosmos/mint/v1beta1/inflation", height)?;
        Ok(res.inflation)
    }

    fn ibc_params(&self, height: Height) -> Result<IbcTransferParams> {
        let res: IbcParamsResponse = self.api("/ibc/apps/transfer/v1/params", height)?;
        Ok(res.params)
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::Relaxed) {
            info!("[node] client stopped");
        }
    }
}

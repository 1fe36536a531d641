//! Named wrappers for the daemon methods Pastel tooling calls most.
//!
//! Each method is a thin call through [`RpcEngine`] plus just enough result
//! inspection to return a typed value. Everything else about the remote
//! method is the daemon's business.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Number, Value};
use tracing::{info, warn};

use crate::error::RpcError;
use crate::rpc::types::{activation_kind, SupernodeExtra, UsernameTicket};
use crate::rpc::{BlockchainTicket, PreviousBlock, RpcEngine, SupernodeEntry, Transport};

/// Signature scheme `pastelid verify` is asked to check.
pub const PASTELID_ALGORITHM: &str = "ed448";

/// Block reference accepted by `getblock`: a hash or a height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRef {
    Hash(String),
    Height(u64),
}

impl BlockRef {
    fn to_param(&self) -> Value {
        match self {
            Self::Hash(hash) => json!(hash),
            // pasteld expects the height as a string for getblock.
            Self::Height(height) => json!(height.to_string()),
        }
    }
}

#[async_trait]
pub trait PastelRpc: Send + Sync {
    async fn get_best_block_hash(&self) -> Result<String, RpcError>;

    async fn get_block(&self, block: &BlockRef) -> Result<Value, RpcError>;

    async fn get_block_hash(&self, height: u64) -> Result<String, RpcError>;

    /// Height of the current best block.
    async fn get_current_block_height(&self) -> Result<u64, RpcError> {
        let hash = self.get_best_block_hash().await?;
        let block = self.get_block(&BlockRef::Hash(hash)).await?;
        block
            .get("height")
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("getblock", "height", &block))
    }

    /// Verbose transaction JSON.
    async fn get_raw_transaction(&self, txid: &str) -> Result<Value, RpcError>;

    /// Balance at `address`, exactly as the daemon reports it.
    async fn get_address_balance(&self, address: &str) -> Result<Number, RpcError>;

    async fn verify_message_with_pastelid(
        &self,
        pastelid: &str,
        message: &str,
        signature: &str,
    ) -> Result<bool, RpcError>;

    async fn masternode_top(&self) -> Result<Value, RpcError>;

    /// Hash, merkle root and height of the block below the tip.
    async fn get_previous_block(&self) -> Result<PreviousBlock, RpcError> {
        let height = self
            .get_current_block_height()
            .await?
            .checked_sub(1)
            .ok_or_else(|| RpcError::MalformedResponse("chain has no block below genesis".to_owned()))?;
        let hash = self.get_block_hash(height).await?;
        let block = self.get_block(&BlockRef::Hash(hash.clone())).await?;
        let merkle_root = block
            .get("merkleroot")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("getblock", "merkleroot", &block))?
            .to_owned();
        Ok(PreviousBlock {
            hash,
            merkle_root,
            height,
        })
    }

    /// Full `getblock` output for the tip, looked up by height.
    async fn get_last_block_data(&self) -> Result<Value, RpcError> {
        let height = self.get_current_block_height().await?;
        self.get_block(&BlockRef::Height(height)).await
    }

    /// Every supernode the daemon knows, ordered by collateral outpoint.
    async fn supernode_list(&self) -> Result<Vec<SupernodeEntry>, RpcError>;

    /// The supernode registered under `pastelid`, if any.
    async fn supernode_by_pastelid(&self, pastelid: &str) -> Result<Option<SupernodeEntry>, RpcError> {
        let found = self
            .supernode_list()
            .await?
            .into_iter()
            .find(|entry| entry.ext_key.as_deref() == Some(pastelid));
        if found.is_none() {
            info!(pastelid, "no supernode with this PastelID");
        }
        Ok(found)
    }

    /// The supernode whose masternode pubkey is `pubkey`, if any.
    async fn supernode_by_pubkey(&self, pubkey: &str) -> Result<Option<SupernodeEntry>, RpcError> {
        let found = self
            .supernode_list()
            .await?
            .into_iter()
            .find(|entry| entry.pubkey.as_deref() == Some(pubkey));
        if found.is_none() {
            info!(pubkey, "no supernode with this pubkey");
        }
        Ok(found)
    }

    /// `tickets get txid` plus registration block time and activation
    /// ticket. `None` when no ticket has that txid.
    async fn get_blockchain_ticket(&self, txid: &str) -> Result<Option<BlockchainTicket>, RpcError>;

    /// Usernames registered to `pastelid`.
    async fn usernames_for_pastelid(&self, pastelid: &str) -> Result<Vec<String>, RpcError>;

    /// PastelID that registered `username`, if any.
    async fn pastelid_for_username(&self, username: &str) -> Result<Option<String>, RpcError>;
}

#[async_trait]
impl<T: Transport> PastelRpc for RpcEngine<T> {
    async fn get_best_block_hash(&self) -> Result<String, RpcError> {
        let raw = self.call("getbestblockhash", Vec::new()).await?;
        expect_string("getbestblockhash", raw)
    }

    async fn get_block(&self, block: &BlockRef) -> Result<Value, RpcError> {
        self.call("getblock", vec![block.to_param()]).await
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, RpcError> {
        let raw = self.call("getblockhash", vec![json!(height)]).await?;
        expect_string("getblockhash", raw)
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<Value, RpcError> {
        self.call("getrawtransaction", vec![json!(txid), json!(1)])
            .await
    }

    async fn get_address_balance(&self, address: &str) -> Result<Number, RpcError> {
        match self.call("z_getbalance", vec![json!(address)]).await? {
            Value::Number(balance) => Ok(balance),
            other => Err(malformed("z_getbalance", "balance", &other)),
        }
    }

    async fn verify_message_with_pastelid(
        &self,
        pastelid: &str,
        message: &str,
        signature: &str,
    ) -> Result<bool, RpcError> {
        let raw = self
            .call(
                "pastelid",
                vec![
                    json!("verify"),
                    json!(message),
                    json!(signature),
                    json!(pastelid),
                    json!(PASTELID_ALGORITHM),
                ],
            )
            .await?;
        match raw.get("verification") {
            Some(Value::Bool(ok)) => Ok(*ok),
            Some(Value::String(s)) => Ok(s.eq_ignore_ascii_case("ok") || s == "true"),
            _ => Err(malformed("pastelid verify", "verification", &raw)),
        }
    }

    async fn masternode_top(&self) -> Result<Value, RpcError> {
        self.call("masternode", vec![json!("top")]).await
    }

    async fn supernode_list(&self) -> Result<Vec<SupernodeEntry>, RpcError> {
        let full: BTreeMap<String, String> = self.masternode_list("full").await?;
        let ranks: BTreeMap<String, u32> = self.masternode_list("rank").await?;
        let pubkeys: BTreeMap<String, String> = self.masternode_list("pubkey").await?;
        let extras: BTreeMap<String, SupernodeExtra> = self.masternode_list("extra").await?;

        full.iter()
            .map(|(txid_vout, line)| {
                let mut entry = SupernodeEntry::from_full_line(txid_vout, line)?;
                entry.rank = ranks.get(txid_vout).copied();
                entry.pubkey = pubkeys.get(txid_vout).cloned();
                if let Some(extra) = extras.get(txid_vout) {
                    entry.ext_address = extra.ext_address.clone();
                    entry.ext_p2p = extra.ext_p2p.clone();
                    entry.ext_key = extra.ext_key.clone();
                }
                Ok(entry)
            })
            .collect()
    }

    async fn get_blockchain_ticket(&self, txid: &str) -> Result<Option<BlockchainTicket>, RpcError> {
        let ticket = self.call("tickets", vec![json!("get"), json!(txid)]).await?;
        if is_empty(&ticket) {
            return Ok(None);
        }
        let ticket_type = ticket
            .get("ticket")
            .and_then(|t| t.get("type"))
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("tickets get", "ticket.type", &ticket))?
            .to_owned();
        let reg_height = ticket
            .get("height")
            .and_then(as_height)
            .ok_or_else(|| malformed("tickets get", "height", &ticket))?;

        let tip = self.get_current_block_height().await?;
        if reg_height > tip {
            warn!(txid, reg_height, tip, "ticket registered above the current tip");
        }

        let block = self.get_block(&BlockRef::Height(reg_height)).await?;
        let reg_block_time = block
            .get("time")
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("getblock", "time", &block))?;

        let activation = match activation_kind(&ticket_type) {
            Some(kind) => {
                let found = self
                    .call("tickets", vec![json!("find"), json!(kind), json!(txid)])
                    .await?;
                (!is_empty(&found)).then_some(found)
            }
            None => None,
        };

        Ok(Some(BlockchainTicket {
            ticket,
            reg_block_time,
            activation,
        }))
    }

    async fn usernames_for_pastelid(&self, pastelid: &str) -> Result<Vec<String>, RpcError> {
        Ok(self
            .username_tickets()
            .await?
            .into_iter()
            .filter(|t| t.ticket.pastel_id == pastelid)
            .map(|t| t.ticket.username)
            .collect())
    }

    async fn pastelid_for_username(&self, username: &str) -> Result<Option<String>, RpcError> {
        Ok(self
            .username_tickets()
            .await?
            .into_iter()
            .find(|t| t.ticket.username == username)
            .map(|t| t.ticket.pastel_id))
    }
}

impl<T: Transport> RpcEngine<T> {
    async fn masternode_list<R: serde::de::DeserializeOwned>(&self, mode: &str) -> Result<R, RpcError> {
        let raw = self.call("masternodelist", vec![json!(mode)]).await?;
        serde_json::from_value(raw).map_err(|e| {
            RpcError::MalformedResponse(format!("masternodelist {mode}: unexpected shape: {e}"))
        })
    }

    async fn username_tickets(&self) -> Result<Vec<UsernameTicket>, RpcError> {
        let raw = self
            .call("tickets", vec![json!("list"), json!("username")])
            .await?;
        if raw.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(raw).map_err(|e| {
            RpcError::MalformedResponse(format!("tickets list username: unexpected shape: {e}"))
        })
    }
}

/// Null, `{}`, `[]` and `""` all mean "nothing found" to the ticket RPCs.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Ticket heights arrive as numbers or numeric strings.
fn as_height(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn expect_string(method: &str, raw: Value) -> Result<String, RpcError> {
    match raw {
        Value::String(s) => Ok(s),
        other => Err(malformed(method, "string result", &other)),
    }
}

fn malformed(method: &str, field: &str, raw: &Value) -> RpcError {
    RpcError::MalformedResponse(format!("{method}: missing or invalid {field} in {raw}"))
}

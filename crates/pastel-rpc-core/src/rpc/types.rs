//! Typed views over the daemon results the named operations inspect.
//!
//! Everything the operations pass through untouched stays a
//! [`serde_json::Value`]; this module only covers shapes that are parsed or
//! merged on the client side.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

// ==============================================================================
// Blocks
// ==============================================================================

/// The block just below the current tip, as used to anchor signed messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviousBlock {
    pub hash: String,
    pub merkle_root: String,
    pub height: u64,
}

// ==============================================================================
// Supernodes
// ==============================================================================

/// One supernode, merged from the four `masternodelist` views and keyed by
/// its collateral outpoint.
///
/// Times are Unix seconds as the daemon reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupernodeEntry {
    pub txid_vout: String,
    pub status: String,
    pub protocol_version: String,
    pub psl_address: String,
    pub last_seen_time: u64,
    pub active_seconds: u64,
    pub last_paid_time: u64,
    pub last_paid_block: u64,
    pub ip_address_port: String,
    pub rank: Option<u32>,
    pub pubkey: Option<String>,
    pub ext_address: Option<String>,
    pub ext_p2p: Option<String>,
    /// The supernode's PastelID.
    pub ext_key: Option<String>,
}

impl SupernodeEntry {
    /// Number of fields in a `masternodelist full` line.
    const FULL_FIELDS: usize = 8;

    /// Parse one `masternodelist full` entry:
    /// `status protocol address lastseen activeseconds lastpaidtime lastpaidblock ip:port`.
    pub fn from_full_line(txid_vout: &str, line: &str) -> Result<Self, RpcError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != Self::FULL_FIELDS {
            return Err(RpcError::MalformedResponse(format!(
                "masternodelist full: expected {} fields for {txid_vout}, got {}: `{line}`",
                Self::FULL_FIELDS,
                fields.len()
            )));
        }
        let number = |index: usize, name: &str| -> Result<u64, RpcError> {
            fields[index].parse().map_err(|_| {
                RpcError::MalformedResponse(format!(
                    "masternodelist full: {name} `{}` for {txid_vout} is not an integer",
                    fields[index]
                ))
            })
        };

        Ok(Self {
            txid_vout: txid_vout.to_owned(),
            status: fields[0].to_owned(),
            protocol_version: fields[1].to_owned(),
            psl_address: fields[2].to_owned(),
            last_seen_time: number(3, "lastseentime")?,
            active_seconds: number(4, "activeseconds")?,
            last_paid_time: number(5, "lastpaidtime")?,
            last_paid_block: number(6, "lastpaidblock")?,
            ip_address_port: fields[7].to_owned(),
            rank: None,
            pubkey: None,
            ext_address: None,
            ext_p2p: None,
            ext_key: None,
        })
    }

    pub fn active_days(&self) -> f64 {
        self.active_seconds as f64 / 86_400.0
    }
}

/// One value of `masternodelist extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupernodeExtra {
    #[serde(rename = "extAddress", default)]
    pub ext_address: Option<String>,
    #[serde(rename = "extP2P", default)]
    pub ext_p2p: Option<String>,
    #[serde(rename = "extKey", default)]
    pub ext_key: Option<String>,
}

// ==============================================================================
// Tickets
// ==============================================================================

/// A ticket from `tickets get`, with the time of the block that registered
/// it and, for registration tickets, the matching activation ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockchainTicket {
    /// The daemon's response, unchanged.
    pub ticket: Value,
    pub reg_block_time: u64,
    /// `None` when the type needs no activation or none is on chain yet.
    pub activation: Option<Value>,
}

impl BlockchainTicket {
    /// `ticket.type`, e.g. `nft-reg`.
    pub fn ticket_type(&self) -> Option<&str> {
        self.ticket.get("ticket")?.get("type")?.as_str()
    }
}

/// Activation ticket kind searched for a registration ticket type, if any.
pub fn activation_kind(ticket_type: &str) -> Option<&'static str> {
    match ticket_type {
        "nft-reg" => Some("act"),
        "action-reg" => Some("action-act"),
        "collection-reg" => Some("collection-act"),
        _ => None,
    }
}

/// One entry of `tickets list username`.
#[derive(Debug, Clone, Deserialize)]
pub struct UsernameTicket {
    pub ticket: UsernameTicketBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsernameTicketBody {
    pub username: String,
    #[serde(rename = "pastelID")]
    pub pastel_id: String,
}

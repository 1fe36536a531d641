//! Locate daemon credentials.
//!
//! Environment variables win when all four are set; otherwise the node's
//! `pastel.conf` is read. The result is an [`Endpoint`], so an engine can
//! only be built once every credential field is known.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::RpcError;
use crate::rpc::Endpoint;

pub const ENV_RPC_HOST: &str = "RPC_HOST";
pub const ENV_RPC_PORT: &str = "RPC_PORT";
pub const ENV_RPC_USER: &str = "RPC_USER";
pub const ENV_RPC_PASSWORD: &str = "RPC_PASSWORD";

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const CONF_FILE_NAME: &str = "pastel.conf";

// ==============================================================================
// Network Mode
// ==============================================================================

/// Network a node is configured for, as declared in `pastel.conf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    Mainnet,
    Testnet,
    Devnet,
    Regtest,
}

impl NetworkMode {
    pub fn default_rpc_port(self) -> u16 {
        match self {
            Self::Mainnet => 9932,
            Self::Testnet => 19932,
            Self::Devnet => 29932,
            Self::Regtest => 18232,
        }
    }

    fn from_conf_key(key: &str) -> Option<Self> {
        match key {
            "mainnet" => Some(Self::Mainnet),
            "testnet" => Some(Self::Testnet),
            "devnet" => Some(Self::Devnet),
            "regtest" => Some(Self::Regtest),
            _ => None,
        }
    }
}

/// Port used when `pastel.conf` names no network and no `rpcport`.
pub const FALLBACK_RPC_PORT: u16 = 19932;

// ==============================================================================
// Resolver seam
// ==============================================================================

/// Anything that can produce daemon credentials.
pub trait CredentialSource {
    fn resolve(&self) -> Result<Endpoint, RpcError>;
}

/// Reads `RPC_HOST`, `RPC_PORT`, `RPC_USER` and `RPC_PASSWORD`.
pub struct EnvCredentials<F = fn(&str) -> Option<String>> {
    lookup: F,
}

impl EnvCredentials {
    pub fn from_process_env() -> Self {
        Self {
            lookup: |key| std::env::var(key).ok(),
        }
    }
}

impl<F: Fn(&str) -> Option<String>> EnvCredentials<F> {
    /// Use a custom lookup instead of the process environment.
    pub fn with_lookup(lookup: F) -> Self {
        Self { lookup }
    }

    fn get(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// True when every variable is set, i.e. the file fallback is not needed.
    pub fn is_complete(&self) -> bool {
        [ENV_RPC_HOST, ENV_RPC_PORT, ENV_RPC_USER, ENV_RPC_PASSWORD]
            .iter()
            .all(|key| self.get(key).is_some())
    }
}

impl<F: Fn(&str) -> Option<String>> CredentialSource for EnvCredentials<F> {
    fn resolve(&self) -> Result<Endpoint, RpcError> {
        let host = self
            .get(ENV_RPC_HOST)
            .ok_or(RpcError::MissingCredentials { field: ENV_RPC_HOST })?;
        let port = self
            .get(ENV_RPC_PORT)
            .ok_or(RpcError::MissingCredentials { field: ENV_RPC_PORT })?;
        let user = self
            .get(ENV_RPC_USER)
            .ok_or(RpcError::MissingCredentials { field: ENV_RPC_USER })?;
        let password = self
            .get(ENV_RPC_PASSWORD)
            .ok_or(RpcError::MissingCredentials { field: ENV_RPC_PASSWORD })?;
        Endpoint::new(host, parse_port(&port, ENV_RPC_PORT)?, user, password)
    }
}

// ==============================================================================
// pastel.conf
// ==============================================================================

/// RPC settings parsed from a `pastel.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastelConf {
    pub network: Option<NetworkMode>,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
    /// Every other `key=value` pair, for callers that need node flags.
    pub other_flags: BTreeMap<String, String>,
}

impl PastelConf {
    /// Read `pastel.conf` from `dir`, or from `~/.pastel` when `dir` is `None`.
    pub fn load(dir: Option<&Path>) -> Result<Self, RpcError> {
        let path = conf_path(dir)?;
        let content = std::fs::read_to_string(&path).map_err(|e| {
            RpcError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "read pastel.conf");
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, RpcError> {
        let entries: Vec<(&str, &str)> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let network = entries
            .iter()
            .find_map(|(k, v)| NetworkMode::from_conf_key(k).filter(|_| *v == "1"));

        let mut conf = Self {
            network,
            rpc_host: DEFAULT_RPC_HOST.to_owned(),
            rpc_port: network.map_or(FALLBACK_RPC_PORT, NetworkMode::default_rpc_port),
            rpc_user: None,
            rpc_password: None,
            other_flags: BTreeMap::new(),
        };

        for (key, value) in entries {
            match key {
                "rpcport" => conf.rpc_port = parse_port(value, "rpcport")?,
                "rpcuser" => conf.rpc_user = Some(value.to_owned()),
                "rpcpassword" => conf.rpc_password = Some(value.to_owned()),
                // The daemon binds rpchost; clients always dial locally.
                "rpchost" => {}
                _ => {
                    conf.other_flags.insert(key.to_owned(), value.to_owned());
                }
            }
        }
        Ok(conf)
    }
}

impl CredentialSource for PastelConf {
    fn resolve(&self) -> Result<Endpoint, RpcError> {
        let user = self
            .rpc_user
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or(RpcError::MissingCredentials { field: "rpcuser" })?;
        let password = self
            .rpc_password
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or(RpcError::MissingCredentials { field: "rpcpassword" })?;
        Endpoint::new(self.rpc_host.clone(), self.rpc_port, user, password)
    }
}

/// Environment first, then `pastel.conf` in `conf_dir` (default `~/.pastel`).
pub fn resolve_endpoint(conf_dir: Option<&Path>) -> Result<Endpoint, RpcError> {
    let env = EnvCredentials::from_process_env();
    if env.is_complete() {
        return env.resolve();
    }
    info!("RPC settings not found in environment; reading pastel.conf");
    PastelConf::load(conf_dir)?.resolve()
}

fn conf_path(dir: Option<&Path>) -> Result<PathBuf, RpcError> {
    let dir = match dir {
        Some(dir) => expand_home(dir)?,
        None => home_dir()?.join(".pastel"),
    };
    Ok(dir.join(CONF_FILE_NAME))
}

fn expand_home(dir: &Path) -> Result<PathBuf, RpcError> {
    match dir.strip_prefix("~") {
        Ok(rest) => Ok(home_dir()?.join(rest)),
        Err(_) => Ok(dir.to_path_buf()),
    }
}

fn home_dir() -> Result<PathBuf, RpcError> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or_else(|| RpcError::InvalidConfig("cannot locate home directory".to_owned()))
}

fn parse_port(value: &str, field: &str) -> Result<u16, RpcError> {
    value
        .trim()
        .parse()
        .map_err(|e| RpcError::InvalidConfig(format!("{field} `{value}` is not a valid port: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_credentials_resolve_when_complete() {
        let env = EnvCredentials::with_lookup(env_of(&[
            ("RPC_HOST", "10.1.2.3"),
            ("RPC_PORT", "9932"),
            ("RPC_USER", "alice"),
            ("RPC_PASSWORD", "secret"),
        ]));
        assert!(env.is_complete());
        let endpoint = env.resolve().expect("complete env must resolve");
        assert_eq!(endpoint.host(), "10.1.2.3");
        assert_eq!(endpoint.port(), 9932);
        assert_eq!(endpoint.username(), "alice");
    }

    #[test]
    fn env_credentials_report_missing_field() {
        let env = EnvCredentials::with_lookup(env_of(&[
            ("RPC_HOST", "10.1.2.3"),
            ("RPC_PORT", "9932"),
            ("RPC_USER", "alice"),
            ("RPC_PASSWORD", "  "),
        ]));
        assert!(!env.is_complete());
        assert!(matches!(
            env.resolve(),
            Err(RpcError::MissingCredentials { field: "RPC_PASSWORD" })
        ));
    }

    #[test]
    fn env_credentials_reject_bad_port() {
        let env = EnvCredentials::with_lookup(env_of(&[
            ("RPC_HOST", "h"),
            ("RPC_PORT", "99999"),
            ("RPC_USER", "u"),
            ("RPC_PASSWORD", "p"),
        ]));
        assert!(matches!(env.resolve(), Err(RpcError::InvalidConfig(_))));
    }

    #[test]
    fn conf_network_mode_selects_default_port() {
        let conf = PastelConf::parse("regtest=1\nrpcuser=u\nrpcpassword=p\n").unwrap();
        assert_eq!(conf.network, Some(NetworkMode::Regtest));
        assert_eq!(conf.rpc_port, 18232);

        let conf = PastelConf::parse("mainnet=1\n").unwrap();
        assert_eq!(conf.rpc_port, 9932);

        let conf = PastelConf::parse("testnet=0\n").unwrap();
        assert_eq!(conf.network, None);
        assert_eq!(conf.rpc_port, FALLBACK_RPC_PORT);
    }

    #[test]
    fn conf_explicit_rpcport_overrides_network_default() {
        let conf = PastelConf::parse(
            "testnet=1\nrpcport = 12345\nrpcuser=rpc_user\nrpcpassword=rpc_pwd\ntxindex=1\nrpchost=0.0.0.0\n",
        )
        .unwrap();
        assert_eq!(conf.rpc_port, 12345);
        assert_eq!(conf.rpc_host, DEFAULT_RPC_HOST);
        assert_eq!(conf.other_flags.get("txindex").map(String::as_str), Some("1"));
        assert!(!conf.other_flags.contains_key("rpchost"));

        let endpoint = conf.resolve().unwrap();
        assert_eq!(endpoint.url(), "http://127.0.0.1:12345/");
        assert_eq!(endpoint.username(), "rpc_user");
    }

    #[test]
    fn conf_without_password_is_missing_credentials() {
        let conf = PastelConf::parse("testnet=1\nrpcuser=u\n").unwrap();
        assert!(matches!(
            conf.resolve(),
            Err(RpcError::MissingCredentials { field: "rpcpassword" })
        ));
    }

    #[test]
    fn conf_ignores_comments_and_blank_lines() {
        let conf = PastelConf::parse("# rpcuser=commented\n\n  rpcuser=real  \n").unwrap();
        assert_eq!(conf.rpc_user.as_deref(), Some("real"));
    }

    #[test]
    fn load_reads_conf_from_directory() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time must be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("pastel-rpc-core-conf-{unique}"));
        fs::create_dir_all(&dir).expect("temp dir must be creatable");
        fs::write(dir.join(CONF_FILE_NAME), "devnet=1\nrpcuser=d\nrpcpassword=e\n")
            .expect("conf must be writable");

        let conf = PastelConf::load(Some(&dir)).expect("conf must load");
        assert_eq!(conf.rpc_port, 29932);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_missing_file_is_invalid_config() {
        let err = PastelConf::load(Some(Path::new("/nonexistent/pastel-rpc-core")))
            .expect_err("missing file must fail");
        assert!(matches!(err, RpcError::InvalidConfig(ref m) if m.contains("pastel.conf")));
    }
}

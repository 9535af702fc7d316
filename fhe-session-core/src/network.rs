use std::fmt;
use std::str::FromStr;

/// Networks a session can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Local development chain (hardhat/anvil style node).
    Local,
    /// Public test network.
    PublicTest,
    /// Main network.
    Main,
}

impl Network {
    /// Parse a network from its environment representation.
    pub fn from_env_value(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse().ok()
    }

    /// Returns a static string identifier for the network.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Local => "local",
            Network::PublicTest => "public-test",
            Network::Main => "main",
        }
    }

    /// Chain id the ledger connection is expected to report.
    pub fn expected_chain_id(&self) -> u64 {
        match self {
            Network::Local => 31_337,
            Network::PublicTest => 11_155_111,
            Network::Main => 1,
        }
    }

    /// Gateway used when the configuration carries no override. Only the
    /// local network has a well-known endpoint.
    pub fn default_gateway_url(&self) -> Option<&'static str> {
        match self {
            Network::Local => Some("http://127.0.0.1:3000"),
            Network::PublicTest | Network::Main => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "dev" | "localhost" => Ok(Network::Local),
            "public-test" | "testnet" | "sepolia" => Ok(Network::PublicTest),
            "main" | "mainnet" => Ok(Network::Main),
            _ => Err(()),
        }
    }
}

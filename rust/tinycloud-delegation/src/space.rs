//! Space identifiers and the host context a share link is redeemed against.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tinycloud_credentials::ethereum::{AddressError, EthereumAddress};
use tinycloud_varsig::Did;
use url::Url;

const SPACE_PREFIX: &str = "tinycloud:pkh:eip155:";

/// Error parsing a [`SpaceId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpaceIdError {
    /// Not of the form `tinycloud:pkh:eip155:<chain id>:<address>:<name>`.
    #[error("malformed space id: {0}")]
    Malformed(String),

    /// The owner address is invalid.
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// A storage namespace owned by one Ethereum account:
/// `tinycloud:pkh:eip155:<chain id>:<address>:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpaceId {
    chain_id: u64,
    address: EthereumAddress,
    name: String,
}

impl SpaceId {
    /// The space name used when none is chosen.
    pub const DEFAULT_NAME: &'static str = "default";

    /// Creates the space `name` owned by `address` on `chain_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceIdError::Malformed`] if the name is empty or contains
    /// `:`, `/` or whitespace.
    pub fn new(
        chain_id: u64,
        address: EthereumAddress,
        name: impl Into<String>,
    ) -> Result<Self, SpaceIdError> {
        let name = name.into();
        if name.is_empty() || name.contains([':', '/']) || name.contains(char::is_whitespace) {
            return Err(SpaceIdError::Malformed(format!("invalid space name {name:?}")));
        }
        Ok(Self {
            chain_id,
            address,
            name,
        })
    }

    /// The EIP-155 chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The owning account.
    #[must_use]
    pub const fn address(&self) -> EthereumAddress {
        self.address
    }

    /// The space name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owner's `did:pkh`, the only identity allowed to root a chain for
    /// this space.
    #[must_use]
    pub fn owner(&self) -> Did {
        self.address.to_did(self.chain_id)
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SPACE_PREFIX}{}:{}:{}",
            self.chain_id, self.address, self.name
        )
    }
}

impl FromStr for SpaceId {
    type Err = SpaceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SpaceIdError::Malformed(s.to_string());
        let rest = s.strip_prefix(SPACE_PREFIX).ok_or_else(malformed)?;
        let mut parts = rest.splitn(3, ':');
        let (Some(chain_id), Some(address), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let chain_id = chain_id.parse().map_err(|_| malformed())?;
        Self::new(chain_id, address.parse()?, name)
    }
}

impl TryFrom<String> for SpaceId {
    type Error = SpaceIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SpaceId> for String {
    fn from(space: SpaceId) -> Self {
        space.to_string()
    }
}

/// Where a delegation is meant to be used: a storage host and a space on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostContext {
    /// Base URL of the storage node.
    pub host: Url,

    /// The space the delegation targets.
    pub space_id: SpaceId,
}

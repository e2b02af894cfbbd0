//! The wallet-signed root of trust of every delegation chain.

use crate::{SiweMessage, error::SiweError, space::SpaceId};
use serde::{Deserialize, Serialize};
use tinycloud_capability::CapabilityGrant;
use tinycloud_credentials::ethereum::EthereumSignature;
use tinycloud_varsig::{Did, Resolver, Signer, Verifier};

/// A SIWE message together with the wallet signature over its text,
/// binding an Ethereum account to a space.
///
/// The exact signed text is kept alongside the parsed message: the
/// signature covers those bytes, not any re-rendering of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AuthorityFields", into = "AuthorityFields")]
pub struct SiweRootAuthority {
    space: SpaceId,
    text: String,
    message: SiweMessage,
    signature: EthereumSignature,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorityFields {
    space: SpaceId,
    siwe: String,
    signature: EthereumSignature,
}

impl TryFrom<AuthorityFields> for SiweRootAuthority {
    type Error = SiweError;

    fn try_from(fields: AuthorityFields) -> Result<Self, Self::Error> {
        Self::new(fields.space, fields.siwe, fields.signature)
    }
}

impl From<SiweRootAuthority> for AuthorityFields {
    fn from(authority: SiweRootAuthority) -> Self {
        Self {
            space: authority.space,
            siwe: authority.text,
            signature: authority.signature,
        }
    }
}

impl SiweRootAuthority {
    /// Wraps signed SIWE `text` for `space`.
    ///
    /// # Errors
    ///
    /// Returns a [`SiweError`] if `text` is not a valid SIWE message.
    pub fn new(
        space: SpaceId,
        text: impl Into<String>,
        signature: EthereumSignature,
    ) -> Result<Self, SiweError> {
        let text = text.into();
        let message = text.parse()?;
        Ok(Self {
            space,
            text,
            message,
            signature,
        })
    }

    /// Signs `message` with `wallet`, for headless callers holding the
    /// wallet key themselves.
    ///
    /// # Errors
    ///
    /// Returns [`SiweError::Signature`] if the wallet cannot sign.
    pub fn sign<W: Signer<EthereumSignature>>(
        space: SpaceId,
        message: &SiweMessage,
        wallet: &W,
    ) -> Result<Self, SiweError> {
        let text = message.to_string();
        let signature = wallet
            .sign(text.as_bytes())
            .map_err(|_| SiweError::Signature)?;
        Self::new(space, text, signature)
    }

    /// The space this authority roots.
    #[must_use]
    pub fn space(&self) -> &SpaceId {
        &self.space
    }

    /// The parsed message.
    #[must_use]
    pub fn message(&self) -> &SiweMessage {
        &self.message
    }

    /// The signed text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The wallet signature.
    #[must_use]
    pub fn signature(&self) -> &EthereumSignature {
        &self.signature
    }

    /// The `did:pkh` of the signing account.
    #[must_use]
    pub fn issuer(&self) -> Did {
        self.message.signer()
    }

    /// The grant the wallet signed.
    ///
    /// # Errors
    ///
    /// See [`SiweMessage::grant`].
    pub fn grant(&self) -> Result<CapabilityGrant, SiweError> {
        self.message.grant(&self.space)
    }

    /// Checks that the space owner signed the message.
    ///
    /// # Errors
    ///
    /// - [`SiweError::NotSpaceOwner`] if the signer does not own the space
    /// - [`SiweError::Resolve`] if the signer DID cannot be resolved
    /// - [`SiweError::Signature`] if the signature does not verify
    pub fn verify<E: Resolver<EthereumSignature>>(&self, wallets: &E) -> Result<(), SiweError> {
        let signer = self.issuer();
        if signer != self.space.owner() {
            return Err(SiweError::NotSpaceOwner {
                owner: self.space.owner(),
                signer,
            });
        }
        wallets
            .resolve(&signer)
            .map_err(|e| SiweError::Resolve(e.to_string()))?
            .verify(self.text.as_bytes(), &self.signature)
            .map_err(|_| SiweError::Signature)
    }
}

//! ReCap ([EIP-5573]) encoding of a root grant inside a SIWE message.
//!
//! The wallet authorizes a session key by signing a SIWE message whose last
//! resource is a `urn:recap:` URI:
//!
//! ```text
//! urn:recap:<base64url({"att":{"<space><path>":{"<action>":[{}]}},"prf":[]})>
//! ```
//!
//! and whose statement ends with a readable rendering of the same
//! capabilities. The expiry and not-before of the grant are the message's
//! `Expiration Time` and `Not Before`.
//!
//! [EIP-5573]: https://eips.ethereum.org/EIPS/eip-5573

use crate::{SiweMessage, error::SiweError, siwe, space::SpaceId};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tinycloud_capability::{Action, CapabilityGrant, ResourcePath, TimeRange};

/// URI scheme prefix of ReCap resources.
pub const RECAP_PREFIX: &str = "urn:recap:";

const STATEMENT_PREFIX: &str =
    "I further authorize the stated URI to perform the following actions on my behalf:";

/// The capability object carried in a ReCap resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recap {
    /// Target URI to action name to caveats.
    pub att: BTreeMap<String, BTreeMap<String, Vec<Map<String, Value>>>>,

    /// Content ids of supporting proofs. Always empty for tinycloud roots.
    #[serde(default)]
    pub prf: Vec<String>,
}

impl Recap {
    /// Describes `grant` on `space` as a single ReCap target.
    #[must_use]
    pub fn from_grant(space: &SpaceId, grant: &CapabilityGrant) -> Self {
        let abilities = grant
            .actions()
            .iter()
            .map(|action| (action.to_string(), vec![Map::new()]))
            .collect();
        let mut att = BTreeMap::new();
        att.insert(format!("{space}{}", grant.path_prefix()), abilities);
        Self {
            att,
            prf: Vec::new(),
        }
    }

    /// Reads the grant back for `space`, valid over `window`.
    ///
    /// # Errors
    ///
    /// Returns [`SiweError::Recap`] unless there is exactly one target, it
    /// lies in `space`, and none of its abilities carry caveats.
    pub fn to_grant(&self, space: &SpaceId, window: TimeRange) -> Result<CapabilityGrant, SiweError> {
        let mut targets = self.att.iter();
        let (Some((target, abilities)), None) = (targets.next(), targets.next()) else {
            return Err(SiweError::Recap("expected exactly one target".into()));
        };

        let path: ResourcePath = target
            .strip_prefix(&space.to_string())
            .ok_or_else(|| SiweError::Recap(format!("{target} is not in {space}")))?
            .parse()
            .map_err(|e| SiweError::Recap(format!("{target}: {e}")))?;

        let mut actions = Vec::with_capacity(abilities.len());
        for (ability, caveats) in abilities {
            if caveats.iter().any(|caveat| !caveat.is_empty()) {
                return Err(SiweError::Recap(format!("{ability} carries caveats")));
            }
            actions.push(ability.parse::<Action>()?);
        }

        Ok(CapabilityGrant::new(path, actions, window.expiration)?
            .with_not_before(window.not_before)?)
    }

    /// Encodes this object as a `urn:recap:` URI.
    #[must_use]
    pub fn to_resource(&self) -> String {
        #[allow(clippy::expect_used)]
        let json = serde_json::to_vec(self).expect("recap objects always serialize");
        format!("{RECAP_PREFIX}{}", URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes a `urn:recap:` URI.
    ///
    /// # Errors
    ///
    /// Returns [`SiweError::Recap`] if the URI is not a ReCap resource.
    pub fn from_resource(resource: &str) -> Result<Self, SiweError> {
        let encoded = resource
            .strip_prefix(RECAP_PREFIX)
            .ok_or_else(|| SiweError::Recap(format!("{resource} is not a recap URI")))?;
        let json = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| SiweError::Recap(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| SiweError::Recap(e.to_string()))
    }

    /// The readable sentence a wallet shows for these capabilities.
    ///
    /// Actions are grouped by namespace per target:
    /// `... on my behalf: (1) 'kv': 'get', 'list' for '<target>'.`
    #[must_use]
    pub fn statement(&self) -> String {
        let mut statement = STATEMENT_PREFIX.to_string();
        let mut n = 0;
        for (target, abilities) in &self.att {
            let mut namespaces: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for ability in abilities.keys() {
                let (namespace, verb) = ability.split_once('/').unwrap_or(("", ability.as_str()));
                namespaces.entry(namespace).or_default().push(verb);
            }
            for (namespace, verbs) in namespaces {
                n += 1;
                let verbs = verbs
                    .iter()
                    .map(|verb| format!("'{verb}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                statement.push_str(&format!(" ({n}) '{namespace}': {verbs} for '{target}'."));
            }
        }
        statement
    }
}

impl SiweMessage {
    /// Binds `grant` on `space` into this message: adds the ReCap resource,
    /// appends the ReCap statement and sets the validity window.
    ///
    /// # Errors
    ///
    /// Returns [`SiweError::InvalidField`] if the grant window cannot be
    /// expressed as message times.
    pub fn with_grant(mut self, space: &SpaceId, grant: &CapabilityGrant) -> Result<Self, SiweError> {
        let recap = Recap::from_grant(space, grant);
        self.statement = Some(match self.statement.take() {
            Some(statement) => format!("{statement} {}", recap.statement()),
            None => recap.statement(),
        });
        self.resources.retain(|resource| !resource.starts_with(RECAP_PREFIX));
        self.resources.push(recap.to_resource());
        self.expiration_time = Some(siwe::from_timestamp("expirationTime", grant.expiry())?);
        self.not_before = grant
            .not_before()
            .map(|nbf| siwe::from_timestamp("notBefore", nbf))
            .transpose()?;
        Ok(self)
    }

    /// The ReCap object this message carries, read from its last
    /// `urn:recap:` resource.
    ///
    /// # Errors
    ///
    /// Returns [`SiweError::MissingRecap`] or [`SiweError::Recap`].
    pub fn recap(&self) -> Result<Recap, SiweError> {
        let resource = self
            .resources
            .iter()
            .rev()
            .find(|resource| resource.starts_with(RECAP_PREFIX))
            .ok_or(SiweError::MissingRecap)?;
        Recap::from_resource(resource)
    }

    /// The grant this message authorizes on `space`.
    ///
    /// The statement must end with the ReCap statement, so what the wallet
    /// displayed and what the resource encodes cannot diverge.
    ///
    /// # Errors
    ///
    /// Returns a [`SiweError`] if the message does not encode a valid grant.
    pub fn grant(&self, space: &SpaceId) -> Result<CapabilityGrant, SiweError> {
        let recap = self.recap()?;
        if !self
            .statement
            .as_deref()
            .is_some_and(|statement| statement.ends_with(&recap.statement()))
        {
            return Err(SiweError::StatementMismatch);
        }
        let expiration = self
            .expiration_time
            .map(siwe::to_timestamp)
            .ok_or(SiweError::MissingExpiration)?;
        let window = TimeRange::new(self.not_before.map(siwe::to_not_before), expiration);
        recap.to_grant(space, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SiweConfig;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;
    use tinycloud_capability::Timestamp;

    const ADDRESS: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn space() -> SpaceId {
        format!("tinycloud:pkh:eip155:1:{ADDRESS}:default")
            .parse()
            .unwrap()
    }

    fn grant() -> CapabilityGrant {
        CapabilityGrant::new(
            "/photos".parse().unwrap(),
            ["kv/get".parse().unwrap(), "kv/list".parse().unwrap()],
            Timestamp::from_unix(1_704_070_800),
        )
        .unwrap()
    }

    fn message() -> SiweMessage {
        let config = SiweConfig {
            address: ADDRESS.into(),
            chain_id: 1,
            domain: "app.tinycloud.xyz".into(),
            nonce: Some("abcdefgh12345678".into()),
            issued_at: "2024-01-01T00:00:00Z".into(),
            statement: Some("Sign in to TinyCloud.".into()),
            ..SiweConfig::default()
        };
        let session = "did:key:z6MktwupdmLXVVqTzCw4i46r4uGyosGXRnR3XjN4Zq7oMMsw"
            .parse()
            .unwrap();
        SiweMessage::from_config(&config, &session).unwrap()
    }

    #[test]
    fn it_encodes_the_grant_as_json() -> TestResult {
        let recap = Recap::from_grant(&space(), &grant());
        let encoded = recap.to_resource();
        let json: Value = serde_json::from_slice(
            &URL_SAFE_NO_PAD.decode(encoded.trim_start_matches(RECAP_PREFIX))?,
        )?;
        let target = format!("{}/photos", space());
        assert_eq!(
            json["att"][target.as_str()],
            serde_json::json!({ "kv/get": [{}], "kv/list": [{}] })
        );
        assert_eq!(json["prf"], serde_json::json!([]));
        assert_eq!(Recap::from_resource(&encoded)?, recap);
        Ok(())
    }

    #[test]
    fn it_renders_a_readable_statement() {
        let recap = Recap::from_grant(&space(), &grant());
        assert_eq!(
            recap.statement(),
            format!(
                "{STATEMENT_PREFIX} (1) 'kv': 'get', 'list' for '{}/photos'.",
                space()
            )
        );
    }

    #[test]
    fn it_binds_a_grant_into_a_message() -> TestResult {
        let message = message().with_grant(&space(), &grant())?;
        let reparsed: SiweMessage = message.to_string().parse()?;

        assert_eq!(reparsed.grant(&space())?, grant());
        assert!(
            reparsed
                .statement
                .as_deref()
                .is_some_and(|s| s.starts_with("Sign in to TinyCloud. I further"))
        );
        Ok(())
    }

    #[test]
    fn it_rejects_a_statement_that_hides_the_capabilities() -> TestResult {
        let mut message = message().with_grant(&space(), &grant())?;
        message.statement = Some("Sign in to TinyCloud.".into());
        assert_eq!(message.grant(&space()), Err(SiweError::StatementMismatch));
        Ok(())
    }

    #[test]
    fn it_rejects_targets_in_another_space() -> TestResult {
        let message = message().with_grant(&space(), &grant())?;
        let other: SpaceId = format!("tinycloud:pkh:eip155:1:{ADDRESS}:other").parse()?;
        assert!(matches!(message.grant(&other), Err(SiweError::Recap(_))));
        Ok(())
    }

    #[test]
    fn it_rejects_caveats() {
        let mut recap = Recap::from_grant(&space(), &grant());
        for caveats in recap.att.values_mut().flat_map(BTreeMap::values_mut) {
            caveats[0].insert("maxSize".into(), Value::from(10));
        }
        let window = TimeRange::new(None, Timestamp::from_unix(10));
        assert!(matches!(
            recap.to_grant(&space(), window),
            Err(SiweError::Recap(_))
        ));
    }

    #[test]
    fn it_requires_a_recap_resource() {
        assert_eq!(message().recap(), Err(SiweError::MissingRecap));
    }
}

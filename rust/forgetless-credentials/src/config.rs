use serde::{Deserialize, Serialize};

use crate::webauthn::{AuthenticatorAttachment, Transport};

/// The relying party passkeys are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingParty {
    /// RP id, normally the registrable domain of the wallet origin. When
    /// `None` the browser uses the current origin's effective domain.
    pub id: Option<String>,

    /// Human readable RP name shown in the platform passkey prompt.
    pub name: String,
}

impl Default for RelyingParty {
    fn default() -> Self {
        Self {
            id: None,
            name: "Forgetless Wallet".to_string(),
        }
    }
}

impl RelyingParty {
    /// Create a relying party bound to an explicit RP id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Settings applied to every ceremony the manager starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyConfig {
    /// Relying party for both registration and assertion
    pub relying_party: RelyingParty,

    /// How long the platform may keep a prompt open, in milliseconds
    /// (default: 60000)
    pub timeout_ms: u32,

    /// Authenticator attachment requested at registration (default: platform)
    pub attachment: AuthenticatorAttachment,

    /// Transports advertised for the credential when signing
    /// (default: internal)
    pub transports: Vec<Transport>,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            relying_party: RelyingParty::default(),
            timeout_ms: 60_000,
            attachment: AuthenticatorAttachment::Platform,
            transports: vec![Transport::Internal],
        }
    }
}

impl CeremonyConfig {
    /// Set the relying party
    pub fn with_relying_party(mut self, relying_party: RelyingParty) -> Self {
        self.relying_party = relying_party;
        self
    }

    /// Set the ceremony timeout
    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the requested authenticator attachment
    pub fn with_attachment(mut self, attachment: AuthenticatorAttachment) -> Self {
        self.attachment = attachment;
        self
    }

    /// Replace the advertised transports
    pub fn with_transports(mut self, transports: Vec<Transport>) -> Self {
        self.transports = transports;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_defaults_to_a_platform_passkey() {
        let config = CeremonyConfig::default();
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.attachment, AuthenticatorAttachment::Platform);
        assert_eq!(config.transports, vec![Transport::Internal]);
        assert_eq!(config.relying_party.name, "Forgetless Wallet");
        assert_eq!(config.relying_party.id, None);
    }

    #[test]
    fn it_deserializes_from_json() -> Result<(), serde_json::Error> {
        let config: CeremonyConfig = serde_json::from_str(
            r#"{
                "relying_party": { "id": "wallet.example", "name": "Example" },
                "timeout_ms": 30000,
                "attachment": "cross-platform",
                "transports": ["internal", "hybrid"]
            }"#,
        )?;
        assert_eq!(
            config,
            CeremonyConfig::default()
                .with_relying_party(RelyingParty::new("wallet.example").with_name("Example"))
                .with_timeout(30_000)
                .with_attachment(AuthenticatorAttachment::CrossPlatform)
                .with_transports(vec![Transport::Internal, Transport::Hybrid])
        );
        Ok(())
    }
}

//! Device facts gathered when a session opens

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::netconf::{extract_element, CAPABILITY_BASE_1_1, CAPABILITY_CANDIDATE};

/// Hardware model prefixes of platforms with a security (flow) stack.
const SECURITY_PLATFORMS: &[&str] = &["srx", "vsrx", "vjunos-firewall", "cstsrx"];

/// Facts from `<get-system-information/>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInformation {
    /// Hardware model, lowercased (e.g. `srx300`, `mx960`)
    pub hardware_model: String,
    /// OS name (e.g. `junos`)
    pub os_name: String,
    /// OS version string
    pub os_version: String,
    /// Configured host name
    pub host_name: String,
}

impl SystemInformation {
    /// Parse the body of a `<get-system-information/>` reply.
    pub fn parse(xml: &str) -> Self {
        let field = |name: &str| extract_element(xml, name).unwrap_or_default();
        Self {
            hardware_model: field("hardware-model").to_lowercase(),
            os_name: field("os-name"),
            os_version: field("os-version"),
            host_name: field("host-name"),
        }
    }

    /// Whether this platform carries security policies, zones and IKE.
    pub fn is_security_platform(&self) -> bool {
        SECURITY_PLATFORMS
            .iter()
            .any(|prefix| self.hardware_model.starts_with(prefix))
    }

    /// Fail with [`Error::Incompatible`] unless `feature` can be configured here.
    pub fn require_security(&self, feature: &str) -> Result<()> {
        if self.is_security_platform() {
            Ok(())
        } else {
            Err(Error::Incompatible {
                feature: feature.to_string(),
                platform: self.hardware_model.clone(),
            })
        }
    }
}

/// Capabilities advertised in the server hello
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(Vec<String>);

impl Capabilities {
    /// Wrap a capability list
    pub fn new(capabilities: Vec<String>) -> Self {
        Self(capabilities)
    }

    /// Whether a capability URI (or a prefix of one, ignoring query strings) is present
    pub fn supports(&self, capability: &str) -> bool {
        self.0
            .iter()
            .any(|c| c.split('?').next().unwrap_or(c) == capability || c.starts_with(capability))
    }

    /// Candidate datastore support
    pub fn has_candidate(&self) -> bool {
        self.supports(CAPABILITY_CANDIDATE)
    }

    /// NETCONF 1.1 support
    pub fn has_base_1_1(&self) -> bool {
        self.supports(CAPABILITY_BASE_1_1)
    }

    /// All advertised capabilities
    pub fn all(&self) -> &[String] {
        &self.0
    }
}

//! Signer role vocabulary
//!
//! Documents author role strings in whatever casing their template used
//! ("TENANT", "tenant_witness", "Property Manager"). Administrative code
//! works in this canonical enum; the single mapping lives here so nothing
//! else resorts to ad hoc string comparison.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of parties who can sign a lease document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignerRole {
    #[default]
    Tenant,
    PropertyManager,
    TenantWitness,
    PropertyManagerWitness,
}

impl SignerRole {
    /// Canonical snake_case form used in tokens, signatures, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerRole::Tenant => "tenant",
            SignerRole::PropertyManager => "property_manager",
            SignerRole::TenantWitness => "tenant_witness",
            SignerRole::PropertyManagerWitness => "property_manager_witness",
        }
    }

    /// Human-readable label, used to default unlabeled placeholders.
    pub fn display_label(&self) -> &'static str {
        match self {
            SignerRole::Tenant => "Tenant",
            SignerRole::PropertyManager => "Property Manager",
            SignerRole::TenantWitness => "Tenant Witness",
            SignerRole::PropertyManagerWitness => "Property Manager Witness",
        }
    }

    pub fn is_witness(&self) -> bool {
        matches!(
            self,
            SignerRole::TenantWitness | SignerRole::PropertyManagerWitness
        )
    }

    /// Map any vocabulary variant onto the canonical role: case, spaces,
    /// underscores, and hyphens are ignored ("TENANT", "tenant_witness",
    /// "Tenant Witness", "tenantWitness" all parse).
    pub fn parse(raw: &str) -> Option<SignerRole> {
        let canonical: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match canonical.as_str() {
            "tenant" => Some(SignerRole::Tenant),
            "propertymanager" => Some(SignerRole::PropertyManager),
            "tenantwitness" => Some(SignerRole::TenantWitness),
            "propertymanagerwitness" => Some(SignerRole::PropertyManagerWitness),
            _ => None,
        }
    }

    /// True when the two vocabulary strings name the same canonical role.
    pub fn matches(&self, raw: &str) -> bool {
        SignerRole::parse(raw) == Some(*self)
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

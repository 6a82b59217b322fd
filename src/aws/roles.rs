//! Extraction of the federation role mapping from a parsed assertion.

use crate::error::{Error, Result};
use crate::saml::SamlAssertion;

/// Role attribute name used by ADFS-style identity claims.
pub const ADFS_ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Role attribute name used by AWS federation.
pub const AWS_ROLE_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/Role";

/// The role/principal ARN pair named by the assertion's role attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMapping {
    pub role_arn: String,
    pub principal_arn: String,
}

impl RoleMapping {
    /// Resolve the mapping from the first recognized role attribute.
    ///
    /// The attribute value must split on a single comma into exactly two
    /// non-empty components, taken positionally as (role, principal). A
    /// value without a comma collapses to one component and is the same
    /// failure as a missing attribute. No ARN syntax validation is done.
    pub fn from_assertion(assertion: &SamlAssertion) -> Result<Self> {
        let value = assertion
            .attributes
            .iter()
            .find(|attr| attr.name == ADFS_ROLE_CLAIM || attr.name == AWS_ROLE_ATTRIBUTE)
            .map(|attr| attr.value.as_str())
            .ok_or(Error::RoleNotFound)?;

        Self::from_attribute_value(value)
    }

    fn from_attribute_value(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(',').collect();
        match parts.as_slice() {
            [role, principal] if !role.is_empty() && !principal.is_empty() => Ok(Self {
                role_arn: (*role).to_string(),
                principal_arn: (*principal).to_string(),
            }),
            _ => Err(Error::RoleNotFound),
        }
    }
}

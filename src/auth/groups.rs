use crate::auth::AuthError;
use std::collections::BTreeSet;

/// Parse a `;`-separated list of LDAP distinguished names into group names.
///
/// Each entry contributes the value of its first `key=value` component, so
/// `"CN=A,OU=X;CN=B,OU=Y"` yields `{"A", "B"}`. Empty entries are ignored.
///
/// # Errors
/// Returns `AuthError::ServiceUnavailable` if any entry is malformed. A partial
/// group set would grant the wrong privileges, so nothing is returned.
pub fn parse_ldap_groups(member_of: Option<&str>) -> Result<BTreeSet<String>, AuthError> {
    let Some(member_of) = member_of else {
        return Ok(BTreeSet::new());
    };

    member_of
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let first = entry.split(',').next().unwrap_or_default();
            match first.split_once('=') {
                Some((_, value)) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(AuthError::ServiceUnavailable(format!(
                    "malformed group distinguished name: {entry}"
                ))),
            }
        })
        .collect()
}

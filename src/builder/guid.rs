//! Deterministic installer GUID derivation.

use uuid::Uuid;

/// Namespace for UUIDv5 GUID derivation.
///
/// Fixed so that rebuilding the same application identifier always yields
/// the same registry identity, across machines and tool versions.
const GUID_NAMESPACE: Uuid = uuid::uuid!("6ba7c2e1-9d14-4f68-8c2a-0f3b5d7a91e4");

/// Returns the installer GUID: the explicit one when configured, otherwise
/// a UUIDv5 derived from the application identifier.
pub fn installer_guid(app_id: &str, explicit: Option<&str>) -> String {
    match explicit {
        Some(guid) => guid.to_string(),
        None => Uuid::new_v5(&GUID_NAMESPACE, app_id.as_bytes())
            .to_string()
            .to_uppercase(),
    }
}

/// Returns the GUID with path-separator characters removed.
///
/// The uninstall registry key schema forbids separators; older installers
/// may have written their entry under this stripped form, so when it
/// differs from the GUID both keys must be emitted.
pub fn legacy_registry_guid(guid: &str) -> String {
    guid.chars().filter(|c| *c != '/' && *c != '\\').collect()
}

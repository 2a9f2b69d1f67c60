//! Host/firmware protocol compatibility
//!
//! The robot reports its firmware version in every `StatusData`. Each host
//! protocol version lists the firmware versions it can talk to.

use super::Glob;

/// Protocol version implemented by this crate
pub const PROTOCOL_VERSION: u32 = 2;

/// Host version → compatible firmware versions
const COMPATIBILITY: &[(u32, &[u32])] = &[(1, &[1]), (2, &[2])];

/// Firmware versions compatible with `host_version`
pub fn compatible_firmware_versions(host_version: u32) -> &'static [u32] {
    COMPATIBILITY
        .iter()
        .find(|(host, _)| *host == host_version)
        .map(|(_, firmware)| *firmware)
        .unwrap_or(&[])
}

/// Host versions that can talk to `firmware_version`
pub fn compatible_host_versions(firmware_version: u32) -> Vec<u32> {
    COMPATIBILITY
        .iter()
        .filter(|(_, firmware)| firmware.contains(&firmware_version))
        .map(|(host, _)| *host)
        .collect()
}

/// Whether this crate can talk to `firmware_version`
pub fn is_firmware_compatible(firmware_version: u32) -> bool {
    compatible_firmware_versions(PROTOCOL_VERSION).contains(&firmware_version)
}

/// Result of checking a reported firmware version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareCheck {
    /// Version the robot reported
    pub firmware_version: u32,
    /// Whether this host can talk to it
    pub compatible: bool,
    /// Firmware versions this host can talk to
    pub compatible_firmware: &'static [u32],
    /// Host versions that can talk to the reported firmware
    pub compatible_hosts: Vec<u32>,
}

/// Check `firmware_version` against [`PROTOCOL_VERSION`]
pub fn check_firmware(firmware_version: u32) -> FirmwareCheck {
    FirmwareCheck {
        firmware_version,
        compatible: is_firmware_compatible(firmware_version),
        compatible_firmware: compatible_firmware_versions(PROTOCOL_VERSION),
        compatible_hosts: compatible_host_versions(firmware_version),
    }
}

/// Checks the firmware version once per connection, on the first `StatusData`
#[derive(Debug, Default)]
pub struct FirmwareVerifier {
    verified: bool,
}

impl FirmwareVerifier {
    /// Not yet verified
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a version has been checked since the last reset
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Forget the check; call on every new connection
    pub fn reset(&mut self) {
        self.verified = false;
    }

    /// Returns the check for the first status message only
    pub fn observe(&mut self, glob: &Glob) -> Option<FirmwareCheck> {
        match glob {
            Glob::StatusData(status) if !self.verified => {
                self.verified = true;
                Some(check_firmware(status.firmware_version))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_version_in_table() {
        assert!(!compatible_firmware_versions(PROTOCOL_VERSION).is_empty());
    }

    #[test]
    fn test_firmware_compatibility() {
        assert!(is_firmware_compatible(2));
        assert!(!is_firmware_compatible(1));
        assert!(!is_firmware_compatible(99));
    }

    #[test]
    fn test_host_versions_for_firmware() {
        assert_eq!(compatible_host_versions(1), vec![1]);
        assert!(compatible_host_versions(42).is_empty());
    }

    #[test]
    fn test_unknown_host_version() {
        assert!(compatible_firmware_versions(7).is_empty());
    }

    #[test]
    fn test_check_lists_both_directions() {
        let check = check_firmware(1);
        assert!(!check.compatible);
        assert_eq!(check.compatible_firmware, &[2]);
        assert_eq!(check.compatible_hosts, vec![1]);
        assert!(check_firmware(PROTOCOL_VERSION).compatible);
    }

    #[test]
    fn test_verifier_checks_once_per_connection() {
        use crate::protocol::{Modes, StatusData};

        let status = Glob::StatusData(StatusData {
            firmware_version: 1,
            ..StatusData::default()
        });
        let mut verifier = FirmwareVerifier::new();
        assert!(verifier.observe(&Glob::Modes(Modes::default())).is_none());
        assert!(!verifier.is_verified());

        let check = verifier.observe(&status).unwrap();
        assert_eq!(check.firmware_version, 1);
        assert!(verifier.observe(&status).is_none());

        verifier.reset();
        assert!(verifier.observe(&status).is_some());
    }
}

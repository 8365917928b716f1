//! Host identity for activation binding.
//!
//! Engines derive a stable hardware ID from machine identifiers and send it,
//! together with a few descriptive fields, when they activate. The server
//! never inspects how the ID was derived; it only binds to the string.

use crate::model::ActivationRequest;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;
use tessera_types::LicenseId;

const UNKNOWN: &str = "unknown";

/// Descriptive information about the machine an engine runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Hostname.
    pub hostname: String,
    /// `os/arch`, e.g. `linux/x86_64`.
    pub platform: String,
    /// Operating system version.
    pub os_version: String,
}

impl HostInfo {
    /// Collects information about the current machine.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            hostname: platform::hostname(),
            platform: format!("{}/{}", env::consts::OS, env::consts::ARCH),
            os_version: platform::os_version().unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    /// Builds an activation request for this machine.
    #[must_use]
    pub fn activation_request(
        &self,
        license_id: LicenseId,
        hardware_id: &HardwareId,
        engine_version: &str,
    ) -> ActivationRequest {
        ActivationRequest {
            license_id,
            hardware_id: hardware_id.as_str().to_string(),
            hostname: self.hostname.clone(),
            platform: self.platform.clone(),
            version: engine_version.to_string(),
            ip_address: String::new(),
        }
    }
}

/// A stable identifier for the current machine.
///
/// Survives reboots; changes when the OS is reinstalled or the machine ID
/// is regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareId(String);

impl HardwareId {
    /// Derives the hardware ID of the current machine.
    #[must_use]
    pub fn current() -> Self {
        let mut components = vec![
            env::consts::OS.to_string(),
            env::consts::ARCH.to_string(),
            platform::hostname(),
        ];
        components.extend(platform::machine_id());
        Self::from_components(&components)
    }

    /// Derives a hardware ID from identifier components.
    #[must_use]
    pub fn from_components<S: AsRef<str>>(components: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for (i, part) in components.iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            hasher.update(part.as_ref().as_bytes());
        }
        let hash = hasher.finalize();
        Self(URL_SAFE_NO_PAD.encode(&hash[..16]))
    }

    /// Returns the ID string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Best-effort lookups on the running machine. A lookup that fails yields
/// `None` and the caller substitutes a placeholder.
mod platform {
    use super::UNKNOWN;

    pub(super) fn hostname() -> String {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    #[cfg(target_os = "linux")]
    pub(super) fn os_version() -> Option<String> {
        let release = std::fs::read_to_string("/etc/os-release").ok()?;
        release
            .lines()
            .find_map(|line| line.strip_prefix("VERSION_ID="))
            .map(|value| value.trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
    }

    #[cfg(target_os = "macos")]
    pub(super) fn os_version() -> Option<String> {
        command_output("sw_vers", &["-productVersion"]).map(|out| out.trim().to_string())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    pub(super) fn os_version() -> Option<String> {
        None
    }

    /// Stable per-install machine identifier.
    #[cfg(target_os = "linux")]
    pub(super) fn machine_id() -> Option<String> {
        ["/etc/machine-id", "/var/lib/dbus/machine-id"]
            .iter()
            .filter_map(|path| std::fs::read_to_string(path).ok())
            .map(|id| id.trim().to_string())
            .find(|id| !id.is_empty())
    }

    #[cfg(target_os = "macos")]
    pub(super) fn machine_id() -> Option<String> {
        let out = command_output("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"])?;
        let line = out.lines().find(|line| line.contains("IOPlatformUUID"))?;
        line.split('"').nth(3).map(str::to_string)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    pub(super) fn machine_id() -> Option<String> {
        None
    }

    #[cfg(target_os = "macos")]
    fn command_output(program: &str, args: &[&str]) -> Option<String> {
        let output = std::process::Command::new(program).args(args).output().ok()?;
        String::from_utf8(output.stdout).ok()
    }
}

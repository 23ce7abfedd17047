//! Device inventory: CSV rows → `DeviceDescriptor`s.
//!
//! The inventory has a header row with `address` (or `ip`), `username`,
//! `password`, `platform` and `role`. A leading UTF-8 BOM (as written by
//! spreadsheet exports) is accepted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Device platform as named in the inventory (netmiko-style device types).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    HpComware,
    Huawei,
    RuijieOs,
    /// Unrecognised name, kept verbatim so the profile lookup can reject it per device.
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::HpComware => "hp_comware",
            Platform::Huawei => "huawei",
            Platform::RuijieOs => "ruijie_os",
            Platform::Other(name) => name,
        }
    }
}

impl From<String> for Platform {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hp_comware" => Platform::HpComware,
            "huawei" => Platform::Huawei,
            "ruijie_os" => Platform::RuijieOs,
            _ => Platform::Other(s.trim().to_string()),
        }
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        Platform::from(s.to_string())
    }
}

impl From<Platform> for String {
    fn from(p: Platform) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device to back up. Immutable for the duration of a run.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(alias = "ip")]
    pub address: String,
    pub username: String,
    pub password: String,
    pub platform: Platform,
    pub role: String,
}

impl DeviceDescriptor {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        platform: impl Into<Platform>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
            platform: platform.into(),
            role: role.into(),
        }
    }

    /// Stable `{platform}-{role}-{address}` stem shared by the snapshot and transcript names.
    pub fn stem(&self) -> String {
        format!("{}-{}-{}", self.platform, self.role, self.address)
    }
}

impl fmt::Debug for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("platform", &self.platform)
            .field("role", &self.role)
            .finish()
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.address, self.platform, self.role)
    }
}

/// Load the inventory at `path`.
pub fn load(path: &Path) -> Result<Vec<DeviceDescriptor>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("read inventory {}", path.display()))?;
    parse(&data).with_context(|| format!("parse inventory {}", path.display()))
}

/// Parse inventory CSV text. Rows with an empty required field are rejected.
pub fn parse(data: &str) -> Result<Vec<DeviceDescriptor>> {
    let data = data.strip_prefix('\u{feff}').unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut devices = Vec::new();
    for (idx, row) in reader.deserialize::<DeviceDescriptor>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let device = row.with_context(|| format!("inventory line {line}"))?;
        let empty = [
            ("address", device.address.as_str()),
            ("username", device.username.as_str()),
            ("platform", device.platform.as_str()),
            ("role", device.role.as_str()),
        ]
        .into_iter()
        .find(|(_, v)| v.is_empty());
        if let Some((field, _)) = empty {
            anyhow::bail!("inventory line {line}: empty `{field}`");
        }
        devices.push(device);
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_ip_header_and_bom() {
        let csv = "\u{feff}ip,username,password,platform,role\n\
                   10.0.0.1,admin,secret,huawei,core\n\
                   10.0.0.2,admin,secret,ruijie_os,access\n";
        let devices = parse(csv).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "10.0.0.1");
        assert_eq!(devices[0].platform, Platform::Huawei);
        assert_eq!(devices[1].platform, Platform::RuijieOs);
        assert_eq!(devices[1].role, "access");
    }

    #[test]
    fn parses_address_header_and_unknown_platform() {
        let csv = "address,username,password,platform,role\n\
                   192.0.2.7, ops , pw ,cisco_ios,edge\n";
        let devices = parse(csv).unwrap();
        assert_eq!(devices[0].username, "ops");
        assert_eq!(devices[0].platform, Platform::Other("cisco_ios".into()));
    }

    #[test]
    fn rejects_empty_address() {
        let csv = "ip,username,password,platform,role\n,admin,pw,huawei,core\n";
        let err = parse(csv).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn rejects_missing_column() {
        let csv = "ip,username,password,platform\n10.0.0.1,admin,pw,huawei\n";
        assert!(parse(csv).is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let d = DeviceDescriptor::new("10.0.0.1", "admin", "hunter2", "huawei", "core");
        let dbg = format!("{d:?}");
        assert!(!dbg.contains("hunter2"));
        assert_eq!(d.stem(), "huawei-core-10.0.0.1");
    }
}

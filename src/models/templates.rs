use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raw, loosely typed template record as handed over by a loader.
/// Numbers may arrive as text and are coerced by the validator.
pub type RawTemplate = serde_json::Map<String, serde_json::Value>;

/// Emulation backend a template targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Iol,
    Dynamips,
    Qemu,
}

impl Backend {
    pub const ALL: &'static [Backend] = &[Backend::Iol, Backend::Dynamips, Backend::Qemu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Iol => "iol",
            Backend::Dynamips => "dynamips",
            Backend::Qemu => "qemu",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a backend name is not one of the known backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backend: {0}")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    /// Case-sensitive; only surrounding whitespace is tolerated
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Backend::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == name)
            .ok_or_else(|| UnknownBackend(name.to_string()))
    }
}

/// DeviceTemplate is a validated hardware profile for one emulated device kind.
///
/// Fields are private so a template held by the registry can never be edited
/// in place; the `with_*` methods return a modified copy instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceTemplate {
    #[serde(rename = "type")]
    type_id: Backend,
    #[serde(rename = "name")]
    display_name_prefix: String,
    #[serde(rename = "icon")]
    icon_ref: String,
    #[serde(rename = "nvram")]
    nvram_kib: u64,
    #[serde(rename = "ram")]
    ram_mib: u64,
    #[serde(rename = "ethernet")]
    ethernet_port_count: u64,
    #[serde(rename = "serial")]
    serial_port_count: u64,
}

impl DeviceTemplate {
    /// Assemble a template from already-validated parts.
    /// Only the validator calls this; everything else goes through `validate`.
    pub(crate) fn from_parts(
        type_id: Backend,
        display_name_prefix: String,
        icon_ref: String,
        nvram_kib: u64,
        ram_mib: u64,
        ethernet_port_count: u64,
        serial_port_count: u64,
    ) -> Self {
        Self {
            type_id,
            display_name_prefix,
            icon_ref,
            nvram_kib,
            ram_mib,
            ethernet_port_count,
            serial_port_count,
        }
    }

    pub fn type_id(&self) -> Backend {
        self.type_id
    }

    pub fn display_name_prefix(&self) -> &str {
        &self.display_name_prefix
    }

    pub fn icon_ref(&self) -> &str {
        &self.icon_ref
    }

    pub fn nvram_kib(&self) -> u64 {
        self.nvram_kib
    }

    pub fn ram_mib(&self) -> u64 {
        self.ram_mib
    }

    pub fn ethernet_port_count(&self) -> u64 {
        self.ethernet_port_count
    }

    pub fn serial_port_count(&self) -> u64 {
        self.serial_port_count
    }

    pub fn with_display_name_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            display_name_prefix: prefix.into(),
            ..self.clone()
        }
    }

    pub fn with_icon_ref(&self, icon: impl Into<String>) -> Self {
        Self {
            icon_ref: icon.into(),
            ..self.clone()
        }
    }

    pub fn with_ports(&self, ethernet: u64, serial: u64) -> Self {
        Self {
            ethernet_port_count: ethernet,
            serial_port_count: serial,
            ..self.clone()
        }
    }

    /// Memory must stay positive; a zero value yields `None`.
    pub fn with_memory(&self, nvram_kib: u64, ram_mib: u64) -> Option<Self> {
        if nvram_kib == 0 || ram_mib == 0 {
            return None;
        }
        Some(Self {
            nvram_kib,
            ram_mib,
            ..self.clone()
        })
    }
}

/// TemplateEntry pairs a template with its registry identifier for API listings
#[derive(Debug, Clone, Serialize)]
pub struct TemplateEntry {
    pub id: String,
    #[serde(flatten)]
    pub template: DeviceTemplate,
}

//! Handler variants and the cloud services they serve
//!
//! Both services ship the same handler in two ABI builds. The build is
//! selected purely by filename: the 102e build carries a `_102e` suffix
//! before the `.68k` extension.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Directory prefix used inside the mountlist to reference handler binaries
pub const HANDLER_DIR: &str = "Devs:Cloud/";

/// Key that introduces a handler declaration in a mountlist entry
pub const HANDLER_KEY: &str = "Handler = ";

/// Extension shared by every handler build
const HANDLER_EXT: &str = ".68k";

/// Which ABI build of the handlers the mountlist points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Variant {
    /// Plain 68k build (68020 class CPUs)
    #[default]
    #[serde(rename = "68k")]
    M68k,
    /// 102e build (68060/68080 class CPUs)
    #[serde(rename = "102e")]
    V102e,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::M68k, Variant::V102e];

    /// Filename suffix inserted between the handler stem and the extension
    pub fn suffix(self) -> &'static str {
        match self {
            Variant::M68k => "",
            Variant::V102e => "_102e",
        }
    }

    /// Short name used on the command line and in config
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::M68k => "68k",
            Variant::V102e => "102e",
        }
    }

    /// CPU family label shown to operators
    pub fn cpu_label(self) -> &'static str {
        match self {
            Variant::M68k => "68020",
            Variant::V102e => "68060/80",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "68k" | "68020" | "m68k" => Ok(Variant::M68k),
            "102e" | "68060" | "68080" | "v102e" => Ok(Variant::V102e),
            other => Err(format!(
                "unknown variant '{}' (expected '68k' or '102e')",
                other
            )),
        }
    }
}

/// A cloud storage service with its own handler, volume and credential files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    Dropbox,
    GoogleDrive,
}

impl Service {
    pub const ALL: [Service; 2] = [Service::Dropbox, Service::GoogleDrive];

    /// Handler filename without variant suffix or extension
    pub fn handler_stem(self) -> &'static str {
        match self {
            Service::Dropbox => "dropbox-handler",
            Service::GoogleDrive => "google-drive-handler",
        }
    }

    /// Full handler filename for the given build
    pub fn handler_filename(self, variant: Variant) -> String {
        format!("{}{}{}", self.handler_stem(), variant.suffix(), HANDLER_EXT)
    }

    /// Substring identifying this service's handler declaration
    pub fn selector_pattern(self) -> String {
        format!("{}{}{}", HANDLER_KEY, HANDLER_DIR, self.handler_stem())
    }

    /// Substring identifying a declaration that already points at `variant`
    pub fn variant_pattern(self, variant: Variant) -> String {
        format!("{}{}", self.selector_pattern(), variant.suffix())
    }

    /// Volume name the handler mounts as
    pub fn volume(self) -> &'static str {
        match self {
            Service::Dropbox => "DBOX:",
            Service::GoogleDrive => "GOOGLE:",
        }
    }

    /// File holding the client code entered by the operator
    pub fn client_code_file(self) -> &'static str {
        match self {
            Service::Dropbox => "dropbox_client_code",
            Service::GoogleDrive => "google_drive_client_code",
        }
    }

    /// Files the handler writes after authorising; removed on purge
    pub fn session_token_files(self) -> &'static [&'static str] {
        match self {
            Service::Dropbox => &["dropbox_access_token"],
            Service::GoogleDrive => &["google_drive_access_token", "google_drive_refresh_token"],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Service::Dropbox => "Dropbox",
            Service::GoogleDrive => "Google Drive",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dropbox" | "dbox" | "dbox:" => Ok(Service::Dropbox),
            "google-drive" | "googledrive" | "google" | "gdrive" | "google:" => {
                Ok(Service::GoogleDrive)
            }
            other => Err(format!(
                "unknown service '{}' (expected 'dropbox' or 'google-drive')",
                other
            )),
        }
    }
}

//! Presence probes for optional files in the cloud directory
//!
//! The panel greys out a service when neither handler build is installed and
//! shows whether a registration keyfile is present. Probes never prompt; with
//! `Interaction::Suppressed` they also never fail, an unreadable path simply
//! counts as absent.

use crate::variant::{Service, Variant};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Whether probe failures may be surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interaction {
    /// Every failure reads as "absent"
    #[default]
    Suppressed,
    /// Failures other than "not found" are returned as errors
    Allowed,
}

fn path_present(path: &Path, interaction: Interaction) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => match interaction {
            Interaction::Suppressed => {
                debug!(path = %path.display(), error = %e, "Probe failed, treating as absent");
                Ok(false)
            }
            Interaction::Allowed => Err(e),
        },
    }
}

/// Handler builds installed for one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerAvailability {
    pub service: Service,
    pub installed: Vec<Variant>,
}

impl HandlerAvailability {
    /// A service is usable when either build is installed
    pub fn is_available(&self) -> bool {
        !self.installed.is_empty()
    }

    pub fn has(&self, variant: Variant) -> bool {
        self.installed.contains(&variant)
    }
}

pub fn handler_availability(
    cloud_dir: &Path,
    service: Service,
    interaction: Interaction,
) -> io::Result<HandlerAvailability> {
    let mut installed = Vec::new();
    for variant in Variant::ALL {
        if path_present(&cloud_dir.join(service.handler_filename(variant)), interaction)? {
            installed.push(variant);
        }
    }
    Ok(HandlerAvailability { service, installed })
}

fn is_keyfile_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.contains("keyfile") || name.ends_with(".key")
}

/// Whether the cloud directory holds a registration keyfile
///
/// Any regular file whose name contains "keyfile" or ends in ".key" counts,
/// case-insensitively.
pub fn keyfile_present(cloud_dir: &Path, interaction: Interaction) -> io::Result<bool> {
    let entries = match fs::read_dir(cloud_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return match interaction {
                Interaction::Suppressed => {
                    debug!(dir = %cloud_dir.display(), error = %e, "Cannot list cloud directory");
                    Ok(false)
                }
                Interaction::Allowed => Err(e),
            };
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => match interaction {
                Interaction::Suppressed => continue,
                Interaction::Allowed => return Err(e),
            },
        };
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_keyfile_name(&entry.file_name().to_string_lossy()) {
            return Ok(true);
        }
    }

    Ok(false)
}

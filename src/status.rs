//! Combined report of what the configuration panel shows

use crate::detect::detect_variant;
use crate::probe::{handler_availability, keyfile_present, HandlerAvailability, Interaction};
use crate::token::{TokenError, TokenStore};
use crate::variant::{Service, Variant};
use colored::*;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub service: Service,
    pub volume: &'static str,
    pub handlers: HandlerAvailability,
    pub client_code_stored: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub mountlist: PathBuf,
    pub mountlist_present: bool,
    pub variant: Variant,
    pub keyfile: bool,
    pub services: Vec<ServiceStatus>,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("cannot probe {}: {source}", path.display())]
    Probe { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl StatusReport {
    pub fn gather(
        cloud_dir: &Path,
        mountlist: &Path,
        interaction: Interaction,
    ) -> Result<Self, StatusError> {
        let probe_err = |source| StatusError::Probe {
            path: cloud_dir.to_path_buf(),
            source,
        };
        let store = TokenStore::new(cloud_dir);

        let mut services = Vec::with_capacity(Service::ALL.len());
        for service in Service::ALL {
            let handlers = handler_availability(cloud_dir, service, interaction).map_err(probe_err)?;
            services.push(ServiceStatus {
                service,
                volume: service.volume(),
                handlers,
                client_code_stored: store.load_client_code(service)?.is_some(),
            });
        }

        Ok(Self {
            mountlist: mountlist.to_path_buf(),
            mountlist_present: mountlist.is_file(),
            variant: detect_variant(mountlist),
            keyfile: keyfile_present(cloud_dir, interaction).map_err(probe_err)?,
            services,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn format_text(&self, use_color: bool) -> String {
        let yes_no = |flag: bool| -> String {
            match (flag, use_color) {
                (true, true) => "yes".green().to_string(),
                (false, true) => "no".red().to_string(),
                (true, false) => "yes".to_string(),
                (false, false) => "no".to_string(),
            }
        };

        let mut out = String::new();
        let variant = format!("{} ({})", self.variant, self.variant.cpu_label());
        if use_color {
            out.push_str(&format!("{} {}\n", "Variant:".bold(), variant.cyan().bold()));
        } else {
            out.push_str(&format!("Variant: {}\n", variant));
        }
        out.push_str(&format!(
            "Mountlist: {}{}\n",
            self.mountlist.display(),
            if self.mountlist_present { "" } else { " (missing)" }
        ));
        out.push_str(&format!("Keyfile: {}\n", yes_no(self.keyfile)));

        for status in &self.services {
            let installed = if status.handlers.is_available() {
                status
                    .handlers
                    .installed
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                "none".to_string()
            };
            out.push_str(&format!(
                "\n{} ({})\n  Handlers: {}\n  Client code: {}\n",
                status.service,
                status.volume,
                installed,
                yes_no(status.client_code_stored)
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn cloud_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("cloud.mountlist"),
            "GOOGLE:\n    Handler = Devs:Cloud/google-drive-handler_102e.68k\n#\n",
        )
        .unwrap();
        fs::write(dir.path().join("google-drive-handler_102e.68k"), b"\0").unwrap();
        fs::write(dir.path().join("dropbox_client_code"), "abc\n").unwrap();
        dir
    }

    #[test]
    fn test_gather() {
        let dir = cloud_dir();
        let report = StatusReport::gather(
            dir.path(),
            &dir.path().join("cloud.mountlist"),
            Interaction::Suppressed,
        )
        .unwrap();

        assert!(report.mountlist_present);
        assert_eq!(report.variant, Variant::V102e);
        assert!(!report.keyfile);
        assert!(!report.services[0].handlers.is_available());
        assert!(report.services[0].client_code_stored);
        assert!(report.services[1].handlers.has(Variant::V102e));
        assert!(!report.services[1].client_code_stored);
    }

    #[test]
    fn test_format_text_plain() {
        let dir = cloud_dir();
        let report = StatusReport::gather(
            dir.path(),
            &dir.path().join("cloud.mountlist"),
            Interaction::Suppressed,
        )
        .unwrap();
        let text = report.format_text(false);
        assert!(text.starts_with("Variant: 102e (68060/80)\n"));
        assert!(text.contains("Keyfile: no"));
        assert!(text.contains("Dropbox (DBOX:)\n  Handlers: none\n  Client code: yes"));
        assert!(text.contains("Google Drive (GOOGLE:)\n  Handlers: 102e\n  Client code: no"));
    }

    #[test]
    fn test_json_field_names() {
        let dir = TempDir::new().unwrap();
        let report = StatusReport::gather(
            dir.path(),
            &dir.path().join("cloud.mountlist"),
            Interaction::Suppressed,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["variant"], "68k");
        assert_eq!(json["mountlist_present"], false);
        assert_eq!(json["services"][1]["service"], "google-drive");
        assert_eq!(json["services"][1]["volume"], "GOOGLE:");
    }
}

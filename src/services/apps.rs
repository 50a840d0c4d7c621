use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use log::{debug, info};

use super::ApplicationDirectory;
use crate::models::InstalledApp;

/// Discovers and launches applications through the host's own launcher.
pub struct SystemApplications {
    search_dirs: Vec<PathBuf>,
}

impl SystemApplications {
    pub fn new() -> Self {
        Self {
            search_dirs: default_search_dirs(),
        }
    }

    pub fn with_search_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }
}

impl Default for SystemApplications {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
fn default_search_dirs() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/Applications"),
        PathBuf::from("/System/Applications"),
    ];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join("Applications"));
    }
    paths
}

#[cfg(not(target_os = "macos"))]
fn default_search_dirs() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/usr/share/applications"),
        PathBuf::from("/usr/local/share/applications"),
    ];
    if let Some(data) = dirs::data_dir() {
        paths.push(data.join("applications"));
    }
    paths
}

/// Reads one application entry; `None` for anything that isn't a launchable app.
fn read_entry(path: &Path) -> Option<InstalledApp> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("app") => read_app_bundle(path),
        Some("desktop") => read_desktop_entry(path),
        _ => None,
    }
}

fn read_app_bundle(path: &Path) -> Option<InstalledApp> {
    let info = path.join("Contents/Info.plist");
    let value = match plist::Value::from_file(&info) {
        Ok(value) => value,
        Err(err) => {
            debug!("Skipping {}: {err}", info.display());
            return None;
        }
    };
    let dict = value.as_dictionary()?;
    let text = |key: &str| {
        dict.get(key)
            .and_then(plist::Value::as_string)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    Some(InstalledApp {
        bundle_id: text("CFBundleIdentifier")?,
        name: text("CFBundleName").or_else(|| text("CFBundleDisplayName"))?,
        path: path.to_path_buf(),
    })
}

fn read_desktop_entry(path: &Path) -> Option<InstalledApp> {
    let contents = fs::read_to_string(path).ok()?;
    let mut in_entry = false;
    let mut name = None;
    for line in contents.lines().map(str::trim) {
        if line.starts_with('[') {
            in_entry = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry {
            continue;
        }
        match line.split_once('=') {
            Some(("Name", value)) if name.is_none() => name = Some(value.trim().to_string()),
            Some(("NoDisplay", "true")) | Some(("Hidden", "true")) => return None,
            Some(("Type", kind)) if kind != "Application" => return None,
            _ => {}
        }
    }
    Some(InstalledApp {
        name: name?,
        bundle_id: path.file_stem()?.to_string_lossy().into_owned(),
        path: path.to_path_buf(),
    })
}

/// Sorts by name and keeps the first entry for each bundle id.
fn sorted_unique(mut apps: Vec<InstalledApp>) -> Vec<InstalledApp> {
    apps.sort_by(|a, b| a.name.cmp(&b.name));
    let mut seen = HashSet::new();
    apps.retain(|app| seen.insert(app.bundle_id.clone()));
    apps
}

pub(super) fn run_launcher(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {program}"))?;
    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl ApplicationDirectory for SystemApplications {
    fn list_applications(&self) -> Result<Vec<InstalledApp>> {
        let mut apps = Vec::new();
        for dir in &self.search_dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                debug!("Skipping missing application directory {}", dir.display());
                continue;
            };
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                if let Some(app) = read_entry(&entry.path()) {
                    apps.push(app);
                }
            }
        }
        Ok(sorted_unique(apps))
    }

    fn open(&self, bundle_id: &str) -> Result<()> {
        if cfg!(target_os = "macos") {
            run_launcher("open", &["-b", bundle_id])?;
        } else {
            run_launcher("gtk-launch", &[bundle_id])?;
        }
        info!("Opened application {}", bundle_id);
        Ok(())
    }

    fn activate(&self, bundle_id: &str) -> Result<()> {
        if cfg!(target_os = "macos") {
            let running = run_launcher(
                "osascript",
                &["-e", &format!("application id \"{bundle_id}\" is running")],
            )?;
            if running == "true" {
                run_launcher(
                    "osascript",
                    &["-e", &format!("tell application id \"{bundle_id}\" to activate")],
                )?;
                return Ok(());
            }
        }
        self.open(bundle_id)
    }
}

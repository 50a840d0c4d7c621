use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use log::{info, warn};

use super::DesktopOrganizer;

const CLEARED_PREFIX: &str = ".Desktop_Cleared_";

/// Clears a desktop by moving its visible entries into a hidden sibling folder.
pub struct FsDesktopOrganizer {
    desktop_dir: PathBuf,
}

impl FsDesktopOrganizer {
    pub fn new(desktop_dir: impl Into<PathBuf>) -> Self {
        Self {
            desktop_dir: desktop_dir.into(),
        }
    }

    pub fn for_current_user() -> Result<Self> {
        dirs::desktop_dir()
            .map(Self::new)
            .ok_or_else(|| anyhow!("could not locate the desktop directory"))
    }

    fn visible_entries(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut items = Vec::new();
        let entries =
            fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            items.push(entry.path());
        }
        items.sort();
        Ok(items)
    }

    fn unused_folder_name(&self) -> String {
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ");
        let base = format!("{CLEARED_PREFIX}{stamp}");
        let mut candidate = base.clone();
        let mut n = 1;
        while self.desktop_dir.join(&candidate).exists() {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        candidate
    }

    /// Moves every visible item into a fresh hidden folder using `move_item`.
    ///
    /// If the very first move fails the empty folder is removed again. Later
    /// failures leave the moved items in place and name the folder in the error.
    fn clear_with<F>(&self, mut move_item: F) -> Result<String>
    where
        F: FnMut(&Path, &Path) -> io::Result<()>,
    {
        let items = Self::visible_entries(&self.desktop_dir)?;
        let folder = self.unused_folder_name();
        let hidden = self.desktop_dir.join(&folder);
        fs::create_dir(&hidden)
            .with_context(|| format!("failed to create {}", hidden.display()))?;

        for (moved, item) in items.iter().enumerate() {
            let Some(name) = item.file_name() else { continue };
            let Err(err) = move_item(item, &hidden.join(name)) else {
                continue;
            };
            let err =
                anyhow::Error::new(err).context(format!("failed to move {}", item.display()));
            if moved == 0 {
                if let Err(cleanup) = fs::remove_dir(&hidden) {
                    warn!("Could not remove empty {}: {cleanup}", hidden.display());
                }
                return Err(err);
            }
            return Err(err.context(format!(
                "{moved} desktop items are in {folder}; restore {folder} to bring them back"
            )));
        }

        info!("Moved {} desktop items into {}", items.len(), folder);
        Ok(folder)
    }
}

impl DesktopOrganizer for FsDesktopOrganizer {
    fn clear(&self) -> Result<String> {
        self.clear_with(|from, to| fs::rename(from, to))
    }

    fn restore(&self, folder: &str) -> Result<()> {
        if !folder.starts_with(CLEARED_PREFIX) || folder.contains(['/', '\\']) {
            bail!("{folder} is not a cleared desktop folder");
        }
        let hidden = self.desktop_dir.join(folder);

        let mut skipped = 0;
        let entries =
            fs::read_dir(&hidden).with_context(|| format!("failed to read {}", hidden.display()))?;
        for entry in entries {
            let entry = entry?;
            let destination = self.desktop_dir.join(entry.file_name());
            if destination.exists() {
                warn!(
                    "Not restoring {}: {} already exists",
                    entry.path().display(),
                    destination.display()
                );
                skipped += 1;
                continue;
            }
            fs::rename(entry.path(), &destination)
                .with_context(|| format!("failed to restore {}", destination.display()))?;
        }

        if skipped > 0 {
            bail!(
                "{skipped} items left in {folder} because the desktop already has entries \
                 with the same name"
            );
        }

        fs::remove_dir(&hidden)
            .with_context(|| format!("failed to remove {}", hidden.display()))?;
        info!("Restored desktop from {}", folder);
        Ok(())
    }

    fn list_items(&self) -> Result<Vec<PathBuf>> {
        Self::visible_entries(&self.desktop_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn populate(dir: &Path) {
        fs::write(dir.join("notes.txt"), "todo").unwrap();
        fs::write(dir.join("screenshot.png"), [0u8; 4]).unwrap();
        fs::create_dir(dir.join("Projects")).unwrap();
        fs::write(dir.join(".DS_Store"), "").unwrap();
    }

    #[test]
    fn clear_hides_visible_items_only() {
        let dir = tempdir().unwrap();
        populate(dir.path());
        let organizer = FsDesktopOrganizer::new(dir.path());

        let folder = organizer.clear().unwrap();
        assert!(folder.starts_with(CLEARED_PREFIX));
        assert!(organizer.list_items().unwrap().is_empty());
        assert!(dir.path().join(".DS_Store").exists());

        let hidden = dir.path().join(&folder);
        assert!(hidden.join("notes.txt").exists());
        assert!(hidden.join("Projects").is_dir());
    }

    #[test]
    fn restore_puts_everything_back() {
        let dir = tempdir().unwrap();
        populate(dir.path());
        let organizer = FsDesktopOrganizer::new(dir.path());
        let before = organizer.list_items().unwrap();

        let folder = organizer.clear().unwrap();
        organizer.restore(&folder).unwrap();

        assert_eq!(organizer.list_items().unwrap(), before);
        assert!(!dir.path().join(&folder).exists());
    }

    #[test]
    fn clearing_twice_uses_distinct_folders() {
        let dir = tempdir().unwrap();
        populate(dir.path());
        let organizer = FsDesktopOrganizer::new(dir.path());

        let first = organizer.clear().unwrap();
        fs::write(dir.path().join("later.txt"), "x").unwrap();
        let second = organizer.clear().unwrap();

        assert_ne!(first, second);
        assert!(dir.path().join(&second).join("later.txt").exists());
    }

    #[test]
    fn restore_refuses_foreign_folders() {
        let dir = tempdir().unwrap();
        let organizer = FsDesktopOrganizer::new(dir.path());
        assert!(organizer.restore("Projects").is_err());
        assert!(organizer.restore(".Desktop_Cleared_x/../../etc").is_err());
    }

    #[test]
    fn restore_keeps_conflicting_items_hidden() {
        let dir = tempdir().unwrap();
        populate(dir.path());
        let organizer = FsDesktopOrganizer::new(dir.path());
        let folder = organizer.clear().unwrap();
        fs::write(dir.path().join("notes.txt"), "new").unwrap();

        assert!(organizer.restore(&folder).is_err());
        assert!(dir.path().join(&folder).join("notes.txt").exists());
        assert!(dir.path().join("screenshot.png").exists());
    }

    #[test]
    fn missing_desktop_is_an_error() {
        let dir = tempdir().unwrap();
        let organizer = FsDesktopOrganizer::new(dir.path().join("nope"));
        assert!(organizer.list_items().is_err());
        assert!(organizer.clear().is_err());
        assert!(!dir.path().join("nope").exists());
    }

    fn cleared_folders(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(CLEARED_PREFIX))
            .collect()
    }

    #[test]
    fn failed_first_move_leaves_no_folder_behind() {
        let dir = tempdir().unwrap();
        populate(dir.path());
        let organizer = FsDesktopOrganizer::new(dir.path());
        let before = organizer.list_items().unwrap();

        let err = organizer
            .clear_with(|_, _| Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked")))
            .unwrap_err();

        assert!(format!("{err:#}").contains("locked"));
        assert!(cleared_folders(dir.path()).is_empty());
        assert_eq!(organizer.list_items().unwrap(), before);
    }

    #[test]
    fn partial_clear_names_the_folder_holding_moved_items() {
        let dir = tempdir().unwrap();
        populate(dir.path());
        let organizer = FsDesktopOrganizer::new(dir.path());

        let mut calls = 0;
        let err = organizer
            .clear_with(|from, to| {
                calls += 1;
                if calls == 2 {
                    return Err(io::Error::other("disk went away"));
                }
                fs::rename(from, to)
            })
            .unwrap_err();

        let folders = cleared_folders(dir.path());
        assert_eq!(folders.len(), 1);
        let folder = &folders[0];
        let message = format!("{err:#}");
        assert!(message.contains(folder.as_str()), "{message}");
        assert!(message.contains("disk went away"), "{message}");

        // "Projects" sorts first and was moved before the failure.
        assert!(dir.path().join(folder).join("Projects").is_dir());
        organizer.restore(folder).unwrap();
        assert_eq!(organizer.list_items().unwrap().len(), 3);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::io;
use std::path::{Path, PathBuf};

/// Overrides the data directory when set.
pub const DATA_DIR_ENV: &str = "INSTAX_EMU_DATA_DIR";

const APP_DIR_NAME: &str = "instax-emu";

/// Default data directory: `$INSTAX_EMU_DATA_DIR`, else
/// `$XDG_DATA_HOME/instax-emu`, else `~/.local/share/instax-emu`.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    base_dir().join(APP_DIR_NAME)
}

fn base_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}

/// Create `name` inside `dir` and return its path.
pub fn subdir(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

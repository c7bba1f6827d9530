use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// Display theme for whatever front end sits on top. The core only owns the
/// storage entry, which lives beside (never inside) the tasks file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => f.write_str("light"),
            Self::Dark => f.write_str("dark"),
        }
    }
}

fn theme_path(data_dir: &Path) -> std::path::PathBuf {
    data_dir.join("theme.data")
}

/// Absent or unrecognized stored value falls back to light.
pub fn load(data_dir: &Path) -> Theme {
    let path = theme_path(data_dir);
    let theme = fs::read_to_string(&path)
        .ok()
        .and_then(|raw| Theme::parse(&raw))
        .unwrap_or_default();
    debug!(file = %path.display(), %theme, "loaded theme");
    theme
}

pub fn save(data_dir: &Path, theme: Theme) -> anyhow::Result<()> {
    let path = theme_path(data_dir);
    fs::write(&path, theme.to_string())
        .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}

//! Optional `~/.joyrc.toml` (`spec.md` §6 "load of a user library" and
//! the autoput/echo/gc-trace defaults a user may want to carry across
//! sessions). Missing or unreadable files are silent; a malformed file
//! is a warning, not a fatal error — a typo in the rc file should never
//! stop the REPL from starting.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RcConfig {
    pub autoput: Option<u8>,
    pub echo: Option<u8>,
    pub gc_trace: Option<bool>,
    pub library: Option<PathBuf>,
}

impl RcConfig {
    /// Load `~/.joyrc.toml`, or the defaults if it does not exist.
    pub fn load() -> Self {
        let Some(home) = home::home_dir() else {
            return Self::default();
        };
        let path = home.join(".joyrc.toml");
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&text) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("joy: warning: {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

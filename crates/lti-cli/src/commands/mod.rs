pub mod config;
pub mod launch;
pub mod token;

use std::io::Read;
use std::path::Path;

/// Contents of `path`, or all of stdin when `path` is `None`.
pub fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub fn ensure_dir(p: &Path) -> Result<()> {
    fs::create_dir_all(p)
        .map_err(|e| Error::msg(format!("failed to create dir {}: {e}", p.display())))
}

/// Write directives one per line, with a trailing newline.
pub fn write_lines(p: &Path, lines: &[String]) -> Result<()> {
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(p, body).map_err(|e| Error::msg(format!("failed to write {}: {e}", p.display())))
}

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static CC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CC\s*=\s*(.+)$").expect("invalid CC regex"));
static KERNEL_DIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^KERNEL_DIR\s*=\s*(.+)$").expect("invalid KERNEL_DIR regex"));
static SOURCE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.\s.+$").expect("invalid source-line regex"));

/// The referenced build-config after the line rewrites, plus the KERNEL_DIR
/// value it assigns (needed later for the staged-defconfig directives).
#[derive(Debug, Default)]
pub struct BaseConfig {
    pub lines: Vec<String>,
    pub kernel_dir: String,
}

/// Rewrite one trimmed line: a CC assignment gains the ${CC_WRAPPER} prefix,
/// then shell-escaped `$$` references collapse back to `$`.
fn rewrite_line(line: &str) -> String {
    let line = match CC_RE.captures(line) {
        Some(c) => format!("CC=\"${{CC_WRAPPER}} {}\"", c[1].trim()),
        None => line.to_string(),
    };
    line.replace("$$", "$")
}

/// Stream the referenced build-config, applying the rewrites in input order.
pub fn transform_base(path: &Path) -> Result<BaseConfig> {
    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read {}: {e}", path.display())))?;

    let mut out = BaseConfig::default();
    for raw in data.lines() {
        let line = rewrite_line(raw.trim());
        if let Some(c) = KERNEL_DIR_RE.captures(&line) {
            out.kernel_dir = c[1].trim().to_string();
        }
        out.lines.push(line);
    }
    Ok(out)
}

/// Read the generic build-config, dropping `. <file>` sourcing lines so the
/// copy stands alone. An absent file yields an empty config, not an error.
pub fn filter_generic(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read {}: {e}", path.display())))?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|l| !SOURCE_LINE_RE.is_match(l))
        .map(str::to_string)
        .collect())
}

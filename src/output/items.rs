use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one item id per line, creating parent directories as needed
///
/// An existing file is replaced.
pub fn write_item_list(path: &Path, items: &[String]) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        writeln!(writer, "{}", item)?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} items to {}", items.len(), path.display());
    Ok(())
}

/// Reads a newline-delimited id list, ignoring blank lines and surrounding whitespace
pub fn load_item_list(path: &Path) -> crate::Result<HashSet<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

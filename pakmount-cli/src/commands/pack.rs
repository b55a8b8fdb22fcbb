//! Build a PAK archive from files on disk.

use std::path::{Path, PathBuf};

use pakmount::archive::PakWriter;
use pakmount::config::format_size;
use tracing::debug;

use crate::error::CliError;

/// Member name for `file`: relative to `base` when given, else the file
/// name, with `/` separators.
fn member_name(file: &Path, base: Option<&Path>) -> Result<String, CliError> {
    let relative = match base {
        Some(base) => file.strip_prefix(base).map_err(|_| {
            CliError::Usage(format!(
                "{} is not under {}",
                file.display(),
                base.display()
            ))
        })?,
        None => Path::new(file.file_name().unwrap_or(file.as_os_str())),
    };
    Ok(relative.to_string_lossy().replace('\\', "/"))
}

pub fn run(output: &Path, files: &[PathBuf], base: Option<&Path>) -> Result<(), CliError> {
    let mut writer = PakWriter::new();
    let mut total = 0u64;

    for file in files {
        let name = member_name(file, base)?;
        let data = std::fs::read(file).map_err(|e| CliError::io(file.display(), e))?;
        debug!(name = %name, size = data.len(), "Adding archive member");
        total += data.len() as u64;
        writer = writer.add(name, data);
    }

    let bytes = writer.finish()?;
    std::fs::write(output, &bytes).map_err(|e| CliError::io(output.display(), e))?;
    println!(
        "Wrote {} ({} files, {} of content)",
        output.display(),
        files.len(),
        format_size(total)
    );
    Ok(())
}

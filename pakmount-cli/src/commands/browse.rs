//! Read-only commands over the merged tree.

use std::io::Write;

use console::style;
use pakmount::codec::Asset;
use pakmount::config::{format_size, ConfigFile};
use pakmount::overlay::{FileStat, TreeNode, ViewMode};

use super::{open_vfs, VfsArgs};
use crate::error::CliError;

/// List a directory.
pub async fn ls(args: &VfsArgs, config: &ConfigFile, dir: &str) -> Result<(), CliError> {
    let vfs = open_vfs(args, config).await?;
    if !dir.is_empty() && !vfs.is_directory(dir) {
        return Err(CliError::Usage(format!("Not a directory: {}", dir)));
    }

    let listing = vfs.list(dir);
    for sub in &listing.subdirectories {
        println!("{}", style(format!("{}/", sub)).blue().bold());
    }
    for file in &listing.files {
        print_file(file, true);
    }
    vfs.shutdown();
    Ok(())
}

/// Write a file to stdout.
pub async fn cat(args: &VfsArgs, config: &ConfigFile, path: &str) -> Result<(), CliError> {
    let vfs = open_vfs(args, config).await?;
    let data = vfs.read(path)?;
    vfs.shutdown();

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&data).and_then(|()| stdout.flush()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(CliError::io("stdout", e)),
    }
}

pub async fn stat(args: &VfsArgs, config: &ConfigFile, path: &str) -> Result<(), CliError> {
    let vfs = open_vfs(args, config).await?;
    let meta = vfs.metadata(path)?;

    println!("Path:    {}", meta.path);
    println!("Size:    {} ({} bytes)", format_size(meta.size), meta.size);
    println!("Kind:    {:?}", meta.kind);
    println!("Archive: {} ({})", meta.source_mount, meta.source_mount_id);
    vfs.shutdown();
    Ok(())
}

pub async fn find(
    args: &VfsArgs,
    config: &ConfigFile,
    ext: Option<String>,
    glob: Option<String>,
) -> Result<(), CliError> {
    let vfs = open_vfs(args, config).await?;
    let files = match (ext, glob) {
        (Some(ext), _) => vfs.find_by_extension(&ext),
        (None, Some(glob)) => vfs.find_matching(&glob)?,
        (None, None) => return Err(CliError::Usage("Pass --ext or --glob".to_string())),
    };

    for file in &files {
        print_file(file, false);
    }
    println!("{} file(s)", files.len());
    vfs.shutdown();
    Ok(())
}

/// Decode a file and print what it contains.
pub async fn parse(args: &VfsArgs, config: &ConfigFile, path: &str) -> Result<(), CliError> {
    let vfs = open_vfs(args, config).await?;
    let asset = vfs.parse(path).await?;
    println!("{}", describe(&asset));
    vfs.shutdown();
    Ok(())
}

pub async fn tree(args: &VfsArgs, config: &ConfigFile, by_mount: bool) -> Result<(), CliError> {
    let vfs = open_vfs(args, config).await?;
    let mode = if by_mount {
        ViewMode::ByMount
    } else {
        ViewMode::Merged
    };
    let root = vfs.file_tree(mode);
    for child in &root.children {
        print_node(child, 0);
    }
    println!("{} file(s)", root.file_count());
    vfs.shutdown();
    Ok(())
}

/// Print mounts lowest priority first, so the last line wins conflicts.
pub async fn mounts(args: &VfsArgs, config: &ConfigFile) -> Result<(), CliError> {
    let vfs = open_vfs(args, config).await?;
    for info in vfs.mounts() {
        println!(
            "{:>6}  {}  {} files, {}{}",
            info.priority_rank,
            style(&info.id).cyan(),
            info.file_count,
            format_size(info.total_size),
            if info.is_user_provided { "  [user]" } else { "" }
        );
    }
    vfs.shutdown();
    Ok(())
}

pub async fn mods(args: &VfsArgs, config: &ConfigFile) -> Result<(), CliError> {
    let vfs = open_vfs(args, config).await?;
    let mods = vfs.detect_mods();
    if mods.is_empty() {
        println!("No mods detected");
    }
    for info in mods {
        println!(
            "{} ({}) {} priority {}",
            style(&info.name).bold(),
            info.id,
            info.class,
            info.priority
        );
        if let Some(author) = &info.author {
            println!("  by {}", author);
        }
        println!("  archives: {}", info.pak_files.join(", "));
    }
    vfs.shutdown();
    Ok(())
}

fn print_file(file: &FileStat, name_only: bool) {
    let name = if name_only {
        file.path.rsplit('/').next().unwrap_or(&file.path)
    } else {
        file.path.as_str()
    };
    println!(
        "{:>10}  {}  {}",
        format_size(file.size),
        name,
        style(&file.source_mount_id).dim()
    );
}

fn print_node(node: &TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    if node.is_mount_root {
        println!("{}{}", indent, style(&node.name).cyan().bold());
    } else if node.is_directory {
        println!("{}{}", indent, style(format!("{}/", node.name)).blue());
    } else {
        let size = node.file.as_ref().map(|f| f.size).unwrap_or(0);
        println!("{}{}  {}", indent, node.name, style(format_size(size)).dim());
    }
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

/// One-paragraph summary of a decoded asset.
pub fn describe(asset: &Asset) -> String {
    match asset {
        Asset::Pcx(img) => format!(
            "PCX image {}x{}, {} bpp x {} planes{}",
            img.width,
            img.height,
            img.bits_per_pixel,
            img.planes,
            if img.has_palette { ", 256-colour palette" } else { "" }
        ),
        Asset::Wal(tex) => {
            let mut out = format!("WAL texture '{}' {}x{}", tex.name, tex.width, tex.height);
            if !tex.next_frame.is_empty() {
                out.push_str(&format!(", next frame '{}'", tex.next_frame));
            }
            out
        }
        Asset::Md2(model) => format!(
            "MD2 model: {} frames, {} vertices, {} triangles, skins [{}]",
            model.frames,
            model.vertices,
            model.triangles,
            model.skins.join(", ")
        ),
        Asset::Md3(model) => format!(
            "MD3 model '{}': {} frames, {} tags, {} surfaces",
            model.name, model.frames, model.tags, model.surfaces
        ),
        Asset::Sp2(frames) => {
            let images: Vec<&str> = frames.iter().map(|f| f.image.as_str()).collect();
            format!("Sprite: {} frame(s) [{}]", frames.len(), images.join(", "))
        }
        Asset::Wav(wav) => format!(
            "WAV audio: {} Hz, {} channel(s), {} bit, {} data bytes",
            wav.sample_rate, wav.channels, wav.bits_per_sample, wav.data_len
        ),
        Asset::Bsp(map) => format!("BSP map version {}, {} lumps", map.version, map.lumps.len()),
        Asset::Demo(data) => format!("Demo: {}", format_size(data.len() as u64)),
        Asset::Text(text) => text.clone(),
        Asset::Unknown { data, error } => match error {
            Some(e) => format!("Unreadable ({}): {}", format_size(data.len() as u64), e),
            None => format!("Binary data, {}", format_size(data.len() as u64)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pakmount::codec::{BspMap, Lump, WavAudio};

    #[test]
    fn test_describe_summaries() {
        let wav = Asset::Wav(WavAudio {
            format: 1,
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            data_len: 100,
        });
        assert_eq!(
            describe(&wav),
            "WAV audio: 22050 Hz, 1 channel(s), 16 bit, 100 data bytes"
        );

        let bsp = Asset::Bsp(BspMap {
            version: 38,
            lumps: vec![Lump { offset: 0, length: 0 }; 19],
        });
        assert_eq!(describe(&bsp), "BSP map version 38, 19 lumps");

        let text = Asset::Text("exec default.cfg".into());
        assert_eq!(describe(&text), "exec default.cfg");

        let unknown = Asset::Unknown {
            data: vec![0; 10],
            error: Some("bad magic".into()),
        };
        assert_eq!(describe(&unknown), "Unreadable (10 B): bad magic");
    }
}

//! Mod and expansion detection.
//!
//! Inspects an archive to decide which [`PriorityClass`] it belongs to:
//!
//! 1. `mod.json` with an `id` → third-party mod (its `priority` or
//!    [`PriorityClass::Mod`])
//! 2. file name containing `rogue` / `xatrix` → official expansion
//! 3. marker maps `maps/rogue1.bsp` / `maps/xware1.bsp` → official expansion
//! 4. `pics/colormap.pcx` → base game
//!
//! Anything else is unclassified.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::mount::{Mount, PriorityClass, PriorityRank};
use crate::archive::ArchiveIndex;

const MOD_MANIFEST: &str = "mod.json";

/// `mod.json` contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModManifest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub homepage: Option<String>,
    pub priority: Option<PriorityRank>,
}

/// A detected mod, possibly spread over several archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModInfo {
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub class: PriorityClass,
    pub priority: PriorityRank,
    /// Display names of the archives belonging to this mod.
    pub pak_files: Vec<String>,
}

impl ModInfo {
    fn known(
        id: &str,
        name: &str,
        description: &str,
        author: &str,
        class: PriorityClass,
        pak: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            author: Some(author.to_string()),
            description: Some(description.to_string()),
            version: None,
            dependencies: Vec::new(),
            class,
            priority: class.rank(),
            pak_files: vec![pak.to_string()],
        }
    }

    fn rogue(pak: &str) -> Self {
        Self::known(
            "rogue",
            "Ground Zero",
            "Official Expansion Pack: Ground Zero",
            "Rogue Entertainment",
            PriorityClass::Expansion,
            pak,
        )
    }

    fn xatrix(pak: &str) -> Self {
        Self::known(
            "xatrix",
            "The Reckoning",
            "Official Expansion Pack: The Reckoning",
            "Xatrix Entertainment",
            PriorityClass::Expansion,
            pak,
        )
    }

    fn base(pak: &str) -> Self {
        Self::known(
            "baseq2",
            "Base Game",
            "Quake II Base Game",
            "id Software",
            PriorityClass::Base,
            pak,
        )
    }
}

/// Classify one archive. `data` is the whole archive buffer `index` was
/// decoded from.
pub fn detect_mod(display_name: &str, index: &ArchiveIndex, data: &[u8]) -> Option<ModInfo> {
    if let Some(info) = read_manifest(display_name, index, data) {
        return Some(info);
    }

    let file_name = display_name.to_lowercase();
    if file_name.contains("rogue") {
        return Some(ModInfo::rogue(display_name));
    }
    if file_name.contains("xatrix") {
        return Some(ModInfo::xatrix(display_name));
    }
    if index.contains("maps/rogue1.bsp") {
        return Some(ModInfo::rogue(display_name));
    }
    if index.contains("maps/xware1.bsp") {
        return Some(ModInfo::xatrix(display_name));
    }
    if index.contains("pics/colormap.pcx") {
        return Some(ModInfo::base(display_name));
    }
    None
}

/// Class of one archive, if any rule matches.
pub fn detect_priority_class(
    display_name: &str,
    index: &ArchiveIndex,
    data: &[u8],
) -> Option<PriorityClass> {
    detect_mod(display_name, index, data).map(|info| info.class)
}

fn read_manifest(display_name: &str, index: &ArchiveIndex, data: &[u8]) -> Option<ModInfo> {
    let entry = index.get(MOD_MANIFEST)?;
    let bytes = data.get(entry.range())?;
    let manifest: ModManifest = match serde_json::from_slice(bytes) {
        Ok(m) => m,
        Err(e) => {
            warn!(archive = %display_name, error = %e, "Failed to parse mod.json");
            return None;
        }
    };
    if manifest.id.is_empty() {
        return None;
    }

    Some(ModInfo {
        name: if manifest.name.is_empty() {
            manifest.id.clone()
        } else {
            manifest.name
        },
        id: manifest.id,
        author: manifest.author,
        description: manifest.description,
        version: manifest.version,
        dependencies: manifest.dependencies,
        class: PriorityClass::Mod,
        priority: manifest.priority.unwrap_or(PriorityClass::Mod.rank()),
        pak_files: vec![display_name.to_string()],
    })
}

/// Classify every mount, merging archives that belong to the same mod.
pub fn detect_mods<'a>(mounts: impl IntoIterator<Item = &'a Mount>) -> Vec<ModInfo> {
    let mut mods: Vec<ModInfo> = Vec::new();
    for mount in mounts {
        let Some(info) = detect_mod(mount.display_name(), mount.index(), mount.data()) else {
            continue;
        };
        match mods.iter_mut().find(|m| m.id == info.id) {
            Some(existing) => existing.pak_files.extend(info.pak_files),
            None => mods.push(info),
        }
    }
    mods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveCodec, PakCodec, PakWriter};

    fn pak(files: &[(&str, &str)]) -> (ArchiveIndex, Vec<u8>) {
        let mut writer = PakWriter::new();
        for (name, data) in files {
            writer = writer.add(*name, data.as_bytes().to_vec());
        }
        let bytes = writer.finish().unwrap();
        (PakCodec::new().index(&bytes).unwrap(), bytes)
    }

    #[test]
    fn test_mod_json_with_priority() {
        let (index, data) = pak(&[(
            "mod.json",
            r#"{"id": "ctf", "name": "Capture The Flag", "priority": 120}"#,
        )]);
        let info = detect_mod("ctf.pak", &index, &data).unwrap();

        assert_eq!(info.id, "ctf");
        assert_eq!(info.name, "Capture The Flag");
        assert_eq!(info.class, PriorityClass::Mod);
        assert_eq!(info.priority, 120);
    }

    #[test]
    fn test_mod_json_default_priority() {
        let (index, data) = pak(&[("mod.json", r#"{"id": "mymod"}"#)]);
        let info = detect_mod("x.pak", &index, &data).unwrap();
        assert_eq!(info.priority, 100);
        assert_eq!(info.name, "mymod");
    }

    #[test]
    fn test_mod_json_without_id_falls_through() {
        let (index, data) = pak(&[
            ("mod.json", r#"{"name": "anonymous"}"#),
            ("pics/colormap.pcx", "p"),
        ]);
        let info = detect_mod("pak0.pak", &index, &data).unwrap();
        assert_eq!(info.id, "baseq2");
    }

    #[test]
    fn test_broken_mod_json_ignored() {
        let (index, data) = pak(&[("mod.json", "{oops")]);
        assert!(detect_mod("x.pak", &index, &data).is_none());
    }

    #[test]
    fn test_expansion_by_name_and_marker() {
        let (index, data) = pak(&[]);
        let info = detect_mod("ROGUE_pak0.pak", &index, &data).unwrap();
        assert_eq!(info.id, "rogue");
        assert_eq!(info.priority, PriorityClass::Expansion.rank());

        let (index, data) = pak(&[("maps/xware1.bsp", "IBSP")]);
        assert_eq!(detect_mod("pak0.pak", &index, &data).unwrap().id, "xatrix");
    }

    #[test]
    fn test_base_and_unclassified() {
        let (index, data) = pak(&[("pics/colormap.pcx", "p")]);
        let info = detect_mod("pak0.pak", &index, &data).unwrap();
        assert_eq!(info.class, PriorityClass::Base);

        let (index, data) = pak(&[("readme.txt", "hi")]);
        assert!(detect_mod("random.pak", &index, &data).is_none());
        assert!(detect_priority_class("random.pak", &index, &data).is_none());
    }

    #[test]
    fn test_detect_priority_class() {
        let (index, data) = pak(&[("maps/rogue1.bsp", "IBSP")]);
        assert_eq!(
            detect_priority_class("pak0.pak", &index, &data),
            Some(PriorityClass::Expansion)
        );
    }
}

//! Decoded asset types.
//!
//! The set of asset kinds is closed: every path maps to exactly one
//! [`AssetKind`] by extension, and every decode produces one [`Asset`]
//! variant. Assets are serialisable so decoded results can be stored in
//! the parsed-asset cache.

use serde::{Deserialize, Serialize};

/// Asset kind, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// 8-bit paletted PCX image.
    Pcx,
    /// Quake II wall texture.
    Wal,
    /// Quake II alias model.
    Md2,
    /// Quake III model.
    Md3,
    /// Sprite definition.
    Sp2,
    /// RIFF/WAVE audio.
    Wav,
    /// Compiled map.
    Bsp,
    /// Recorded demo (kept as raw bytes).
    Demo,
    /// Plain text (`txt`, `cfg`, `ent`).
    Text,
    /// Anything else.
    Unknown,
}

impl AssetKind {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: &str) -> Self {
        match extension(path).as_str() {
            "pcx" => AssetKind::Pcx,
            "wal" => AssetKind::Wal,
            "md2" => AssetKind::Md2,
            "md3" => AssetKind::Md3,
            "sp2" => AssetKind::Sp2,
            "wav" => AssetKind::Wav,
            "bsp" => AssetKind::Bsp,
            "dm2" => AssetKind::Demo,
            "txt" | "cfg" | "ent" => AssetKind::Text,
            _ => AssetKind::Unknown,
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssetKind::Pcx => "pcx",
            AssetKind::Wal => "wal",
            AssetKind::Md2 => "md2",
            AssetKind::Md3 => "md3",
            AssetKind::Sp2 => "sp2",
            AssetKind::Wav => "wav",
            AssetKind::Bsp => "bsp",
            AssetKind::Demo => "dm2",
            AssetKind::Text => "txt",
            AssetKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Lowercased extension of a path, or an empty string.
pub fn extension(path: &str) -> String {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Final component of a `/`-separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// PCX image header summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcxImage {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u8,
    pub planes: u8,
    /// Whether a trailing 256-colour palette is present.
    pub has_palette: bool,
}

/// WAL texture header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mip_offsets: [u32; 4],
    /// Next frame of an animated texture (empty when static).
    pub next_frame: String,
    pub flags: i32,
    pub contents: i32,
    pub value: i32,
}

/// MD2 model summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Md2Model {
    pub skin_width: i32,
    pub skin_height: i32,
    pub frames: i32,
    pub vertices: i32,
    pub triangles: i32,
    pub skins: Vec<String>,
}

/// MD3 model summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Md3Model {
    pub name: String,
    pub frames: i32,
    pub tags: i32,
    pub surfaces: i32,
}

/// One frame of a sprite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteFrame {
    pub width: i32,
    pub height: i32,
    pub origin_x: i32,
    pub origin_y: i32,
    pub image: String,
}

/// WAV format summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavAudio {
    pub format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

/// One BSP lump directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lump {
    pub offset: u32,
    pub length: u32,
}

/// BSP map header summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BspMap {
    pub version: i32,
    pub lumps: Vec<Lump>,
}

/// A decoded asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Asset {
    Pcx(PcxImage),
    Wal(WalTexture),
    Md2(Md2Model),
    Md3(Md3Model),
    Sp2(Vec<SpriteFrame>),
    Wav(WavAudio),
    Bsp(BspMap),
    Demo(Vec<u8>),
    Text(String),
    /// Unrecognised or undecodable content, kept raw.
    Unknown {
        data: Vec<u8>,
        error: Option<String>,
    },
}

impl Asset {
    /// The kind of this asset. `Unknown` assets report [`AssetKind::Unknown`]
    /// even when they came from a known extension that failed to decode.
    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Pcx(_) => AssetKind::Pcx,
            Asset::Wal(_) => AssetKind::Wal,
            Asset::Md2(_) => AssetKind::Md2,
            Asset::Md3(_) => AssetKind::Md3,
            Asset::Sp2(_) => AssetKind::Sp2,
            Asset::Wav(_) => AssetKind::Wav,
            Asset::Bsp(_) => AssetKind::Bsp,
            Asset::Demo(_) => AssetKind::Demo,
            Asset::Text(_) => AssetKind::Text,
            Asset::Unknown { .. } => AssetKind::Unknown,
        }
    }
}

//! Built-in decoder for Quake II asset formats.
//!
//! Decodes headers and directory structures only; pixel, vertex and sample
//! data stay in the archive. Model, sprite and map failures degrade to
//! [`Asset::Unknown`] carrying the error text, so a broken model still shows
//! up in a browser as raw bytes. Image and audio failures are hard errors.

use tracing::warn;

use super::asset::{
    Asset, AssetKind, BspMap, Lump, Md2Model, Md3Model, PcxImage, SpriteFrame, WalTexture,
    WavAudio,
};
use super::reader::ByteReader;
use super::{AssetCodec, DecodeError};

const PCX_HEADER_LEN: usize = 128;
const PCX_PALETTE_LEN: usize = 769;
const MD2_VERSION: i32 = 8;
const MD3_VERSION: i32 = 15;
const SP2_VERSION: i32 = 2;
const BSP_VERSION: i32 = 38;
const BSP_LUMPS: usize = 19;

/// Decoder for PCX, WAL, MD2, MD3, SP2, WAV, BSP, demo and text files.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuakeAssetCodec;

impl QuakeAssetCodec {
    pub fn new() -> Self {
        Self
    }
}

impl AssetCodec for QuakeAssetCodec {
    fn decode(&self, path: &str, bytes: &[u8]) -> Result<Asset, DecodeError> {
        match AssetKind::from_path(path) {
            AssetKind::Pcx => decode_pcx(bytes).map(Asset::Pcx),
            AssetKind::Wal => decode_wal(bytes).map(Asset::Wal),
            AssetKind::Wav => decode_wav(bytes).map(Asset::Wav),
            AssetKind::Md2 => Ok(soft(path, bytes, decode_md2(bytes).map(Asset::Md2))),
            AssetKind::Md3 => Ok(soft(path, bytes, decode_md3(bytes).map(Asset::Md3))),
            AssetKind::Sp2 => Ok(soft(path, bytes, decode_sp2(bytes).map(Asset::Sp2))),
            AssetKind::Bsp => Ok(soft(path, bytes, decode_bsp(bytes).map(Asset::Bsp))),
            AssetKind::Demo => Ok(Asset::Demo(bytes.to_vec())),
            AssetKind::Text => Ok(Asset::Text(String::from_utf8_lossy(bytes).into_owned())),
            AssetKind::Unknown => Ok(Asset::Unknown {
                data: bytes.to_vec(),
                error: None,
            }),
        }
    }
}

fn soft(path: &str, bytes: &[u8], result: Result<Asset, DecodeError>) -> Asset {
    match result {
        Ok(asset) => asset,
        Err(e) => {
            warn!(path = %path, error = %e, "Asset decode failed, keeping raw bytes");
            Asset::Unknown {
                data: bytes.to_vec(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// The 256-colour RGB palette trailing a version 5 PCX file.
///
/// Returns `None` when the file has no palette marker.
pub fn pcx_palette(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < PCX_HEADER_LEN + PCX_PALETTE_LEN || bytes.first() != Some(&0x0a) {
        return None;
    }
    let marker = bytes.len() - PCX_PALETTE_LEN;
    (bytes[1] == 5 && bytes[marker] == 0x0c).then(|| &bytes[marker + 1..])
}

fn decode_pcx(bytes: &[u8]) -> Result<PcxImage, DecodeError> {
    let mut r = ByteReader::new(bytes, "PCX header");
    if bytes.len() < PCX_HEADER_LEN {
        return Err(DecodeError::Truncated {
            what: "PCX header",
            needed: PCX_HEADER_LEN,
            available: bytes.len(),
        });
    }
    let manufacturer = r.u8()?;
    if manufacturer != 0x0a {
        return Err(DecodeError::Invalid {
            format: "PCX",
            reason: format!("manufacturer byte {:#04x}", manufacturer),
        });
    }
    let version = r.u8()?;
    let _encoding = r.u8()?;
    let bits_per_pixel = r.u8()?;
    let xmin = r.u16()?;
    let ymin = r.u16()?;
    let xmax = r.u16()?;
    let ymax = r.u16()?;
    if xmax < xmin || ymax < ymin {
        return Err(DecodeError::Invalid {
            format: "PCX",
            reason: format!("window {}..{} x {}..{}", xmin, xmax, ymin, ymax),
        });
    }
    let mut planes = ByteReader::at(bytes, 65, "PCX header");
    let planes = planes.u8()?;

    let has_palette = version == 5 && pcx_palette(bytes).is_some();

    Ok(PcxImage {
        width: u32::from(xmax - xmin) + 1,
        height: u32::from(ymax - ymin) + 1,
        bits_per_pixel,
        planes,
        has_palette,
    })
}

fn decode_wal(bytes: &[u8]) -> Result<WalTexture, DecodeError> {
    let mut r = ByteReader::new(bytes, "WAL header");
    let name = r.fixed_str(32)?;
    let width = r.u32()?;
    let height = r.u32()?;
    let mut mip_offsets = [0u32; 4];
    for offset in &mut mip_offsets {
        *offset = r.u32()?;
    }
    let next_frame = r.fixed_str(32)?;
    let flags = r.i32()?;
    let contents = r.i32()?;
    let value = r.i32()?;

    let base_len = width as usize * height as usize;
    if mip_offsets[0] as usize + base_len > bytes.len() {
        return Err(DecodeError::Invalid {
            format: "WAL",
            reason: format!("{}x{} mip 0 runs past end of file", width, height),
        });
    }

    Ok(WalTexture {
        name,
        width,
        height,
        mip_offsets,
        next_frame,
        flags,
        contents,
        value,
    })
}

fn decode_wav(bytes: &[u8]) -> Result<WavAudio, DecodeError> {
    let mut r = ByteReader::new(bytes, "WAV header");
    r.magic(b"RIFF", "WAV")?;
    let _riff_len = r.u32()?;
    r.magic(b"WAVE", "WAV")?;

    let mut format = None;
    let mut data_len = None;
    while r.position() + 8 <= bytes.len() && (format.is_none() || data_len.is_none()) {
        let id = r.take(4)?;
        let len = r.u32()? as usize;
        match id {
            b"fmt " => {
                let mut chunk = ByteReader::new(r.take(len)?, "WAV fmt chunk");
                let audio_format = chunk.u16()?;
                let channels = chunk.u16()?;
                let sample_rate = chunk.u32()?;
                let _byte_rate = chunk.u32()?;
                let _block_align = chunk.u16()?;
                let bits = chunk.u16()?;
                format = Some((audio_format, channels, sample_rate, bits));
            }
            b"data" => {
                data_len = Some(len as u32);
                // Sample data may be shorter than declared in truncated files.
                let available = bytes.len() - r.position();
                r.skip(len.min(available))?;
            }
            _ => r.skip(len)?,
        }
        if len % 2 == 1 && r.position() < bytes.len() {
            r.skip(1)?;
        }
    }

    let (audio_format, channels, sample_rate, bits) = format.ok_or(DecodeError::Invalid {
        format: "WAV",
        reason: "missing fmt chunk".into(),
    })?;
    let data_len = data_len.ok_or(DecodeError::Invalid {
        format: "WAV",
        reason: "missing data chunk".into(),
    })?;

    Ok(WavAudio {
        format: audio_format,
        channels,
        sample_rate,
        bits_per_sample: bits,
        data_len,
    })
}

fn decode_md2(bytes: &[u8]) -> Result<Md2Model, DecodeError> {
    let mut r = ByteReader::new(bytes, "MD2 header");
    r.magic(b"IDP2", "MD2")?;
    let version = r.i32()?;
    if version != MD2_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            format: "MD2",
            version,
        });
    }
    let skin_width = r.i32()?;
    let skin_height = r.i32()?;
    let _frame_size = r.i32()?;
    let num_skins = r.i32()?;
    let vertices = r.i32()?;
    let _num_st = r.i32()?;
    let triangles = r.i32()?;
    let _num_glcmds = r.i32()?;
    let frames = r.i32()?;
    let ofs_skins = r.i32()?;

    let skin_count = non_negative(num_skins, "MD2", "skin count")?;
    let skin_offset = non_negative(ofs_skins, "MD2", "skin offset")?;
    let mut skin_reader = ByteReader::at(bytes, skin_offset, "MD2 skins");
    let skins = (0..skin_count)
        .map(|_| skin_reader.fixed_str(64))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Md2Model {
        skin_width,
        skin_height,
        frames,
        vertices,
        triangles,
        skins,
    })
}

fn decode_md3(bytes: &[u8]) -> Result<Md3Model, DecodeError> {
    let mut r = ByteReader::new(bytes, "MD3 header");
    r.magic(b"IDP3", "MD3")?;
    let version = r.i32()?;
    if version != MD3_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            format: "MD3",
            version,
        });
    }
    let name = r.fixed_str(64)?;
    let _flags = r.i32()?;
    let frames = r.i32()?;
    let tags = r.i32()?;
    let surfaces = r.i32()?;

    Ok(Md3Model {
        name,
        frames,
        tags,
        surfaces,
    })
}

fn decode_sp2(bytes: &[u8]) -> Result<Vec<SpriteFrame>, DecodeError> {
    let mut r = ByteReader::new(bytes, "SP2 header");
    r.magic(b"IDS2", "SP2")?;
    let version = r.i32()?;
    if version != SP2_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            format: "SP2",
            version,
        });
    }
    let count = non_negative(r.i32()?, "SP2", "frame count")?;
    (0..count)
        .map(|_| -> Result<SpriteFrame, DecodeError> {
            Ok(SpriteFrame {
                width: r.i32()?,
                height: r.i32()?,
                origin_x: r.i32()?,
                origin_y: r.i32()?,
                image: r.fixed_str(64)?,
            })
        })
        .collect()
}

fn decode_bsp(bytes: &[u8]) -> Result<BspMap, DecodeError> {
    let mut r = ByteReader::new(bytes, "BSP header");
    r.magic(b"IBSP", "BSP")?;
    let version = r.i32()?;
    if version != BSP_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            format: "BSP",
            version,
        });
    }
    let mut lumps = Vec::with_capacity(BSP_LUMPS);
    for i in 0..BSP_LUMPS {
        let offset = r.u32()?;
        let length = r.u32()?;
        if offset as usize + length as usize > bytes.len() {
            return Err(DecodeError::Invalid {
                format: "BSP",
                reason: format!("lump {} ({}+{}) outside file", i, offset, length),
            });
        }
        lumps.push(Lump { offset, length });
    }
    Ok(BspMap { version, lumps })
}

fn non_negative(value: i32, format: &'static str, field: &str) -> Result<usize, DecodeError> {
    usize::try_from(value).map_err(|_| DecodeError::Invalid {
        format,
        reason: format!("negative {}: {}", field, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcx(width: u16, height: u16, palette: bool) -> Vec<u8> {
        let mut data = vec![0u8; PCX_HEADER_LEN];
        data[0] = 0x0a;
        data[1] = 5;
        data[2] = 1;
        data[3] = 8;
        data[8..10].copy_from_slice(&(width - 1).to_le_bytes());
        data[10..12].copy_from_slice(&(height - 1).to_le_bytes());
        data[65] = 1;
        if palette {
            data.push(0x0c);
            data.extend(std::iter::repeat(0u8).take(768));
        }
        data
    }

    fn wav(channels: u16, rate: u32, samples: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
        data.extend_from_slice(b"WAVE");
        data.extend_from_slice(b"fmt ");
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&channels.to_le_bytes());
        data.extend_from_slice(&rate.to_le_bytes());
        data.extend_from_slice(&(rate * channels as u32).to_le_bytes());
        data.extend_from_slice(&channels.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(b"data");
        data.extend_from_slice(&(samples.len() as u32).to_le_bytes());
        data.extend_from_slice(samples);
        data
    }

    #[test]
    fn test_decode_pcx_with_palette() {
        let codec = QuakeAssetCodec::new();
        let asset = codec.decode("pics/colormap.pcx", &pcx(256, 320, true)).unwrap();
        match asset {
            Asset::Pcx(image) => {
                assert_eq!(image.width, 256);
                assert_eq!(image.height, 320);
                assert!(image.has_palette);
                assert_eq!(image.planes, 1);
            }
            other => panic!("unexpected asset {:?}", other),
        }
    }

    #[test]
    fn test_pcx_palette() {
        let mut data = pcx(2, 2, true);
        let n = data.len();
        data[n - 768] = 0xaa;
        let palette = pcx_palette(&data).unwrap();
        assert_eq!(palette.len(), 768);
        assert_eq!(palette[0], 0xaa);

        assert!(pcx_palette(&pcx(2, 2, false)).is_none());
    }

    #[test]
    fn test_decode_pcx_rejects_bad_manufacturer() {
        let mut data = pcx(4, 4, false);
        data[0] = 0;
        let err = QuakeAssetCodec::new().decode("a.pcx", &data).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { format: "PCX", .. }));
    }

    #[test]
    fn test_decode_wav() {
        let data = wav(1, 22050, &[0, 1, 2]);
        let asset = QuakeAssetCodec::new().decode("sound/x.wav", &data).unwrap();
        assert_eq!(
            asset,
            Asset::Wav(WavAudio {
                format: 1,
                channels: 1,
                sample_rate: 22050,
                bits_per_sample: 8,
                data_len: 3,
            })
        );
    }

    #[test]
    fn test_decode_wav_missing_riff_is_error() {
        let err = QuakeAssetCodec::new()
            .decode("sound/x.wav", b"not a wav file at all")
            .unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic { format: "WAV", .. }));
    }

    #[test]
    fn test_decode_wal() {
        let mut data = Vec::new();
        let mut name = b"e1u1/floor".to_vec();
        name.resize(32, 0);
        data.extend_from_slice(&name);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        for offset in [100u32, 104, 105, 106] {
            data.extend_from_slice(&offset.to_le_bytes());
        }
        data.extend_from_slice(&[0u8; 32]);
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&[7u8; 7]);

        match QuakeAssetCodec::new().decode("textures/floor.wal", &data).unwrap() {
            Asset::Wal(tex) => {
                assert_eq!(tex.name, "e1u1/floor");
                assert_eq!((tex.width, tex.height), (2, 2));
                assert_eq!(tex.next_frame, "");
            }
            other => panic!("unexpected asset {:?}", other),
        }
    }

    #[test]
    fn test_broken_model_degrades_to_unknown() {
        let asset = QuakeAssetCodec::new()
            .decode("models/broken.md2", b"IDP2\x07\x00\x00\x00")
            .unwrap();
        match asset {
            Asset::Unknown { data, error } => {
                assert_eq!(data.len(), 8);
                assert!(error.unwrap().contains("version"));
            }
            other => panic!("unexpected asset {:?}", other),
        }
    }

    #[test]
    fn test_decode_bsp_header() {
        let mut data = b"IBSP".to_vec();
        data.extend_from_slice(&BSP_VERSION.to_le_bytes());
        let header_len = 8 + BSP_LUMPS * 8;
        for _ in 0..BSP_LUMPS {
            data.extend_from_slice(&(header_len as u32).to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
        }
        match QuakeAssetCodec::new().decode("maps/base1.bsp", &data).unwrap() {
            Asset::Bsp(map) => {
                assert_eq!(map.version, 38);
                assert_eq!(map.lumps.len(), BSP_LUMPS);
            }
            other => panic!("unexpected asset {:?}", other),
        }
    }

    #[test]
    fn test_text_and_unknown() {
        let codec = QuakeAssetCodec::new();
        assert_eq!(
            codec.decode("autoexec.cfg", b"bind w +forward").unwrap(),
            Asset::Text("bind w +forward".into())
        );
        assert_eq!(
            codec.decode("blob.bin", &[1, 2]).unwrap(),
            Asset::Unknown {
                data: vec![1, 2],
                error: None
            }
        );
    }
}

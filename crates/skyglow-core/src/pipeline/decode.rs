//! RAW sensor plane decoding and Bayer channel slicing.

use ndarray::{s, Array2};
use std::path::Path;

use crate::camera::CameraGeometry;
use crate::error::{PipelineError, PipelineResult};
use crate::types::Channel;

/// Decoded RAW sensor plane, one sample per photosite.
pub type SensorPlane = Array2<u16>;

/// The four Bayer channel planes in `Channel::ALL` order.
pub type ChannelPlanes = [Array2<u16>; 4];

/// Decodes the undemosaiced sensor data of camera RAW files.
pub struct RawDecoder;

impl RawDecoder {
    /// Decode the full sensor plane of a RAW file (rows × columns).
    ///
    /// Masked border pixels are kept: channel offsets refer to the
    /// uncropped plane.
    pub fn decode(path: &Path) -> PipelineResult<SensorPlane> {
        let raw = rawloader::decode_file(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = (raw.width, raw.height);
        if raw.cpp != 1 {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!(
                    "{} {} is not a Bayer sensor ({} components per pixel)",
                    raw.clean_make, raw.clean_model, raw.cpp
                ),
            });
        }

        let data = match raw.data {
            rawloader::RawImageData::Integer(values) => values,
            rawloader::RawImageData::Float(_) => {
                return Err(PipelineError::Decode {
                    path: path.to_path_buf(),
                    message: "floating point sensor data is not supported".to_string(),
                })
            }
        };

        tracing::trace!("Decoded {:?}: {}x{}", path, width, height);
        Array2::from_shape_vec((height, width), data).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Split a sensor plane into its four Bayer channels.
///
/// Channel `c` is `plane[offset_x::stride, offset_y::stride]`, the first
/// axis being rows.
pub fn slice_channels(
    plane: &SensorPlane,
    geometry: &CameraGeometry,
    path: &Path,
) -> PipelineResult<ChannelPlanes> {
    let (rows, cols) = plane.dim();
    let slice = |channel: Channel| -> PipelineResult<Array2<u16>> {
        let g = geometry.channel(channel);
        if g.offset_x >= rows || g.offset_y >= cols {
            return Err(PipelineError::Geometry {
                path: path.to_path_buf(),
                message: format!(
                    "{channel} offset ({}, {}) outside a {rows}x{cols} sensor plane",
                    g.offset_x, g.offset_y
                ),
            });
        }
        let step = g.stride as isize;
        Ok(plane
            .slice(s![g.offset_x..;step, g.offset_y..;step])
            .to_owned())
    };

    Ok([
        slice(Channel::R1)?,
        slice(Channel::G2)?,
        slice(Channel::G3)?,
        slice(Channel::B4)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraCache;

    const RGGB: &str = "[cam]\nR1 = \"0,0,2\"\nG2 = \"0,1,2\"\nG3 = \"1,0,2\"\nB4 = \"1,1,2\"\n";

    /// 4x6 plane whose value encodes its position: 10*row + col.
    fn positional_plane() -> SensorPlane {
        Array2::from_shape_fn((4, 6), |(r, c)| (10 * r + c) as u16)
    }

    #[test]
    fn test_slice_rggb() {
        let geometry = CameraCache::from_toml(RGGB).lookup("cam").unwrap();
        let [r1, g2, g3, b4] =
            slice_channels(&positional_plane(), &geometry, Path::new("x.CR2")).unwrap();

        assert_eq!(r1.dim(), (2, 3));
        assert_eq!(r1.row(0).to_vec(), vec![0, 2, 4]);
        assert_eq!(r1.row(1).to_vec(), vec![20, 22, 24]);
        assert_eq!(g2.row(0).to_vec(), vec![1, 3, 5]);
        assert_eq!(g3.row(0).to_vec(), vec![10, 12, 14]);
        assert_eq!(b4.row(1).to_vec(), vec![31, 33, 35]);
    }

    #[test]
    fn test_slice_rejects_offsets_outside_plane() {
        let table = "[cam]\nR1 = \"0,0,2\"\nG2 = \"0,9,2\"\nG3 = \"1,0,2\"\nB4 = \"1,1,2\"\n";
        let geometry = CameraCache::from_toml(table).lookup("cam").unwrap();
        let err = slice_channels(&positional_plane(), &geometry, Path::new("x.CR2")).unwrap_err();
        assert!(matches!(err, PipelineError::Geometry { .. }));
        assert!(!err.unregisters_image());
    }

    #[test]
    fn test_decode_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0001.CR2");
        std::fs::write(&path, b"not a raw file").unwrap();
        assert!(matches!(
            RawDecoder::decode(&path),
            Err(PipelineError::Decode { .. })
        ));
    }
}

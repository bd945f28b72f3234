// src/io.rs
//
// Frame supply seam. Video decoding and background subtraction live in an
// external collaborator; the engine only consumes per-frame foreground
// intensity grids through FrameSource. The file-backed implementation
// reads a trivial raw container so tracked runs are reproducible without
// any video stack.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{NativeEndian, ReadBytesExt};

use crate::error::TrackingError;
use crate::imgproc::Gray;

pub trait FrameSource {
    /// (height, width) of every frame.
    fn dims(&self) -> (usize, usize);
    fn frame_count(&self) -> usize;
    /// Next foreground intensity grid, or None at end of stream.
    fn next_frame(&mut self) -> Result<Option<Gray>, TrackingError>;
}

/// Raw mask container: magic "FCTM", then u32 width, height, frameCount
/// (native endianness), then frames row-major as u8 intensities.
pub struct RawMaskFile {
    reader: BufReader<File>,
    width: usize,
    height: usize,
    total: usize,
    delivered: usize,
}

const MAGIC: [u8; 4] = *b"FCTM";

impl RawMaskFile {
    pub fn open(path: &Path) -> Result<Self, TrackingError> {
        let io_err = |e| TrackingError::io(path, e);
        let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(io_err)?;
        if magic != MAGIC {
            return Err(TrackingError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "not a mask container"),
            ));
        }
        let width = reader.read_u32::<NativeEndian>().map_err(io_err)? as usize;
        let height = reader.read_u32::<NativeEndian>().map_err(io_err)? as usize;
        let total = reader.read_u32::<NativeEndian>().map_err(io_err)? as usize;
        Ok(Self {
            reader,
            width,
            height,
            total,
            delivered: 0,
        })
    }
}

impl FrameSource for RawMaskFile {
    fn dims(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    fn frame_count(&self) -> usize {
        self.total
    }

    fn next_frame(&mut self) -> Result<Option<Gray>, TrackingError> {
        if self.delivered >= self.total {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.width * self.height];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| TrackingError::io("<mask stream>", e))?;
        self.delivered += 1;
        let frame = Gray::from_shape_vec((self.height, self.width), buf).map_err(|_| {
            TrackingError::io(
                "<mask stream>",
                std::io::Error::new(std::io::ErrorKind::InvalidData, "bad frame shape"),
            )
        })?;
        Ok(Some(frame))
    }
}

/// In-memory source for tests and synthetic runs.
pub struct MemorySource {
    frames: std::vec::IntoIter<Gray>,
    dims: (usize, usize),
    total: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<Gray>) -> Self {
        let dims = frames.first().map(|f| f.dim()).unwrap_or((0, 0));
        let total = frames.len();
        Self {
            frames: frames.into_iter(),
            dims,
            total,
        }
    }
}

impl FrameSource for MemorySource {
    fn dims(&self) -> (usize, usize) {
        self.dims
    }

    fn frame_count(&self) -> usize {
        self.total
    }

    fn next_frame(&mut self) -> Result<Option<Gray>, TrackingError> {
        Ok(self.frames.next())
    }
}

/// Write frames into the raw container format.
pub fn write_mask_file(path: &Path, frames: &[Gray]) -> Result<(), TrackingError> {
    use byteorder::WriteBytesExt;
    use std::io::Write;

    let io_err = |e| TrackingError::io(path, e);
    let (h, w) = frames.first().map(|f| f.dim()).unwrap_or((0, 0));
    let mut out = std::io::BufWriter::new(File::create(path).map_err(io_err)?);
    out.write_all(&MAGIC).map_err(io_err)?;
    out.write_u32::<NativeEndian>(w as u32).map_err(io_err)?;
    out.write_u32::<NativeEndian>(h as u32).map_err(io_err)?;
    out.write_u32::<NativeEndian>(frames.len() as u32)
        .map_err(io_err)?;
    for frame in frames {
        for &v in frame.iter() {
            out.write_u8(v).map_err(io_err)?;
        }
    }
    out.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_container_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena0.fctm");

        let mut a = Gray::from_elem((4, 6), 0);
        a[(1, 2)] = 200;
        let mut b = Gray::from_elem((4, 6), 0);
        b[(3, 5)] = 77;
        write_mask_file(&path, &[a.clone(), b.clone()]).unwrap();

        let mut src = RawMaskFile::open(&path).unwrap();
        assert_eq!(src.dims(), (4, 6));
        assert_eq!(src.frame_count(), 2);
        assert_eq!(src.next_frame().unwrap().unwrap(), a);
        assert_eq!(src.next_frame().unwrap().unwrap(), b);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        std::fs::write(&path, b"XXXX0123456789").unwrap();
        assert!(RawMaskFile::open(&path).is_err());
    }
}

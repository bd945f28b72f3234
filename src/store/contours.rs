// src/store/contours.rs
//
// Contour record codec. Layout per record:
//   u32 segmentCount
//   per segment: u32 vertexCount, then vertexCount * (f32 x, f32 y)
// Offset 0 always holds an explicit empty (0-segment) record; contour-less
// frames and flies reference that instead of carrying a sentinel value.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{NativeEndian, ReadBytesExt};

use super::AppendLog;
use crate::error::StoreError;
use crate::geometry::Point;

/// Opaque reference to one contour record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContourHandle(u32);

impl ContourHandle {
    pub const EMPTY: ContourHandle = ContourHandle(0);

    /// Raw value for storage in a uint attribute series.
    pub fn to_raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

pub struct ContourLog {
    log: AppendLog,
}

impl ContourLog {
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let mut log = AppendLog::create(path)?;
        // Reserved empty record at offset 0.
        log.put_u32(0)?;
        Ok(Self { log })
    }

    pub fn append(&mut self, segments: &[Vec<Point>]) -> Result<ContourHandle, StoreError> {
        if segments.is_empty() {
            return Ok(ContourHandle::EMPTY);
        }
        let handle = ContourHandle(self.log.next_offset()?);
        self.log.put_u32(segments.len() as u32)?;
        for segment in segments {
            self.log.put_u32(segment.len() as u32)?;
            for p in segment {
                self.log.put_f32(p.x)?;
                self.log.put_f32(p.y)?;
            }
        }
        Ok(handle)
    }

    pub fn finish(self) -> Result<(), StoreError> {
        self.log.finish()
    }
}

pub struct ContourReader {
    reader: BufReader<File>,
}

/// Cap on segment/vertex counts while reading; anything larger means the
/// record under the handle is not a contour.
const MAX_COUNT: u32 = 1 << 24;

impl ContourReader {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
        })
    }

    pub fn read(&mut self, handle: ContourHandle) -> Result<Vec<Vec<Point>>, StoreError> {
        self.reader.seek(SeekFrom::Start(handle.0 as u64))?;
        let segment_count = self.reader.read_u32::<NativeEndian>()?;
        if segment_count > MAX_COUNT {
            return Err(StoreError::Malformed {
                offset: handle.0,
                reason: format!("segment count {segment_count}"),
            });
        }
        let mut segments = Vec::with_capacity(segment_count as usize);
        for _ in 0..segment_count {
            let vertex_count = self.reader.read_u32::<NativeEndian>()?;
            if vertex_count > MAX_COUNT {
                return Err(StoreError::Malformed {
                    offset: handle.0,
                    reason: format!("vertex count {vertex_count}"),
                });
            }
            let mut segment = Vec::with_capacity(vertex_count as usize);
            let mut buf = [0u8; 8];
            for _ in 0..vertex_count {
                self.reader.read_exact(&mut buf)?;
                let x = f32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
                let y = f32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]);
                segment.push(Point::new(x, y));
            }
            segments.push(segment);
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_reproduces_exact_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contours.bin");

        let body = vec![
            vec![
                Point::new(1.0, 2.0),
                Point::new(3.5, 4.25),
                Point::new(-1.0, 0.0),
            ],
            vec![Point::new(10.0, 20.0)],
        ];
        let wing = vec![vec![Point::new(7.0, 7.0), Point::new(8.0, 9.0)]];

        let mut log = ContourLog::create(&path).unwrap();
        let h_body = log.append(&body).unwrap();
        let h_wing = log.append(&wing).unwrap();
        log.finish().unwrap();

        let mut reader = ContourReader::open(&path).unwrap();
        // Read out of append order on purpose.
        assert_eq!(reader.read(h_wing).unwrap(), wing);
        assert_eq!(reader.read(h_body).unwrap(), body);
    }

    #[test]
    fn offset_zero_is_the_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contours.bin");

        let mut log = ContourLog::create(&path).unwrap();
        let h = log.append(&[]).unwrap();
        assert_eq!(h, ContourHandle::EMPTY);
        log.finish().unwrap();

        let mut reader = ContourReader::open(&path).unwrap();
        assert!(reader.read(ContourHandle::EMPTY).unwrap().is_empty());
    }
}

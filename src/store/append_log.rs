// src/store/append_log.rs

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{NativeEndian, WriteBytesExt};

use crate::error::StoreError;

/// Append-only record writer shared by the contour and histogram logs.
///
/// Tracks the running byte offset so codecs can hand out record handles
/// without querying the file. Handles are 32-bit; a log growing past 4 GiB
/// is an error rather than a silent wrap.
pub struct AppendLog {
    writer: BufWriter<File>,
    offset: u64,
    finished: bool,
}

impl AppendLog {
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            offset: 0,
            finished: false,
        })
    }

    /// Byte offset the next record will start at, validated to fit a handle.
    pub fn next_offset(&self) -> Result<u32, StoreError> {
        u32::try_from(self.offset).map_err(|_| StoreError::OffsetOverflow {
            offset: self.offset,
        })
    }

    pub fn put_u32(&mut self, v: u32) -> Result<(), StoreError> {
        self.check_open()?;
        self.writer.write_u32::<NativeEndian>(v)?;
        self.offset += 4;
        Ok(())
    }

    pub fn put_f32(&mut self, v: f32) -> Result<(), StoreError> {
        self.check_open()?;
        self.writer.write_f32::<NativeEndian>(v)?;
        self.offset += 4;
        Ok(())
    }

    /// Flush and close. Consumes the log so it can only happen once.
    pub fn finish(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.writer.flush()?;
        Ok(())
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        Ok(())
    }
}

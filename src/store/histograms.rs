// src/store/histograms.rs
//
// Body-intensity histogram records: u32 binCount followed by the bins as
// u32 counts. Same handle discipline as the contour log, including the
// reserved empty record at offset 0.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use byteorder::{NativeEndian, ReadBytesExt};

use super::AppendLog;
use crate::error::StoreError;

pub const HISTOGRAM_BINS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramHandle(u32);

impl HistogramHandle {
    pub const EMPTY: HistogramHandle = HistogramHandle(0);

    pub fn to_raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

pub struct HistogramLog {
    log: AppendLog,
}

impl HistogramLog {
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let mut log = AppendLog::create(path)?;
        log.put_u32(0)?;
        Ok(Self { log })
    }

    pub fn append(&mut self, bins: &[u32; HISTOGRAM_BINS]) -> Result<HistogramHandle, StoreError> {
        let handle = HistogramHandle(self.log.next_offset()?);
        self.log.put_u32(HISTOGRAM_BINS as u32)?;
        for &b in bins {
            self.log.put_u32(b)?;
        }
        Ok(handle)
    }

    pub fn finish(self) -> Result<(), StoreError> {
        self.log.finish()
    }
}

pub struct HistogramReader {
    reader: BufReader<File>,
}

impl HistogramReader {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
        })
    }

    pub fn read(&mut self, handle: HistogramHandle) -> Result<Vec<u32>, StoreError> {
        self.reader.seek(SeekFrom::Start(handle.0 as u64))?;
        let bin_count = self.reader.read_u32::<NativeEndian>()?;
        if bin_count as usize > 4096 {
            return Err(StoreError::Malformed {
                offset: handle.0,
                reason: format!("bin count {bin_count}"),
            });
        }
        let mut bins = Vec::with_capacity(bin_count as usize);
        for _ in 0..bin_count {
            bins.push(self.reader.read_u32::<NativeEndian>()?);
        }
        Ok(bins)
    }
}

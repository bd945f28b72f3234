// src/attributes/export.rs
//
// On-disk attribute layout: one directory per collection kind
//   <root>/frame/            per-frame series
//   <root>/fly/<N>/          per-fly series
//   <root>/pair/<a>/<p>/     per-pair series
// Each attribute gets a raw binary file (sizeof(T) * frameCount, native
// endianness) named after it, and each directory gets one transposed
// tab-separated table: rows are name, type, count, then the values, so
// columns line up with frames. Vec2 series emit two rows (.x and .y).
//
// I/O faults on a single attribute are warnings, not errors; the rest of
// the export continues.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{NativeEndian, WriteBytesExt};
use tracing::{debug, warn};

use super::attribute::{Attribute, AttributeData};
use super::collections::{FlyAttributes, FrameAttributes, PairAttributes};
use crate::error::TrackingError;

pub fn export_attributes(
    root: &Path,
    frame: &FrameAttributes,
    fly: &FlyAttributes,
    pair: &PairAttributes,
) -> Result<(), TrackingError> {
    export_map_dir(&root.join("frame"), frame.attrs.iter())?;
    for i in 0..fly.fly_count() {
        export_map_dir(&root.join("fly").join(i.to_string()), fly.fly(i).iter())?;
    }
    for (a, p) in pair.keys() {
        export_map_dir(
            &root.join("pair").join(a.to_string()).join(p.to_string()),
            pair.pair(a, p).iter(),
        )?;
    }
    debug!(root = %root.display(), "attribute export complete");
    Ok(())
}

fn export_map_dir<'a>(
    dir: &Path,
    attrs: impl Iterator<Item = &'a Attribute>,
) -> Result<(), TrackingError> {
    fs::create_dir_all(dir).map_err(|e| TrackingError::io(dir, e))?;
    let table_path = dir.join("attributes.tsv");
    let table = File::create(&table_path).map_err(|e| TrackingError::io(&table_path, e))?;
    let mut table = BufWriter::new(table);

    for attr in attrs {
        let raw_path = dir.join(&attr.name);
        if let Err(e) = write_raw(&raw_path, attr) {
            warn!(
                attribute = %attr.name,
                path = %raw_path.display(),
                error = %e,
                "skipping attribute raw export"
            );
            continue;
        }
        if let Err(e) = write_table_rows(&mut table, attr) {
            warn!(attribute = %attr.name, error = %e, "skipping attribute table rows");
        }
    }
    table.flush().map_err(|e| TrackingError::io(&table_path, e))?;
    Ok(())
}

fn write_raw(path: &Path, attr: &Attribute) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    match &attr.data {
        AttributeData::Float(v) => {
            for &x in v {
                w.write_f32::<NativeEndian>(x)?;
            }
        }
        AttributeData::Vec2(v) => {
            for &[x, y] in v {
                w.write_f32::<NativeEndian>(x)?;
                w.write_f32::<NativeEndian>(y)?;
            }
        }
        AttributeData::Bool(v) => {
            for &x in v {
                w.write_u8(x as u8)?;
            }
        }
        AttributeData::Uint(v) => {
            for &x in v {
                w.write_u32::<NativeEndian>(x)?;
            }
        }
    }
    w.flush()
}

fn write_table_rows(w: &mut impl Write, attr: &Attribute) -> std::io::Result<()> {
    match &attr.data {
        AttributeData::Float(v) => {
            write_row(w, &attr.name, "float", v.len(), v.iter().map(|x| x.to_string()))
        }
        AttributeData::Vec2(v) => {
            write_row(
                w,
                &format!("{}.x", attr.name),
                "float",
                v.len(),
                v.iter().map(|p| p[0].to_string()),
            )?;
            write_row(
                w,
                &format!("{}.y", attr.name),
                "float",
                v.len(),
                v.iter().map(|p| p[1].to_string()),
            )
        }
        AttributeData::Bool(v) => write_row(
            w,
            &attr.name,
            "bool",
            v.len(),
            v.iter().map(|&x| if x { "1" } else { "0" }.to_string()),
        ),
        AttributeData::Uint(v) => {
            write_row(w, &attr.name, "uint32", v.len(), v.iter().map(|x| x.to_string()))
        }
    }
}

fn write_row(
    w: &mut impl Write,
    name: &str,
    type_name: &str,
    count: usize,
    values: impl Iterator<Item = String>,
) -> std::io::Result<()> {
    write!(w, "{name}\t{type_name}\t{count}")?;
    for v in values {
        write!(w, "\t{v}")?;
    }
    writeln!(w)
}

/// One parsed row of a transposed table.
#[derive(Debug, Clone)]
pub struct TableRow {
    pub name: String,
    pub type_name: String,
    pub values: Vec<String>,
}

/// Read a transposed tab-separated table. Malformed rows are skipped with
/// a warning; a missing file is an error for the caller to handle.
pub fn read_table(path: &Path) -> Result<Vec<TableRow>, TrackingError> {
    let file = File::open(path).map_err(|e| TrackingError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| TrackingError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(name), Some(type_name), Some(count)) =
            (fields.next(), fields.next(), fields.next())
        else {
            warn!(line = line_no + 1, "table row too short, skipping");
            continue;
        };
        let Ok(count) = count.parse::<usize>() else {
            warn!(line = line_no + 1, name, "bad count field, skipping row");
            continue;
        };
        let values: Vec<String> = fields.map(str::to_string).collect();
        if values.len() != count {
            warn!(
                line = line_no + 1,
                name,
                expected = count,
                actual = values.len(),
                "value count mismatch, skipping row"
            );
            continue;
        }
        rows.push(TableRow {
            name: name.to_string(),
            type_name: type_name.to_string(),
            values,
        });
    }
    Ok(rows)
}

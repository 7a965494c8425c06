// Copyright 2025 promics Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{collections::HashMap, fs::File, io::Read, path::Path};

use bytes::Buf;
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    format::{decode_footer_text, inflate, EntryCursor, HEADER_LEN, MAGIC},
    spectrum::{Precursor, Spectrum},
};

/// Random-access reader of a finalized `.cms` spectrum container.
///
/// The data region is memory-mapped read-only and addressed through the
/// footer index, so lookups touch only the pages of the requested entry.
/// Every read works on its own slice of the map; no shared cursor exists,
/// and the reader is `Sync`. Decompressed peak arrays are fresh allocations
/// the caller owns.
pub struct SpectrumReader {
    map: Mmap,
    footer_offset: usize,
    titles: Vec<String>,
    index: HashMap<String, usize>,
    postcursors: HashMap<String, Vec<String>>,
    buffer_starts: Vec<u64>,
    // precursor m/z is the hot field in recalibration passes, worth memoizing
    precursor_mz: Mutex<HashMap<String, f64>>,
    min_mz: f64,
    max_mz: f64,
    max_intensity: f64,
    max_rt: f64,
}

impl SpectrumReader {
    /// Opens a container, validating the magic number and parsing the footer
    /// index.
    ///
    /// Returns [`Error::UnsupportedFormat`] when the magic number does not
    /// match, before trusting any offset in the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)
            .map_err(|_| Error::UnsupportedFormat)?;
        if header[..MAGIC.len()] != MAGIC {
            return Err(Error::UnsupportedFormat);
        }

        let mut fields = &header[MAGIC.len()..];
        let footer_offset = fields.get_i64();
        let min_mz = fields.get_f64();
        let max_mz = fields.get_f64();
        let max_intensity = fields.get_f64();
        let max_rt = fields.get_f64();

        // erroring out before the map is created keeps all later slicing in
        // bounds
        let map = unsafe { Mmap::map(&file)? };
        let footer_offset = usize::try_from(footer_offset)
            .ok()
            .filter(|offset| (HEADER_LEN as usize..map.len()).contains(offset))
            .ok_or_else(|| Error::corrupt(format!("footer offset {footer_offset} out of range")))?;

        let mut cursor = EntryCursor::new(&map[footer_offset..]);
        let compressed_len = cursor.get_len()?;
        let uncompressed_len = cursor.get_len()?;
        let compressed = cursor.take(compressed_len)?;
        let text = inflate(compressed, uncompressed_len)?;
        let text =
            String::from_utf8(text).map_err(|_| Error::corrupt("footer text is not utf-8"))?;
        let footer = decode_footer_text(&text)?;

        if footer.buffer_starts.first() != Some(&HEADER_LEN) {
            return Err(Error::corrupt("buffer start list does not open the data region"));
        }

        let mut index = HashMap::with_capacity(footer.titles.len());
        for (title, offset) in footer.titles.iter().zip(footer.offsets.iter()) {
            let offset = usize::try_from(*offset)
                .ok()
                .filter(|offset| (HEADER_LEN as usize..footer_offset).contains(offset))
                .ok_or_else(|| {
                    Error::corrupt(format!("entry offset {offset} outside the data region"))
                })?;
            index.insert(title.clone(), offset);
        }

        tracing::debug!(
            spectra = footer.titles.len(),
            footer_offset,
            buffers = footer.buffer_starts.len(),
            "opened spectrum container"
        );

        Ok(Self {
            map,
            footer_offset,
            titles: footer.titles,
            index,
            postcursors: footer.postcursors,
            buffer_starts: footer.buffer_starts,
            precursor_mz: Mutex::new(HashMap::new()),
            min_mz,
            max_mz,
            max_intensity,
            max_rt,
        })
    }

    fn entry(&self, title: &str) -> Result<EntryCursor<'_>> {
        let offset = *self.index.get(title).ok_or_else(|| Error::NotFound {
            title: title.to_string(),
        })?;
        Ok(EntryCursor::new(&self.map[offset..self.footer_offset]))
    }

    /// Returns the fully decoded spectrum with the given title.
    pub fn spectrum(&self, title: &str) -> Result<Spectrum> {
        let mut cursor = self.entry(title)?;

        let mz = cursor.get_f64()?;
        let rt = cursor.get_f64()?;
        let intensity = cursor.get_f64()?;
        let level = cursor.get_i32()?;
        let compressed_len = cursor.get_len()?;
        let peak_count = cursor.get_len()?;
        let compressed = cursor.take(compressed_len)?;
        let charge_count = cursor.get_len()?;
        let mut charges = Vec::with_capacity(charge_count);
        for _ in 0..charge_count {
            charges.push(cursor.get_i32()?);
        }

        let (peak_mz, peak_intensity) = self.decode_peaks(compressed, peak_count)?;

        Ok(Spectrum::new(
            Precursor::new(rt, mz, intensity, charges),
            peak_mz,
            peak_intensity,
            level,
        ))
    }

    /// Returns the precursor of the spectrum with the given title, skipping
    /// peak decompression.
    pub fn precursor(&self, title: &str) -> Result<Precursor> {
        let mut cursor = self.entry(title)?;

        let mz = cursor.get_f64()?;
        let rt = cursor.get_f64()?;
        let intensity = cursor.get_f64()?;
        cursor.skip(4)?;
        let compressed_len = cursor.get_len()?;
        cursor.skip(4 + compressed_len)?;
        let charge_count = cursor.get_len()?;
        let mut charges = Vec::with_capacity(charge_count);
        for _ in 0..charge_count {
            charges.push(cursor.get_i32()?);
        }

        Ok(Precursor::new(rt, mz, intensity, charges))
    }

    /// Returns the precursor m/z of the spectrum with the given title,
    /// memoized across calls.
    pub fn precursor_mz(&self, title: &str) -> Result<f64> {
        // One guard across check and fill; the entry read under it is a
        // single f64 slice read.
        let mut memo = self.precursor_mz.lock();
        if let Some(mz) = memo.get(title) {
            return Ok(*mz);
        }
        let mz = self.entry(title)?.get_f64()?;
        memo.insert(title.to_string(), mz);
        Ok(mz)
    }

    /// Returns the precursor retention time of the spectrum with the given
    /// title.
    pub fn precursor_rt(&self, title: &str) -> Result<f64> {
        let mut cursor = self.entry(title)?;
        cursor.skip(8)?;
        cursor.get_f64()
    }

    /// Returns the MSn level of the spectrum with the given title.
    pub fn spectrum_level(&self, title: &str) -> Result<i32> {
        let mut cursor = self.entry(title)?;
        cursor.skip(24)?;
        cursor.get_i32()
    }

    /// Returns the decompressed (m/z, intensity) pairs of the spectrum with
    /// the given title, in acquisition order.
    pub fn peaks(&self, title: &str) -> Result<Vec<(f64, f64)>> {
        let mut cursor = self.entry(title)?;
        cursor.skip(28)?;
        let compressed_len = cursor.get_len()?;
        let peak_count = cursor.get_len()?;
        let compressed = cursor.take(compressed_len)?;

        let (mz, intensity) = self.decode_peaks(compressed, peak_count)?;
        Ok(mz.into_iter().zip(intensity).collect())
    }

    fn decode_peaks(&self, compressed: &[u8], peak_count: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        if peak_count == 0 {
            return Ok((vec![], vec![]));
        }
        let raw = inflate(compressed, peak_count * 16)?;
        let mut raw = raw.as_slice();
        let mut mz = Vec::with_capacity(peak_count);
        let mut intensity = Vec::with_capacity(peak_count);
        for _ in 0..peak_count {
            mz.push(raw.get_f64());
            intensity.push(raw.get_f64());
        }
        Ok((mz, intensity))
    }

    /// Spectrum titles in insertion order.
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    /// Number of spectra in the container.
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    /// Whether the container holds no spectrum.
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Titles of the spectra acquired from the given one, empty when none
    /// were linked.
    pub fn postcursor_titles(&self, title: &str) -> &[String] {
        self.postcursors
            .get(title)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Start offsets of the logical buffers recorded by the writer.
    pub fn buffer_starts(&self) -> &[u64] {
        &self.buffer_starts
    }

    /// Smallest precursor m/z in the container.
    pub fn min_precursor_mz(&self) -> f64 {
        self.min_mz
    }

    /// Largest precursor m/z in the container.
    pub fn max_precursor_mz(&self) -> f64 {
        self.max_mz
    }

    /// Largest precursor intensity in the container.
    pub fn max_precursor_intensity(&self) -> f64 {
        self.max_intensity
    }

    /// Largest precursor retention time in the container.
    pub fn max_precursor_rt(&self) -> f64 {
        self.max_rt
    }
}

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

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{BufWriter, Seek, SeekFrom, Write},
    path::Path,
};

use bytes::BufMut;

use crate::{
    error::{Error, Result},
    format::{deflate, encode_footer_text, HEADER_LEN, MAGIC, MAX_BUFFER_BYTES, TITLE_SEPARATOR},
    spectrum::Spectrum,
};

/// Streaming writer of a `.cms` spectrum container.
///
/// Spectra are appended once each under a unique title. [`finish`] writes the
/// footer, rewrites the header with the final footer offset and precursor
/// statistics, and closes the file. A writer dropped without `finish`, or one
/// that returned an I/O error, leaves a file that no reader will accept.
///
/// [`finish`]: SpectrumWriter::finish
pub struct SpectrumWriter {
    file: BufWriter<File>,
    position: u64,
    titles: Vec<String>,
    offsets: Vec<u64>,
    index: HashMap<String, u64>,
    postcursors: Vec<(String, Vec<String>)>,
    buffer_starts: Vec<u64>,
    current_buffer_start: u64,
    min_mz: f64,
    max_mz: f64,
    max_intensity: f64,
    max_rt: f64,
}

impl SpectrumWriter {
    /// Creates the container file, truncating any existing one, and writes a
    /// placeholder header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut file = BufWriter::new(file);

        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.put_slice(&MAGIC);
        header.put_bytes(0, HEADER_LEN as usize - MAGIC.len());
        file.write_all(&header)?;

        Ok(Self {
            file,
            position: HEADER_LEN,
            titles: vec![],
            offsets: vec![],
            index: HashMap::new(),
            postcursors: vec![],
            buffer_starts: vec![HEADER_LEN],
            current_buffer_start: HEADER_LEN,
            min_mz: f64::INFINITY,
            max_mz: f64::NEG_INFINITY,
            max_intensity: f64::NEG_INFINITY,
            max_rt: f64::NEG_INFINITY,
        })
    }

    fn check_title(&self, title: &str) -> Result<()> {
        if title.is_empty() || title.contains(TITLE_SEPARATOR) {
            return Err(Error::InvalidTitle {
                title: title.to_string(),
            });
        }
        Ok(())
    }

    /// Appends one spectrum under the given title.
    ///
    /// The title must be unique within the container and free of tab
    /// characters, which delimit the footer fields.
    pub fn add(&mut self, title: &str, spectrum: &Spectrum) -> Result<()> {
        self.check_title(title)?;
        if self.index.contains_key(title) {
            return Err(Error::DuplicateTitle {
                title: title.to_string(),
            });
        }
        if spectrum.mz.len() != spectrum.intensity.len() {
            return Err(Error::PeakMismatch {
                mz: spectrum.mz.len(),
                intensity: spectrum.intensity.len(),
            });
        }

        let mut peaks = Vec::with_capacity(16 * spectrum.mz.len());
        for (mz, intensity) in spectrum.mz.iter().zip(spectrum.intensity.iter()) {
            peaks.put_f64(*mz);
            peaks.put_f64(*intensity);
        }
        let compressed = deflate(&peaks)?;
        let compressed_len = i32::try_from(compressed.len())
            .map_err(|_| Error::corrupt("compressed peak block exceeds the i32 length prefix"))?;
        let peak_count = i32::try_from(spectrum.mz.len())
            .map_err(|_| Error::corrupt("peak count exceeds the i32 length prefix"))?;
        let charge_count = i32::try_from(spectrum.precursor.charges.len())
            .map_err(|_| Error::corrupt("charge count exceeds the i32 length prefix"))?;

        let precursor = &spectrum.precursor;
        let mut entry =
            Vec::with_capacity(3 * 8 + 3 * 4 + compressed.len() + 4 * precursor.charges.len() + 4);
        entry.put_f64(precursor.mz);
        entry.put_f64(precursor.rt);
        entry.put_f64(precursor.intensity);
        entry.put_i32(spectrum.level);
        entry.put_i32(compressed_len);
        entry.put_i32(peak_count);
        entry.put_slice(&compressed);
        entry.put_i32(charge_count);
        for charge in &precursor.charges {
            entry.put_i32(*charge);
        }

        // Move the buffer boundary when this entry would outgrow the current
        // mapped region, unless the entry opens the region.
        let entry_len = entry.len() as u64;
        if self.position > self.current_buffer_start
            && self.position + entry_len - self.current_buffer_start > MAX_BUFFER_BYTES
        {
            self.buffer_starts.push(self.position);
            self.current_buffer_start = self.position;
        }

        self.file.write_all(&entry)?;

        self.titles.push(title.to_string());
        self.offsets.push(self.position);
        self.index.insert(title.to_string(), self.position);
        self.position += entry_len;

        self.min_mz = self.min_mz.min(precursor.mz);
        self.max_mz = self.max_mz.max(precursor.mz);
        self.max_intensity = self.max_intensity.max(precursor.intensity);
        self.max_rt = self.max_rt.max(precursor.rt);

        Ok(())
    }

    /// Records that `child` was acquired from `parent`, e.g. an MS3 spectrum
    /// triggered by an MS2 one. The linkage is persisted in the footer by
    /// spectrum position; both titles must have been added by the time
    /// [`finish`](Self::finish) runs.
    pub fn link_postcursor(&mut self, parent: &str, child: &str) -> Result<()> {
        self.check_title(parent)?;
        self.check_title(child)?;
        match self
            .postcursors
            .iter_mut()
            .find(|(existing, _)| existing == parent)
        {
            Some((_, children)) => children.push(child.to_string()),
            None => self
                .postcursors
                .push((parent.to_string(), vec![child.to_string()])),
        }
        Ok(())
    }

    fn resolve_postcursors(&self) -> Result<Vec<(usize, Vec<usize>)>> {
        let positions: HashMap<&str, usize> = self
            .titles
            .iter()
            .enumerate()
            .map(|(position, title)| (title.as_str(), position))
            .collect();
        let position_of = |title: &str| {
            positions.get(title).copied().ok_or_else(|| Error::NotFound {
                title: title.to_string(),
            })
        };

        self.postcursors
            .iter()
            .map(|(parent, children)| {
                let children = children
                    .iter()
                    .map(|child| position_of(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok((position_of(parent)?, children))
            })
            .collect()
    }

    /// Number of spectra appended so far.
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    /// Whether no spectrum has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Writes the footer, rewrites the header and syncs the file.
    pub fn finish(mut self) -> Result<()> {
        let footer_offset = self.position;

        let postcursors = self.resolve_postcursors()?;
        let text = encode_footer_text(
            &self.titles,
            &self.offsets,
            &postcursors,
            &self.buffer_starts,
        );
        let compressed = deflate(text.as_bytes())?;
        let compressed_len = i32::try_from(compressed.len())
            .map_err(|_| Error::corrupt("compressed footer exceeds the i32 length prefix"))?;
        let uncompressed_len = i32::try_from(text.len())
            .map_err(|_| Error::corrupt("footer text exceeds the i32 length prefix"))?;

        let mut footer = Vec::with_capacity(8 + compressed.len());
        footer.put_i32(compressed_len);
        footer.put_i32(uncompressed_len);
        footer.put_slice(&compressed);
        self.file.write_all(&footer)?;

        let empty = self.titles.is_empty();
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.put_slice(&MAGIC);
        header.put_i64(footer_offset as i64);
        header.put_f64(if empty { 0.0 } else { self.min_mz });
        header.put_f64(if empty { 0.0 } else { self.max_mz });
        header.put_f64(if empty { 0.0 } else { self.max_intensity });
        header.put_f64(if empty { 0.0 } else { self.max_rt });

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;

        tracing::debug!(
            spectra = self.titles.len(),
            footer_offset,
            buffers = self.buffer_starts.len(),
            "finalized spectrum container"
        );

        Ok(())
    }
}

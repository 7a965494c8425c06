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

use std::{fs::OpenOptions, io::Write, path::PathBuf};

use promics_cms::{Error, Precursor, Spectrum, SpectrumReader, SpectrumWriter};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::TempDir;

fn container_path(dir: &TempDir) -> PathBuf {
    dir.path().join("run.cms")
}

fn random_spectrum(rng: &mut StdRng, peak_count: usize) -> Spectrum {
    let mz: Vec<f64> = (0..peak_count).map(|_| rng.random_range(100.0..2000.0)).collect();
    let intensity: Vec<f64> = (0..peak_count).map(|_| rng.random_range(0.0..1e6)).collect();
    let charges: Vec<i32> = (0..rng.random_range(0..4)).map(|_| rng.random_range(1..5)).collect();
    let precursor = Precursor::new(
        rng.random_range(0.0..3600.0),
        rng.random_range(100.0..2000.0),
        rng.random_range(0.0..1e7),
        charges,
    );
    Spectrum::new(precursor, mz, intensity, 2)
}

#[test_log::test]
fn test_round_trip_randomized_spectra() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);
    let mut rng = StdRng::seed_from_u64(42);

    let peak_counts = [0usize, 1, 7, 128, 1000, 10_000];
    let spectra: Vec<(String, Spectrum)> = peak_counts
        .iter()
        .enumerate()
        .map(|(i, n)| (format!("scan={i}"), random_spectrum(&mut rng, *n)))
        .collect();

    let mut writer = SpectrumWriter::create(&path).unwrap();
    for (title, spectrum) in &spectra {
        writer.add(title, spectrum).unwrap();
    }
    writer.finish().unwrap();

    let reader = SpectrumReader::open(&path).unwrap();
    assert_eq!(reader.len(), spectra.len());
    for (title, spectrum) in &spectra {
        assert_eq!(&reader.spectrum(title).unwrap(), spectrum);
    }
}

#[test_log::test]
fn test_empty_and_dense_peak_lists() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    // "C" gets deliberately unsorted masses so reader-side reordering would
    // show up.
    let c_mz: Vec<f64> = (0..100).map(|i| 2000.0 - (i as f64) * 3.5).collect();
    let c_intensity: Vec<f64> = (0..100).map(|i| (i as f64) * 11.0 + 1.0).collect();

    let a = Spectrum::new(
        Precursor::new(10.0, 445.12, 1e4, vec![2]),
        vec![100.0, 200.0, 300.0, 400.0, 500.0],
        vec![1.0, 2.0, 3.0, 4.0, 5.0],
        2,
    );
    let b = Spectrum::new(Precursor::new(20.0, 612.33, 2e4, vec![3]), vec![], vec![], 2);
    let c = Spectrum::new(
        Precursor::new(30.0, 801.99, 3e4, vec![2, 3]),
        c_mz.clone(),
        c_intensity.clone(),
        2,
    );

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer.add("A", &a).unwrap();
    writer.add("B", &b).unwrap();
    writer.add("C", &c).unwrap();
    writer.finish().unwrap();

    let reader = SpectrumReader::open(&path).unwrap();

    assert_eq!(reader.peaks("A").unwrap().len(), 5);
    assert_eq!(reader.peaks("B").unwrap(), vec![]);

    let peaks = reader.peaks("C").unwrap();
    assert_eq!(peaks.len(), 100);
    for (i, (mz, intensity)) in peaks.iter().enumerate() {
        assert_eq!(*mz, c_mz[i]);
        assert_eq!(*intensity, c_intensity[i]);
    }

    assert_eq!(reader.titles(), ["A", "B", "C"]);
}

#[test_log::test]
fn test_corrupted_magic_number_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer
        .add("A", &Spectrum::new(Precursor::new(1.0, 2.0, 3.0, vec![]), vec![], vec![], 2))
        .unwrap();
    writer.finish().unwrap();

    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.write_all(b"XXXX").unwrap();
    drop(file);

    assert!(matches!(
        SpectrumReader::open(&path),
        Err(Error::UnsupportedFormat)
    ));
}

#[test_log::test]
fn test_corrupted_footer_offset_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer
        .add("A", &Spectrum::new(Precursor::new(1.0, 2.0, 3.0, vec![]), vec![], vec![], 2))
        .unwrap();
    writer.finish().unwrap();

    // overwrite the footer offset, offset 8, with an out-of-range value
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    use std::io::Seek;
    file.seek(std::io::SeekFrom::Start(8)).unwrap();
    file.write_all(&i64::MAX.to_be_bytes()).unwrap();
    drop(file);

    assert!(matches!(
        SpectrumReader::open(&path),
        Err(Error::Corrupt { .. })
    ));
}

#[test_log::test]
fn test_unknown_title_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer
        .add("A", &Spectrum::new(Precursor::new(1.0, 2.0, 3.0, vec![]), vec![], vec![], 2))
        .unwrap();
    writer.finish().unwrap();

    let reader = SpectrumReader::open(&path).unwrap();
    assert!(matches!(
        reader.spectrum("missing"),
        Err(Error::NotFound { title }) if title == "missing"
    ));
}

#[test_log::test]
fn test_precursor_getters_agree_with_full_decode() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);
    let mut rng = StdRng::seed_from_u64(7);

    let spectrum = random_spectrum(&mut rng, 50);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer.add("A", &spectrum).unwrap();
    writer.finish().unwrap();

    let reader = SpectrumReader::open(&path).unwrap();
    let full = reader.spectrum("A").unwrap();

    assert_eq!(reader.precursor("A").unwrap(), full.precursor);
    assert_eq!(reader.precursor_mz("A").unwrap(), full.precursor.mz);
    // second call is served from the memo map
    assert_eq!(reader.precursor_mz("A").unwrap(), full.precursor.mz);
    assert_eq!(reader.precursor_rt("A").unwrap(), full.precursor.rt);
    assert_eq!(reader.spectrum_level("A").unwrap(), full.level);
}

#[test_log::test]
fn test_postcursor_linkage_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    let ms2 = Spectrum::new(Precursor::new(1.0, 500.0, 1e4, vec![2]), vec![], vec![], 2);
    let ms3 = Spectrum::new(Precursor::new(1.5, 300.0, 1e3, vec![1]), vec![], vec![], 3);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer.add("parent", &ms2).unwrap();
    writer.add("child1", &ms3).unwrap();
    writer.add("child2", &ms3).unwrap();
    writer.link_postcursor("parent", "child1").unwrap();
    writer.link_postcursor("parent", "child2").unwrap();
    writer.finish().unwrap();

    let reader = SpectrumReader::open(&path).unwrap();
    assert_eq!(reader.postcursor_titles("parent"), ["child1", "child2"]);
    assert!(reader.postcursor_titles("child1").is_empty());
    assert!(reader.postcursor_titles("unknown").is_empty());
}

#[test_log::test]
fn test_linkage_with_delimiter_heavy_titles() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    // Vendor titles routinely carry spaces, braces and hash marks; none of
    // that syntax may leak into the linkage encoding.
    let parent = "File: run.raw {scan 12}";
    let child = "frag # 1";

    let ms2 = Spectrum::new(Precursor::new(1.0, 500.0, 1e4, vec![2]), vec![], vec![], 2);
    let ms3 = Spectrum::new(Precursor::new(1.5, 300.0, 1e3, vec![1]), vec![], vec![], 3);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer.add(parent, &ms2).unwrap();
    writer.add(child, &ms3).unwrap();
    writer.link_postcursor(parent, child).unwrap();
    writer.finish().unwrap();

    let reader = SpectrumReader::open(&path).unwrap();
    assert_eq!(reader.postcursor_titles(parent), [child]);
    assert_eq!(reader.spectrum(child).unwrap(), ms3);
}

#[test_log::test]
fn test_linking_an_absent_title_fails_finish() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    let ms2 = Spectrum::new(Precursor::new(1.0, 500.0, 1e4, vec![2]), vec![], vec![], 2);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer.add("parent", &ms2).unwrap();
    writer.link_postcursor("parent", "never added").unwrap();

    assert!(matches!(
        writer.finish(),
        Err(Error::NotFound { title }) if title == "never added"
    ));
}

#[test_log::test]
fn test_precursor_statistics_cover_all_entries() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    writer
        .add("low", &Spectrum::new(Precursor::new(5.0, 400.0, 1e3, vec![]), vec![], vec![], 2))
        .unwrap();
    writer
        .add("high", &Spectrum::new(Precursor::new(90.0, 1800.0, 5e6, vec![]), vec![], vec![], 2))
        .unwrap();
    writer.finish().unwrap();

    let reader = SpectrumReader::open(&path).unwrap();
    assert_eq!(reader.min_precursor_mz(), 400.0);
    assert_eq!(reader.max_precursor_mz(), 1800.0);
    assert_eq!(reader.max_precursor_intensity(), 5e6);
    assert_eq!(reader.max_precursor_rt(), 90.0);
    assert_eq!(reader.buffer_starts(), [promics_cms::HEADER_LEN]);
}

#[test_log::test]
fn test_titles_with_tabs_and_duplicates_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    let spectrum = Spectrum::new(Precursor::new(1.0, 2.0, 3.0, vec![]), vec![], vec![], 2);

    let mut writer = SpectrumWriter::create(&path).unwrap();
    assert!(matches!(
        writer.add("a\tb", &spectrum),
        Err(Error::InvalidTitle { .. })
    ));
    assert!(matches!(writer.add("", &spectrum), Err(Error::InvalidTitle { .. })));

    writer.add("A", &spectrum).unwrap();
    assert!(matches!(
        writer.add("A", &spectrum),
        Err(Error::DuplicateTitle { .. })
    ));

    // the rejected calls must not have left entries behind
    writer.finish().unwrap();
    let reader = SpectrumReader::open(&path).unwrap();
    assert_eq!(reader.titles(), ["A"]);
}

#[test_log::test]
fn test_mismatched_peak_arrays_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = container_path(&dir);

    let broken = Spectrum {
        precursor: Precursor::new(1.0, 2.0, 3.0, vec![]),
        mz: vec![100.0, 200.0],
        intensity: vec![1.0],
        level: 2,
    };

    let mut writer = SpectrumWriter::create(&path).unwrap();
    assert!(matches!(
        writer.add("A", &broken),
        Err(Error::PeakMismatch { mz: 2, intensity: 1 })
    ));
}

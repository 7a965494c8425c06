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

//! End-to-end pass over the toolkit: spectra land in a container file, their
//! identifications land in the object store, and both survive reopening.

use promics::{
    key_for, ObjectKey, ObjectStore, Precursor, Spectrum, SpectrumReader, SpectrumWriter,
    StoreObject, StoreOptions,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SpectrumMatch {
    id: ObjectKey,
    first_level: bool,
    spectrum_title: String,
    peptide: String,
    score: f64,
}

impl StoreObject for SpectrumMatch {
    fn id(&self) -> ObjectKey {
        self.id
    }

    fn set_id(&mut self, id: ObjectKey) {
        self.id = id;
    }

    fn first_level(&self) -> bool {
        self.first_level
    }

    fn set_first_level(&mut self, first_level: bool) {
        self.first_level = first_level;
    }

    fn type_name(&self) -> &'static str {
        "SpectrumMatch"
    }
}

#[test_log::test]
fn test_container_and_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let cms_path = dir.path().join("run.cms");
    let db_path = dir.path().join("matches.psdb");

    let titles: Vec<String> = (0..10).map(|i| format!("scan={i}")).collect();

    let mut writer = SpectrumWriter::create(&cms_path).unwrap();
    for (i, title) in titles.iter().enumerate() {
        let spectrum = Spectrum::new(
            Precursor::new(i as f64, 400.0 + i as f64, 1e4, vec![2]),
            vec![100.0, 200.0, 300.0],
            vec![1.0, 2.0, 3.0],
            2,
        );
        writer.add(title, &spectrum).unwrap();
    }
    writer.finish().unwrap();

    let store: ObjectStore<SpectrumMatch> =
        ObjectStore::open(&db_path, StoreOptions::default()).unwrap();
    for title in &titles {
        let m = SpectrumMatch {
            id: 0,
            first_level: false,
            spectrum_title: title.clone(),
            peptide: "PEPTIDER".to_string(),
            score: 0.95,
        };
        store.insert_object(key_for(title), m).unwrap();
    }
    store.close(false).unwrap();

    let reader = SpectrumReader::open(&cms_path).unwrap();
    let store: ObjectStore<SpectrumMatch> =
        ObjectStore::open(&db_path, StoreOptions::default()).unwrap();
    store.establish_connection(true).unwrap();

    for title in &titles {
        let spectrum = reader.spectrum(title).unwrap();
        assert_eq!(spectrum.peak_count(), 3);

        let m = store.retrieve_object(key_for(title)).unwrap().unwrap();
        assert_eq!(&m.spectrum_title, title);
    }
    assert_eq!(store.count_by_class("SpectrumMatch"), 10);
}

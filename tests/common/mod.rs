#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

use adm_datamart::frame::DataFrame;
use adm_datamart::ingest;
use adm_datamart::io_utils::DEFAULT_CSV_DELIMITER;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Writes `contents` as a CSV file and reads it back through ingestion,
/// inferring column types the way the pipeline would.
pub fn frame_from_csv(workspace: &TestWorkspace, name: &str, contents: &str) -> DataFrame {
    let path = workspace.write(name, contents);
    ingest::read_frame(&path, DEFAULT_CSV_DELIMITER, encoding_rs::UTF_8).expect("read frame")
}

/// A small model export: two models, two snapshots for the first.
pub fn model_csv() -> &'static str {
    "pyModelID,pyPositives,pyResponseCount,pySnapshotTime,pyName,pyChannel\n\
     m1,5,20,20240506T143000.000 GMT,OfferA,Web\n\
     m1,10,40,20240507T143000.000 GMT,OfferA,Web\n\
     m2,0,0,20240506T143000.000 GMT,OfferB,Mobile\n"
}

/// A predictor export without BinResponseCount so derivation kicks in.
pub fn predictor_csv() -> &'static str {
    "pyModelID,pyPredictorName,pyBinIndex,pyBinPositives,pyBinNegatives,pySnapshotTime\n\
     m1,Customer.Age,1,3,7,20240506T143000.000 GMT\n\
     m1,Customer.Age,2,2,8,20240506T143000.000 GMT\n\
     m1,Clicks,1,1,9,20240506T143000.000 GMT\n\
     m3,Customer.Age,1,4,6,20240506T143000.000 GMT\n"
}

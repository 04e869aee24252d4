use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use data_encoding::HEXLOWER;

/// Create a fresh scratch directory under ./target/results/
pub fn setup() -> PathBuf {
    let results_dir_path = temp_file_name("./target/results/");
    fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
        panic!("Failed to create results directory: {:?}", results_dir_path)
    );
    results_dir_path
}

#[allow(dead_code)]
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

#[allow(dead_code)]
pub fn count_files(dir: &PathBuf) -> Result<usize, anyhow::Error> {
    Ok(fs::read_dir(dir)?.count())
}

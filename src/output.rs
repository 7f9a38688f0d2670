// src/output.rs
use crate::mc::mc_engine::SampleOutputs;
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// One row per path: `path_id,s_bar[,s_t]`
pub fn write_sample_to_csv(filename: &str, sample: &SampleOutputs) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    match &sample.terminal {
        Some(terminal) => {
            writeln!(file, "path_id,s_bar,s_t")?;
            for (i, (s_bar, s_t)) in sample.averaged.iter().zip(terminal).enumerate() {
                writeln!(file, "{},{},{}", i, s_bar, s_t)?;
            }
        }
        None => {
            writeln!(file, "path_id,s_bar")?;
            for (i, s_bar) in sample.averaged.iter().enumerate() {
                writeln!(file, "{},{}", i, s_bar)?;
            }
        }
    }
    file.flush()
}

pub fn write_summary_to_csv(filename: &str, summary_data: &[(&str, String)]) -> io::Result<()> {
    let mut file = File::create(filename)?;
    for (key, value) in summary_data {
        writeln!(file, "{},{}", key, value)?;
    }
    Ok(())
}

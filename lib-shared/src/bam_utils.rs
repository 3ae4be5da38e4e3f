use std::path::Path;

use rust_htslib::bam::{self, Read};

mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {}
}

pub use self::errors::*;

/// Number of records inspected by `is_paired()` by default.
pub const PAIRED_PROBE_RECORDS: usize = 1000;

/// Check whether the BAM file at `path` holds paired-end reads.
///
/// Only the first `max_records` records are looked at; the file counts as paired if any of
/// them has the paired flag set.
pub fn is_paired<P: AsRef<Path>>(path: P, max_records: usize) -> Result<bool> {
    let path = path.as_ref();
    let mut reader = bam::Reader::from_path(path)
        .chain_err(|| format!("Could not open BAM file {}", path.display()))?;

    let mut record = bam::Record::new();
    let mut seen = 0;
    while seen < max_records {
        match reader.read(&mut record) {
            Some(Ok(())) => {
                if record.is_paired() {
                    return Ok(true);
                }
                seen += 1;
            }
            Some(Err(e)) => {
                return Err(e).chain_err(|| format!("Problem reading {}", path.display()))
            }
            None => break,
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rust_htslib::bam::header::HeaderRecord;
    use tempdir::TempDir;

    /// Write a BAM file with `count` unmapped reads carrying `flags`.
    fn write_bam(path: &Path, flags: u16, count: usize) {
        let mut header = bam::Header::new();
        header.push_record(
            HeaderRecord::new(b"SQ")
                .push_tag(b"SN", &"chr1")
                .push_tag(b"LN", &1000),
        );
        let mut writer = bam::Writer::from_path(path, &header, bam::Format::Bam).unwrap();
        for i in 0..count {
            let mut record = bam::Record::new();
            let name = format!("read{}", i);
            record.set(name.as_bytes(), None, b"ACGT", &[30, 30, 30, 30]);
            record.set_tid(-1);
            record.set_pos(-1);
            record.set_mtid(-1);
            record.set_mpos(-1);
            record.set_flags(flags | 0x4);
            writer.write(&record).unwrap();
        }
    }

    #[test]
    fn test_is_paired() {
        let tmp_dir = TempDir::new("mrnaseq_bam").unwrap();

        let paired = tmp_dir.path().join("paired.bam");
        write_bam(&paired, 0x1 | 0x8 | 0x40, 3);
        assert!(is_paired(&paired, PAIRED_PROBE_RECORDS).unwrap());

        let single = tmp_dir.path().join("single.bam");
        write_bam(&single, 0, 3);
        assert!(!is_paired(&single, PAIRED_PROBE_RECORDS).unwrap());

        let empty = tmp_dir.path().join("empty.bam");
        write_bam(&empty, 0, 0);
        assert!(!is_paired(&empty, PAIRED_PROBE_RECORDS).unwrap());
    }

    #[test]
    fn test_is_paired_limits_records() {
        let tmp_dir = TempDir::new("mrnaseq_bam").unwrap();
        let path = tmp_dir.path().join("paired.bam");
        write_bam(&path, 0x1 | 0x8 | 0x40, 2);

        assert!(!is_paired(&path, 0).unwrap());
        assert!(is_paired(&path, 1).unwrap());
    }

    #[test]
    fn test_is_paired_missing_file() {
        let tmp_dir = TempDir::new("mrnaseq_bam").unwrap();
        assert!(is_paired(tmp_dir.path().join("missing.bam"), PAIRED_PROBE_RECORDS).is_err());
    }
}

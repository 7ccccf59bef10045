use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use tracing::{debug, warn};

use crate::domain::{CHROMOSOMES, Snp};
use crate::error::IndexError;
use crate::relation::{Multimap, MultimapBuilder};

pub const DELIMITER: char = ' ';
pub const BASE_PAIR_COLUMN: usize = 1;
pub const RSID_COLUMN: usize = 2;
pub const SWISSPROT_COLUMN: usize = 5;
/// Placeholder accession in tables for variants without a protein.
pub const NO_ACCESSION: &str = "NA";

/// Relations read from one chromosome's table, possibly partial.
#[derive(Debug)]
pub struct ChromosomeScan {
    pub chromosome: u8,
    pub rs_ids_to_proteins: Multimap<String, String>,
    pub positions_to_proteins: Multimap<i64, String>,
    pub lines_read: usize,
    pub lines_skipped: usize,
    /// Set when reading stopped early; the relations hold what was read before.
    pub error: Option<IndexError>,
}

impl ChromosomeScan {
    pub fn rs_ids_artifact(&self) -> String {
        rs_ids_artifact(self.chromosome)
    }

    pub fn positions_artifact(&self) -> String {
        positions_artifact(self.chromosome)
    }
}

pub fn rs_ids_artifact(chromosome: u8) -> String {
    format!("rsIdsToProteins{chromosome}")
}

pub fn positions_artifact(chromosome: u8) -> String {
    format!("chrBpToProteins{chromosome}")
}

pub fn table_path(dir: &Utf8Path, chromosome: u8) -> Utf8PathBuf {
    dir.join(format!("{chromosome}.gz"))
}

/// Accumulates one chromosome's relations line by line.
pub struct VariantScanner<'a, F>
where
    F: Fn(&str) -> bool,
{
    chromosome: u8,
    is_known: &'a F,
    rs_ids: MultimapBuilder<String, String>,
    positions: MultimapBuilder<i64, String>,
}

impl<'a, F> VariantScanner<'a, F>
where
    F: Fn(&str) -> bool,
{
    pub fn new(chromosome: u8, is_known: &'a F) -> Self {
        Self {
            chromosome,
            is_known,
            rs_ids: MultimapBuilder::new(),
            positions: MultimapBuilder::new(),
        }
    }

    /// Applies one data line: every (rsID, accession) pair whose accession is
    /// known is recorded under both the rsID and the position.
    pub fn scan_line(&mut self, line: &str) -> Result<(), IndexError> {
        let fields: Vec<&str> = line.split(DELIMITER).collect();
        if fields.len() <= SWISSPROT_COLUMN {
            return Err(self.invalid(line));
        }
        let base_pair = fields[BASE_PAIR_COLUMN]
            .parse::<i64>()
            .map_err(|_| self.invalid(line))?;

        let accessions: Vec<&str> = fields[SWISSPROT_COLUMN]
            .split(',')
            .map(str::trim)
            .filter(|accession| {
                !accession.is_empty() && *accession != NO_ACCESSION && (self.is_known)(*accession)
            })
            .collect();
        if accessions.is_empty() {
            return Ok(());
        }

        for rs_id in fields[RSID_COLUMN].split(',').map(str::trim) {
            if rs_id.is_empty() {
                continue;
            }
            let snp = Snp::new(self.chromosome, base_pair, rs_id);
            for accession in &accessions {
                self.rs_ids.insert(snp.rs_id.clone(), accession.to_string());
                self.positions.insert(snp.base_pair, accession.to_string());
            }
        }
        Ok(())
    }

    fn invalid(&self, line: &str) -> IndexError {
        IndexError::InvalidVariantLine {
            chromosome: self.chromosome,
            line: line.to_string(),
        }
    }

    pub fn finish(self) -> (Multimap<String, String>, Multimap<i64, String>) {
        (self.rs_ids.build(), self.positions.build())
    }
}

/// Reads `<dir>/<chromosome>.gz`. The header line is skipped, malformed lines
/// (including ones that are not UTF-8) are logged and skipped, and an open,
/// read or decompression failure stops the scan while keeping everything
/// accumulated so far.
pub fn scan_chromosome<F>(dir: &Utf8Path, chromosome: u8, is_known: &F) -> ChromosomeScan
where
    F: Fn(&str) -> bool,
{
    let path = table_path(dir, chromosome);
    let mut scanner = VariantScanner::new(chromosome, is_known);
    let mut lines_read = 0usize;
    let mut lines_skipped = 0usize;

    let error = match File::open(path.as_std_path()) {
        Err(err) => Some(IndexError::VariantTableRead {
            chromosome,
            message: format!("open {path}: {err}"),
        }),
        Ok(file) => {
            let mut reader = BufReader::new(GzDecoder::new(file));
            let mut buf = Vec::new();
            let mut line_number = 0usize;
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break None,
                    Ok(_) => {}
                    Err(err) => {
                        break Some(IndexError::VariantTableRead {
                            chromosome,
                            message: format!("{path} line {}: {err}", line_number + 1),
                        });
                    }
                }
                line_number += 1;
                let raw = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                if line_number == 1 || raw.trim_ascii().is_empty() {
                    continue;
                }
                lines_read += 1;
                let scanned = match std::str::from_utf8(raw) {
                    Ok(line) => scanner.scan_line(line),
                    Err(_) => Err(IndexError::InvalidVariantLine {
                        chromosome,
                        line: String::from_utf8_lossy(raw).into_owned(),
                    }),
                };
                if let Err(err) = scanned {
                    debug!("{err}");
                    lines_skipped += 1;
                }
            }
        }
    };

    if let Some(err) = &error {
        warn!(chromosome, "{err}");
    }
    if lines_skipped > 0 {
        warn!(chromosome, lines_skipped, "skipped malformed variant lines");
    }

    let (rs_ids_to_proteins, positions_to_proteins) = scanner.finish();
    ChromosomeScan {
        chromosome,
        rs_ids_to_proteins,
        positions_to_proteins,
        lines_read,
        lines_skipped,
        error,
    }
}

/// Scans chromosomes 1 to 22 in order. Always returns one scan per chromosome.
pub fn scan_all<F>(dir: &Utf8Path, is_known: &F) -> Vec<ChromosomeScan>
where
    F: Fn(&str) -> bool,
{
    CHROMOSOMES
        .map(|chromosome| scan_chromosome(dir, chromosome, is_known))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn known(accession: &str) -> bool {
        accession == "P1"
    }

    #[test]
    fn na_and_unknown_accessions_are_dropped() {
        let mut scanner = VariantScanner::new(1, &known);
        scanner
            .scan_line("1 12345 rs1,rs2 A G P1,NA,P2")
            .unwrap();
        let (rs_ids, positions) = scanner.finish();

        let pairs: Vec<_> = rs_ids
            .pairs()
            .map(|(rs, protein)| (rs.as_str(), protein.as_str()))
            .collect();
        assert_eq!(pairs, vec![("rs1", "P1"), ("rs2", "P1")]);
        let at_position: Vec<_> = positions.get(&12345).unwrap().iter().cloned().collect();
        assert_eq!(at_position, vec!["P1"]);
    }

    #[test]
    fn short_line_is_rejected() {
        let mut scanner = VariantScanner::new(3, &known);
        let err = scanner.scan_line("3 100 rs9 A G").unwrap_err();
        assert_matches!(err, IndexError::InvalidVariantLine { chromosome: 3, .. });
    }

    #[test]
    fn non_numeric_position_is_rejected() {
        let mut scanner = VariantScanner::new(3, &known);
        assert!(scanner.scan_line("3 abc rs9 A G P1").is_err());
    }

    #[test]
    fn header_is_skipped_and_missing_file_reports_error() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let file = File::create(table_path(&dir, 2).as_std_path()).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        writeln!(encoder, "Chr Bp Id Ref Alt Swissprot").unwrap();
        writeln!(encoder, "2 500 rs7 C T P1").unwrap();
        writeln!(encoder, "broken").unwrap();
        encoder.finish().unwrap();

        let scan = scan_chromosome(&dir, 2, &known);
        assert!(scan.error.is_none());
        assert_eq!(scan.lines_read, 2);
        assert_eq!(scan.lines_skipped, 1);
        assert!(scan.rs_ids_to_proteins.contains_key("rs7"));

        let missing = scan_chromosome(&dir, 5, &known);
        assert_matches!(missing.error, Some(IndexError::VariantTableRead { chromosome: 5, .. }));
        assert!(missing.rs_ids_to_proteins.is_empty());
    }

    fn write_table(dir: &Utf8Path, chromosome: u8, body: &[u8]) {
        let file = File::create(table_path(dir, chromosome).as_std_path()).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(body).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn line_that_is_not_utf8_is_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        write_table(
            &dir,
            1,
            b"Chr Bp Id Ref Alt Swissprot\n1 100 rs1 A G P1\n1 150 rs\xff A G P1\r\n1 200 rs2 A G P1\n",
        );

        let scan = scan_chromosome(&dir, 1, &known);
        assert!(scan.error.is_none());
        assert_eq!(scan.lines_read, 3);
        assert_eq!(scan.lines_skipped, 1);
        assert!(scan.rs_ids_to_proteins.contains_key("rs1"));
        assert!(scan.rs_ids_to_proteins.contains_key("rs2"));
        assert!(scan.positions_to_proteins.contains_key(&200));
    }

    #[test]
    fn truncated_table_keeps_lines_read_before_the_cut() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mut body = String::from("Chr Bp Id Ref Alt Swissprot\n");
        for position in 0..20_000 {
            body.push_str(&format!("4 {position} rs{position} A G P1\n"));
        }
        write_table(&dir, 4, body.as_bytes());

        let path = table_path(&dir, 4);
        let compressed = std::fs::read(path.as_std_path()).unwrap();
        std::fs::write(path.as_std_path(), &compressed[..compressed.len() / 2]).unwrap();

        let scan = scan_chromosome(&dir, 4, &known);
        assert_matches!(scan.error, Some(IndexError::VariantTableRead { chromosome: 4, .. }));
        assert!(scan.rs_ids_to_proteins.contains_key("rs0"));
        assert!(!scan.rs_ids_to_proteins.contains_key("rs19999"));
        assert!(scan.lines_read > 1);
    }
}

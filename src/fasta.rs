//! Very thin Fasta reader. Only support batch IO.
//!
//! Training and test files interleave two kinds of records: a record whose id contains
//! `sequence` carries residues, and the record right after it carries the DSSP string
//! of the same chain.
use crate::alphabet::Label;
use crate::error::{Error, Result};
use std::io::{BufRead, BufReader};
use std::io::{BufWriter, Write};
pub type FASTARecord = (String, Vec<u8>);

/// Marker in the id of a residue record.
pub const SEQUENCE_MARKER: &str = "sequence";

/// A chain with its secondary structure, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub id: String,
    /// Upper case residues.
    pub seq: Vec<u8>,
    pub labels: Option<Vec<Label>>,
}

/// Write records into the writer
pub fn write_fasta<W: Write>(
    wtr: &mut BufWriter<W>,
    records: &[FASTARecord],
) -> std::io::Result<()> {
    for (id, seq) in records {
        writeln!(wtr, ">{}\n{}", id, String::from_utf8_lossy(seq))?;
    }
    Ok(())
}

/// Read file or stdin, return parsed fasta files.
/// Malformed records are skipped.
pub fn read_fasta<P: AsRef<std::path::Path>>(
    file: &Option<P>,
) -> std::io::Result<Vec<FASTARecord>> {
    let stdin = std::io::stdin();
    let mut reader: Box<dyn BufRead> = match file {
        Some(file) => std::fs::File::open(file)
            .map(BufReader::new)
            .map(Box::new)?,
        None => {
            let lock = stdin.lock();
            Box::new(BufReader::new(lock))
        }
    };
    let mut contents = vec![];
    reader.read_to_end(&mut contents)?;
    Ok(parse_fasta(&contents))
}

fn parse_fasta(contents: &[u8]) -> Vec<FASTARecord> {
    contents
        .split(|&x| x == b'>')
        .skip(1)
        .filter_map(|record| {
            let mut record = record.splitn(2, |&x| x == b'\n');
            let id = record.next()?.split(|&x| x == b' ').next()?;
            let id = id.strip_suffix(b"\r").unwrap_or(id);
            let contents = record.next()?;
            let contents: Vec<_> = contents
                .iter()
                .filter(|x| !x.is_ascii_whitespace())
                .copied()
                .collect();
            Some((String::from_utf8_lossy(id).to_string(), contents))
        })
        .collect()
}

/// Pair each residue record with the structure record following it.
/// A residue record immediately followed by another residue record (or by the end of input)
/// has no labels. A chain containing the unknown residue `X` is dropped together with its
/// structure record.
pub fn pair_records(records: &[FASTARecord]) -> Result<Vec<LabeledRecord>> {
    let mut paired = vec![];
    let mut dropped = 0;
    let mut records = records.iter().peekable();
    while let Some((id, seq)) = records.next() {
        if !id.contains(SEQUENCE_MARKER) {
            let msg = format!("structure record {} without residue record", id);
            return Err(Error::Malformed(msg));
        }
        let seq = seq.to_ascii_uppercase();
        let labels = match records.next_if(|(id, _)| !id.contains(SEQUENCE_MARKER)) {
            Some((_, structure)) => {
                let labels = crate::alphabet::parse_structure(structure)?;
                if labels.len() != seq.len() {
                    let msg = format!(
                        "{} has {} residues but {} structure codes",
                        id,
                        seq.len(),
                        labels.len()
                    );
                    return Err(Error::Malformed(msg));
                }
                Some(labels)
            }
            None => None,
        };
        if seq.contains(&b'X') {
            dropped += 1;
            continue;
        }
        paired.push(LabeledRecord {
            id: id.clone(),
            seq,
            labels,
        });
    }
    if 0 < dropped {
        debug!("Dropped {} chains with unknown residues", dropped);
    }
    Ok(paired)
}

/// Split into residue strings and label strings, keeping only the labelled chains.
pub fn training_pairs(records: &[LabeledRecord]) -> (Vec<Vec<u8>>, Vec<Vec<Label>>) {
    records
        .iter()
        .filter_map(|r| r.labels.as_ref().map(|labels| (r.seq.clone(), labels.clone())))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use Label::*;
    const INPUT: &[u8] = b">101M:A:sequence\nmvlsegewql\nvlhvwakvea\n>101M:A:secstr\nHHHHHHHHHH\nEEEEETTSNB\n>102L:A:sequence\nMNIXE\n>102L:A:secstr\nHHHHH\n>103L:A:sequence\nMKS\n";
    #[test]
    fn parse() {
        let records = parse_fasta(INPUT);
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].0, "101M:A:sequence");
        assert_eq!(records[0].1, b"mvlsegewqlvlhvwakvea".to_vec());
        assert_eq!(records[4].1, b"MKS".to_vec());
        let crlf = parse_fasta(b">a b\r\nAC\r\nDE\r\n");
        assert_eq!(crlf, vec![("a".to_string(), b"ACDE".to_vec())]);
    }
    #[test]
    fn pair() {
        let records = pair_records(&parse_fasta(INPUT)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, b"MVLSEGEWQLVLHVWAKVEA".to_vec());
        let labels = records[0].labels.as_ref().unwrap();
        assert_eq!(labels.len(), 20);
        assert_eq!(labels[..10], [A; 10]);
        assert_eq!(labels[10..], [B, B, B, B, B, O, O, O, O, B]);
        assert_eq!(records[1].id, "103L:A:sequence");
        assert_eq!(records[1].labels, None);
        let (seqs, labels) = training_pairs(&records);
        assert_eq!(seqs.len(), 1);
        assert_eq!(labels.len(), 1);
    }
    #[test]
    fn pair_errors() {
        let orphan = vec![("1:secstr".to_string(), b"HH".to_vec())];
        assert!(pair_records(&orphan).is_err());
        let short = vec![
            ("1:sequence".to_string(), b"MKS".to_vec()),
            ("1:secstr".to_string(), b"HH".to_vec()),
        ];
        assert!(pair_records(&short).is_err());
        let unknown = vec![
            ("1:sequence".to_string(), b"MKS".to_vec()),
            ("1:secstr".to_string(), b"HHZ".to_vec()),
        ];
        assert!(pair_records(&unknown).is_err());
    }
    #[test]
    fn write_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.fa");
        let records = vec![("x:sequence".to_string(), b"MKS".to_vec())];
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut wtr = BufWriter::new(file);
            write_fasta(&mut wtr, &records).unwrap();
        }
        assert_eq!(read_fasta(&Some(&path)).unwrap(), records);
    }
}

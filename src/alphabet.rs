//! Fixed alphabets: twenty amino acids as emission symbols, and three coarse
//! structural labels as state labels.
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of emission symbols.
pub const NUM_SYMBOLS: usize = 20;
/// The amino acids in index order.
pub const AMINO_ACIDS: &[u8; NUM_SYMBOLS] = b"ACDEFGHIKLMNPQRSTVWY";
// Slot value for anything outside the alphabet.
const NULL: u8 = 0xFF;

const fn lookup_table() -> [u8; 256] {
    let mut slots = [NULL; 256];
    let mut i = 0;
    while i < NUM_SYMBOLS {
        let aa = AMINO_ACIDS[i];
        slots[aa as usize] = i as u8;
        slots[aa.to_ascii_lowercase() as usize] = i as u8;
        i += 1;
    }
    slots
}
const LOOKUP_TABLE: [u8; 256] = lookup_table();

/// Return the index of `residue`, or `None` if it is not one of the twenty amino acids.
pub const fn residue_index(residue: u8) -> Option<u8> {
    match LOOKUP_TABLE[residue as usize] {
        NULL => None,
        idx => Some(idx),
    }
}

/// Convert a residue string into symbol indices.
pub fn encode(seq: &[u8]) -> Result<Vec<u8>> {
    seq.iter()
        .enumerate()
        .map(|(position, &residue)| {
            residue_index(residue).ok_or(Error::UnknownResidue {
                residue: residue as char,
                position,
            })
        })
        .collect()
}

/// Coarse secondary structure class of a hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    /// Helix.
    A,
    /// Sheet.
    B,
    /// Everything else.
    O,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::A, Label::B, Label::O];
    pub fn index(self) -> usize {
        match self {
            Label::A => 0,
            Label::B => 1,
            Label::O => 2,
        }
    }
    /// Simplify a DSSP code. The coarse letters themselves are accepted too.
    /// G,H -> A, E,B -> B, N,S,T -> O.
    pub fn from_dssp(code: u8) -> Option<Self> {
        match code.to_ascii_uppercase() {
            b'G' | b'H' | b'A' => Some(Label::A),
            b'E' | b'B' => Some(Label::B),
            b'N' | b'S' | b'T' | b'O' => Some(Label::O),
            _ => None,
        }
    }
    pub fn as_char(self) -> char {
        match self {
            Label::A => 'A',
            Label::B => 'B',
            Label::O => 'O',
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;
        f.write_char(self.as_char())
    }
}

/// Convert a DSSP string into labels.
pub fn parse_structure(codes: &[u8]) -> Result<Vec<Label>> {
    codes
        .iter()
        .enumerate()
        .map(|(position, &code)| {
            Label::from_dssp(code).ok_or(Error::UnknownStructure {
                code: code as char,
                position,
            })
        })
        .collect()
}

pub fn labels_to_string(labels: &[Label]) -> String {
    labels.iter().map(|l| l.as_char()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn encode_is_a_bijection() {
        let encoded = encode(AMINO_ACIDS).unwrap();
        assert_eq!(encoded, (0..NUM_SYMBOLS as u8).collect::<Vec<_>>());
        assert_eq!(encode(b"mks").unwrap(), encode(b"MKS").unwrap());
        assert_eq!(encode(b"MKS").unwrap(), vec![10, 8, 15]);
    }
    #[test]
    fn unknown_residue() {
        match encode(b"MKXS") {
            Err(Error::UnknownResidue { residue, position }) => {
                assert_eq!(residue, 'X');
                assert_eq!(position, 2);
            }
            x => panic!("{:?}", x),
        }
    }
    #[test]
    fn dssp_simplification() {
        let labels = parse_structure(b"GHEBNST").unwrap();
        use Label::*;
        assert_eq!(labels, vec![A, A, B, B, O, O, O]);
        assert_eq!(labels_to_string(&labels), "AABBOOO");
        assert!(parse_structure(b"HHZ").is_err());
    }
}

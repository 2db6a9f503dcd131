//!
//! Nucleotide alphabet and IUPAC degeneracy codes
//!
//! Symbols `0..4` are the nucleotides `A, C, G, T`. Symbols `4..15` are the
//! degenerate IUPAC codes. A degenerate symbol is not expanded when encoding a
//! sequence: its emission probability is the sum over its support.
//!
use crate::error::{Error, Result};

/// Encoded symbol (`0..N_SYMBOLS`)
pub type Symbol = u8;

/// Type of an encoded nucleotide sequence
pub type Sequence = Vec<Symbol>;

/// Number of non-degenerate symbols (= columns of the emission matrix)
pub const N_EMISSIONS: usize = 4;

/// Number of symbols including degenerate codes
pub const N_SYMBOLS: usize = 15;

/// Characters of every symbol
pub const SYMBOLS: [u8; N_SYMBOLS] = *b"ACGTRYSWKMBDHVN";

/// Support of every symbol as a bit mask over `A=1, C=2, G=4, T=8`
const MASKS: [u8; N_SYMBOLS] = [1, 2, 4, 8, 5, 10, 6, 9, 12, 3, 14, 13, 11, 7, 15];

///
/// Encode a single character (case-insensitive, `U` is read as `T`)
///
pub fn encode_char(c: char) -> Result<Symbol> {
    let upper = match c.to_ascii_uppercase() {
        'U' => 'T',
        x => x,
    };
    SYMBOLS
        .iter()
        .position(|&s| s as char == upper)
        .map(|i| i as Symbol)
        .ok_or(Error::InvalidNucleotide(c))
}

pub fn decode_symbol(symbol: Symbol) -> char {
    SYMBOLS[symbol as usize] as char
}

///
/// Encode a string into symbols
///
pub fn encode(s: &str) -> Result<Sequence> {
    s.chars().map(encode_char).collect()
}

///
/// Decode symbols into a string
///
pub fn decode(seq: &[Symbol]) -> String {
    seq.iter().map(|&s| decode_symbol(s)).collect()
}

///
/// Is the symbol one of the four nucleotides
///
#[inline]
pub fn is_nucleotide(symbol: Symbol) -> bool {
    (symbol as usize) < N_EMISSIONS
}

///
/// Iterator of nucleotides consistent with the symbol
///
pub fn support(symbol: Symbol) -> impl Iterator<Item = usize> {
    let mask = MASKS[symbol as usize];
    (0..N_EMISSIONS).filter(move |k| mask & (1 << k) != 0)
}

///
/// Number of nucleotides consistent with the symbol
///
pub fn degeneracy(symbol: Symbol) -> usize {
    MASKS[symbol as usize].count_ones() as usize
}

///
/// Symbol whose support is exactly the given nucleotides
///
pub fn symbol_from_support(nucleotides: &[usize]) -> Symbol {
    let mask = nucleotides.iter().fold(0u8, |m, &k| m | (1 << k));
    MASKS
        .iter()
        .position(|&m| m == mask)
        .map(|i| i as Symbol)
        .unwrap_or(N_SYMBOLS as Symbol - 1)
}

///
/// Complementary symbol (`A <-> T`, `C <-> G`, `R <-> Y`, ...)
///
pub fn complement(symbol: Symbol) -> Symbol {
    let comp: Vec<usize> = support(symbol).map(|k| N_EMISSIONS - 1 - k).collect();
    symbol_from_support(&comp)
}

///
/// Reverse complement of a sequence
///
pub fn reverse_complement(seq: &[Symbol]) -> Sequence {
    seq.iter().rev().map(|&s| complement(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let s = encode("ACGTNryu").unwrap();
        assert_eq!(s, vec![0, 1, 2, 3, 14, 4, 5, 3]);
        assert_eq!(decode(&s), "ACGTNRYT");
        assert!(matches!(encode("ACXT"), Err(Error::InvalidNucleotide('X'))));
    }

    #[test]
    fn supports() {
        let r = encode_char('R').unwrap();
        assert_eq!(support(r).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(degeneracy(r), 2);
        let b = encode_char('B').unwrap();
        assert_eq!(support(b).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(degeneracy(encode_char('N').unwrap()), 4);
        assert_eq!(decode_symbol(symbol_from_support(&[0, 1])), 'M');
        assert_eq!(decode_symbol(symbol_from_support(&[0, 1, 2, 3])), 'N');
        for s in 0..N_SYMBOLS as Symbol {
            assert_eq!(symbol_from_support(&support(s).collect::<Vec<_>>()), s);
        }
    }

    #[test]
    fn complements() {
        let s = encode("ACGTRYKM").unwrap();
        assert_eq!(decode(&reverse_complement(&s)), "KMRYACGT");
        assert_eq!(decode(&reverse_complement(&encode("AACG").unwrap())), "CGTT");
    }
}

//!
//! Seeded synthetic sequences with planted motif sites
//!
use crate::common::{Sequence, Symbol, N_EMISSIONS};
use crate::data::{Contrast, Seq, Set};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

///
/// generate random bases of given length from seed
///
pub fn generate(length: usize, seed: u64) -> Sequence {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    generate_with_rng(length, &mut rng)
}

pub fn generate_with_rng<R: Rng>(length: usize, rng: &mut R) -> Sequence {
    (0..length)
        .map(|_| rng.gen_range(0..N_EMISSIONS) as Symbol)
        .collect()
}

///
/// Overwrite `seq[pos..pos + site.len()]` by the site
///
pub fn plant(seq: &mut Sequence, site: &[Symbol], pos: usize) {
    seq[pos..pos + site.len()].copy_from_slice(site);
}

///
/// A signal/control contrast. Every signal sequence carries exactly one copy of
/// `site` at a random position; control sequences are plain background.
///
/// Returns the contrast and the planted position of each signal sequence.
///
pub fn planted_contrast(
    name: &str,
    motif: &str,
    site: &[Symbol],
    n_seqs: usize,
    length: usize,
    seed: u64,
) -> (Contrast, Vec<usize>) {
    assert!(length >= site.len());
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut positions = Vec::with_capacity(n_seqs);
    let signal: Vec<Seq> = (0..n_seqs)
        .map(|i| {
            let mut seq = generate_with_rng(length, &mut rng);
            let pos = rng.gen_range(0..=length - site.len());
            plant(&mut seq, site, pos);
            positions.push(pos);
            Seq::new(&format!("signal{}", i), seq)
        })
        .collect();
    let control: Vec<Seq> = (0..n_seqs)
        .map(|i| Seq::new(&format!("control{}", i), generate_with_rng(length, &mut rng)))
        .collect();
    let contrast = Contrast::new(
        name,
        vec![
            Set::new("signal", &[motif], signal),
            Set::new("control", &[], control),
        ],
    );
    (contrast, positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{decode, encode};

    #[test]
    fn random_seq() {
        let s = generate(10, 0);
        assert_eq!(s.len(), 10);
        assert!(s.iter().all(|&x| (x as usize) < N_EMISSIONS));
        assert_eq!(generate(50, 11), generate(50, 11));
        assert_ne!(generate(50, 11), generate(50, 12));
    }

    #[test]
    fn planted() {
        let site = encode("TGACGT").unwrap();
        let (contrast, positions) = planted_contrast("c", "m", &site, 5, 30, 3);
        assert_eq!(contrast.sets.len(), 2);
        assert_eq!(contrast.n_seqs(), 10);
        for (seq, &pos) in contrast.sets[0].seqs.iter().zip(positions.iter()) {
            assert_eq!(decode(&seq.symbols[pos..pos + 6]), "TGACGT");
        }
        assert!(contrast.sets[0].is_signal_for(&["m"]));
        assert!(!contrast.sets[1].is_signal_for(&["m"]));
    }
}

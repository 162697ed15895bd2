//! Fixed capacity bit vector used as the validity mask of zero-suppressed containers.
//!
//! Channels hit in a single event are sparse, so most words of the mask are zero.
//! Iteration skips whole zero words and jumps straight to the lowest set bit of a
//! non-zero word, which makes walking the valid slots of a mostly empty container
//! proportional to the number of words plus the number of hits.

const WORD_BITS: usize = u64::BITS as usize;

/// Number of words needed to hold `bits` bits
const fn words_for(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

/// BitsOne is a fixed-capacity set of slot indices in `[0, N)`.
///
/// Bit i set means slot i holds valid data. Indices outside of the capacity are
/// programming errors and panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitsOne<const N: usize> {
    words: Box<[u64]>,
}

impl<const N: usize> Default for BitsOne<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BitsOne<N> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            words: vec![0; words_for(N)].into_boxed_slice(),
        }
    }

    /// The maximum number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Zero all words
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    #[inline]
    fn locate(index: usize) -> (usize, u64) {
        assert!(index < N, "bit index {index} out of range for BitsOne<{N}>");
        (index / WORD_BITS, 1u64 << (index % WORD_BITS))
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        let (word, mask) = Self::locate(index);
        self.words[word] |= mask;
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        self.words[word] & mask != 0
    }

    /// Set the bit and return its previous value.
    ///
    /// A `false` return marks the first touch of the slot since the last clear.
    #[inline]
    pub fn get_set(&mut self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        let was = self.words[word] & mask != 0;
        self.words[word] |= mask;
        was
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterate the set indices in ascending order
    pub fn iter(&self) -> BitsOneIter<'_> {
        BitsOneIter {
            words: &self.words,
            next_word: 0,
            bits: 0,
            base: 0,
        }
    }
}

impl<'a, const N: usize> IntoIterator for &'a BitsOne<N> {
    type Item = usize;
    type IntoIter = BitsOneIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Resumable forward scan over the set bits of a [`BitsOne`].
///
/// Holds the not yet reported bits of the current word and the slot index of
/// that word's bit 0. Once exhausted it keeps returning `None`.
#[derive(Debug, Clone)]
pub struct BitsOneIter<'a> {
    words: &'a [u64],
    next_word: usize,
    bits: u64,
    base: usize,
}

impl Iterator for BitsOneIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        while self.bits == 0 {
            let word = *self.words.get(self.next_word)?;
            self.base = self.next_word * WORD_BITS;
            self.next_word += 1;
            self.bits = word;
        }
        let offset = self.bits.trailing_zeros() as usize;
        // Drop the lowest set bit
        self.bits &= self.bits - 1;
        Some(self.base + offset)
    }
}

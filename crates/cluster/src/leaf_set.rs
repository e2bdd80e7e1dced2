use crate::feature::LeafIndex;

/// Set of leaves of one index snapshot, backed by a bitset.
///
/// Ordering contract:
/// - Iteration yields leaf indices in ascending order, so consumers that walk
///   the set see points in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafSet {
    words: Vec<u64>,
    len: usize,
}

impl LeafSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(leaves: usize) -> Self {
        Self {
            words: vec![0; leaves.div_ceil(64)],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, leaf: LeafIndex) -> bool {
        let (word, bit) = word_bit(leaf.0);
        self.words
            .get(word)
            .is_some_and(|w| (w & (1u64 << bit)) != 0)
    }

    /// Returns `true` if the set changed.
    pub fn insert(&mut self, leaf: LeafIndex) -> bool {
        let (word, bit) = word_bit(leaf.0);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let w = &mut self.words[word];
        if (*w & mask) != 0 {
            return false;
        }
        *w |= mask;
        self.len += 1;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = LeafIndex> + '_ {
        LeafIter {
            words: &self.words,
            word_index: 0,
            current_word: 0,
            base: 0,
        }
    }
}

impl Extend<LeafIndex> for LeafSet {
    fn extend<T: IntoIterator<Item = LeafIndex>>(&mut self, iter: T) {
        for leaf in iter {
            self.insert(leaf);
        }
    }
}

impl FromIterator<LeafIndex> for LeafSet {
    fn from_iter<T: IntoIterator<Item = LeafIndex>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

fn word_bit(index: u32) -> (usize, u32) {
    ((index / 64) as usize, index % 64)
}

struct LeafIter<'a> {
    words: &'a [u64],
    word_index: usize,
    current_word: u64,
    base: u32,
}

impl Iterator for LeafIter<'_> {
    type Item = LeafIndex;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let tz = self.current_word.trailing_zeros();
                self.current_word &= self.current_word - 1;
                return Some(LeafIndex(self.base + tz));
            }
            self.current_word = *self.words.get(self.word_index)?;
            self.base = (self.word_index as u32) * 64;
            self.word_index += 1;
        }
    }
}

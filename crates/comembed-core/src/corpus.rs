//! Walk corpora: repetition over epochs and fixed-size chunking for workers.

use ndarray::{Array1, Array2, ArrayView1};

/// Lazily groups an iterator into `Vec`s of `size` items.
///
/// The last group may be shorter. An empty source (or `size == 0`) yields no
/// groups. The iterator is single-pass; it consumes its source.
#[derive(Debug, Clone)]
pub struct Chunked<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Chunked<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.size == 0 {
            return None;
        }
        let chunk: Vec<_> = self.inner.by_ref().take(self.size).collect();
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.size == 0 {
            return (0, Some(0));
        }
        let (lo, hi) = self.inner.size_hint();
        (lo.div_ceil(self.size), hi.map(|h| h.div_ceil(self.size)))
    }
}

/// Group `iter` into chunks of `size` items.
///
/// ```rust
/// use comembed_core::corpus::chunked;
///
/// let groups: Vec<Vec<u32>> = chunked(0..10, 3).collect();
/// assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9]]);
/// ```
pub fn chunked<I: IntoIterator>(iter: I, size: usize) -> Chunked<I::IntoIter> {
    Chunked {
        inner: iter.into_iter(),
        size,
    }
}

/// Like [`chunked`], but packs every item (a walk) into a contiguous array,
/// which is cheaper to hand to another worker than a nested `Vec`.
pub fn chunked_arrays<I, W, T>(iter: I, size: usize) -> impl Iterator<Item = Vec<Array1<T>>>
where
    I: IntoIterator<Item = W>,
    W: IntoIterator<Item = T>,
{
    chunked(iter, size).map(|chunk| chunk.into_iter().map(Array1::from_iter).collect())
}

/// A 2-D corpus (one walk per row) replayed `n` times.
///
/// Unlike [`Chunked`], this can be iterated any number of times.
#[derive(Debug, Clone)]
pub struct RepeatCorpus<T> {
    corpus: Array2<T>,
    n: usize,
}

impl<T> RepeatCorpus<T> {
    pub fn new(corpus: Array2<T>, n: usize) -> Self {
        Self { corpus, n }
    }

    /// Number of repetitions.
    pub fn repetitions(&self) -> usize {
        self.n
    }

    /// Underlying corpus.
    pub fn corpus(&self) -> &Array2<T> {
        &self.corpus
    }

    /// `rows x cols x n`: node occurrences across all repetitions.
    pub fn total_nodes(&self) -> usize {
        let (rows, cols) = self.corpus.dim();
        rows * cols * self.n
    }

    /// `rows x n`: walks across all repetitions.
    pub fn total_examples(&self) -> usize {
        self.corpus.nrows() * self.n
    }

    /// Every row of the corpus, `n` times over.
    pub fn iter(&self) -> impl Iterator<Item = ArrayView1<'_, T>> + '_ {
        (0..self.n).flat_map(move |_| self.corpus.rows())
    }
}

impl<'a, T> IntoIterator for &'a RepeatCorpus<T> {
    type Item = ArrayView1<'a, T>;
    type IntoIter = Box<dyn Iterator<Item = ArrayView1<'a, T>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A copyable key that maps one-to-one onto a `usize` offset.
pub trait IndexRef: Copy + Eq {
    fn index(&self) -> usize;
    fn new(input: usize) -> Self;
}

/// A half open range of indices. The start is inclusive, the end is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexRange<I>
where
    I: IndexRef + PartialOrd,
{
    start: I,
    end: I,
}

impl<I> IndexRange<I>
where
    I: IndexRef + PartialOrd,
{
    pub fn new(start: I, end: I) -> Self {
        assert!(start <= end, "start must be less than or equal to end");
        Self { start, end }
    }

    pub fn size(&self) -> usize {
        self.end.index().saturating_sub(self.start.index())
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, candidate: I) -> bool {
        self.start <= candidate && self.end > candidate
    }

    pub fn start(&self) -> I {
        self.start
    }

    pub fn end(&self) -> I {
        self.end
    }
}

impl<I> IntoIterator for IndexRange<I>
where
    I: IndexRef + PartialOrd,
{
    type Item = I;

    type IntoIter = OwnedIndexRangeIterator<I>;

    fn into_iter(self) -> Self::IntoIter {
        OwnedIndexRangeIterator { range: self }
    }
}

/// An iterator over a range of indices that owns the range.
pub struct OwnedIndexRangeIterator<I>
where
    I: IndexRef + PartialOrd,
{
    range: IndexRange<I>,
}

impl<I> Iterator for OwnedIndexRangeIterator<I>
where
    I: IndexRef + PartialOrd,
{
    type Item = I;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.start < self.range.end {
            let out = self.range.start;
            self.range.start = I::new(self.range.start.index() + 1);
            Some(out)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = self.range.size();
        (size, Some(size))
    }
}

impl<I> ExactSizeIterator for OwnedIndexRangeIterator<I> where
    I: IndexRef + PartialOrd
{
}

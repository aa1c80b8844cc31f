use std::cmp::Ordering;

/// Total order over priorities.
///
/// The queue serves the priority that compares as [`Ordering::Less`] first, so the natural order
/// of `P` yields min-heap behaviour. Any `Fn(&P, &P) -> Ordering` closure is a comparator.
pub trait Comparator<P>: Send + Sync {
    fn compare(&self, a: &P, b: &P) -> Ordering;
}

/// Uses the [`Ord`] implementation of the priority type: the lowest value is served first.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<P: Ord> Comparator<P> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &P, b: &P) -> Ordering {
        a.cmp(b)
    }
}

/// Flips the [`Ord`] implementation of the priority type: the highest value is served first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseOrder;

impl<P: Ord> Comparator<P> for ReverseOrder {
    #[inline]
    fn compare(&self, a: &P, b: &P) -> Ordering {
        b.cmp(a)
    }
}

impl<P, F> Comparator<P> for F
where
    F: Fn(&P, &P) -> Ordering + Send + Sync,
{
    #[inline]
    fn compare(&self, a: &P, b: &P) -> Ordering {
        self(a, b)
    }
}

//! Turns a member count into the sequence of listing pages to visit.

use std::num::NonZeroU64;

/// Number of pages needed to list `total_count` members, `page_size` at a time.
///
/// Integer ceiling division, `0` members means no pages.
pub fn plan_pages(total_count: u64, page_size: NonZeroU64) -> u64 {
    let page_size = page_size.get();
    total_count / page_size + u64::from(total_count % page_size > 0)
}

/// One listing page: 1-based `index` and the member `offset` it starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: u64,
    pub offset: u64,
}

/// Iterator over the pages `1..=plan_pages(total, size)` in order.
#[derive(Debug, Clone)]
pub struct PagePlan {
    page_size: u64,
    next: u64,
    remaining: u64,
    page_count: u64,
}

impl PagePlan {
    pub fn new(total_count: u64, page_size: NonZeroU64) -> Self {
        let page_count = plan_pages(total_count, page_size);
        Self {
            page_size: page_size.get(),
            next: 1,
            remaining: page_count,
            page_count,
        }
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }
}

impl Iterator for PagePlan {
    type Item = Page;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.next;
        self.remaining -= 1;
        self.next = self.next.wrapping_add(1);
        Some(Page {
            index,
            offset: (index - 1) * self.page_size,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

impl ExactSizeIterator for PagePlan {}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    #[test]
    fn no_members_no_pages() {
        for p in [1, 2, 20, 1000] {
            assert_eq!(0, plan_pages(0, size(p)));
        }
        assert_eq!(0, PagePlan::new(0, size(20)).count());
    }

    #[test]
    fn ceiling_division() {
        assert_eq!(3, plan_pages(45, size(20)));
        assert_eq!(2, plan_pages(40, size(20)));
        assert_eq!(1, plan_pages(1, size(20)));
        assert_eq!(1, plan_pages(20, size(20)));
        assert_eq!(2, plan_pages(21, size(20)));
        assert_eq!(7, plan_pages(7, size(1)));
    }

    #[test]
    fn matches_exact_ceiling_for_small_inputs() {
        for n in 0..200u64 {
            for p in 1..25u64 {
                let expected = (n + p - 1) / p;
                assert_eq!(expected, plan_pages(n, size(p)), "n={n} p={p}");
            }
        }
    }

    #[test]
    fn huge_counts_dont_overflow() {
        assert_eq!(u64::MAX, plan_pages(u64::MAX, size(1)));
        assert_eq!(u64::MAX / 2 + 1, plan_pages(u64::MAX, size(2)));
    }

    #[test]
    fn pages_are_contiguous_with_offsets() {
        let plan = PagePlan::new(45, size(20));
        assert_eq!(3, plan.len());
        let pages: Vec<_> = plan.collect();
        assert_eq!(
            vec![
                Page { index: 1, offset: 0 },
                Page { index: 2, offset: 20 },
                Page { index: 3, offset: 40 },
            ],
            pages
        );
    }
}

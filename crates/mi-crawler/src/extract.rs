use crate::error::ExtractionError;

/// A member as found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFragment {
    pub member_id: i64,
    pub display_name: String,
}

/// Reads the structural content of a collection's member listing.
pub trait Extractor {
    /// Number of members announced by the collection view.
    fn total_count(&self, html: &str) -> Result<u64, ExtractionError>;

    /// Members listed on one page, possibly none.
    fn members(&self, html: &str) -> Result<Vec<MemberFragment>, ExtractionError>;
}

impl<T: Extractor + ?Sized> Extractor for &T {
    fn total_count(&self, html: &str) -> Result<u64, ExtractionError> {
        (**self).total_count(html)
    }

    fn members(&self, html: &str) -> Result<Vec<MemberFragment>, ExtractionError> {
        (**self).members(html)
    }
}

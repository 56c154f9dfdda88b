//! HTTP backed collaborators for `mi-crawler`: a cookie keeping [`HttpSession`]
//! and a selector driven [`CssExtractor`].

mod extractor;
mod markup;
mod session;

pub use extractor::{CssExtractor, ExtractorConfig};
pub use session::{HttpConfig, HttpSession};

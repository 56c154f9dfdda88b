use mi_crawler::{ExtractionError, Extractor, MemberFragment};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Element whose text holds the collection's member count.
    #[serde(default = "default_count_selector")]
    pub count_selector: String,

    /// One element per listed member.
    #[serde(default = "default_member_selector")]
    pub member_selector: String,

    /// Attribute of a member element holding its id.
    #[serde(default = "default_member_id_attr")]
    pub member_id_attr: String,

    /// Element within a member element holding its display name.
    #[serde(default = "default_name_selector")]
    pub name_selector: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            count_selector: default_count_selector(),
            member_selector: default_member_selector(),
            member_id_attr: default_member_id_attr(),
            name_selector: default_name_selector(),
        }
    }
}

fn default_count_selector() -> String {
    String::from("#C_document > div > div:nth-of-type(2) > ul > li:nth-of-type(1) > a > span")
}

fn default_member_selector() -> String {
    String::from("#memberList > li")
}

fn default_member_id_attr() -> String {
    String::from("data-memid")
}

fn default_name_selector() -> String {
    String::from("div > div:nth-of-type(2) > h4 > a")
}

/// [`Extractor`] driven by CSS selectors.
#[derive(Debug)]
pub struct CssExtractor {
    count: Selector,
    member: Selector,
    name: Selector,
    config: ExtractorConfig,
}

impl CssExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractionError> {
        Ok(Self {
            count: parse_selector(&config.count_selector)?,
            member: parse_selector(&config.member_selector)?,
            name: parse_selector(&config.name_selector)?,
            config,
        })
    }

    fn member(&self, elem: ElementRef<'_>) -> Result<MemberFragment, ExtractionError> {
        let raw_id = elem
            .value()
            .attr(&self.config.member_id_attr)
            .ok_or_else(|| ExtractionError::MissingElement {
                what: "member id",
                selector: format!("[{}]", self.config.member_id_attr),
            })?
            .trim();
        let member_id = raw_id
            .parse()
            .map_err(|_| ExtractionError::InvalidMemberId(raw_id.to_string()))?;

        let name = elem
            .select(&self.name)
            .next()
            .ok_or_else(|| ExtractionError::MissingElement {
                what: "member name",
                selector: self.config.name_selector.clone(),
            })?;

        Ok(MemberFragment {
            member_id,
            display_name: squash_whitespace(name.text()),
        })
    }
}

impl Extractor for CssExtractor {
    fn total_count(&self, html: &str) -> Result<u64, ExtractionError> {
        let doc = Html::parse_document(html);
        let text = doc
            .select(&self.count)
            .next()
            .map(|elem| elem.text().collect::<String>())
            .ok_or_else(|| ExtractionError::MissingElement {
                what: "member count",
                selector: self.config.count_selector.clone(),
            })?;
        parse_count(&text)
    }

    fn members(&self, html: &str) -> Result<Vec<MemberFragment>, ExtractionError> {
        let doc = Html::parse_document(html);
        doc.select(&self.member)
            .map(|elem| self.member(elem))
            .collect()
    }
}

fn parse_selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::InvalidSelector(css.to_string()))
}

/// Keeps the ASCII digits of a count such as `(1.234)` or `1,234 members`.
fn parse_count(text: &str) -> Result<u64, ExtractionError> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits
        .parse()
        .map_err(|_| ExtractionError::InvalidCount(text.trim().to_string()))
}

fn squash_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

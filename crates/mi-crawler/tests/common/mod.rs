#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use mi_crawler::{
    async_trait, Config, Element, ExtractionError, Extractor, FindOptions, Locator, Lookup,
    MemberFragment, Selectors, Session, SessionError,
};

pub const START_URL: &str = "https://example.org/login";
pub const RUST: &str = "https://example.org/rust";
pub const ZIG: &str = "https://example.org/zig";
pub const OWN: &str = "https://example.org/mine";

pub fn config(collections: &[&str]) -> Config {
    let mut config = Config::new(
        START_URL,
        collections.iter().map(|c| c.to_string()).collect(),
        "Hello username, ...",
    );
    config.message_url_template =
        "https://example.org/messages/?member_id={member_id}&name={name}".into();
    config
}

/// Markup understood by [`LineExtractor`]: `count:N` and `member:ID:NAME` lines.
pub fn count_page(total: u64) -> String {
    format!("count:{total}\n")
}

pub fn member_page(ids: impl IntoIterator<Item = i64>) -> String {
    ids.into_iter()
        .map(|id| format!("member:{id}:Member{id} Surname\n"))
        .collect()
}

pub struct LineExtractor;

impl Extractor for LineExtractor {
    fn total_count(&self, html: &str) -> Result<u64, ExtractionError> {
        let line = html
            .lines()
            .find_map(|l| l.strip_prefix("count:"))
            .ok_or(ExtractionError::MissingElement {
                what: "count",
                selector: "count:".into(),
            })?;
        line.trim()
            .parse()
            .map_err(|_| ExtractionError::InvalidCount(line.into()))
    }

    fn members(&self, html: &str) -> Result<Vec<MemberFragment>, ExtractionError> {
        html.lines()
            .filter_map(|l| l.strip_prefix("member:"))
            .map(|rest| {
                let (id, name) = rest.split_once(':').unwrap_or((rest, ""));
                let member_id = id
                    .parse()
                    .map_err(|_| ExtractionError::InvalidMemberId(id.into()))?;
                Ok(MemberFragment {
                    member_id,
                    display_name: name.into(),
                })
            })
            .collect()
    }
}

/// Scripted session serving canned pages.
#[derive(Default)]
pub struct FakeSession {
    pub pages: HashMap<String, String>,
    pub broken: HashSet<String>,
    /// Number of polls the loading indicator stays up per URL, `u32::MAX` for ever.
    pub spinner_polls: HashMap<String, u32>,
    pub probe_errors: HashSet<String>,
    pub no_send_button: HashSet<String>,

    pub visited: Vec<String>,
    pub filled: Vec<(String, String)>,
    pub clicked: Vec<(String, String)>,
    pub polls: HashMap<String, u32>,
    current: Option<String>,
    selectors: Selectors,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&mut self, url: &str, html: String) -> &mut Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    /// Serves a collection of `ids` in pages of `page_size`, the way the
    /// default page URL template addresses them.
    pub fn collection(&mut self, config: &Config, collection: &str, ids: &[i64]) -> &mut Self {
        self.page(collection, count_page(ids.len() as u64));
        let size = config.users_per_page.get() as usize;
        for (n, chunk) in ids.chunks(size).enumerate() {
            let url = config.page_url(collection, (n * size) as u64);
            self.page(&url, member_page(chunk.iter().copied()));
        }
        self
    }

    /// Messages pages answer with an empty body.
    pub fn serve_messages(&mut self, config: &Config, ids: &[(i64, &str)]) -> &mut Self {
        for (id, name) in ids {
            self.page(&config.message_url(*id, name), String::new());
        }
        self
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.clicked
            .iter()
            .filter(|(_, locator)| *locator == self.selectors.send_button.as_str())
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait(?Send)]
impl Session for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.visited.push(url.to_string());
        if self.broken.contains(url) || !self.pages.contains_key(url) {
            self.current = None;
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "404 Not Found".into(),
            });
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn fill_field(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        self.current.as_ref().ok_or(SessionError::NoPage)?;
        self.filled.push((name.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), SessionError> {
        let url = self.current.clone().ok_or(SessionError::NoPage)?;
        self.clicked.push((url, locator.to_string()));
        Ok(())
    }

    async fn find(
        &mut self,
        locator: &Locator,
        _options: FindOptions,
    ) -> Result<Lookup, SessionError> {
        let url = self.current.clone().ok_or(SessionError::NoPage)?;
        let found = Lookup::Found(Element {
            text: String::new(),
        });

        if *locator == self.selectors.loading_indicator {
            if self.probe_errors.contains(&url) {
                return Err(SessionError::Backend("renderer crashed".into()));
            }
            let polls = self.polls.entry(url.clone()).or_default();
            *polls += 1;
            let up_for = self.spinner_polls.get(&url).copied().unwrap_or(0);
            return Ok(if *polls <= up_for { found } else { Lookup::NotFound });
        }
        if *locator == self.selectors.send_button && self.no_send_button.contains(&url) {
            return Ok(Lookup::NotFound);
        }
        Ok(found)
    }

    fn current_html(&self) -> Result<String, SessionError> {
        let url = self.current.as_ref().ok_or(SessionError::NoPage)?;
        Ok(self.pages.get(url).cloned().unwrap_or_default())
    }
}

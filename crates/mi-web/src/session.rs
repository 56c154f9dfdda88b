use std::time::Duration;

use async_trait::async_trait;
use mi_crawler::{FindOptions, Locator, Lookup, Session, SessionError};
use reqwest::header::USER_AGENT;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::markup::{self, ClickAction, Method, Submission};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per request timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    String::from("mi-crawler")
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug)]
struct Page {
    url: Url,
    html: String,
}

/// [`Session`] over plain HTTP with a cookie jar.
///
/// Pages are never scripted: a click follows a link or submits the form
/// enclosing the clicked button, and lookups only see the served markup.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    user_agent: String,
    page: Option<Page>,
    filled: Vec<(String, String)>,
}

impl HttpSession {
    pub fn new(config: &HttpConfig) -> Result<Self, SessionError> {
        let client = ClientBuilder::new()
            .cookie_store(true)
            .gzip(true)
            .deflate(true)
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| SessionError::Backend(Box::new(e)))?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            page: None,
            filled: Vec::new(),
        })
    }

    /// URL of the page currently open, after redirects.
    pub fn current_url(&self) -> Option<&Url> {
        self.page.as_ref().map(|p| &p.url)
    }

    fn page(&self) -> Result<&Page, SessionError> {
        self.page.as_ref().ok_or(SessionError::NoPage)
    }

    async fn load(&mut self, url: &Url, request: RequestBuilder) -> Result<(), SessionError> {
        let failed = |e: reqwest::Error| SessionError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        self.page = None;
        self.filled.clear();

        let resp = request
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(failed)?;
        let url = resp.url().clone();
        let html = resp.text().await.map_err(failed)?;

        log::debug!("Loaded {url} ({} bytes)", html.len());
        self.page = Some(Page { url, html });
        Ok(())
    }

    async fn submit(&mut self, submission: Submission) -> Result<(), SessionError> {
        let Submission {
            method,
            mut action,
            fields,
        } = submission;
        log::debug!("Submitting form to {action}");

        let request = match method {
            Method::Post => self.client.post(action.clone()).form(&fields),
            Method::Get => {
                action.query_pairs_mut().clear().extend_pairs(&fields);
                self.client.get(action.clone())
            }
        };
        self.load(&action, request).await
    }
}

#[async_trait(?Send)]
impl Session for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let target = Url::parse(url).map_err(|e| SessionError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let request = self.client.get(target.clone());
        self.load(&target, request).await
    }

    async fn fill_field(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        let field = markup::field_name(&self.page()?.html, name)?;
        match self.filled.iter_mut().find(|(n, _)| *n == field) {
            Some(filled) => filled.1 = value.to_string(),
            None => self.filled.push((field, value.to_string())),
        }
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), SessionError> {
        let page = self.page()?;
        match markup::click_action(&page.url, &page.html, locator, &self.filled)? {
            ClickAction::Follow(url) => {
                let request = self.client.get(url.clone());
                self.load(&url, request).await
            }
            ClickAction::Submit(submission) => self.submit(submission).await,
        }
    }

    async fn find(
        &mut self,
        locator: &Locator,
        options: FindOptions,
    ) -> Result<Lookup, SessionError> {
        // Served markup never changes, so `options.wait` has nothing to wait for.
        let found = markup::find(&self.page()?.html, locator, options.visible)?;
        Ok(found.map_or(Lookup::NotFound, Lookup::Found))
    }

    fn current_html(&self) -> Result<String, SessionError> {
        self.page().map(|p| p.html.clone())
    }
}

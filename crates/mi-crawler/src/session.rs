use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LoginForm;
use crate::error::SessionError;

/// A CSS selector addressing an element of the current view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(css: impl Into<String>) -> Self {
        Self(css.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    /// Only match elements that would be rendered.
    pub visible: bool,
    /// How long the backend may keep looking before answering `NotFound`.
    pub wait: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Element),
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// An authenticated browsing session with a single open view.
///
/// Crawling and dispatching run strictly one after another on one session,
/// so the futures don't have to be `Send`.
#[async_trait(?Send)]
pub trait Session {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    async fn fill_field(&mut self, name: &str, value: &str) -> Result<(), SessionError>;

    async fn click(&mut self, locator: &Locator) -> Result<(), SessionError>;

    async fn find(
        &mut self,
        locator: &Locator,
        options: FindOptions,
    ) -> Result<Lookup, SessionError>;

    fn current_html(&self) -> Result<String, SessionError>;
}

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// The password with everything but its first character hidden.
    pub fn masked_password(&self) -> String {
        let mut chars = self.password.chars();
        match chars.next() {
            Some(first) => std::iter::once(first)
                .chain(chars.map(|_| '*'))
                .collect(),
            None => String::new(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.masked_password())
            .finish()
    }
}

/// Signs in through the login form at `start_url`, then lets the site settle.
pub async fn login<S>(
    session: &mut S,
    start_url: &str,
    form: &LoginForm,
    credentials: &Credentials,
    settle_delay: Duration,
) -> Result<(), SessionError>
where
    S: Session + ?Sized,
{
    log::info!("Logging in at {start_url} as {}", credentials.user);
    session.navigate(start_url).await?;
    session
        .fill_field(&form.user_field, &credentials.user)
        .await?;
    session
        .fill_field(&form.password_field, &credentials.password)
        .await?;
    session.click(&form.submit).await?;
    tokio::time::sleep(settle_delay).await;
    Ok(())
}

use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Locator;
use crate::store::PendingScope;
use crate::template::{self, MessageTemplate};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`start_url` is empty")]
    MissingStartUrl,
    #[error("message template doesn't contain the name placeholder `{0}`")]
    MissingPlaceholder(String),
    #[error("`{field}` must contain `{token}`")]
    MissingToken {
        field: &'static str,
        token: &'static str,
    },
    #[error("timing `{0}` must be a non-negative number of seconds within range")]
    InvalidTiming(&'static str),
    #[error("`pacing_min` ({min}) is greater than `pacing_max` ({max})")]
    InvalidPacing { min: f32, max: f32 },
    #[error("`max_ready_polls` must be at least 1")]
    NoReadyPolls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub start_url: String,

    #[serde(default, alias = "own_meetup")]
    pub own_collection_url: Option<String>,

    #[serde(alias = "meetups")]
    pub collections: Vec<String>,

    #[serde(alias = "message")]
    pub message_template: String,

    #[serde(default = "default_name_placeholder")]
    pub name_placeholder: String,

    #[serde(default = "default_users_per_page")]
    pub users_per_page: NonZeroU64,

    #[serde(default)]
    pub target_policy: TargetPolicy,

    #[serde(default = "default_page_url_template")]
    pub page_url_template: String,

    #[serde(default = "default_message_url_template")]
    pub message_url_template: String,

    #[serde(default)]
    pub on_collection_error: OnError,

    #[serde(default)]
    pub login: LoginForm,

    #[serde(default)]
    pub selectors: Selectors,

    #[serde(default)]
    pub timing: Timing,
}

impl Config {
    /// A config with every optional key at its default.
    pub fn new(start_url: &str, collections: Vec<String>, message_template: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            own_collection_url: None,
            collections,
            message_template: message_template.to_string(),
            name_placeholder: default_name_placeholder(),
            users_per_page: default_users_per_page(),
            target_policy: TargetPolicy::default(),
            page_url_template: default_page_url_template(),
            message_url_template: default_message_url_template(),
            on_collection_error: OnError::default(),
            login: LoginForm::default(),
            selectors: Selectors::default(),
            timing: Timing::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_url.trim().is_empty() {
            return Err(ConfigError::MissingStartUrl);
        }
        if !self.message_template.contains(&self.name_placeholder) {
            return Err(ConfigError::MissingPlaceholder(
                self.name_placeholder.clone(),
            ));
        }
        if !self.page_url_template.contains(template::OFFSET) {
            return Err(ConfigError::MissingToken {
                field: "page_url_template",
                token: template::OFFSET,
            });
        }
        if !self.message_url_template.contains(template::MEMBER_ID) {
            return Err(ConfigError::MissingToken {
                field: "message_url_template",
                token: template::MEMBER_ID,
            });
        }
        self.timing.validate()
    }

    pub fn message(&self) -> MessageTemplate {
        MessageTemplate::new(&self.message_template, &self.name_placeholder)
    }

    pub fn page_url(&self, collection: &str, offset: u64) -> String {
        template::page_url(&self.page_url_template, collection, offset)
    }

    pub fn message_url(&self, member_id: i64, display_name: &str) -> String {
        template::message_url(&self.message_url_template, member_id, display_name)
    }

    /// The own collection to crawl first, if the policy tracks group membership.
    pub fn primary_collection(&self) -> Option<&str> {
        match self.target_policy {
            TargetPolicy::FilterByGroup => self.own_collection_url.as_deref(),
            TargetPolicy::PrecomputeTarget => None,
        }
    }
}

fn default_name_placeholder() -> String {
    String::from("username")
}

fn default_users_per_page() -> NonZeroU64 {
    NonZeroU64::new(20).unwrap_or(NonZeroU64::MIN)
}

fn default_page_url_template() -> String {
    String::from("{collection}/members/?offset={offset}&sort=name&desc=0")
}

fn default_message_url_template() -> String {
    String::from(
        "https://secure.meetup.com/messages/?new_convo=true&member_id={member_id}&name={name}",
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OnError {
    Fail,
    #[default]
    SkipAndLog,
}

/// How the send target of a member is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum TargetPolicy {
    /// Track own-collection members and skip them at dispatch, build the
    /// message URL at send time.
    #[default]
    FilterByGroup,
    /// Render the message URL once at crawl time and store it on the record.
    PrecomputeTarget,
}

impl TargetPolicy {
    pub fn pending_scope(self) -> PendingScope {
        match self {
            Self::FilterByGroup => PendingScope::ExcludePrimaryGroup,
            Self::PrecomputeTarget => PendingScope::Everyone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default = "default_user_field")]
    pub user_field: String,

    #[serde(default = "default_password_field")]
    pub password_field: String,

    #[serde(default = "default_submit")]
    pub submit: Locator,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            user_field: default_user_field(),
            password_field: default_password_field(),
            submit: default_submit(),
        }
    }
}

fn default_user_field() -> String {
    String::from("email")
}

fn default_password_field() -> String {
    String::from("password")
}

fn default_submit() -> Locator {
    Locator::new("#loginForm input[type=submit]")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selectors {
    /// Clicked after entering a collection to reach its member listing.
    #[serde(default)]
    pub members_link: Option<Locator>,

    #[serde(default = "default_loading_indicator")]
    pub loading_indicator: Locator,

    /// Field name (or id) of the message input.
    #[serde(default = "default_message_input")]
    pub message_input: String,

    #[serde(default = "default_send_button")]
    pub send_button: Locator,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            members_link: None,
            loading_indicator: default_loading_indicator(),
            message_input: default_message_input(),
            send_button: default_send_button(),
        }
    }
}

fn default_loading_indicator() -> Locator {
    Locator::new("i.icon-refresh.spinning")
}

fn default_message_input() -> String {
    String::from("messaging-new-convo")
}

fn default_send_button() -> Locator {
    Locator::new("#messaging-new-send")
}

/// Delays in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default = "default_settle_delay")]
    pub settle_delay: f32,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: f32,

    #[serde(default = "default_max_ready_polls")]
    pub max_ready_polls: u32,

    #[serde(default = "default_input_wait")]
    pub input_wait: f32,

    #[serde(default = "default_pacing_min")]
    pub pacing_min: f32,

    #[serde(default = "default_pacing_max")]
    pub pacing_max: f32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: default_settle_delay(),
            poll_interval: default_poll_interval(),
            max_ready_polls: default_max_ready_polls(),
            input_wait: default_input_wait(),
            pacing_min: default_pacing_min(),
            pacing_max: default_pacing_max(),
        }
    }
}

impl Timing {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let delays = [
            ("settle_delay", self.settle_delay),
            ("poll_interval", self.poll_interval),
            ("input_wait", self.input_wait),
            ("pacing_min", self.pacing_min),
            ("pacing_max", self.pacing_max),
        ];
        for (name, secs) in delays {
            if Duration::try_from_secs_f32(secs).is_err() {
                return Err(ConfigError::InvalidTiming(name));
            }
        }
        if self.pacing_min > self.pacing_max {
            return Err(ConfigError::InvalidPacing {
                min: self.pacing_min,
                max: self.pacing_max,
            });
        }
        if self.max_ready_polls == 0 {
            return Err(ConfigError::NoReadyPolls);
        }
        if self
            .poll_interval()
            .checked_mul(self.max_ready_polls)
            .is_none()
        {
            return Err(ConfigError::InvalidTiming("max_ready_polls"));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs_f32(self.settle_delay)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f32(self.poll_interval)
    }

    pub fn input_wait(&self) -> Duration {
        Duration::from_secs_f32(self.input_wait)
    }

    /// Random delay between two messages.
    pub fn pacing_delay(&self) -> Duration {
        use rand::Rng;

        if self.pacing_max <= self.pacing_min {
            return Duration::from_secs_f32(self.pacing_min);
        }
        let secs = rand::rng().random_range(self.pacing_min..=self.pacing_max);
        Duration::from_secs_f32(secs)
    }
}

fn default_settle_delay() -> f32 {
    2.0
}

fn default_poll_interval() -> f32 {
    1.0
}

fn default_max_ready_polls() -> u32 {
    30
}

fn default_input_wait() -> f32 {
    5.0
}

fn default_pacing_min() -> f32 {
    3.0
}

fn default_pacing_max() -> f32 {
    5.0
}

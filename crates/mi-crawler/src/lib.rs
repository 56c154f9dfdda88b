mod config;
mod crawler;
mod dispatch;
mod error;
mod extract;
mod pipeline;
pub mod planner;
mod session;
mod store;
pub mod template;

pub use config::{
    Config, ConfigError, LoginForm, OnError, Selectors, TargetPolicy, Timing,
};
pub use crawler::{CollectionReport, Crawler, PopulateReport};
pub use dispatch::{DispatchReport, Dispatcher, Probe};
pub use error::{
    CrawlError, Error, ExtractionError, Result, SendError, SessionError, StoreError,
};
pub use extract::{Extractor, MemberFragment};
pub use pipeline::Pipeline;
pub use planner::{plan_pages, Page, PagePlan};
pub use session::{login, Credentials, Element, FindOptions, Locator, Lookup, Session};
pub use store::{MemberRecord, MemberStore, NewMember, PendingMembers, PendingScope, StoreStats};

pub use async_trait::async_trait;

use crate::config::Config;
use crate::crawler::{Crawler, PopulateReport};
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::session::{self, Credentials, Session};
use crate::store::MemberStore;

/// Everything a run needs, built once at startup and handed to each stage.
pub struct Pipeline<S, X> {
    config: Config,
    store: MemberStore,
    session: S,
    extractor: X,
}

impl<S, X> Pipeline<S, X>
where
    S: Session,
    X: Extractor,
{
    pub fn new(config: Config, store: MemberStore, session: S, extractor: X) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            session,
            extractor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &MemberStore {
        &self.store
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        session::login(
            &mut self.session,
            &self.config.start_url,
            &self.config.login,
            credentials,
            self.config.timing.settle_delay(),
        )
        .await
        .map_err(Error::Login)
    }

    pub async fn populate(&mut self) -> Result<PopulateReport> {
        Crawler::new(
            &mut self.session,
            &self.extractor,
            &self.store,
            &self.config,
        )
        .populate()
        .await
    }

    pub async fn send(&mut self) -> Result<DispatchReport> {
        let report = Dispatcher::new(&mut self.session, &self.store, &self.config)
            .run()
            .await?;
        Ok(report)
    }

    /// Populates then sends. Nothing is sent if populating didn't complete.
    pub async fn full(&mut self) -> Result<(PopulateReport, DispatchReport)> {
        let populated = self.populate().await?;
        let sent = self.send().await?;
        Ok((populated, sent))
    }
}

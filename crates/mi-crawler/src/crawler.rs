use crate::config::{Config, OnError, TargetPolicy};
use crate::error::{CrawlError, Error, Result};
use crate::extract::Extractor;
use crate::planner::PagePlan;
use crate::session::Session;
use crate::store::{MemberStore, NewMember};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: String,
    pub total_count: u64,
    pub pages_visited: u64,
    pub seen: u64,
    pub added: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    pub collections: Vec<CollectionReport>,
    pub failed: Vec<String>,
}

impl PopulateReport {
    pub fn added(&self) -> u64 {
        self.collections.iter().map(|c| c.added).sum()
    }
}

/// Walks the member listing of each configured collection page by page and
/// records every member not seen before.
pub struct Crawler<'a, S: ?Sized, X> {
    session: &'a mut S,
    extractor: X,
    store: &'a MemberStore,
    config: &'a Config,
}

impl<'a, S, X> Crawler<'a, S, X>
where
    S: Session + ?Sized,
    X: Extractor,
{
    pub fn new(
        session: &'a mut S,
        extractor: X,
        store: &'a MemberStore,
        config: &'a Config,
    ) -> Self {
        Self {
            session,
            extractor,
            store,
            config,
        }
    }

    /// Crawls the own collection (when tracked) then every configured one.
    ///
    /// A failed collection doesn't stop the others under
    /// [`OnError::SkipAndLog`], but the run then ends with
    /// [`Error::IncompleteCrawl`]. Store failures always end the run, and so
    /// does a failed own collection: its members must be flagged before any
    /// target collection inserts them.
    pub async fn populate(&mut self) -> Result<PopulateReport> {
        let config = self.config;
        log::info!("Populating from {} collections", config.collections.len());
        if config.primary_collection().is_none() && config.own_collection_url.is_some() {
            log::warn!(
                "Ignoring own collection with {:?}, its members would become targets",
                config.target_policy
            );
        }

        let own = config.primary_collection().map(|url| (url, true));
        let others = config.collections.iter().map(|url| (url.as_str(), false));

        let mut report = PopulateReport::default();
        for (collection, primary) in own.into_iter().chain(others) {
            match self.crawl_collection(collection, primary).await {
                Ok(collection_report) => report.collections.push(collection_report),
                Err(e) if e.is_fatal() || primary => return Err(e.into()),
                Err(e) => match config.on_collection_error {
                    OnError::SkipAndLog => {
                        log::error!("Skipping collection {collection}: {e}");
                        report.failed.push(collection.to_string());
                    }
                    OnError::Fail => return Err(e.into()),
                },
            }
        }

        if !report.failed.is_empty() {
            return Err(Error::IncompleteCrawl {
                failed: report.failed,
            });
        }
        log::info!(
            "Finished populating! {} new members over {} collections",
            report.added(),
            report.collections.len()
        );
        Ok(report)
    }

    pub async fn crawl_collection(
        &mut self,
        collection: &str,
        primary: bool,
    ) -> Result<CollectionReport, CrawlError> {
        let enter_err = |source| CrawlError::Enter {
            collection: collection.to_string(),
            source,
        };
        self.session.navigate(collection).await.map_err(enter_err)?;
        if let Some(link) = &self.config.selectors.members_link {
            self.session.click(link).await.map_err(enter_err)?;
        }

        let total_count = self
            .session
            .current_html()
            .map_err(enter_err)
            .and_then(|html| {
                self.extractor
                    .total_count(&html)
                    .map_err(|source| CrawlError::Count {
                        collection: collection.to_string(),
                        source,
                    })
            })?;

        let plan = PagePlan::new(total_count, self.config.users_per_page);
        log::info!(
            "{collection}: {total_count} members over {} pages",
            plan.page_count()
        );

        let mut report = CollectionReport {
            collection: collection.to_string(),
            total_count,
            ..Default::default()
        };
        for page in plan {
            let url = self.config.page_url(collection, page.offset);
            log::info!("Visiting {url}");
            let fetch_err = |source| CrawlError::Fetch {
                collection: collection.to_string(),
                page: page.index,
                url: url.clone(),
                source,
            };
            self.session.navigate(&url).await.map_err(fetch_err)?;
            let html = self.session.current_html().map_err(fetch_err)?;
            let fragments = self
                .extractor
                .members(&html)
                .map_err(|source| CrawlError::Page {
                    collection: collection.to_string(),
                    page: page.index,
                    source,
                })?;

            for fragment in fragments {
                let message_target = match self.config.target_policy {
                    TargetPolicy::PrecomputeTarget => Some(
                        self.config
                            .message_url(fragment.member_id, &fragment.display_name),
                    ),
                    TargetPolicy::FilterByGroup => None,
                };
                let member = NewMember {
                    member_id: fragment.member_id,
                    source_collection: collection.to_string(),
                    display_name: fragment.display_name,
                    in_primary_group: primary,
                    message_target,
                };
                report.seen += 1;
                if self.store.upsert_if_absent(&member)? {
                    log::info!("Added member {} - {}", member.display_name, member.member_id);
                    report.added += 1;
                }
            }
            report.pages_visited += 1;
        }

        log::info!(
            "{collection}: {} members seen, {} new",
            report.seen,
            report.added
        );
        Ok(report)
    }
}

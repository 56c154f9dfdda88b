use crate::config::{Config, TargetPolicy};
use crate::error::{SendError, SessionError, StoreError};
use crate::session::{FindOptions, Lookup, Session};
use crate::store::{MemberRecord, MemberStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: u64,
    pub sent: u64,
    pub failed: u64,
}

/// Outcome of one look for the loading indicator.
#[derive(Debug)]
pub enum Probe {
    Present,
    Absent,
    Failed(SessionError),
}

/// Sends the templated message to every pending member, marking each one
/// delivered right after its send was triggered.
///
/// A crash between the send and the store update leaves the member pending,
/// so it gets messaged again on the next run.
pub struct Dispatcher<'a, S: ?Sized> {
    session: &'a mut S,
    store: &'a MemberStore,
    config: &'a Config,
}

impl<'a, S> Dispatcher<'a, S>
where
    S: Session + ?Sized,
{
    pub fn new(session: &'a mut S, store: &'a MemberStore, config: &'a Config) -> Self {
        Self {
            session,
            store,
            config,
        }
    }

    /// Only store failures end the run; a failed send is logged and the next
    /// member is tried after the pacing delay.
    pub async fn run(&mut self) -> Result<DispatchReport, StoreError> {
        let store = self.store;
        let template = self.config.message();
        let scope = self.config.target_policy.pending_scope();

        log::info!("Message is:\n{}", template.body());
        log::info!("Sending {} messages", store.count_pending(scope)?);

        let mut report = DispatchReport::default();
        for member in store.select_pending(scope) {
            let member = member?;
            if report.attempted > 0 {
                tokio::time::sleep(self.config.timing.pacing_delay()).await;
            }
            let body = template.render(&member.display_name);
            report.attempted += 1;

            log::info!("Sending message to {}", member.display_name);
            match self.send_to(&member, &body).await {
                Ok(()) => {
                    store.mark_delivered(member.member_id)?;
                    report.sent += 1;
                    log::info!("Message sent!");
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!(
                        "Couldn't send message to {} ({}): {e}",
                        member.display_name,
                        member.member_id
                    );
                }
            }
        }

        log::info!(
            "Finished sending! {} sent, {} failed",
            report.sent,
            report.failed
        );
        Ok(report)
    }

    /// Opens the member's conversation, waits for it to load and sends `body`.
    pub async fn send_to(
        &mut self,
        member: &MemberRecord,
        body: &str,
    ) -> Result<(), SendError> {
        let target = self.target(member)?;
        self.session.navigate(&target).await?;
        self.wait_until_ready(member.member_id).await?;

        let selectors = &self.config.selectors;
        self.session
            .fill_field(&selectors.message_input, body)
            .await?;

        let input_wait = self.config.timing.input_wait();
        let options = FindOptions {
            visible: true,
            wait: Some(input_wait),
        };
        match self.session.find(&selectors.send_button, options).await? {
            Lookup::Found(button) => log::debug!("Send button ready: {:?}", button.text),
            Lookup::NotFound => {
                return Err(SendError::NotReadyTimeout {
                    member_id: member.member_id,
                    waited: input_wait,
                })
            }
        }
        self.session.click(&selectors.send_button).await?;
        Ok(())
    }

    fn target(&self, member: &MemberRecord) -> Result<String, SendError> {
        match self.config.target_policy {
            TargetPolicy::FilterByGroup => Ok(self
                .config
                .message_url(member.member_id, &member.display_name)),
            TargetPolicy::PrecomputeTarget => member
                .message_target
                .clone()
                .ok_or(SendError::MissingTarget(member.member_id)),
        }
    }

    pub async fn probe(&mut self) -> Probe {
        let options = FindOptions {
            visible: true,
            wait: None,
        };
        match self
            .session
            .find(&self.config.selectors.loading_indicator, options)
            .await
        {
            Ok(lookup) if lookup.is_found() => Probe::Present,
            Ok(_) => Probe::Absent,
            Err(e) => Probe::Failed(e),
        }
    }

    /// Ready means the loading indicator is gone. Polls at a fixed interval,
    /// at most `max_ready_polls` times.
    async fn wait_until_ready(&mut self, member_id: i64) -> Result<(), SendError> {
        let config = self.config;
        let timing = &config.timing;
        let interval = timing.poll_interval();
        for _ in 0..timing.max_ready_polls {
            match self.probe().await {
                Probe::Absent => return Ok(()),
                Probe::Failed(e) => return Err(SendError::Probe(e)),
                Probe::Present => tokio::time::sleep(interval).await,
            }
        }
        Err(SendError::NotReadyTimeout {
            member_id,
            waited: interval * timing.max_ready_polls,
        })
    }
}

//! The daily birthday job.

use std::{str::FromStr, sync::Arc};

use {
    anyhow::{Context, Result},
    chrono::NaiveDate,
    chrono_tz::Tz,
    tracing::{debug, error, info},
};

use wagate_sessions::SessionRegistry;

use crate::source::RecipientSource;

/// Fires once per day and fans greetings out to whichever sessions are
/// ready. One entry's failure never aborts the rest of the pass, and a
/// failed send is not retried until the date matches again.
pub struct BirthdayScheduler {
    registry: Arc<SessionRegistry>,
    source: Arc<dyn RecipientSource>,
    schedule: cron::Schedule,
    timezone: Tz,
    template: String,
}

impl BirthdayScheduler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        source: Arc<dyn RecipientSource>,
        schedule: &str,
        timezone: Tz,
        template: impl Into<String>,
    ) -> Result<Self> {
        let schedule = cron::Schedule::from_str(schedule)
            .with_context(|| format!("invalid cron expression '{schedule}'"))?;
        Ok(Self {
            registry,
            source,
            schedule,
            timezone,
            template: template.into(),
        })
    }

    /// Run forever, firing at each schedule tick.
    pub async fn run(self) {
        info!(timezone = %self.timezone, "birthday scheduler started");
        loop {
            let Some(next) = self.schedule.upcoming(self.timezone).next() else {
                error!("cron schedule yields no future fire times, scheduler stopping");
                return;
            };

            let now = chrono::Utc::now().with_timezone(&self.timezone);
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, "sleeping until next birthday run");
            tokio::time::sleep(wait).await;

            let today = chrono::Utc::now().with_timezone(&self.timezone).date_naive();
            self.run_once(today).await;
        }
    }

    /// One pass over the recipient list for `today`.
    pub async fn run_once(&self, today: NaiveDate) {
        let records = match self.source.load().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to load birthday list, skipping run");
                return;
            },
        };

        info!(count = records.len(), date = %today, "running birthday pass");

        for record in records {
            let due = match record.matches(today) {
                Ok(due) => due,
                Err(e) => {
                    error!(name = %record.name, error = %e, "bad birthday record, skipping");
                    continue;
                },
            };
            if !due {
                continue;
            }

            if !self.registry.is_ready(&record.user_id).await {
                info!(
                    user_id = %record.user_id,
                    name = %record.name,
                    "session not ready, skipping greeting"
                );
                continue;
            }

            let message = self.template.replace("{name}", &record.name);
            match self
                .registry
                .send(&record.user_id, &record.number, &message)
                .await
            {
                Ok(()) => info!(user_id = %record.user_id, name = %record.name, "greeting sent"),
                Err(e) => {
                    error!(
                        user_id = %record.user_id,
                        name = %record.name,
                        error = %e,
                        "failed to send greeting"
                    );
                },
            }
        }
    }
}

//! Synthetic end-to-end handler.
//!
//! Exercises the queue -> dedup -> persistence path with no site scraper
//! attached: one task per subject, one synthetic record per task per day.
//! Useful for validating a deployment's wiring before real scrapers are
//! pointed at it.

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Fingerprint, ResultRecord, SourceUniverse};
use crate::queue::TaskDescriptor;

use super::{HandlerError, HandlerOutput, TaskContext, TaskHandler};

pub struct ProbeHandler;

#[async_trait]
impl TaskHandler for ProbeHandler {
    fn kind(&self) -> &str {
        "probe"
    }

    fn produce_tasks(
        &self,
        universe: &SourceUniverse,
    ) -> Box<dyn Iterator<Item = TaskDescriptor> + Send> {
        let tickers = universe.tickers.clone();
        Box::new(
            tickers
                .into_iter()
                .map(|ticker| TaskDescriptor::new("probe", &ticker)),
        )
    }

    async fn execute(
        &self,
        payload: &str,
        ctx: &TaskContext<'_>,
    ) -> Result<HandlerOutput, HandlerError> {
        // One synthetic article per subject per day, so re-probing the same
        // day exercises the dedup skip path.
        let day = Utc::now().format("%Y-%m-%d");
        let natural_key = format!("probe/{payload}/{day}");
        let fingerprint = Fingerprint::of(&natural_key);

        if !ctx.dedup.try_claim(&fingerprint, None).await? {
            return Ok(HandlerOutput {
                records: Vec::new(),
                skipped: 1,
            });
        }

        let record = ResultRecord {
            unique_id: uuid::Uuid::new_v4().to_string(),
            tickers: vec![payload.to_string()],
            source_id: natural_key,
            source_link: None,
            fingerprint,
            sector_code: None,
            sentiment: None,
            title: format!("probe {payload}"),
            text: format!("synthetic record for {payload} from {}", ctx.session),
            published_at: None,
            retrieved_at: Utc::now(),
            pending_migration: true,
        };

        Ok(HandlerOutput {
            records: vec![record],
            skipped: 0,
        })
    }
}

//! Prediction history for the logged-in user.

use std::sync::Arc;

use tracing::debug;

use crate::analysis::PredictionRecord;
use crate::error::GatewayError;
use crate::gateway::{endpoints, ApiRequest, RequestGateway, Transport};

/// Number of records shown as recent activity.
pub const RECENT_LIMIT: usize = 5;

/// Read access to past predictions. Both calls require a session.
pub struct HistoryService<T: Transport> {
    gateway: Arc<RequestGateway<T>>,
}

impl<T: Transport> HistoryService<T> {
    pub fn new(gateway: Arc<RequestGateway<T>>) -> Self {
        Self { gateway }
    }

    /// All predictions of the current user, in the order the API returns them
    /// (newest first).
    pub async fn history(&self) -> Result<Vec<PredictionRecord>, GatewayError> {
        let records: Vec<PredictionRecord> = self
            .gateway
            .send_json(ApiRequest::get(endpoints::HISTORY))
            .await?;
        debug!(count = records.len(), "Fetched prediction history");
        Ok(records)
    }

    /// A single prediction by id.
    pub async fn prediction(&self, id: i64) -> Result<PredictionRecord, GatewayError> {
        self.gateway
            .send_json(ApiRequest::get(endpoints::prediction(id)))
            .await
    }
}

/// Dashboard counts over a history listing.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub total: usize,
    pub normal: usize,
    pub abnormal: usize,
    pub recent: Vec<PredictionRecord>,
}

impl HistorySummary {
    pub fn from_records(records: &[PredictionRecord]) -> Self {
        let total = records.len();
        let normal = records.iter().filter(|r| !r.is_abnormal()).count();

        Self {
            total,
            normal,
            abnormal: total - normal,
            recent: records.iter().take(RECENT_LIMIT).cloned().collect(),
        }
    }
}

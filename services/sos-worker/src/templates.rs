//! Observation template allocation and lookup.
//!
//! Template identifiers are `template:{procedure}-{n}`, where `n` counts
//! creations per procedure starting at 0. Numbers are never reused or
//! reset for the lifetime of the manager, and identical requests still get
//! distinct identifiers.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use sos_protocol::filter::template_window;
use sos_protocol::{
    ObservationTemplate, ResultBlock, ResultStructure, TemporalFilter, TextEncoding,
    TEMPLATE_ID_PREFIX,
};

/// What a new template describes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTemplate {
    pub procedure: String,
    pub offering: Option<String>,
    pub observed_properties: Vec<String>,
    pub feature_of_interest: Option<String>,
    pub filters: Vec<TemporalFilter>,
    pub structure: ResultStructure,
    pub encoding: TextEncoding,
}

/// Creates and resolves observation templates.
#[derive(Default)]
pub struct TemplateManager {
    counters: Mutex<HashMap<String, u64>>,
    templates: RwLock<HashMap<String, ObservationTemplate>>,
}

impl TemplateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next identifier of a procedure.
    pub async fn allocate_id(&self, procedure: &str) -> String {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(procedure.to_string()).or_insert(0);
        let id = format!("{}{}-{}", TEMPLATE_ID_PREFIX, procedure, counter);
        *counter += 1;
        id
    }

    /// Create and register a template.
    ///
    /// Without filters the template window starts at `sentinel_start`.
    pub async fn create(&self, new: NewTemplate, sentinel_start: DateTime<Utc>) -> ObservationTemplate {
        let id = self.allocate_id(&new.procedure).await;
        let template = ObservationTemplate {
            id: id.clone(),
            procedure: new.procedure,
            offering: new.offering,
            observed_properties: new.observed_properties,
            feature_of_interest: new.feature_of_interest,
            sampling_time: template_window(&new.filters, sentinel_start),
            filters: new.filters,
            result: ResultBlock::empty(new.structure, new.encoding),
        };

        self.templates.write().await.insert(id.clone(), template.clone());
        metrics::counter!("sos_templates_created_total").increment(1);
        debug!(template = %id, "Created observation template");
        template
    }

    pub async fn get(&self, id: &str) -> Option<ObservationTemplate> {
        self.templates.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.templates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

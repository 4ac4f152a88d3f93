use prometheus::{IntCounterVec, Opts, Registry};
use tracing::instrument;

const DISPOSITION_KEY: &str = "disposition";
const OUTCOME_KEY: &str = "outcome";

/// Classified result of one eviction request, as recorded in metrics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EvictionOutcome {
    Accepted,
    NotFound,
    RateLimited,
    Failed,
}

impl EvictionOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Failed => "failed",
        }
    }
}

/// Counters describing what the drain controller has been doing.
#[derive(Clone)]
pub struct DrainerMetrics {
    registry: Registry,
    dispositions: IntCounterVec,
    evictions: IntCounterVec,
}

impl DrainerMetrics {
    #[instrument]
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let dispositions = IntCounterVec::new(
            Opts::new(
                "ektopistis_reconcile_dispositions_total",
                "Node reconciliations by resulting disposition",
            ),
            &[DISPOSITION_KEY],
        )?;
        registry.register(Box::new(dispositions.clone()))?;

        let evictions = IntCounterVec::new(
            Opts::new(
                "ektopistis_evictions_total",
                "Eviction requests issued by outcome",
            ),
            &[OUTCOME_KEY],
        )?;
        registry.register(Box::new(evictions.clone()))?;

        Ok(DrainerMetrics {
            registry,
            dispositions,
            evictions,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_disposition(&self, disposition: &str) {
        self.dispositions.with_label_values(&[disposition]).inc();
    }

    pub fn record_eviction(&self, outcome: EvictionOutcome) {
        self.evictions.with_label_values(&[outcome.label()]).inc();
    }

    #[cfg(test)]
    pub(crate) fn eviction_count(&self, outcome: EvictionOutcome) -> u64 {
        self.evictions.with_label_values(&[outcome.label()]).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_registered() {
        let metrics = DrainerMetrics::new().unwrap();
        metrics.record_disposition("settled");
        metrics.record_eviction(EvictionOutcome::Accepted);
        metrics.record_eviction(EvictionOutcome::Accepted);

        assert_eq!(metrics.eviction_count(EvictionOutcome::Accepted), 2);
        assert_eq!(metrics.eviction_count(EvictionOutcome::Failed), 0);

        let names: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"ektopistis_reconcile_dispositions_total".to_string()));
        assert!(names.contains(&"ektopistis_evictions_total".to_string()));
    }
}

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::aggregator::SentimentPartitions;
use crate::article::Article;
use crate::classify::ClassifyCapability;
use crate::db::Store;
use crate::error::ContractError;
use crate::languages::{priority, Language};
use crate::monitor::MonitorConfig;
use crate::search::SearchCapability;
use crate::worker::LanguageWorker;
use crate::TARGET_DB;

/// How the work set for a monitoring run is determined.
#[derive(Clone, Debug)]
pub enum SearchMode {
    /// An explicit list of language codes.
    Languages(Vec<String>),
    /// Every language attributed to the named regions.
    Regions(Vec<String>),
    /// Languages whose coverage is older than the threshold, capped to bound
    /// run size.
    StaleCoverage {
        hours_threshold: i64,
        max_units: usize,
    },
}

/// One language's slice of a monitoring run. Owned exclusively by its worker
/// while executing; immutable once `completed`.
#[derive(Clone, Debug)]
pub struct WorkUnit {
    pub language: Language,
    pub queries: Vec<String>,
    pub articles: Vec<Article>,
    pub completed: bool,
    pub failure: Option<String>,
}

impl WorkUnit {
    pub fn new(language: Language) -> WorkUnit {
        WorkUnit {
            language,
            queries: Vec::new(),
            articles: Vec::new(),
            completed: false,
            failure: None,
        }
    }

    /// Marks the unit terminal with a recorded failure. Failed units are
    /// never dropped from the run; they surface in the digest.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
        self.completed = true;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    Dispatching,
    AwaitingJoin,
    Joined,
}

/// The whole monitoring run. Mutated additively by each pipeline stage.
#[derive(Clone, Debug)]
pub struct RunState {
    pub phase: RunPhase,
    pub units: BTreeMap<String, WorkUnit>,
    /// Language codes in dispatch order; the dedup tie-break follows it.
    pub dispatch_order: Vec<String>,
    pub all_articles: Vec<Article>,
    pub partitions: SentimentPartitions,
    pub digest: Option<String>,
}

impl RunState {
    fn new(units: BTreeMap<String, WorkUnit>, dispatch_order: Vec<String>) -> RunState {
        RunState {
            phase: RunPhase::Initializing,
            units,
            dispatch_order,
            all_articles: Vec::new(),
            partitions: SentimentPartitions::default(),
            digest: None,
        }
    }

    /// The run is joined iff every unit reached a terminal state.
    pub fn joined(&self) -> bool {
        self.units.values().all(|unit| unit.completed)
    }

    /// Languages that completed without finding anything, in dispatch order.
    pub fn empty_languages(&self) -> Vec<&WorkUnit> {
        self.dispatch_order
            .iter()
            .filter_map(|code| self.units.get(code))
            .filter(|unit| unit.completed && unit.articles.is_empty())
            .collect()
    }
}

/// Decides the work set, fans one worker out per language, and joins.
pub struct Orchestrator {
    search: Arc<dyn SearchCapability>,
    classifier: Arc<dyn ClassifyCapability>,
    store: Arc<dyn Store>,
    config: Arc<MonitorConfig>,
}

impl Orchestrator {
    pub fn new(
        search: Arc<dyn SearchCapability>,
        classifier: Arc<dyn ClassifyCapability>,
        store: Arc<dyn Store>,
        config: Arc<MonitorConfig>,
    ) -> Orchestrator {
        Orchestrator {
            search,
            classifier,
            store,
            config,
        }
    }

    /// Runs every language worker to a terminal state and returns the joined
    /// run. The join is a barrier: no unit is left pending, and aggregation
    /// must not start before this returns.
    pub async fn run(&self, mode: SearchMode) -> Result<RunState> {
        let codes = self.resolve_work_set(&mode).await?;

        let mut units = BTreeMap::new();
        let mut dispatch_order = Vec::with_capacity(codes.len());
        for code in &codes {
            if units.contains_key(code) {
                continue;
            }
            units.insert(code.clone(), WorkUnit::new(Language::resolve(code)));
            dispatch_order.push(code.clone());
        }
        // Priority classes first; ties keep original list order.
        dispatch_order.sort_by_key(|code| priority(code));

        let mut run = RunState::new(units, dispatch_order);
        info!(
            "Starting press monitoring for {} languages: {}",
            run.dispatch_order.len(),
            run.dispatch_order.join(", ")
        );

        if run.units.is_empty() {
            run.phase = RunPhase::Joined;
            return Ok(run);
        }

        run.phase = RunPhase::Dispatching;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_searches.max(1)));
        let mut join_set = JoinSet::new();
        let mut task_languages: HashMap<tokio::task::Id, String> = HashMap::new();

        for code in &run.dispatch_order {
            let Some(unit) = run.units.get(code).cloned() else {
                continue;
            };
            let worker = LanguageWorker::new(
                Arc::clone(&self.search),
                Arc::clone(&self.classifier),
                Arc::clone(&self.store),
                Arc::clone(&self.config),
            );
            let semaphore = Arc::clone(&semaphore);
            let handle = join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let mut unit = unit;
                        unit.record_failure("dispatcher shut down before start");
                        return unit;
                    }
                };
                worker.run(unit).await
            });
            task_languages.insert(handle.id(), code.clone());
        }

        run.phase = RunPhase::AwaitingJoin;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(unit) => {
                    info!(
                        "Language '{}' completed with {} articles{}",
                        unit.language.code,
                        unit.articles.len(),
                        unit.failure
                            .as_deref()
                            .map(|f| format!(" (degraded: {f})"))
                            .unwrap_or_default()
                    );
                    run.units.insert(unit.language.code.clone(), unit);
                }
                Err(join_error) => {
                    let code = task_languages
                        .get(&join_error.id())
                        .cloned()
                        .unwrap_or_default();
                    warn!("Worker task for '{}' died: {}", code, join_error);
                    if let Some(unit) = run.units.get_mut(&code) {
                        unit.record_failure(format!("worker task died: {join_error}"));
                    }
                }
            }
        }

        if !run.joined() {
            let incomplete = run
                .units
                .values()
                .find(|unit| !unit.completed)
                .map(|unit| unit.language.code.clone())
                .unwrap_or_default();
            return Err(ContractError::IncompleteJoin(incomplete).into());
        }
        run.phase = RunPhase::Joined;
        info!(
            "Search completed. Found {} articles across {} languages.",
            run.units.values().map(|u| u.articles.len()).sum::<usize>(),
            run.units.len()
        );
        Ok(run)
    }

    async fn resolve_work_set(&self, mode: &SearchMode) -> Result<Vec<String>> {
        match mode {
            SearchMode::Languages(codes) => {
                if codes.is_empty() {
                    return Err(
                        ContractError::EmptyWorkSet("no languages requested".to_string()).into(),
                    );
                }
                Ok(codes.clone())
            }
            SearchMode::Regions(regions) => {
                if regions.is_empty() {
                    return Err(
                        ContractError::EmptyWorkSet("no regions requested".to_string()).into()
                    );
                }
                match self.store.languages_for_regions(regions).await {
                    Ok(codes) => Ok(codes),
                    Err(e) => {
                        // Degraded discovery, not a run failure.
                        warn!(target: TARGET_DB, "Region expansion unavailable: {}", e);
                        Ok(Vec::new())
                    }
                }
            }
            SearchMode::StaleCoverage {
                hours_threshold,
                max_units,
            } => match self.store.stale_languages(*hours_threshold).await {
                Ok(mut codes) => {
                    codes.truncate(*max_units);
                    Ok(codes)
                }
                Err(e) => {
                    warn!(target: TARGET_DB, "Stale-coverage discovery unavailable: {}", e);
                    Ok(Vec::new())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, ScriptedSearch, StubClassifier, StubSearch};
    use std::time::{Duration, Instant};

    fn config() -> Arc<MonitorConfig> {
        Arc::new(MonitorConfig::default())
    }

    #[tokio::test]
    async fn explicit_empty_language_list_is_a_contract_error() {
        let orchestrator = Orchestrator::new(
            Arc::new(StubSearch::default()),
            Arc::new(StubClassifier::default()),
            Arc::new(MemoryStore::default()),
            config(),
        );
        let err = orchestrator
            .run(SearchMode::Languages(vec![]))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ContractError>().is_some());
    }

    #[tokio::test]
    async fn join_waits_for_slow_workers() {
        let delay = Duration::from_millis(200);
        let mut search = StubSearch::default();
        search.script.insert(
            "q-tr".to_string(),
            ScriptedSearch::Docs(vec![("https://tr.example.com/1", "a")]),
        );
        search.script.insert(
            "q-ru".to_string(),
            ScriptedSearch::DelayedDocs(delay, vec![("https://ru.example.com/1", "b")]),
        );

        let orchestrator = Orchestrator::new(
            Arc::new(search),
            Arc::new(StubClassifier::default()),
            Arc::new(MemoryStore::default()),
            config(),
        );

        let started = Instant::now();
        let run = orchestrator
            .run(SearchMode::Languages(vec!["tr".into(), "ru".into()]))
            .await
            .unwrap();

        // The orchestrator must not race ahead of the slow unit.
        assert!(started.elapsed() >= delay);
        assert_eq!(run.phase, RunPhase::Joined);
        assert!(run.joined());
        assert!(run.units.values().all(|unit| unit.completed));
    }

    #[tokio::test]
    async fn stale_mode_caps_unit_count() {
        let mut store = MemoryStore::default();
        store.stale = vec!["tr".into(), "ru".into(), "fa".into(), "kk".into()];

        let orchestrator = Orchestrator::new(
            Arc::new(StubSearch::default()),
            Arc::new(StubClassifier::default()),
            Arc::new(store),
            config(),
        );
        let run = orchestrator
            .run(SearchMode::StaleCoverage {
                hours_threshold: 24,
                max_units: 2,
            })
            .await
            .unwrap();
        assert_eq!(run.units.len(), 2);
    }

    #[tokio::test]
    async fn dispatch_order_follows_priority_classes() {
        let orchestrator = Orchestrator::new(
            Arc::new(StubSearch::default()),
            Arc::new(StubClassifier::default()),
            Arc::new(MemoryStore::default()),
            config(),
        );
        let run = orchestrator
            .run(SearchMode::Languages(vec![
                "sw".into(),
                "en".into(),
                "kk".into(),
                "tr".into(),
            ]))
            .await
            .unwrap();
        assert_eq!(run.dispatch_order, vec!["tr", "kk", "en", "sw"]);
    }
}

//! Feature-computation loop over a checkpointed pending set
//!
//! Reads one classified id set as the pending work set, computes the
//! configured feature row for each repository, and appends it to the
//! matching CSV table. Ids leave the pending set only after their row has
//! been written, so an interrupted run resumes where it stopped and loses
//! at most the rows since the last flush.

use crate::analysis::RepoView;
use crate::checkpoint::{load_ids, load_names, save_ids, save_names, Checkpointer};
use crate::config::{Config, TargetSet};
use crate::features::{Feature, FeatureValue};
use crate::identity::IdentityPool;
use crate::output::FeatureTable;
use crate::provider::{build_api_client, ApiClient, ProviderError};
use crate::{ConfigError, QuarryError, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Quota failures tolerated per feature before it is sentineled
const QUOTA_STRIKES: u32 = 2;

/// Transport failures tolerated per feature before the row is abandoned
const TRANSPORT_STRIKES: u32 = 2;

/// Pause before retrying a timed-out or failed transport call
const TRANSPORT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Outcome of one pending id
enum RowOutcome {
    Written,
    SkippedDuplicate,
    Abandoned,
}

/// Drives feature computation for every id in one classified set
pub struct FeatureComputer {
    api: ApiClient,
    pool: IdentityPool,
    checkpointer: Checkpointer,
    features: Vec<Feature>,
    table: FeatureTable,
    pending: HashSet<u64>,
    seen_names: HashSet<String>,
    pending_path: PathBuf,
    names_path: PathBuf,
    log_path: PathBuf,
    flush_interval: usize,
}

/// Runs the compute phase for `source` end to end
///
/// The not-suitable set has no feature table; asking to compute it is a
/// configuration mistake, reported before any remote call.
pub async fn run_compute(config: &Config, source: TargetSet) -> Result<()> {
    let mut computer = FeatureComputer::new(config, source).await?;
    let outcome = computer.process_all().await;
    computer.flush().await?;
    match outcome {
        Err(QuarryError::QuotaUnavailable { attempts }) => {
            warn!(attempts, "API calls were not granted; stopping");
            Ok(())
        }
        other => other,
    }
}

impl FeatureComputer {
    pub async fn new(config: &Config, source: TargetSet) -> Result<Self> {
        let csv_path = match source {
            TargetSet::Maintained => &config.compute.maintained_csv,
            TargetSet::Unmaintained => &config.compute.unmaintained_csv,
            TargetSet::NotSuitable => {
                return Err(ConfigError::Validation(
                    "the not-suitable set has no feature table".to_string(),
                )
                .into())
            }
        };
        let pending_path = PathBuf::from(source.ids_file(&config.checkpoint));
        let names_path = PathBuf::from(&config.checkpoint.seen_names);
        let csv_path = PathBuf::from(csv_path);

        let checkpointer = if config.blob.enabled {
            Checkpointer::connect(&config.blob).await?
        } else {
            Checkpointer::local_only()
        };
        checkpointer
            .download_all(&[&pending_path, &names_path, &csv_path])
            .await?;

        let pending = load_ids(&pending_path);
        let seen_names = load_names(&names_path);
        info!(
            set = %source,
            pending = pending.len(),
            "loaded pending work set"
        );

        let features = Feature::resolve(&config.compute.features)?;
        let table = FeatureTable::open(&csv_path, &config.compute.features)?;

        let http =
            build_api_client().map_err(|e| ProviderError::Transport(e.to_string()))?;
        let first_token = config
            .provider
            .tokens
            .first()
            .cloned()
            .unwrap_or_default();
        let mut api = ApiClient::new(http, &config.provider.api_base, first_token)?;
        let mut pool = IdentityPool::from_config(&config.provider);
        let identity = pool.acquire(&api).await?;
        api.set_token(identity.token);

        Ok(Self {
            api,
            pool,
            checkpointer,
            features,
            table,
            pending,
            seen_names,
            pending_path,
            names_path,
            log_path: PathBuf::from(&config.checkpoint.run_log),
            flush_interval: config.checkpoint.flush_interval,
        })
    }

    async fn process_all(&mut self) -> Result<()> {
        let mut ids: Vec<u64> = self.pending.iter().copied().collect();
        ids.sort_unstable();

        let mut since_flush = 0usize;
        let mut written = 0usize;
        for id in ids {
            match self.process_one(id).await? {
                RowOutcome::Written => {
                    written += 1;
                    since_flush += 1;
                    info!(
                        rows = written,
                        remaining = self.pending.len(),
                        "row complete"
                    );
                }
                RowOutcome::SkippedDuplicate => since_flush += 1,
                RowOutcome::Abandoned => continue,
            }
            if since_flush >= self.flush_interval {
                self.flush().await?;
                since_flush = 0;
            }
        }
        info!(rows = written, remaining = self.pending.len(), "compute pass finished");
        Ok(())
    }

    /// Computes and appends the row for one id
    ///
    /// Only a fully computed row removes the id from the pending set; an
    /// abandoned row leaves it for the next run.
    async fn process_one(&mut self, id: u64) -> Result<RowOutcome> {
        let repo = loop {
            match self.api.get_repository(id).await {
                Ok(repo) => break repo,
                Err(ProviderError::QuotaExceeded) => self.rotate_identity().await?,
                Err(ProviderError::NotFound) => {
                    warn!(id, "repository no longer exists; abandoning row");
                    return Ok(RowOutcome::Abandoned);
                }
                Err(ProviderError::Timeout) | Err(ProviderError::Transport(_)) => {
                    tokio::time::sleep(TRANSPORT_RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(id, error = %e, "could not fetch repository; abandoning row");
                    return Ok(RowOutcome::Abandoned);
                }
            }
        };

        if self.seen_names.contains(&repo.full_name) {
            debug!(id, name = %repo.full_name, "already computed under this name; skipping");
            self.pending.remove(&id);
            return Ok(RowOutcome::SkippedDuplicate);
        }
        let full_name = repo.full_name.clone();
        let mut view = RepoView::new(repo);

        let mut row = Vec::with_capacity(self.features.len());
        for feature in self.features.clone() {
            match self.compute_cell(feature, &mut view).await? {
                Some(value) => row.push(value),
                None => {
                    warn!(id, feature = feature.name(), "abandoning row");
                    return Ok(RowOutcome::Abandoned);
                }
            }
        }

        self.table.append_row(&row)?;
        self.seen_names.insert(full_name);
        self.pending.remove(&id);
        Ok(RowOutcome::Written)
    }

    /// Computes one cell, retrying within the per-feature strike budgets
    ///
    /// A second consecutive quota failure yields the sentinel instead of
    /// stalling the whole row on one starved endpoint. `None` means the
    /// row cannot be completed at all.
    async fn compute_cell(
        &mut self,
        feature: Feature,
        view: &mut RepoView,
    ) -> Result<Option<FeatureValue>> {
        let mut quota_strikes = 0u32;
        let mut transport_strikes = 0u32;
        loop {
            match feature.compute(view, &self.api).await {
                Ok(value) => return Ok(Some(value)),
                Err(ProviderError::QuotaExceeded) => {
                    quota_strikes += 1;
                    if quota_strikes >= QUOTA_STRIKES {
                        warn!(
                            feature = feature.name(),
                            "quota exhausted twice for one feature; writing sentinel"
                        );
                        return Ok(Some(FeatureValue::Missing));
                    }
                    self.rotate_identity().await?;
                }
                Err(ProviderError::Timeout) | Err(ProviderError::Transport(_)) => {
                    transport_strikes += 1;
                    if transport_strikes >= TRANSPORT_STRIKES {
                        return Ok(None);
                    }
                    tokio::time::sleep(TRANSPORT_RETRY_DELAY).await;
                }
                Err(ProviderError::NotFound) => return Ok(None),
                Err(e) => {
                    warn!(feature = feature.name(), error = %e, "feature failed");
                    return Ok(None);
                }
            }
        }
    }

    async fn rotate_identity(&mut self) -> Result<()> {
        let identity = self.pool.acquire(&self.api).await?;
        self.api.set_token(identity.token);
        Ok(())
    }

    /// Persists the pending set, the name set, the table, and the run log
    async fn flush(&mut self) -> Result<()> {
        save_ids(&self.pending_path, &self.pending)?;
        save_names(&self.names_path, &self.seen_names)?;
        self.checkpointer
            .upload_all(&[
                self.pending_path.as_path(),
                self.names_path.as_path(),
                self.table.path(),
                self.log_path.as_path(),
            ])
            .await?;
        debug!(pending = self.pending.len(), "checkpoint flushed");
        Ok(())
    }

    #[cfg(test)]
    pub fn pending(&self) -> &HashSet<u64> {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_with_source() -> Config {
        let toml = r#"
            [search]
            from-year = 2012
            to-year = 2020
            query = "created:{date}"
            target-set = "unmaintained"
            target-count = 10

            [compute]
            features = ["stargazers-count"]
            maintained-csv = "maintained.csv"
            unmaintained-csv = "unmaintained.csv"

            [checkpoint]
            unmaintained-ids = "unmaintained.json"
            maintained-ids = "maintained.json"
            not-suitable-ids = "not_suitable.json"
            seen-names = "seen_names.json"

            [provider]
            token-env = ["QUARRY_TEST_TOKEN"]
        "#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        std::env::set_var("QUARRY_TEST_TOKEN", "token-a");
        load_config(file.path()).unwrap()
    }

    #[tokio::test]
    async fn test_not_suitable_set_is_rejected_as_source() {
        let config = config_with_source();
        let result = FeatureComputer::new(&config, TargetSet::NotSuitable).await;
        assert!(matches!(
            result,
            Err(QuarryError::Config(ConfigError::Validation(_)))
        ));
    }
}

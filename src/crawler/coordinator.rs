//! Crawl loop: date sampling, candidate classification, checkpointing
//!
//! The loop alternates between two phases. Sampling draws a random
//! creation date from the configured range and asks the search endpoint
//! for repositories created that day. Classifying sorts each candidate
//! into exactly one of the unmaintained, maintained, or not-suitable id
//! sets. Every `flush_interval` classifications the four sets are written
//! to disk and mirrored, together with the run log, to the blob store;
//! one final flush runs on every exit path.

use crate::analysis::{classify, RepoView};
use crate::checkpoint::{load_ids, load_names, save_ids, save_names, Checkpointer};
use crate::config::{Config, TargetSet};
use crate::identity::IdentityPool;
use crate::provider::{build_api_client, ApiClient, ProviderError};
use crate::{QuarryError, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use rand::Rng;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause before retrying a timed-out or failed transport call
const TRANSPORT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Where one candidate ended up
enum Classification {
    Unmaintained,
    Maintained,
    NotSuitable,
    /// Malformed or unreadable; not recorded anywhere
    Skipped,
}

/// Drives the crawl phase against one configuration
pub struct Crawler {
    api: ApiClient,
    pool: IdentityPool,
    checkpointer: Checkpointer,
    query_template: String,
    from_year: i32,
    to_year: i32,
    sample_size: usize,
    target_set: TargetSet,
    target_count: usize,
    flush_interval: usize,
    unmaintained: HashSet<u64>,
    maintained: HashSet<u64>,
    not_suitable: HashSet<u64>,
    seen_names: HashSet<String>,
    unmaintained_path: PathBuf,
    maintained_path: PathBuf,
    not_suitable_path: PathBuf,
    names_path: PathBuf,
    log_path: PathBuf,
}

/// Runs the crawl phase end to end
///
/// A quota refusal from the identity pool ends the run cleanly instead of
/// failing it: the sets collected so far are flushed and kept for the
/// next run.
pub async fn run_search(config: &Config) -> Result<()> {
    let mut crawler = Crawler::new(config).await?;
    let outcome = crawler.crawl().await;
    crawler.flush().await?;
    match outcome {
        Err(QuarryError::QuotaUnavailable { attempts }) => {
            warn!(attempts, "API calls were not granted; stopping");
            Ok(())
        }
        other => other,
    }
}

impl Crawler {
    pub async fn new(config: &Config) -> Result<Self> {
        let unmaintained_path = PathBuf::from(&config.checkpoint.unmaintained_ids);
        let maintained_path = PathBuf::from(&config.checkpoint.maintained_ids);
        let not_suitable_path = PathBuf::from(&config.checkpoint.not_suitable_ids);
        let names_path = PathBuf::from(&config.checkpoint.seen_names);

        let checkpointer = if config.blob.enabled {
            Checkpointer::connect(&config.blob).await?
        } else {
            Checkpointer::local_only()
        };
        checkpointer
            .download_all(&[
                &unmaintained_path,
                &maintained_path,
                &not_suitable_path,
                &names_path,
            ])
            .await?;

        let unmaintained = load_ids(&unmaintained_path);
        let maintained = load_ids(&maintained_path);
        let not_suitable = load_ids(&not_suitable_path);
        let seen_names = load_names(&names_path);
        info!(
            unmaintained = unmaintained.len(),
            maintained = maintained.len(),
            not_suitable = not_suitable.len(),
            "loaded classification sets"
        );

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
            query_template: config.search.query.clone(),
            from_year: config.search.from_year,
            to_year: config.search.to_year,
            sample_size: config.search.sample_size,
            target_set: config.search.target_set,
            target_count: config.search.target_count,
            flush_interval: config.checkpoint.flush_interval,
            unmaintained,
            maintained,
            not_suitable,
            seen_names,
            unmaintained_path,
            maintained_path,
            not_suitable_path,
            names_path,
            log_path: PathBuf::from(&config.checkpoint.run_log),
        })
    }

    async fn crawl(&mut self) -> Result<()> {
        let mut since_flush = 0usize;
        while self.target_len() < self.target_count {
            let date = self.sample_date();
            let query = self.query_template.replace("{date}", &date);
            info!(
                %query,
                progress = self.target_len(),
                target = self.target_count,
                "sampling"
            );

            let items = self.search_batch(&query).await?;
            for item in items {
                if self.target_len() >= self.target_count {
                    break;
                }
                if self.classified(item.id) || self.seen_names.contains(&item.full_name) {
                    debug!(id = item.id, "already known; skipping");
                    continue;
                }
                match self.classify_one(item.id).await? {
                    Classification::Skipped => continue,
                    _ => since_flush += 1,
                }
                if since_flush >= self.flush_interval {
                    self.flush().await?;
                    since_flush = 0;
                }
            }
        }
        info!(
            set = %self.target_set,
            count = self.target_len(),
            "target reached"
        );
        Ok(())
    }

    /// Fetches one page of search results, retrying quota and transport
    /// failures; a malformed response skips the batch
    async fn search_batch(&mut self, query: &str) -> Result<Vec<crate::provider::SearchItem>> {
        loop {
            match self.api.search_repositories(query, self.sample_size).await {
                Ok(items) => return Ok(items),
                Err(ProviderError::QuotaExceeded) => self.rotate_identity().await?,
                Err(ProviderError::Timeout) | Err(ProviderError::Transport(_)) => {
                    tokio::time::sleep(TRANSPORT_RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(query, error = %e, "search failed; skipping batch");
                    return Ok(Vec::new());
                }
            }
        }
    }

    /// Sorts one candidate into exactly one of the three sets
    async fn classify_one(&mut self, id: u64) -> Result<Classification> {
        let repo = loop {
            match self.api.get_repository(id).await {
                Ok(repo) => break repo,
                Err(ProviderError::QuotaExceeded) => self.rotate_identity().await?,
                Err(ProviderError::NotFound) => {
                    debug!(id, "repository gone; marking not suitable");
                    self.not_suitable.insert(id);
                    return Ok(Classification::NotSuitable);
                }
                Err(ProviderError::Timeout) | Err(ProviderError::Transport(_)) => {
                    tokio::time::sleep(TRANSPORT_RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(id, error = %e, "could not fetch repository; skipping");
                    return Ok(Classification::Skipped);
                }
            }
        };
        let full_name = repo.full_name.clone();
        let mut view = RepoView::new(repo);

        let suitable = loop {
            match classify::suitable(&mut view, &self.api).await {
                Ok(verdict) => break verdict,
                Err(ProviderError::QuotaExceeded) => self.rotate_identity().await?,
                Err(ProviderError::NotFound) => {
                    self.not_suitable.insert(id);
                    return Ok(Classification::NotSuitable);
                }
                Err(ProviderError::Timeout) | Err(ProviderError::Transport(_)) => {
                    tokio::time::sleep(TRANSPORT_RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(id, name = %full_name, error = %e, "suitability check failed; skipping");
                    return Ok(Classification::Skipped);
                }
            }
        };
        if !suitable {
            debug!(id, name = %full_name, "not suitable");
            self.not_suitable.insert(id);
            return Ok(Classification::NotSuitable);
        }

        let unmaintained = loop {
            match classify::unmaintained(&mut view, &self.api).await {
                Ok(verdict) => break verdict,
                Err(ProviderError::QuotaExceeded) => self.rotate_identity().await?,
                Err(ProviderError::NotFound) => {
                    self.not_suitable.insert(id);
                    return Ok(Classification::NotSuitable);
                }
                Err(ProviderError::Timeout) | Err(ProviderError::Transport(_)) => {
                    tokio::time::sleep(TRANSPORT_RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(id, name = %full_name, error = %e, "maintenance check failed; skipping");
                    return Ok(Classification::Skipped);
                }
            }
        };
        if unmaintained {
            info!(id, name = %full_name, "classified unmaintained");
            self.unmaintained.insert(id);
            Ok(Classification::Unmaintained)
        } else {
            info!(id, name = %full_name, "classified maintained");
            self.maintained.insert(id);
            self.seen_names.insert(full_name);
            Ok(Classification::Maintained)
        }
    }

    /// A uniformly random date inside the configured year range
    fn sample_date(&self) -> String {
        // Year bounds are validated at config load, so both dates exist.
        let start = NaiveDate::from_ymd_opt(self.from_year, 1, 1)
            .unwrap_or(NaiveDate::MIN);
        let end = NaiveDate::from_ymd_opt(self.to_year, 12, 31)
            .unwrap_or(NaiveDate::MAX);
        let span = (end - start).num_days().max(0);
        let offset = rand::thread_rng().gen_range(0..=span);
        (start + ChronoDuration::days(offset))
            .format("%Y-%m-%d")
            .to_string()
    }

    fn classified(&self, id: u64) -> bool {
        self.unmaintained.contains(&id)
            || self.maintained.contains(&id)
            || self.not_suitable.contains(&id)
    }

    fn target_len(&self) -> usize {
        match self.target_set {
            TargetSet::Unmaintained => self.unmaintained.len(),
            TargetSet::Maintained => self.maintained.len(),
            TargetSet::NotSuitable => self.not_suitable.len(),
        }
    }

    async fn rotate_identity(&mut self) -> Result<()> {
        let identity = self.pool.acquire(&self.api).await?;
        self.api.set_token(identity.token);
        Ok(())
    }

    /// Writes all four sets locally and mirrors them, with the run log,
    /// to the blob store
    async fn flush(&mut self) -> Result<()> {
        save_ids(&self.unmaintained_path, &self.unmaintained)?;
        save_ids(&self.maintained_path, &self.maintained)?;
        save_ids(&self.not_suitable_path, &self.not_suitable)?;
        save_names(&self.names_path, &self.seen_names)?;
        self.checkpointer
            .upload_all(&[
                self.unmaintained_path.as_path(),
                self.maintained_path.as_path(),
                self.not_suitable_path.as_path(),
                self.names_path.as_path(),
                self.log_path.as_path(),
            ])
            .await?;
        debug!(
            unmaintained = self.unmaintained.len(),
            maintained = self.maintained.len(),
            not_suitable = self.not_suitable.len(),
            "checkpoint flushed"
        );
        Ok(())
    }

    #[cfg(test)]
    pub fn sets(&self) -> (&HashSet<u64>, &HashSet<u64>, &HashSet<u64>) {
        (&self.unmaintained, &self.maintained, &self.not_suitable)
    }
}

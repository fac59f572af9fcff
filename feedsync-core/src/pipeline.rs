//! High-level pipeline: orchestrates match → decide → mutate for every
//! variant group in a feed.
//!
//! The pipeline partitions groups into fixed-size batches and reconciles
//! each batch's groups concurrently. A batch is a barrier: every task in it
//! settles, successfully or with a recorded error, before the next batch
//! starts, and a fixed delay between batches keeps the remote API's rate
//! limits happy. Nothing below a group task's boundary can abort the run;
//! the run always ends with a completion event carrying full accounting.
//!
//! # Major Types
//! - [`SyncPipeline`]: the orchestrator, constructed per shop with explicit
//!   [`SyncConfig`]
//! - [`SyncReport`]: run id plus final [`SyncStats`]
//!
//! # Callable From
//! - The CLI crate and integration tests; expects concrete
//!   [`CatalogClient`], [`ProgressNotifier`] and [`TrackingStore`]
//!   implementations (or mocks).
//!
//! # Cancellation
//! There is none to speak of: an external abort simply stops scheduling
//! further batches, in-flight group tasks finish on their own.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::contract::{
    CatalogClient, ProductMapping, ProgressEvent, ProgressNotifier, TrackingStore,
};
use crate::error::SyncError;
use crate::feed::{self, FeedItem};
use crate::group::{group_items, VariantGroup};
use crate::matcher::CatalogMatcher;
use crate::mutation::{MutationExecutor, UpdateOutcome};
use crate::stats::SyncStats;

/// Final accounting for one run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub stats: SyncStats,
}

enum GroupOutcome {
    Created { variants_created: usize },
    Updated { variants_updated: usize, variants_created: usize },
    Skipped,
}

pub struct SyncPipeline<C, N, T> {
    matcher: CatalogMatcher<C>,
    executor: MutationExecutor<C>,
    notifier: N,
    tracking: T,
    config: SyncConfig,
    shop: String,
}

impl<C, N, T> SyncPipeline<C, N, T>
where
    C: CatalogClient,
    N: ProgressNotifier,
    T: TrackingStore,
{
    pub fn new(
        client: Arc<C>,
        notifier: N,
        tracking: T,
        config: SyncConfig,
        shop: impl Into<String>,
    ) -> Self {
        let matcher = CatalogMatcher::new(Arc::clone(&client), config.cache_enabled);
        let executor = MutationExecutor::new(client, &config);
        Self {
            matcher,
            executor,
            notifier,
            tracking,
            config,
            shop: shop.into(),
        }
    }

    /// Download, parse and reconcile a feed by URL. Fetch and parse failures
    /// abort the run before any group work starts.
    pub async fn run_from_url(&self, url: &str) -> Result<SyncReport, SyncError> {
        let bytes = feed::fetch(url).await?;
        let items = feed::parse(&bytes)?;
        self.run(items).await
    }

    /// Reconcile already-parsed feed items.
    pub async fn run(&self, items: Vec<FeedItem>) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4();
        let mut groups = group_items(items);

        // Everything present in the feed is "seen", including groups beyond
        // the per-run cap: capping defers work, it must not delete it.
        let seen_keys: HashSet<String> = groups.iter().map(|g| g.key.clone()).collect();
        if let Some(cap) = self.config.max_groups {
            if groups.len() > cap {
                warn!(
                    total = groups.len(),
                    cap, "[SYNC] Capping groups for this run"
                );
                groups.truncate(cap);
            }
        }

        let total = groups.len();
        info!(%run_id, shop = %self.shop, total, "[SYNC] Starting reconciliation run");
        let stats = Mutex::new(SyncStats {
            total_groups: total,
            ..SyncStats::default()
        });
        self.notify(ProgressEvent::SyncStarted { total }).await;

        let batch_size = self.config.batch_size.max(1);
        for (batch_index, batch) in groups.chunks(batch_size).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(self.config.inter_batch_delay()).await;
            }
            info!(
                batch = batch_index + 1,
                size = batch.len(),
                "[SYNC] Processing batch"
            );
            // join_all is the batch barrier: each task records its own
            // outcome, a failure never cancels its siblings.
            join_all(
                batch
                    .iter()
                    .map(|group| self.process_group(group, total, &stats)),
            )
            .await;
        }

        if self.config.auto_delete {
            self.delete_missing(&seen_keys, &stats).await;
        }

        let final_stats = stats.into_inner().expect("stats mutex poisoned");
        info!(
            %run_id,
            created = final_stats.created,
            updated = final_stats.updated,
            skipped = final_stats.skipped,
            errored = final_stats.errored,
            "[SYNC] Run complete"
        );
        self.notify(ProgressEvent::SyncCompleted {
            stats: final_stats.clone(),
        })
        .await;

        Ok(SyncReport {
            run_id,
            stats: final_stats,
        })
    }

    async fn process_group(&self, group: &VariantGroup, total: usize, stats: &Mutex<SyncStats>) {
        let title = group.master().title.clone();
        let processed = {
            let mut stats = stats.lock().expect("stats mutex poisoned");
            stats.processed += 1;
            stats.processed
        };
        self.notify(ProgressEvent::Processing {
            product_title: title.clone(),
            processed,
            total,
        })
        .await;

        match self.reconcile_group(group).await {
            Ok(GroupOutcome::Created { variants_created }) => {
                {
                    let mut stats = stats.lock().expect("stats mutex poisoned");
                    stats.created += 1;
                    stats.variants_created += variants_created;
                }
                self.notify(ProgressEvent::Created {
                    product_title: title,
                    processed,
                    total,
                    variants_created,
                })
                .await;
            }
            Ok(GroupOutcome::Updated {
                variants_updated,
                variants_created,
            }) => {
                {
                    let mut stats = stats.lock().expect("stats mutex poisoned");
                    stats.updated += 1;
                    stats.variants_updated += variants_updated;
                    stats.variants_created += variants_created;
                }
                self.notify(ProgressEvent::Updated {
                    product_title: title,
                    processed,
                    total,
                    variants_updated,
                    variants_created,
                })
                .await;
            }
            Ok(GroupOutcome::Skipped) => {
                stats.lock().expect("stats mutex poisoned").skipped += 1;
                self.notify(ProgressEvent::Skipped {
                    product_title: title,
                    processed,
                    total,
                })
                .await;
            }
            Err(err) => {
                error!(group = %group.key, error = %err, "[SYNC] Group failed");
                stats
                    .lock()
                    .expect("stats mutex poisoned")
                    .record_error(&title, err.to_string());
                self.notify(ProgressEvent::Error {
                    product_title: title,
                    processed,
                    total,
                    error: err.to_string(),
                })
                .await;
            }
        }
    }

    /// Match the group, decide create vs update, execute, and keep the
    /// tracking record current. Every error funnels back to the caller as a
    /// per-group record.
    async fn reconcile_group(&self, group: &VariantGroup) -> Result<GroupOutcome, SyncError> {
        let mapping = self
            .tracking
            .get(&group.key)
            .await
            .map_err(SyncError::transport)?;

        match mapping.filter(|m| m.active) {
            Some(mapping) => {
                let lookup_id = group
                    .feed_group_id()
                    .unwrap_or(&group.master().external_id)
                    .to_string();
                let first_sku = group.items.iter().find_map(|item| item.sku.as_deref());
                match self.matcher.find_by_group(&lookup_id, first_sku).await {
                    Some(existing) => {
                        let outcome = self
                            .executor
                            .update(&existing, group, Some(mapping.last_price))
                            .await?;
                        if !matches!(outcome, UpdateOutcome::Skipped) {
                            self.upsert_mapping(group, existing.id.clone()).await?;
                        }
                        Ok(outcome.into())
                    }
                    None => {
                        // Tracked but gone remotely: recreate rather than
                        // leave the product missing.
                        info!(group = %group.key, "[SYNC] Tracked product missing remotely, recreating");
                        let created = self.executor.create(group).await?;
                        self.upsert_mapping(group, created.product_id).await?;
                        Ok(GroupOutcome::Created {
                            variants_created: created.variants_created,
                        })
                    }
                }
            }
            None => match self.matcher.find_existing(group).await {
                Some(existing) => {
                    let outcome = self.executor.update(&existing, group, None).await?;
                    self.upsert_mapping(group, existing.id.clone()).await?;
                    Ok(outcome.into())
                }
                None => {
                    let created = self.executor.create(group).await?;
                    self.upsert_mapping(group, created.product_id).await?;
                    Ok(GroupOutcome::Created {
                        variants_created: created.variants_created,
                    })
                }
            },
        }
    }

    async fn upsert_mapping(
        &self,
        group: &VariantGroup,
        remote_product_id: String,
    ) -> Result<(), SyncError> {
        let master = group.master();
        self.tracking
            .upsert(ProductMapping {
                group_key: group.key.clone(),
                sku: master.sku.clone(),
                remote_product_id,
                title: master.title.clone(),
                last_price: master.price,
                active: true,
            })
            .await
            .map_err(SyncError::transport)
    }

    /// Remove remote products whose mapping is active but absent from the
    /// current feed. Runs after all batches; each failure is recorded, none
    /// stops the pass.
    async fn delete_missing(&self, seen_keys: &HashSet<String>, stats: &Mutex<SyncStats>) {
        let mappings = match self.tracking.list_active().await {
            Ok(mappings) => mappings,
            Err(err) => {
                warn!(error = %err, "[SYNC] Could not list tracked products, skipping delete pass");
                return;
            }
        };

        for mapping in mappings
            .into_iter()
            .filter(|m| m.active && !seen_keys.contains(&m.group_key))
        {
            let outcome = match self.executor.remove(&mapping).await {
                Ok(()) => self
                    .tracking
                    .mark_inactive(&mapping.group_key)
                    .await
                    .map_err(SyncError::transport),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => {
                    stats.lock().expect("stats mutex poisoned").deleted += 1;
                }
                Err(err) => {
                    stats
                        .lock()
                        .expect("stats mutex poisoned")
                        .record_error(&mapping.title, format!("delete failed: {err}"));
                }
            }
        }
    }

    /// Progress delivery is best-effort: a broken notifier must never take
    /// the run down with it.
    async fn notify(&self, event: ProgressEvent) {
        if let Err(err) = self.notifier.send(&self.shop, event).await {
            warn!(error = %err, "[SYNC] Progress notification failed");
        }
    }
}

impl From<UpdateOutcome> for GroupOutcome {
    fn from(outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::Skipped => GroupOutcome::Skipped,
            UpdateOutcome::Updated {
                variants_updated,
                variants_created,
            } => GroupOutcome::Updated {
                variants_updated,
                variants_created,
            },
        }
    }
}

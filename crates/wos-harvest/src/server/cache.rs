//! Read-mostly table cache shared by the HTTP handlers.
//!
//! The cache holds one immutable [`Snapshot`]. A bulk load builds a complete
//! replacement off to the side and publishes it with a single pointer swap, so
//! readers see either the previous snapshot or the new one, never a mix.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;

use super::source::TableSource;
use crate::models::{AuthorRow, Organization, slugify};

/// Load state of one organization's table.
#[derive(Debug, Clone)]
pub enum OrgState {
    /// No load has finished yet.
    NotLoaded,
    /// Table available.
    Ready(Arc<Vec<AuthorRow>>),
    /// Load failed with this message.
    Failed(String),
}

impl OrgState {
    /// Short state label used in listings.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotLoaded => "not_loaded",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }

    /// Row count, 0 unless ready.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Self::Ready(rows) => rows.len(),
            _ => 0,
        }
    }
}

/// One published view of every organization's table.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Incremented on every publish; 0 before the first load.
    pub generation: u64,

    /// States keyed by organization display name.
    pub states: BTreeMap<String, OrgState>,
}

impl Snapshot {
    /// True once a bulk load has been published.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.generation > 0
    }

    /// State for an organization, `NotLoaded` if it was never seen.
    #[must_use]
    pub fn state(&self, organization: &Organization) -> OrgState {
        self.states.get(&organization.display_name).cloned().unwrap_or(OrgState::NotLoaded)
    }

    /// Ready tables in display-name order.
    pub fn ready_tables(&self) -> impl Iterator<Item = (&str, &[AuthorRow])> {
        self.states.iter().filter_map(|(name, state)| match state {
            OrgState::Ready(rows) => Some((name.as_str(), rows.as_slice())),
            _ => None,
        })
    }
}

/// Cache of per-organization tables.
#[derive(Debug)]
pub struct TableCache {
    organizations: Vec<Organization>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl TableCache {
    /// Create a cache for the given organizations, all `NotLoaded`.
    #[must_use]
    pub fn new(organizations: Vec<Organization>) -> Self {
        let states = organizations
            .iter()
            .map(|org| (org.display_name.clone(), OrgState::NotLoaded))
            .collect();

        Self {
            organizations,
            snapshot: RwLock::new(Arc::new(Snapshot { generation: 0, states })),
        }
    }

    /// Supported organizations.
    #[must_use]
    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    /// Resolve a path segment to a supported organization.
    ///
    /// Matches query name, display name or file stem, ignoring case.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Organization> {
        let needle = name.trim().to_lowercase();
        self.organizations.iter().find(|org| {
            org.query_name.to_lowercase() == needle
                || org.display_name.to_lowercase() == needle
                || org.file_stem() == slugify(&needle)
        })
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// True once the first bulk load has been published.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ready()
    }

    /// Load every organization concurrently, then publish the result at once.
    ///
    /// Failures are recorded per organization; they never abort the load.
    pub async fn bulk_load(&self, source: &dyn TableSource) -> Arc<Snapshot> {
        tracing::info!(organizations = self.organizations.len(), "Bulk load started");

        let results = join_all(self.organizations.iter().map(|org| async move {
            let state = match source.load(org).await {
                Ok(rows) => {
                    tracing::info!(organization = %org.display_name, rows = rows.len(), "Table loaded");
                    OrgState::Ready(Arc::new(rows))
                }
                Err(err) => {
                    tracing::error!(organization = %org.display_name, error = %err, "Table load failed");
                    OrgState::Failed(err.to_string())
                }
            };
            (org.display_name.clone(), state)
        }))
        .await;

        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(Snapshot { generation: guard.generation + 1, states: results.into_iter().collect() });
        *guard = Arc::clone(&next);
        drop(guard);

        tracing::info!(generation = next.generation, "Snapshot published");
        next
    }
}

//! Fetch → normalize for one or many organizations.

use futures::stream::{self, StreamExt};

use crate::client::WosClient;
use crate::config::Config;
use crate::error::PipelineResult;
use crate::models::{BatchReport, Organization, OrganizationTable, SearchQuery};
use crate::normalize::{dedupe_rows, normalize_pages};

/// Options shared by every organization in a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Drop repeated (uid, author) pairs.
    pub dedupe: bool,
}

/// Build the query for an organization from configuration.
#[must_use]
pub fn query_for(config: &Config, organization: Organization) -> SearchQuery {
    SearchQuery::new(organization, config.year_range, config.page_size)
}

/// Harvest and flatten one organization.
///
/// # Errors
///
/// Returns error only when the organization's first page fails.
pub async fn run_query(
    client: &WosClient,
    query: &SearchQuery,
    options: PipelineOptions,
) -> PipelineResult<OrganizationTable> {
    let harvest = client.harvest(query).await?;
    let publications = harvest.record_count();
    let organization = harvest.query.organization;

    let mut rows = normalize_pages(&harvest.pages, &organization.display_name);
    if options.dedupe {
        let before = rows.len();
        rows = dedupe_rows(rows);
        tracing::debug!(
            organization = %organization.display_name,
            removed = before - rows.len(),
            "Deduplicated rows"
        );
    }

    tracing::info!(
        organization = %organization.display_name,
        publications,
        rows = rows.len(),
        "Normalized"
    );

    Ok(OrganizationTable { organization, rows, report: harvest.report })
}

/// Harvest several organizations independently.
///
/// Up to `config.max_concurrent_orgs` run at once. An organization whose first
/// page fails is listed in [`BatchReport::failed`]; the rest of the batch continues.
pub async fn run_batch(
    client: &WosClient,
    config: &Config,
    organizations: Vec<Organization>,
    options: PipelineOptions,
) -> BatchReport {
    let results: Vec<_> = stream::iter(organizations)
        .map(|organization| async move {
            let query = query_for(config, organization.clone());
            (organization, run_query(client, &query, options).await)
        })
        .buffered(config.max_concurrent_orgs.max(1))
        .collect()
        .await;

    let mut batch = BatchReport::default();
    for (organization, result) in results {
        match result {
            Ok(table) => batch.tables.push(table),
            Err(err) => {
                tracing::error!(organization = %organization.display_name, error = %err, "Organization skipped");
                batch.failed.push((organization, err.to_string()));
            }
        }
    }
    batch
}

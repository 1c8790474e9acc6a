//! Schedule page addresses.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use gymcal_core::PortalConfig;
use tracing::debug;
use url::Url;

use crate::error::PortalResult;

/// Week-view schedule URL for `date`, filtered to the named categories and
/// locations. Names missing from the portal's id tables are dropped.
pub fn schedule_url(
    portal: &PortalConfig,
    date: NaiveDate,
    categories: &[String],
    locations: &[String],
) -> PortalResult<String> {
    let mut url = Url::parse(&portal.base_url)?;

    url.query_pairs_mut()
        .append_pair("scheduleView", "week")
        .append_pair("date", &date.format("%Y-%m-%d").to_string())
        .append_pair("categoryIds", &id_list(&portal.categories, categories, "category"))
        .append_pair("locationIds", &id_list(&portal.locations, locations, "location"));

    Ok(url.into())
}

fn id_list(table: &BTreeMap<String, u32>, names: &[String], kind: &str) -> String {
    names
        .iter()
        .filter_map(|name| {
            let id = table.get(name);
            if id.is_none() {
                debug!(kind, name = %name, "unknown portal name, skipping");
            }
            id
        })
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

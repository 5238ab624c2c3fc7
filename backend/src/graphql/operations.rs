//! Generic entity operations
//!
//! Every query and mutation of the entity API is one of the functions below,
//! parametrized by an [`EntityType`]. Nothing in here is specific to a kind.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::filters::{FilterString, Relation, Term};
use super::pagination::{
    Connection, PaginationArgs, Reported, Window, build_filter_for_pagination, needs_filtered_count,
};
use super::types::Entity;
use crate::gmp::{EntityType, GmpClient, GmpError, XmlElement};

/// One page of entities
pub async fn list(
    gmp: &GmpClient,
    kind: &'static EntityType,
    filter_string: Option<&str>,
    args: &PaginationArgs,
) -> Result<Connection<Entity>, ApiError> {
    let base = filter_string
        .map(FilterString::parse)
        .transpose()?
        .filter(|f| !f.is_empty());
    let filtered = if needs_filtered_count(base.as_ref(), args)? {
        filtered_count(gmp, kind, base.as_ref()).await?
    } else {
        None
    };
    let (filter, window) = build_filter_for_pagination(base, args, filtered)?;
    let filter = filter.to_string();

    debug!(entity = kind.name, filter = %filter, "Listing entities");
    let response = gmp.get_entities(kind, &filter).await?;

    let nodes = response
        .root
        .children_named(kind.name)
        .map(|element| Entity::new(kind, element.clone()))
        .collect();
    Ok(Connection::collect(
        nodes,
        reported_counts(&response.root, kind),
        window,
    ))
}

/// Number of entities the base filter matches, from a one-row lookup
async fn filtered_count(
    gmp: &GmpClient,
    kind: &EntityType,
    base: Option<&FilterString>,
) -> Result<Option<u64>, GmpError> {
    let mut lookup = base.cloned().unwrap_or_default();
    lookup.set_first(Some(1));
    lookup.set_rows(Some(1));

    let response = gmp.get_entities(kind, &lookup.to_string()).await?;
    let filtered = reported_counts(&response.root, kind).filtered;
    debug!(entity = kind.name, filtered = ?filtered, "Counted entities for a 'last' page");
    Ok(filtered)
}

pub async fn get(
    gmp: &GmpClient,
    kind: &'static EntityType,
    id: Uuid,
) -> Result<Option<Entity>, ApiError> {
    let element = gmp.get_entity(kind, id).await?;
    Ok(element.map(|e| Entity::new(kind, e)))
}

pub async fn clone(gmp: &GmpClient, kind: &EntityType, id: Uuid) -> Result<Uuid, ApiError> {
    let new_id = gmp.clone_entity(kind, id).await?;
    info!(entity = kind.name, source = %id, id = %new_id, "Cloned entity");
    Ok(new_id)
}

/// Delete the given entities one after another
///
/// Every requested id gets a delete call, even when the lookup did not return
/// it. The result is false when any entity was missing.
pub async fn delete_by_ids(
    gmp: &GmpClient,
    kind: &EntityType,
    ids: &[Uuid],
) -> Result<bool, ApiError> {
    let ids = dedup(ids);
    let response = gmp.get_entities(kind, &ids_filter(&ids)).await?;
    let found: HashSet<Uuid> = response
        .root
        .children_named(kind.name)
        .filter_map(|e| e.attr("id"))
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect();

    let mut ok = true;
    for id in &ids {
        if !found.contains(id) {
            warn!(entity = kind.name, id = %id, "Entity not found for deletion");
            ok = false;
        }
        ok &= delete_one(gmp, kind, &id.to_string()).await?;
    }

    info!(entity = kind.name, count = ids.len(), ok, "Deleted entities by id");
    Ok(ok)
}

/// Delete every entity the filter string selects
pub async fn delete_by_filter(
    gmp: &GmpClient,
    kind: &EntityType,
    filter_string: &str,
) -> Result<bool, ApiError> {
    let parsed = FilterString::parse(filter_string)?;
    if parsed.terms().is_empty() {
        warn!(entity = kind.name, filter = filter_string, "Deleting without a selecting filter term");
    }
    let response = gmp.get_entities(kind, filter_string).await?;
    let ids: Vec<String> = response
        .root
        .children_named(kind.name)
        .filter_map(|e| e.attr("id"))
        .map(str::to_string)
        .collect();

    let mut ok = true;
    for id in &ids {
        ok &= delete_one(gmp, kind, id).await?;
    }

    info!(entity = kind.name, filter = filter_string, count = ids.len(), ok, "Deleted entities by filter");
    Ok(ok)
}

/// Raw gvmd response for the given ids; all entities when `ids` is empty
pub async fn export_by_ids(
    gmp: &GmpClient,
    kind: &EntityType,
    ids: &[Uuid],
) -> Result<String, ApiError> {
    let filter = ids_filter(&dedup(ids));
    let response = gmp.get_entities(kind, &filter).await?;
    debug!(entity = kind.name, count = ids.len(), "Exported entities by id");
    Ok(response.raw)
}

pub async fn export_by_filter(
    gmp: &GmpClient,
    kind: &EntityType,
    filter_string: &str,
) -> Result<String, ApiError> {
    FilterString::parse(filter_string)?;
    let response = gmp.get_entities(kind, filter_string).await?;
    debug!(entity = kind.name, filter = filter_string, "Exported entities by filter");
    Ok(response.raw)
}

async fn delete_one(gmp: &GmpClient, kind: &EntityType, id: &str) -> Result<bool, GmpError> {
    match gmp.delete_entity(kind, id).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => {
            warn!(entity = kind.name, id, error = %e, "Delete failed, entity not found");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// `uuid=A uuid=B rows=2`, or an empty filter for no ids
///
/// `rows` keeps gvmd from cutting the lookup at its default page size.
pub(crate) fn ids_filter(ids: &[Uuid]) -> String {
    if ids.is_empty() {
        return String::new();
    }
    let mut filter = FilterString::default();
    for id in ids {
        filter.push(Term::new("uuid", Relation::Equal, id.to_string()));
    }
    filter.set_rows(Some(ids.len() as i64));
    filter.to_string()
}

/// Counts and window from `<x_count>` and `<xs start max>`
fn reported_counts(root: &XmlElement, kind: &EntityType) -> Reported {
    let count = root.child(&kind.count_element());
    let window = root.child(kind.plural).and_then(|w| {
        let start: u64 = w.attr("start")?.parse().ok()?;
        let max: i64 = w.attr("max")?.parse().ok()?;
        Some(Window {
            offset: start.saturating_sub(1),
            size: u64::try_from(max).ok(),
        })
    });

    Reported {
        total: count.and_then(|c| c.text().parse().ok()),
        filtered: count
            .and_then(|c| c.child_int("filtered"))
            .and_then(|n| u64::try_from(n).ok()),
        window,
    }
}

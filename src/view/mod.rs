/// Derived tables module
///
/// Pure functions over a record snapshot. Nothing here mutates the store:
/// - Status, region and district counts, recent collections (aggregate.rs)
/// - Rating filter, sort order, tag search, rating stats (portfolio.rs)
/// - All status-screen tables computed together (dashboard.rs)
/// - Recompute on change events and on a fixed tick (refresh.rs)

pub mod aggregate;
pub mod dashboard;
pub mod portfolio;
pub mod refresh;

//! Dashboard refresh driver
//!
//! Recomputes the dashboard whenever the store publishes a snapshot, when
//! the screen options change, and on a fixed tick. The tick covers writes
//! that bypass the change events and keeps the time window moving.
//! Each recompute reads the latest snapshot and replaces the previous tables.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::dashboard::{Dashboard, DashboardOptions};
use crate::state::store::Snapshot;

/// Running refresh task. Dropping the handle stops it.
#[derive(Debug)]
pub struct RefreshHandle {
    tables: watch::Receiver<Arc<Dashboard>>,
    options: watch::Sender<DashboardOptions>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Receiver of recomputed dashboards
    pub fn tables(&self) -> watch::Receiver<Arc<Dashboard>> {
        self.tables.clone()
    }

    /// Most recently computed dashboard
    pub fn latest(&self) -> Arc<Dashboard> {
        self.tables.borrow().clone()
    }

    /// Replace the screen options; triggers a recompute.
    pub fn set_options(&self, options: DashboardOptions) {
        self.options.send_replace(options);
    }

    /// Break districts down for one region (`None` = all).
    pub fn select_region(&self, region: Option<String>) {
        self.options.send_modify(|o| o.selected_region = region);
    }

    /// Drill into one district (`None` closes the drill-down).
    pub fn select_district(&self, district: Option<String>) {
        self.options.send_modify(|o| o.selected_district = district);
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the refresh task on the current tokio runtime.
///
/// The task ends when the store (the snapshot sender) is dropped or when
/// the handle is stopped or dropped.
pub fn spawn_refresh(
    mut snapshots: watch::Receiver<Snapshot>,
    options: DashboardOptions,
    interval: Duration,
) -> RefreshHandle {
    let first = {
        let records = snapshots.borrow_and_update().clone();
        Dashboard::compute(&records, &options, Utc::now())
    };
    let (tables_tx, tables_rx) = watch::channel(Arc::new(first));
    let (options_tx, mut options_rx) = watch::channel(options);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        tracing::debug!("record store dropped, stopping dashboard refresh");
                        break;
                    }
                }
                changed = options_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    tracing::trace!("dashboard refresh tick");
                }
            }

            let records = snapshots.borrow_and_update().clone();
            let options = options_rx.borrow_and_update().clone();
            let dashboard = Dashboard::compute(&records, &options, Utc::now());
            tracing::debug!(records = dashboard.total, "dashboard recomputed");

            if tables_tx.send(Arc::new(dashboard)).is_err() {
                break;
            }
        }
    });

    RefreshHandle {
        tables: tables_rx,
        options: options_tx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{NewRecord, Status};
    use crate::state::slot::MemorySlot;
    use crate::state::store::RecordStore;
    use crate::view::aggregate::RegionKey;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(30);

    /// Wait until the published dashboard satisfies `pred`
    async fn wait_for(
        tables: &mut watch::Receiver<Arc<Dashboard>>,
        pred: impl Fn(&Dashboard) -> bool,
    ) -> Arc<Dashboard> {
        timeout(WAIT, async {
            loop {
                {
                    let current = tables.borrow_and_update().clone();
                    if pred(&current) {
                        return current;
                    }
                }
                tables.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_recomputes_on_change_event() {
        let mut store = RecordStore::open(MemorySlot::new());
        let handle = spawn_refresh(store.subscribe(), DashboardOptions::default(), Duration::from_secs(3600));
        let mut tables = handle.tables();
        assert_eq!(handle.latest().total, 0);

        let r = store.create(NewRecord::new("file:///a.jpg", "제주시 연동")).unwrap();
        let dashboard = wait_for(&mut tables, |d| d.total == 1).await;
        assert_eq!(dashboard.by_region[&RegionKey::Known("제주시".into())], 1);

        store.update_status(&r.id, Status::Collected).unwrap();
        let dashboard = wait_for(&mut tables, |d| d.by_status[&Status::Collected] == 1).await;
        assert_eq!(dashboard.recent_completed.len(), 1);
    }

    #[tokio::test]
    async fn test_recomputes_on_option_change() {
        let mut store = RecordStore::open(MemorySlot::new());
        store.create(NewRecord::new("file:///a.jpg", "제주시 애월읍")).unwrap();
        store.create(NewRecord::new("file:///b.jpg", "서귀포시 중문동")).unwrap();

        let handle = spawn_refresh(store.subscribe(), DashboardOptions::default(), Duration::from_secs(3600));
        let mut tables = handle.tables();
        assert_eq!(handle.latest().by_district.len(), 2);

        handle.select_region(Some("서귀포시".to_string()));
        handle.select_district(Some("중문동".to_string()));
        let dashboard = wait_for(&mut tables, |d| d.district_detail.is_some() && d.by_district.len() == 1).await;
        assert_eq!(dashboard.by_district["중문동"], 1);
        assert_eq!(dashboard.district_detail.as_ref().unwrap()[&Status::PendingReview], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recomputes_on_tick() {
        let store = RecordStore::open(MemorySlot::new());
        let handle = spawn_refresh(store.subscribe(), DashboardOptions::default(), Duration::from_secs(5));
        let mut tables = handle.tables();

        // First tick fires at once, the next one after the interval
        timeout(WAIT, tables.changed()).await.unwrap().unwrap();
        timeout(WAIT, tables.changed()).await.unwrap().unwrap();
        assert_eq!(tables.borrow().total, 0);
    }

    #[tokio::test]
    async fn test_stops_when_store_dropped() {
        let store = RecordStore::open(MemorySlot::new());
        let handle = spawn_refresh(store.subscribe(), DashboardOptions::default(), Duration::from_secs(3600));
        let mut tables = handle.tables();
        drop(store);

        timeout(WAIT, async { while tables.changed().await.is_ok() {} })
            .await
            .unwrap();
        timeout(WAIT, async {
            while !handle.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::{Database, TripField, TripRecord},
    events::TripEvent,
    influx::InfluxClient,
    segmentation::{merge_signals, run_pass, SegmentationConfig, SegmentationSession},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives the poll cycle: fetch → merge → segment → persist → notify.
///
/// A single task owns the segmentation session and awaits each cycle to
/// completion before the next tick is taken, so passes never overlap. Trip
/// events fan out over a broadcast channel; receivers that lag simply miss
/// old notifications.
#[derive(Clone)]
pub struct AnalyzerController {
    db: Database,
    client: Arc<InfluxClient>,
    config: SegmentationConfig,
    poll_interval: Duration,
    events: broadcast::Sender<TripEvent>,
    worker: Arc<Mutex<Option<(CancellationToken, JoinHandle<()>)>>>,
}

impl AnalyzerController {
    pub fn new(
        db: Database,
        client: InfluxClient,
        config: SegmentationConfig,
        poll_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            client: Arc::new(client),
            config,
            poll_interval,
            events,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TripEvent> {
        self.events.subscribe()
    }

    /// Spawn the polling loop. The first cycle runs immediately.
    pub async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Err(anyhow!("analyzer already running"));
        }

        let cancel = CancellationToken::new();
        let controller = self.clone();
        let loop_token = cancel.clone();

        let handle = tokio::spawn(async move {
            controller.analysis_loop(loop_token).await;
        });

        *worker = Some((cancel, handle));
        log_info!("trip analyzer started (poll interval {:?})", self.poll_interval);
        Ok(())
    }

    /// Cancel the polling loop and wait for the in-flight cycle to finish.
    pub async fn stop(&self) {
        let Some((cancel, handle)) = self.worker.lock().await.take() else {
            return;
        };
        cancel.cancel();
        if let Err(err) = handle.await {
            log_error!("analyzer loop join failed: {err:?}");
        }
        log_info!("trip analyzer stopped");
    }

    async fn analysis_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut session = SegmentationSession::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_cycle(&mut session).await {
                        // Degrades to "try again next tick"; prior persisted
                        // trips are untouched.
                        log_warn!("poll cycle skipped: {err:#}");
                    }
                }
                _ = cancel.cancelled() => {
                    log_info!("analysis loop shutting down");
                    break;
                }
            }
        }
    }

    /// One full pass. A fetch or parse error abandons the cycle before any
    /// segmentation state is touched.
    pub async fn run_cycle(&self, session: &mut SegmentationSession) -> Result<()> {
        let window = self.client.fetch_window().await?;
        let samples = merge_signals(&window.speed, &window.charge);
        log_info!("merged {} joint samples for segmentation", samples.len());

        let events = run_pass(session, &samples, Utc::now(), &self.config);

        let mut store_changed = false;
        for event in events {
            let trip_id = match event {
                TripEvent::TripStarted { trip_id, .. } | TripEvent::TripEnded { trip_id, .. } => {
                    trip_id
                }
                TripEvent::TripsUpdated => continue,
            };

            // Store failures are logged per trip and never block the rest of
            // the pass; the next cycle re-upserts the full window anyway.
            if let Some(trip) = session.trip_by_id(trip_id) {
                match self.db.upsert_trip(trip).await {
                    Ok(()) => store_changed = true,
                    Err(err) => log_error!("failed to persist trip {trip_id}: {err:#}"),
                }
            }

            let _ = self.events.send(event);
        }

        if store_changed {
            let _ = self.events.send(TripEvent::TripsUpdated);
        }

        self.log_pass_summary(session);
        Ok(())
    }

    fn log_pass_summary(&self, session: &SegmentationSession) {
        let closed = session.trips.iter().filter(|t| !t.is_open()).count();
        let open = session.trips.len() - closed;
        let total_km: f64 = session.trips.iter().map(|t| t.metrics.distance_km).sum();
        log_info!(
            "pass summary: {} trip(s) detected ({closed} closed, {open} ongoing), {total_km:.2} km total",
            session.trips.len()
        );
    }

    pub async fn list_trips(&self) -> Result<Vec<TripRecord>> {
        self.db.load_trips().await
    }

    pub async fn delete_trip(&self, trip_id: i64) -> Result<bool> {
        let deleted = self.db.delete_trip(trip_id).await?;
        if deleted {
            let _ = self.events.send(TripEvent::TripsUpdated);
        }
        Ok(deleted)
    }

    pub async fn update_trip_field(
        &self,
        trip_id: i64,
        field: TripField,
        value: &str,
    ) -> Result<bool> {
        let updated = self.db.update_trip_field(trip_id, field, value).await?;
        if updated {
            let _ = self.events.send(TripEvent::TripsUpdated);
        }
        Ok(updated)
    }
}

//! The live session: one context object owning every client component

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::game::{
    AttackIntent, CombatResolver, LocalPlayerController, LocalPlayerState, RemoteStateReconciler,
    UNREGISTERED_ID,
};
use crate::telemetry::{
    HistoryEntry, HistoryView, TelemetryClient, TelemetryError, TelemetryPoller, TelemetrySample,
    UsageHistory, HISTORY_LIMIT,
};
use crate::util::events::Subscription;
use crate::ws::{ConnectionManager, ConnectionState, Connector, ServerMsg};

use super::input::InputEvent;
use super::render::RenderSink;

type HistoryResult = (u64, Result<Vec<HistoryEntry>, TelemetryError>);

/// Owns the authority channel, local prediction, remote roster, combat
/// feedback and telemetry for as long as the scene is mounted.
///
/// All state is mutated from the session loop only; network and HTTP work
/// runs in tasks that report back over channels.
pub struct Session<S: RenderSink> {
    config: Arc<Config>,

    player: LocalPlayerState,
    controller: LocalPlayerController,
    reconciler: RemoteStateReconciler,
    combat: CombatResolver,

    connection: ConnectionManager,
    inbound: Subscription<ServerMsg>,
    connection_state: ConnectionState,

    telemetry: TelemetryClient,
    poller: TelemetryPoller,
    samples_rx: mpsc::Receiver<TelemetrySample>,
    usage: UsageHistory,
    latest_sample: Option<TelemetrySample>,

    history_view: HistoryView,
    history_tx: mpsc::Sender<HistoryResult>,
    history_rx: mpsc::Receiver<HistoryResult>,
    history_task: Option<JoinHandle<()>>,

    sink: S,
}

impl<S: RenderSink> Session<S> {
    /// Mount the session: open the channel and start polling telemetry.
    /// Must be called from within a Tokio runtime.
    pub fn start<C: Connector>(config: Arc<Config>, connector: C, sink: S) -> Self {
        let connection =
            ConnectionManager::connect(config.authority_url.clone(), connector, config.reconnect_delay);
        let inbound = connection.subscribe();

        let telemetry = TelemetryClient::new(
            config.telemetry_url.clone(),
            config.telemetry_history_url.clone(),
        );
        let (samples_tx, samples_rx) = mpsc::channel(8);
        let poller = TelemetryPoller::spawn(telemetry.clone(), config.telemetry_interval, samples_tx);

        let (history_tx, history_rx) = mpsc::channel(2);

        info!(
            authority = %config.authority_url,
            telemetry = %config.telemetry_url,
            "Session started"
        );

        Self {
            controller: LocalPlayerController::new(config.move_speed),
            config,
            player: LocalPlayerState::new(),
            reconciler: RemoteStateReconciler::new(),
            combat: CombatResolver::new(),
            connection,
            inbound,
            connection_state: ConnectionState::Connecting,
            telemetry,
            poller,
            samples_rx,
            usage: UsageHistory::new(),
            latest_sample: None,
            history_view: HistoryView::default(),
            history_tx,
            history_rx,
            history_task: None,
            sink,
        }
    }

    pub fn player(&self) -> &LocalPlayerState {
        &self.player
    }

    pub fn reconciler(&self) -> &RemoteStateReconciler {
        &self.reconciler
    }

    pub fn combat(&self) -> &CombatResolver {
        &self.combat
    }

    pub fn usage(&self) -> &UsageHistory {
        &self.usage
    }

    pub fn history_view(&self) -> &HistoryView {
        &self.history_view
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Drive the session until `shutdown` resolves, then tear down
    pub async fn run<F>(&mut self, mut input_rx: mpsc::UnboundedReceiver<InputEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut input_open = true;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                Some(msg) = self.inbound.recv() => self.handle_server_msg(msg),

                event = input_rx.recv(), if input_open => match event {
                    Some(event) => self.handle_input(event, Instant::now()),
                    None => {
                        debug!("Input source closed");
                        input_open = false;
                    }
                },

                Some(sample) = self.samples_rx.recv() => self.on_sample(sample),

                Some((generation, result)) = self.history_rx.recv() => {
                    self.on_history(generation, result);
                }

                _ = ticker.tick() => self.tick(Instant::now()),
            }
        }

        self.shutdown().await;
    }

    /// Apply one inbound authority message
    pub fn handle_server_msg(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::PlayerId { player_id } => {
                info!(player_id = %player_id, "Registered with authority");
                self.player.id = player_id;
                // A broadcast may have listed us before we knew our id
                self.reconciler.claim_local(&mut self.player);
            }
            ServerMsg::PlayersUpdate { players } => {
                self.reconciler.apply(players, &mut self.player);
            }
            ServerMsg::Unknown => {}
        }
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        match event {
            InputEvent::KeyDown(code) => {
                if let Some(intent) = self.controller.key_down(&code, now, &self.player) {
                    self.attack(intent, now);
                }
            }
            InputEvent::KeyUp(code) => self.controller.key_up(&code),
            InputEvent::ReleaseAll => self.controller.release_all(),
            InputEvent::OpenDetail => {
                if let Some(generation) = self.history_view.open() {
                    self.request_history(generation);
                }
            }
            InputEvent::CloseDetail => {
                if let Some(task) = self.history_task.take() {
                    task.abort();
                }
                self.history_view.close();
                self.sink.history_chart(None);
            }
        }
    }

    fn attack(&mut self, intent: AttackIntent, now: Instant) {
        if let Some(command) = self.combat.resolve(&intent, self.reconciler.entities(), now) {
            self.connection.send(&command);
        }
    }

    /// One simulation frame
    pub fn tick(&mut self, now: Instant) {
        self.observe_connection();

        if self.controller.tick(&mut self.player) {
            self.connection.send(&self.player.move_msg());
        }

        let expired = self.combat.sweep(now);
        if expired > 0 {
            debug!(expired, "Attack effects expired");
        }

        self.sink.local_player(&self.player);
        self.sink.remote_entities(self.reconciler.entities());
        self.sink.effects(self.combat.effects());
    }

    fn observe_connection(&mut self) {
        let state = self.connection.state();
        if state == self.connection_state {
            return;
        }
        self.connection_state = state;
        self.sink.connection(state);

        match state {
            // Announce where we are so the authority does not wait for input
            ConnectionState::Open => {
                self.connection.send(&self.player.move_msg());
            }
            // Identity is per channel; the next one assigns a fresh id
            ConnectionState::ClosedRetrying => {
                self.player.id = UNREGISTERED_ID.to_string();
            }
            ConnectionState::Connecting => {}
        }
    }

    fn on_sample(&mut self, sample: TelemetrySample) {
        self.usage.record(sample.snapshot.usage());
        self.sink.telemetry(&self.usage, &sample);
        self.latest_sample = Some(sample);
    }

    pub fn latest_sample(&self) -> Option<&TelemetrySample> {
        self.latest_sample.as_ref()
    }

    fn request_history(&mut self, generation: u64) {
        if !self.telemetry.has_history() {
            debug!("No history endpoint configured, chart stays empty");
            self.history_view.accept(generation, &[]);
            self.sink.history_chart(self.history_view.chart());
            return;
        }

        if let Some(task) = self.history_task.take() {
            task.abort();
        }

        let client = self.telemetry.clone();
        let tx = self.history_tx.clone();
        self.history_task = Some(tokio::spawn(async move {
            let result = client.fetch_history(HISTORY_LIMIT).await;
            let _ = tx.send((generation, result)).await;
        }));
    }

    fn on_history(&mut self, generation: u64, result: Result<Vec<HistoryEntry>, TelemetryError>) {
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to fetch telemetry history");
                Vec::new()
            }
        };

        if self.history_view.accept(generation, &entries) {
            self.sink.history_chart(self.history_view.chart());
        }
    }

    /// Unmount: stop every task and close the channel
    pub async fn shutdown(&mut self) {
        self.poller.stop();
        if let Some(task) = self.history_task.take() {
            task.abort();
        }
        self.connection.shutdown().await;
        self.combat.clear();
        self.reconciler.clear();
        info!("Session stopped");
    }
}

impl<S: RenderSink> Drop for Session<S> {
    fn drop(&mut self) {
        if let Some(task) = self.history_task.take() {
            task.abort();
        }
    }
}

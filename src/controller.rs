use std::{
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, atomic::{AtomicU64, Ordering}},
    thread,
};

use crate::{
    form::FormState,
    prediction::{PredictionError, PredictionRequest, PredictionTransport},
};

pub const FAILURE_MESSAGE: &str = "Failed to get prediction. Please check your inputs and try again.";

/// What happens when submissions overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Every completion is applied; whichever resolves last is shown.
    #[default]
    LastResolvedWins,
    /// Only the most recently started submission may update the state.
    LatestRequestWins,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionState {
    pub in_flight: bool,
    pub prediction: Option<f64>,
    pub error: Option<String>,
    pub latest_generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Idle,
    Pending,
    Success(f64),
    Failure(String),
}

impl SubmissionState {
    pub fn render_state(&self) -> RenderState {
        if self.in_flight {
            return RenderState::Pending;
        }
        match (&self.prediction, &self.error) {
            (Some(price), _) => RenderState::Success(*price),
            (None, Some(message)) => RenderState::Failure(message.clone()),
            (None, None) => RenderState::Idle,
        }
    }
}

pub type Waker = Arc<dyn Fn() + Send + Sync>;

struct Shared {
    state: RwLock<SubmissionState>,
    version: AtomicU64,
    policy: StalePolicy,
    waker: Waker,
}

impl Shared {
    fn write(&self) -> RwLockWriteGuard<'_, SubmissionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, SubmissionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, generation: u64, outcome: Result<f64, PredictionError>) {
        {
            let mut state = self.write();

            if self.policy == StalePolicy::LatestRequestWins && generation != state.latest_generation {
                log::debug!(
                    "discarding outcome of submission #{} (latest is #{})",
                    generation,
                    state.latest_generation
                );
                return;
            }

            match outcome {
                Ok(price) => {
                    log::info!("submission #{} predicted {}", generation, price);
                    state.prediction = Some(price);
                    state.error = None;
                }
                Err(e) => {
                    log::error!("API Error (submission #{}): {}", generation, e);
                    state.prediction = None;
                    state.error = Some(FAILURE_MESSAGE.to_string());
                }
            }
            state.in_flight = false;
        }

        self.version.fetch_add(1, Ordering::Relaxed);
        (self.waker)();
    }
}

// Completion relies on unwinding to settle a submission whose transport panicked.
#[cfg(panic = "abort")]
compile_error!("house_predictor must be built with panic = \"unwind\"");

/// Settles a submission exactly once. If the worker unwinds before
/// reporting, the drop records a failure so the in-flight flag still clears.
struct Completion {
    shared: Arc<Shared>,
    generation: u64,
    settled: bool,
}

impl Completion {
    fn settle(mut self, outcome: Result<f64, PredictionError>) {
        self.settled = true;
        self.shared.apply(self.generation, outcome);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.apply(self.generation, Err(PredictionError::WorkerPanicked));
        }
    }
}

pub struct SubmissionController {
    shared: Arc<Shared>,
    transport: Arc<dyn PredictionTransport>,
    next_generation: AtomicU64,
}

impl SubmissionController {
    pub fn new(transport: Arc<dyn PredictionTransport>, policy: StalePolicy, waker: Waker) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(SubmissionState::default()),
                version: AtomicU64::new(0),
                policy,
                waker,
            }),
            transport,
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> StalePolicy {
        self.shared.policy
    }

    /// Starts a submission and returns its generation. The exchange runs on
    /// its own thread; this call never waits for the network.
    pub fn submit(&self, form: &FormState) -> u64 {
        let request = form.to_request();
        self.submit_request(request)
    }

    pub fn submit_request(&self, request: PredictionRequest) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut state = self.shared.write();
            state.in_flight = true;
            state.prediction = None;
            state.error = None;
            state.latest_generation = generation;
        }
        self.shared.version.fetch_add(1, Ordering::Relaxed);

        log::debug!("submission #{} started: {:?}", generation, request);

        let completion = Completion {
            shared: Arc::clone(&self.shared),
            generation,
            settled: false,
        };
        let transport = Arc::clone(&self.transport);

        let spawned = thread::Builder::new()
            .name(format!("prediction-{}", generation))
            .spawn(move || {
                let outcome = transport.predict(&request);
                completion.settle(outcome);
            });

        // a failed spawn drops the closure, and with it the completion guard
        if let Err(e) = spawned {
            log::error!("could not start prediction worker: {}", e);
        }

        generation
    }

    pub fn snapshot(&self) -> SubmissionState {
        self.shared.read().clone()
    }

    /// Bumped on every state change; lets the UI skip re-reading unchanged state.
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FieldName;
    use reqwest::StatusCode;
    use std::{
        sync::{Mutex, mpsc::{self, Receiver, Sender}},
        time::Duration,
    };

    const WAIT: Duration = Duration::from_secs(5);

    type Reply = Sender<Result<f64, PredictionError>>;

    /// Parks every request until the test decides how and when it resolves.
    #[derive(Default)]
    struct ScriptedTransport {
        pending: Mutex<Vec<(PredictionRequest, Reply)>>,
        arrived: Mutex<Option<Sender<()>>>,
    }

    impl PredictionTransport for ScriptedTransport {
        fn predict(&self, request: &PredictionRequest) -> Result<f64, PredictionError> {
            let (tx, rx) = mpsc::channel();
            self.pending.lock().unwrap().push((request.clone(), tx));
            if let Some(arrived) = self.arrived.lock().unwrap().as_ref() {
                let _ = arrived.send(());
            }
            rx.recv().unwrap_or(Err(PredictionError::WorkerPanicked))
        }
    }

    impl ScriptedTransport {
        fn resolve_where(&self, income: f64, outcome: Result<f64, PredictionError>) {
            let mut pending = self.pending.lock().unwrap();
            let idx = pending
                .iter()
                .position(|(req, _)| req.median_income == income)
                .expect("no parked request with that income");
            let (_, reply) = pending.remove(idx);
            reply.send(outcome).unwrap();
        }
    }

    struct PanickingTransport;

    impl PredictionTransport for PanickingTransport {
        fn predict(&self, _: &PredictionRequest) -> Result<f64, PredictionError> {
            panic!("transport blew up");
        }
    }

    fn harness(policy: StalePolicy) -> (Arc<ScriptedTransport>, SubmissionController, Receiver<()>, Receiver<()>) {
        let transport = Arc::new(ScriptedTransport::default());
        let (arrived_tx, arrived_rx) = mpsc::channel();
        *transport.arrived.lock().unwrap() = Some(arrived_tx);

        let (woke_tx, woke_rx) = mpsc::channel();
        let woke_tx = Mutex::new(woke_tx);
        let waker: Waker = Arc::new(move || {
            let _ = woke_tx.lock().unwrap().send(());
        });

        let controller = SubmissionController::new(transport.clone(), policy, waker);
        (transport, controller, arrived_rx, woke_rx)
    }

    fn form_with_income(income: &str) -> FormState {
        let mut form = FormState::new();
        for (field, value) in FieldName::ALL.into_iter().zip([
            "-122.23", "37.88", "41", income, "6.98", "0.15", "2.55", "322",
        ]) {
            form.update_field(field, value);
        }
        form
    }

    #[test]
    fn idle_before_first_submission() {
        let (_, controller, _, _) = harness(StalePolicy::default());
        let state = controller.snapshot();
        assert_eq!(state.render_state(), RenderState::Idle);
        assert!(state.prediction.is_none() && state.error.is_none());
    }

    #[test]
    fn success_sets_prediction_and_clears_flag() {
        let (transport, controller, arrived, woke) = harness(StalePolicy::default());

        controller.submit(&form_with_income("8.3252"));
        arrived.recv_timeout(WAIT).unwrap();

        assert_eq!(controller.snapshot().render_state(), RenderState::Pending);

        transport.resolve_where(8.3252, Ok(452600.0));
        woke.recv_timeout(WAIT).unwrap();

        let state = controller.snapshot();
        assert!(!state.in_flight);
        assert_eq!(state.prediction, Some(452600.0));
        assert_eq!(state.error, None);
        assert_eq!(state.render_state(), RenderState::Success(452600.0));
    }

    #[test]
    fn failure_sets_fixed_message_and_clears_flag() {
        let (transport, controller, arrived, woke) = harness(StalePolicy::default());

        controller.submit(&form_with_income("1.0"));
        arrived.recv_timeout(WAIT).unwrap();
        transport.resolve_where(1.0, Err(PredictionError::Status(StatusCode::INTERNAL_SERVER_ERROR)));
        woke.recv_timeout(WAIT).unwrap();

        let state = controller.snapshot();
        assert!(!state.in_flight);
        assert_eq!(state.prediction, None);
        assert_eq!(state.error.as_deref(), Some(FAILURE_MESSAGE));
    }

    #[test]
    fn new_submission_clears_previous_outcome() {
        let (transport, controller, arrived, woke) = harness(StalePolicy::default());

        controller.submit(&form_with_income("1.0"));
        arrived.recv_timeout(WAIT).unwrap();
        transport.resolve_where(1.0, Err(PredictionError::WorkerPanicked));
        woke.recv_timeout(WAIT).unwrap();
        assert!(controller.snapshot().error.is_some());

        controller.submit(&form_with_income("2.0"));
        let state = controller.snapshot();
        assert!(state.in_flight);
        assert_eq!(state.prediction, None);
        assert_eq!(state.error, None);

        arrived.recv_timeout(WAIT).unwrap();
        transport.resolve_where(2.0, Ok(10.0));
        woke.recv_timeout(WAIT).unwrap();
        assert_eq!(controller.snapshot().render_state(), RenderState::Success(10.0));
    }

    #[test]
    fn panicking_transport_still_settles() {
        let (woke_tx, woke_rx) = mpsc::channel();
        let woke_tx = Mutex::new(woke_tx);
        let waker: Waker = Arc::new(move || {
            let _ = woke_tx.lock().unwrap().send(());
        });
        let controller = SubmissionController::new(Arc::new(PanickingTransport), StalePolicy::default(), waker);

        controller.submit(&FormState::new());
        woke_rx.recv_timeout(WAIT).unwrap();

        let state = controller.snapshot();
        assert!(!state.in_flight);
        assert_eq!(state.error.as_deref(), Some(FAILURE_MESSAGE));
    }

    #[test]
    fn shipped_profiles_unwind_on_panic() {
        let manifest = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml")).unwrap();
        let manifest: toml::Table = manifest.parse().unwrap();

        let profiles = manifest.get("profile").and_then(|p| p.as_table()).cloned().unwrap_or_default();
        for (name, profile) in &profiles {
            let panic = profile.get("panic").and_then(|v| v.as_str()).unwrap_or("unwind");
            assert_eq!(panic, "unwind", "profile.{} must unwind for the completion guard", name);
        }
    }

    #[test]
    fn overlapping_submissions_last_resolved_wins() {
        let (transport, controller, arrived, woke) = harness(StalePolicy::LastResolvedWins);

        let first = controller.submit(&form_with_income("1.0"));
        let second = controller.submit(&form_with_income("2.0"));
        assert!(second > first);
        arrived.recv_timeout(WAIT).unwrap();
        arrived.recv_timeout(WAIT).unwrap();
        assert_eq!(transport.pending.lock().unwrap().len(), 2);

        // the newer request resolves first, the older one last
        transport.resolve_where(2.0, Ok(200.0));
        woke.recv_timeout(WAIT).unwrap();
        assert_eq!(controller.snapshot().prediction, Some(200.0));

        transport.resolve_where(1.0, Err(PredictionError::WorkerPanicked));
        woke.recv_timeout(WAIT).unwrap();

        let state = controller.snapshot();
        assert!(!state.in_flight);
        assert_eq!(state.prediction, None);
        assert_eq!(state.error.as_deref(), Some(FAILURE_MESSAGE));
    }

    #[test]
    fn overlapping_submissions_latest_request_wins() {
        let (transport, controller, arrived, woke) = harness(StalePolicy::LatestRequestWins);

        controller.submit(&form_with_income("1.0"));
        controller.submit(&form_with_income("2.0"));
        arrived.recv_timeout(WAIT).unwrap();
        arrived.recv_timeout(WAIT).unwrap();

        transport.resolve_where(2.0, Ok(200.0));
        woke.recv_timeout(WAIT).unwrap();
        assert_eq!(controller.snapshot().render_state(), RenderState::Success(200.0));

        let version = controller.version();
        transport.resolve_where(1.0, Ok(100.0));
        assert!(woke.recv_timeout(Duration::from_millis(300)).is_err());

        let state = controller.snapshot();
        assert_eq!(controller.version(), version);
        assert_eq!(state.prediction, Some(200.0));
        assert!(!state.in_flight);
    }

    #[test]
    fn stale_outcome_does_not_end_latest_pending_request() {
        let (transport, controller, arrived, woke) = harness(StalePolicy::LatestRequestWins);

        controller.submit(&form_with_income("1.0"));
        controller.submit(&form_with_income("2.0"));
        arrived.recv_timeout(WAIT).unwrap();
        arrived.recv_timeout(WAIT).unwrap();

        transport.resolve_where(1.0, Ok(100.0));
        assert!(woke.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(controller.snapshot().render_state(), RenderState::Pending);

        transport.resolve_where(2.0, Ok(200.0));
        woke.recv_timeout(WAIT).unwrap();
        assert_eq!(controller.snapshot().render_state(), RenderState::Success(200.0));
    }

    #[test]
    fn render_state_follows_flags() {
        let mut state = SubmissionState::default();
        assert_eq!(state.render_state(), RenderState::Idle);

        state.in_flight = true;
        assert_eq!(state.render_state(), RenderState::Pending);

        state.in_flight = false;
        state.error = Some(FAILURE_MESSAGE.to_string());
        assert_eq!(state.render_state(), RenderState::Failure(FAILURE_MESSAGE.to_string()));
    }
}

//! Test harness: components on a shared in-memory transport.

use iu_buffers::{
    BufferConfig, BufferContext, InputBuffer, IuEvent, IuEventHandler, IuEventType, IuRef,
    OutputBuffer,
};
use iu_bus::InMemoryTransport;
use iu_telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

pub const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(5);

static TELEMETRY: OnceLock<Option<TelemetryGuard>> = OnceLock::new();

/// Installs the subscriber once per test binary. Silent unless `IU_LOG_LEVEL` asks for more.
pub fn init_logging() {
    TELEMETRY.get_or_init(|| {
        let mut config = TelemetryConfig::for_component("iu-tests");
        if std::env::var("IU_LOG_LEVEL").is_err() {
            config.log_level = "off".to_string();
        }
        init_telemetry(&config).ok()
    });
}

/// Polls `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// One transport shared by every component of a test.
pub struct Network {
    pub transport: Arc<InMemoryTransport>,
    pub context: BufferContext,
}

impl Network {
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    pub fn with_config(config: BufferConfig) -> Self {
        init_logging();
        let transport = Arc::new(InMemoryTransport::new());
        let context = BufferContext::new(transport.clone(), config);
        Self { transport, context }
    }

    /// A component with an output buffer and an input buffer on `categories`.
    pub fn component(&self, name: &str, categories: &[&str]) -> Component {
        let output = OutputBuffer::new(name, &self.context).unwrap();
        let input = InputBuffer::new(name, categories.iter().copied(), &self.context).unwrap();
        Component {
            output,
            input,
            events: EventLog::default(),
        }
        .recording()
    }
}

pub struct Component {
    pub output: OutputBuffer,
    pub input: InputBuffer,
    /// Events fired by both buffers of this component.
    pub events: EventLog,
}

impl Component {
    fn recording(self) -> Self {
        self.output.register_handler(self.events.handler());
        self.input.register_handler(self.events.handler()).unwrap();
        self
    }
}

/// One recorded event.
#[derive(Debug, Clone)]
pub struct Seen {
    pub uid: String,
    pub event_type: IuEventType,
    pub local: bool,
    pub iu: IuRef,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl EventLog {
    pub fn handler(&self) -> IuEventHandler {
        let seen = Arc::clone(&self.seen);
        IuEventHandler::new(move |event: &IuEvent| {
            seen.lock().push(Seen {
                uid: event.iu.uid().to_string(),
                event_type: event.event_type,
                local: event.local,
                iu: Arc::clone(&event.iu),
            });
            Ok(())
        })
    }

    pub fn count(&self, uid: &str, event_type: IuEventType) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|seen| seen.uid == uid && seen.event_type == event_type)
            .count()
    }

    pub fn of_type(&self, event_type: IuEventType) -> Vec<Seen> {
        self.seen
            .lock()
            .iter()
            .filter(|seen| seen.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

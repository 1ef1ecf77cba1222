pub mod engine;
pub mod executor;
pub mod state;
pub mod stats;

pub use engine::{EscalationEngine, EscalationTable, EvaluationReport, MAX_STREAMS};
pub use executor::{ActionDispatcher, DispatchOutcome, DEFAULT_DISPATCH_TIMEOUT};
pub use state::{Escalation, EscalationLevel, StreamMonitor, StreamSpec};
pub use stats::{render_summary, StatsLine, STATS_BUFFER_CAPACITY};

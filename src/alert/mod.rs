//! Alert state machine: request arbitration, LED blinking and prompt pacing.

mod machine;
pub mod output;
mod run_loop;
mod state;
pub mod tick;

pub use machine::{AlertController, DEFAULT_REPEAT_TICKS};
pub use output::{LogChannel, OutputChannel, RecordingChannel, SysfsChannel};
pub use run_loop::{run_controller_loop, EVENT_QUEUE_CAPACITY};
pub use state::{
    AlertBinding, AlertKind, AlertMode, AlertSnapshot, AlertUpdate, ControllerEvent, TickOutcome, ALERT_BINDINGS,
    ALERT_KIND_COUNT,
};
pub use tick::{IntervalTicker, ManualTicker, TickSource};

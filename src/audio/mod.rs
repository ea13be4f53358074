mod cpal_backend;
mod manual;

pub use self::cpal_backend::CpalBackend;
pub use self::manual::ManualBackend;

use crate::error::SynthResult;
use crate::synth::engine::SynthEngine;

/// Host audio the synthesizer renders into.
///
/// The orchestrator calls `prepare` to learn the output rate, builds an engine
/// for that rate and hands it over with `launch`. Output stays silent until
/// `resume`, so a host that gates audio behind a user gesture is satisfied by
/// deferring that call.
pub trait AudioBackend {
    fn prepare(&mut self) -> SynthResult<f32>;
    fn launch(&mut self, engine: SynthEngine) -> SynthResult<()>;
    fn resume(&mut self) -> SynthResult<()>;
    fn suspend(&mut self) -> SynthResult<()>;
    fn is_running(&self) -> bool;
}

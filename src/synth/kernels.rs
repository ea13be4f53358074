//! Loadable signal-generation kernels for the polynomial glottal models.
//!
//! The kernels have to be loaded against the output sample rate before a
//! Rosenberg or LF source can be instantiated. Loading happens once per
//! registry; concurrent callers block on the same in-flight load and share its
//! outcome, failures included.

use std::sync::OnceLock;

use rand::rngs::SmallRng;
use tracing::{debug, info, warn};

use super::pulse::{PulseModel, PulseSource, TILT_CUTOFF_HZ};
use crate::error::{SynthError, SynthResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelParam {
    F0,
    OpenQuotient,
    SpeedQuotient,
    Amplitude,
    Jitter,
}

/// Range and default of one block-rate kernel parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamDescriptor {
    pub param: KernelParam,
    pub name: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

impl ParamDescriptor {
    const fn new(param: KernelParam, name: &'static str, default: f32, min: f32, max: f32) -> Self {
        Self {
            param,
            name,
            default,
            min,
            max,
        }
    }
}

const ROSENBERG_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new(KernelParam::F0, "f0", 120.0, 50.0, 1000.0),
    ParamDescriptor::new(KernelParam::OpenQuotient, "openQuotient", 0.6, 0.3, 0.8),
    ParamDescriptor::new(KernelParam::SpeedQuotient, "speedQuotient", 2.0, 0.5, 5.0),
    ParamDescriptor::new(KernelParam::Amplitude, "amplitude", 0.5, 0.0, 1.0),
    ParamDescriptor::new(KernelParam::Jitter, "jitter", 1.0, 0.0, 5.0),
];

const LF_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new(KernelParam::F0, "f0", 120.0, 50.0, 1000.0),
    ParamDescriptor::new(KernelParam::OpenQuotient, "openQuotient", 0.6, 0.3, 0.8),
    ParamDescriptor::new(KernelParam::Jitter, "jitter", 1.0, 0.0, 5.0),
];

/// Parameter table of one kernel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelSpec {
    pub name: &'static str,
    pub params: &'static [ParamDescriptor],
}

impl KernelSpec {
    pub fn for_model(model: PulseModel) -> Self {
        match model {
            PulseModel::Rosenberg => Self {
                name: model.name(),
                params: ROSENBERG_PARAMS,
            },
            PulseModel::Lf => Self {
                name: model.name(),
                params: LF_PARAMS,
            },
        }
    }

    pub fn param(&self, param: KernelParam) -> Option<&ParamDescriptor> {
        self.params.iter().find(|d| d.param == param)
    }

    /// Clamps into the descriptor range; parameters the kernel lacks pass through.
    pub fn clamp(&self, param: KernelParam, value: f32) -> f32 {
        match self.param(param) {
            Some(d) => value.clamp(d.min, d.max),
            None => value,
        }
    }

    fn max_of(&self, param: KernelParam) -> f32 {
        self.param(param).map(|d| d.max).unwrap_or(0.0)
    }
}

/// Kernels available after a successful load.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelTable {
    pub sample_rate: f32,
    pub rosenberg: KernelSpec,
    pub lf: KernelSpec,
}

impl KernelTable {
    pub fn spec(&self, model: PulseModel) -> KernelSpec {
        match model {
            PulseModel::Rosenberg => self.rosenberg,
            PulseModel::Lf => self.lf,
        }
    }
}

#[derive(Debug, Default)]
pub struct KernelRegistry {
    table: OnceLock<SynthResult<KernelTable>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads both kernels for `sample_rate`. Later calls return the first
    /// outcome, but a successful table is still checked against the rate each
    /// caller asks for.
    pub fn load(&self, sample_rate: f32) -> SynthResult<&KernelTable> {
        let outcome = self.table.get_or_init(|| {
            debug!(sample_rate, "loading glottal kernels");
            let result = load_table(sample_rate);
            match &result {
                Ok(_) => info!(sample_rate, "glottal kernels loaded"),
                Err(err) => warn!(%err, "glottal kernel load failed"),
            }
            result
        });
        let table = outcome.as_ref().map_err(Clone::clone)?;
        if sample_rate != table.sample_rate {
            for spec in [&table.rosenberg, &table.lf] {
                check_sample_rate(spec, sample_rate)?;
            }
        }
        Ok(table)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.table.get(), Some(Ok(_)))
    }

    pub fn table(&self) -> Option<&KernelTable> {
        self.table.get().and_then(|r| r.as_ref().ok())
    }

    /// Creates a stopped source backed by a loaded kernel, running at
    /// `sample_rate` even when the table was loaded for another rate.
    pub fn instantiate(
        &self,
        model: PulseModel,
        sample_rate: f32,
        smoothing_time: f32,
        rng: SmallRng,
    ) -> SynthResult<PulseSource> {
        let table = match self.table.get() {
            Some(Ok(table)) => table,
            Some(Err(err)) => return Err(err.clone()),
            None => {
                return Err(SynthError::ModuleLoad {
                    module: model.name(),
                    reason: "kernel not loaded".to_string(),
                })
            }
        };
        let spec = table.spec(model);
        check_sample_rate(&spec, sample_rate)?;
        Ok(PulseSource::new(
            model,
            spec,
            sample_rate,
            smoothing_time,
            rng,
        ))
    }
}

fn load_table(sample_rate: f32) -> SynthResult<KernelTable> {
    let rosenberg = KernelSpec::for_model(PulseModel::Rosenberg);
    let lf = KernelSpec::for_model(PulseModel::Lf);

    for spec in [&rosenberg, &lf] {
        check_sample_rate(spec, sample_rate)?;
    }

    Ok(KernelTable {
        sample_rate,
        rosenberg,
        lf,
    })
}

fn check_sample_rate(spec: &KernelSpec, sample_rate: f32) -> SynthResult<()> {
    let fail = |reason: String| SynthError::ModuleLoad {
        module: spec.name,
        reason,
    };
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(fail(format!("invalid sample rate {sample_rate}")));
    }
    let nyquist = sample_rate as f64 / 2.0;
    if nyquist <= TILT_CUTOFF_HZ {
        return Err(fail(format!(
            "sample rate {sample_rate} cannot host the {TILT_CUTOFF_HZ} Hz tilt filter"
        )));
    }
    let max_f0 = spec.max_of(KernelParam::F0);
    if nyquist <= max_f0 as f64 {
        return Err(fail(format!(
            "sample rate {sample_rate} is too low for f0 up to {max_f0} Hz"
        )));
    }
    Ok(())
}

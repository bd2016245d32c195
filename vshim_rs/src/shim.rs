use std::path::PathBuf;

use bitvec::vec::BitVec;

use crate::trace::{self, VcdWriter};
use crate::{time, Engine, PortSet, RandReset, ShimResult};

/// Generation-time settings of a handle, overridable at construction.
#[derive(Clone, Debug, Default)]
pub struct ShimConfig {
    pub trace_file: Option<PathBuf>,
}

impl ShimConfig {
    pub fn of<P: PortSet>() -> Self {
        Self {
            trace_file: P::TRACE_FILE.map(PathBuf::from),
        }
    }
}

/// The model instance a handle owns, plus the trace sink scoped to it.
pub struct Instance<E> {
    engine: E,
    trace: Option<VcdWriter>,
}

/// Flat handle handed to the foreign caller: every port pointer, then the
/// model reference.
#[repr(C)]
pub struct Shim<P: PortSet> {
    pub ports: P,
    model: Box<Instance<P::Engine>>,
}

impl<P: PortSet> Shim<P> {
    pub fn construct() -> ShimResult<Box<Self>> {
        Self::construct_with(&ShimConfig::of::<P>())
    }

    pub fn construct_with(config: &ShimConfig) -> ShimResult<Box<Self>> {
        P::Engine::set_rand_reset(RandReset::default());
        let mut model = Box::new(Instance {
            engine: P::Engine::construct()?,
            trace: None,
        });
        let ports = P::bind(&mut model.engine);
        if let Some(path) = &config.trace_file {
            match VcdWriter::create(path, P::TOP_NAME, P::PORTS) {
                Ok(writer) => model.trace = Some(writer),
                Err(e) => log::warn!("{}: tracing disabled: {e}", P::TOP_NAME),
            }
        }
        log::debug!("{}: constructed with {} ports", P::TOP_NAME, P::PORTS.len());
        Ok(Box::new(Shim { ports, model }))
    }

    /// One evaluation pass at the current simulated time.
    pub fn eval(&mut self) {
        let now = time::now();
        self.model.engine.eval(now);
        if self.model.trace.is_some() {
            let values = self.values();
            match self.model.trace.as_mut().map(|t| t.dump(now, &values)) {
                Some(Err(e @ trace::Error::TimeReversed(..))) => {
                    log::debug!("{}: pass not traced: {e}", P::TOP_NAME)
                }
                Some(Err(e)) => {
                    log::warn!("{}: tracing stopped: {e}", P::TOP_NAME);
                    self.model.trace = None;
                }
                _ => {}
            }
        }
    }

    pub fn destroy(self: Box<Self>) {
        let Shim { mut model, .. } = *self;
        model.engine.finalize();
        if let Some(trace) = model.trace.take() {
            if let Err(e) = trace.finish() {
                log::warn!("{}: failed to flush trace: {e}", P::TOP_NAME);
            }
        }
        log::debug!("{}: destroyed", P::TOP_NAME);
        release(model);
    }

    /// Current value of every port, in port order.
    pub fn values(&self) -> Vec<BitVec<u32>> {
        P::PORTS
            .iter()
            .zip(self.ports.addresses())
            .map(|(info, ptr)| unsafe { info.read(*ptr) })
            .collect()
    }

    pub fn engine(&self) -> &P::Engine {
        &self.model.engine
    }

    pub fn into_raw(self: Box<Self>) -> *mut Self {
        Box::into_raw(self)
    }

    /// # Safety
    /// `raw` must come from [`Shim::into_raw`] and not have been destroyed.
    pub unsafe fn from_raw(raw: *mut Self) -> Box<Self> {
        Box::from_raw(raw)
    }
}

#[cfg(not(feature = "leak-on-destroy"))]
fn release<E>(model: Box<Instance<E>>) {
    drop(model);
}

// Port pointers taken from the handle stay readable after destroy.
#[cfg(feature = "leak-on-destroy")]
fn release<E>(model: Box<Instance<E>>) {
    std::mem::forget(model);
}

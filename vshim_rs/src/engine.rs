use std::ffi::c_int;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::ShimResult;

/// Initial value policy for storage the model does not reset explicitly.
///
/// The variants follow the codes accepted by `Verilated::randReset`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RandReset {
    #[default]
    Zeros,
    Ones,
    Randomize {
        seed: u64,
    },
}

impl RandReset {
    pub fn verilator_code(&self) -> c_int {
        match self {
            RandReset::Zeros => 0,
            RandReset::Ones => 1,
            RandReset::Randomize { .. } => 2,
        }
    }
}

/// Process-wide storage for a [`RandReset`] policy.
///
/// Engines written in Rust keep one of these in a `static` so that
/// `set_rand_reset` behaves like the global switch of a Verilated model.
#[derive(Debug, Default)]
pub struct RandResetCell {
    code: AtomicU8,
    seed: AtomicU64,
    draws: AtomicU64,
}

impl RandResetCell {
    pub const fn new() -> Self {
        Self {
            code: AtomicU8::new(0),
            seed: AtomicU64::new(0),
            draws: AtomicU64::new(0),
        }
    }

    pub fn set(&self, policy: RandReset) {
        if let RandReset::Randomize { seed } = policy {
            self.seed.store(seed, Ordering::Relaxed);
            self.draws.store(0, Ordering::Relaxed);
        }
        self.code
            .store(policy.verilator_code() as u8, Ordering::Relaxed);
    }

    pub fn get(&self) -> RandReset {
        match self.code.load(Ordering::Relaxed) {
            0 => RandReset::Zeros,
            1 => RandReset::Ones,
            _ => RandReset::Randomize {
                seed: self.seed.load(Ordering::Relaxed),
            },
        }
    }

    /// Fills `words` with the initial value of one storage location.
    pub fn fill(&self, words: &mut [u32]) {
        match self.get() {
            RandReset::Zeros => words.fill(0),
            RandReset::Ones => words.fill(u32::MAX),
            RandReset::Randomize { seed } => {
                let draw = self.draws.fetch_add(1, Ordering::Relaxed);
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(draw));
                words.iter_mut().for_each(|w| *w = rng.random());
            }
        }
    }

    pub fn initial_u32(&self) -> u32 {
        let mut word = [0u32];
        self.fill(&mut word);
        word[0]
    }
}

/// Heap storage for the port values of an engine written in Rust.
///
/// Port pointers handed out by [`crate::PortSet::bind`] must not point into
/// the engine value itself: the engine is moved into the handle and
/// mutably borrowed on every pass. They point into one of these instead,
/// which stays put until the storage is dropped. Access goes through
/// [`PortStorage::as_ptr`] only, so the engine and the foreign caller can
/// both write the same fields.
pub struct PortStorage<T>(NonNull<T>);

impl<T> PortStorage<T> {
    pub fn new(value: T) -> Self {
        Self(NonNull::from(Box::leak(Box::new(value))))
    }

    pub fn as_ptr(&self) -> *mut T {
        self.0.as_ptr()
    }
}

impl<T> Drop for PortStorage<T> {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.0.as_ptr()) });
    }
}

/// An externally compiled simulation model driven by a [`crate::Shim`].
///
/// `construct`, `eval` and `finalize` map onto the constructor, `eval()`
/// and `final()` of a Verilated class.
pub trait Engine: Sized {
    /// Applies to every instance constructed afterwards in this process.
    fn set_rand_reset(policy: RandReset);

    fn construct() -> ShimResult<Self>;

    /// Settles the model once for the current port values. `now` is the
    /// simulated time the pass runs at.
    fn eval(&mut self, now: u64);

    fn finalize(&mut self);
}

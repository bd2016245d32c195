//! Small engines standing in for Verilated models in tests.

use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    Direction, Engine, PortInfo, PortSet, PortStorage, RandReset, RandResetCell, ShimResult,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub static PASSTHROUGH_RAND_RESET: RandResetCell = RandResetCell::new();

pub struct PassthroughState {
    in_: u8,
    out: u8,
}

/// `out = in_`, one bit each.
pub struct Passthrough(PortStorage<PassthroughState>);

impl Engine for Passthrough {
    fn set_rand_reset(policy: RandReset) {
        PASSTHROUGH_RAND_RESET.set(policy);
    }

    fn construct() -> ShimResult<Self> {
        Ok(Self(PortStorage::new(PassthroughState {
            in_: PASSTHROUGH_RAND_RESET.initial_u32() as u8 & 1,
            out: PASSTHROUGH_RAND_RESET.initial_u32() as u8 & 1,
        })))
    }

    fn eval(&mut self, _now: u64) {
        let state = self.0.as_ptr();
        unsafe { (*state).out = (*state).in_ & 1 };
    }

    fn finalize(&mut self) {}
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct PassthroughPorts {
    pub in_: *mut u8,
    pub out: *mut u8,
}

unsafe impl PortSet for PassthroughPorts {
    type Engine = Passthrough;

    const TOP_NAME: &'static str = "passthrough";
    const PORTS: &'static [PortInfo] = &[
        PortInfo::new(c"in_", 1, Direction::In),
        PortInfo::new(c"out", 1, Direction::Out),
    ];

    fn bind(engine: &mut Passthrough) -> Self {
        let state = engine.0.as_ptr();
        unsafe {
            Self {
                in_: addr_of_mut!((*state).in_),
                out: addr_of_mut!((*state).out),
            }
        }
    }
}

crate::export_shim!(
    PassthroughPorts,
    create = passthrough_create,
    eval = passthrough_eval,
    destroy = passthrough_destroy,
    query = passthrough_query
);
crate::export_sim_time!();

pub static COUNTER_RAND_RESET: RandResetCell = RandResetCell::new();

pub struct CounterState {
    clk: u8,
    count: u32,
    seen_time: u64,
}

/// Counts rising edges of `clk` and reports the time of the last pass.
pub struct Counter {
    state: PortStorage<CounterState>,
    last_clk: u8,
}

impl Engine for Counter {
    fn set_rand_reset(policy: RandReset) {
        COUNTER_RAND_RESET.set(policy);
    }

    fn construct() -> ShimResult<Self> {
        Ok(Self {
            state: PortStorage::new(CounterState {
                clk: 0,
                count: COUNTER_RAND_RESET.initial_u32(),
                seen_time: 0,
            }),
            last_clk: 0,
        })
    }

    fn eval(&mut self, now: u64) {
        let state = self.state.as_ptr();
        unsafe {
            let clk = (*state).clk;
            if clk == 1 && self.last_clk == 0 {
                (*state).count = (*state).count.wrapping_add(1);
            }
            self.last_clk = clk;
            (*state).seen_time = now;
        }
    }

    fn finalize(&mut self) {}
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CounterPorts {
    pub clk: *mut u8,
    pub count: *mut u32,
    pub seen_time: *mut u64,
}

unsafe impl PortSet for CounterPorts {
    type Engine = Counter;

    const TOP_NAME: &'static str = "counter";
    const PORTS: &'static [PortInfo] = &[
        PortInfo::new(c"clk", 1, Direction::In),
        PortInfo::new(c"count", 32, Direction::Out),
        PortInfo::new(c"seen_time", 64, Direction::Out),
    ];

    fn bind(engine: &mut Counter) -> Self {
        let state = engine.state.as_ptr();
        unsafe {
            Self {
                clk: addr_of_mut!((*state).clk),
                count: addr_of_mut!((*state).count),
                seen_time: addr_of_mut!((*state).seen_time),
            }
        }
    }
}

#[derive(Default)]
pub struct WideState {
    a: [u32; 3],
    b: u64,
    y: [u32; 3],
}

/// `y = a` over 70 bits, with a 40-bit input alongside.
pub struct WideEngine(PortStorage<WideState>);

impl Engine for WideEngine {
    fn set_rand_reset(_policy: RandReset) {}

    fn construct() -> ShimResult<Self> {
        Ok(Self(PortStorage::new(WideState::default())))
    }

    fn eval(&mut self, _now: u64) {
        let state = self.0.as_ptr();
        unsafe {
            (*state).y = (*state).a;
            (*state).y[2] &= 0x3f;
        }
    }

    fn finalize(&mut self) {}
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct WidePorts {
    pub a: *mut [u32; 3],
    pub b: *mut u64,
    pub y: *mut [u32; 3],
}

unsafe impl PortSet for WidePorts {
    type Engine = WideEngine;

    const TOP_NAME: &'static str = "wide";
    const PORTS: &'static [PortInfo] = &[
        PortInfo::new(c"a", 70, Direction::In),
        PortInfo::new(c"b", 40, Direction::In),
        PortInfo::new(c"y", 70, Direction::Out),
    ];

    fn bind(engine: &mut WideEngine) -> Self {
        let state = engine.0.as_ptr();
        unsafe {
            Self {
                a: addr_of_mut!((*state).a),
                b: addr_of_mut!((*state).b),
                y: addr_of_mut!((*state).y),
            }
        }
    }
}

pub static FINALIZE_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static LIFECYCLE_DROPS: AtomicUsize = AtomicUsize::new(0);

/// Records `finalize` and drop of every instance.
pub struct Lifecycle {
    x: PortStorage<u8>,
    pub finalized: bool,
}

impl Engine for Lifecycle {
    fn set_rand_reset(_policy: RandReset) {}

    fn construct() -> ShimResult<Self> {
        Ok(Self {
            x: PortStorage::new(0),
            finalized: false,
        })
    }

    fn eval(&mut self, _now: u64) {}

    fn finalize(&mut self) {
        self.finalized = true;
        FINALIZE_CALLS.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        LIFECYCLE_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct LifecyclePorts {
    pub x: *mut u8,
}

unsafe impl PortSet for LifecyclePorts {
    type Engine = Lifecycle;

    const TOP_NAME: &'static str = "lifecycle";
    const PORTS: &'static [PortInfo] = &[PortInfo::new(c"x", 1, Direction::In)];

    fn bind(engine: &mut Lifecycle) -> Self {
        Self {
            x: engine.x.as_ptr(),
        }
    }
}

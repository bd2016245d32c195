pub mod engine;
pub mod error;
#[doc(hidden)]
pub mod export;
pub mod host;
pub mod port;
pub mod shim;
pub mod time;
pub mod trace;

#[cfg(test)]
mod testing;

pub use engine::{Engine, PortStorage, RandReset, RandResetCell};
pub use error::{Error, ShimResult};
pub use host::{Dut, DutLib, ShimFns};
pub use port::{Direction, PortInfo, PortInfoT, PortSet};
pub use shim::{Instance, Shim, ShimConfig};

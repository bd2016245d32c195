//! C entry points behind `export_shim!` and `export_sim_time!`.

use std::any::TypeId;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::port::PortTable;
use crate::{time, PortInfoT, PortSet, Shim};

/// Exports the lifecycle and port query functions of one port set.
///
/// ```ignore
/// vshim_rs::export_shim!(SamplePorts);
/// ```
/// exports `create_model`, `eval`, `destroy_model` and `query_ports`; the
/// long form names each symbol explicitly.
#[macro_export]
macro_rules! export_shim {
    ($ports:ty) => {
        $crate::export_shim!(
            $ports,
            create = create_model,
            eval = eval,
            destroy = destroy_model,
            query = query_ports
        );
    };
    ($ports:ty, create = $create:ident, eval = $eval:ident, destroy = $destroy:ident, query = $query:ident) => {
        #[no_mangle]
        pub extern "C" fn $create() -> *mut $crate::Shim<$ports> {
            $crate::export::create::<$ports>()
        }

        /// # Safety
        /// `handle` must come from the matching create function and not be
        /// destroyed yet.
        #[no_mangle]
        pub unsafe extern "C" fn $eval(handle: *mut $crate::Shim<$ports>) {
            $crate::export::eval::<$ports>(handle)
        }

        /// # Safety
        /// `handle` must come from the matching create function and not be
        /// destroyed yet. It is invalid afterwards.
        #[no_mangle]
        pub unsafe extern "C" fn $destroy(handle: *mut $crate::Shim<$ports>) {
            $crate::export::destroy::<$ports>(handle)
        }

        /// # Safety
        /// `num_of_ports` must be null or writable.
        #[no_mangle]
        pub unsafe extern "C" fn $query(num_of_ports: *mut u64) -> *const $crate::PortInfoT {
            $crate::export::query_raw::<$ports>(num_of_ports)
        }
    };
}

/// Exports the simulated time counter, including the `sc_time_stamp` hook
/// Verilated models call for `$time`. Use once per shared library.
#[macro_export]
macro_rules! export_sim_time {
    () => {
        #[no_mangle]
        pub extern "C" fn sc_time_stamp() -> f64 {
            $crate::time::now() as f64
        }

        #[no_mangle]
        pub extern "C" fn sim_time_stamp() -> u64 {
            $crate::export::time_raw()
        }

        #[no_mangle]
        pub extern "C" fn sim_time_set(time: u64) {
            $crate::export::set_time_raw(time)
        }

        #[no_mangle]
        pub extern "C" fn sim_time_advance(ticks: u64) -> u64 {
            $crate::export::advance_time_raw(ticks)
        }

        #[no_mangle]
        pub extern "C" fn sim_time_reset() {
            $crate::time::reset()
        }
    };
}

pub fn create<P: PortSet>() -> *mut Shim<P> {
    match Shim::<P>::construct() {
        Ok(shim) => shim.into_raw(),
        Err(e) => {
            log::error!("{e}");
            std::process::abort()
        }
    }
}

/// # Safety
/// `handle` must be null or a live handle.
pub unsafe fn eval<P: PortSet>(handle: *mut Shim<P>) {
    match handle.as_mut() {
        Some(shim) => shim.eval(),
        None => log::error!("{}: eval called with a null handle", P::TOP_NAME),
    }
}

/// # Safety
/// `handle` must be null or a live handle.
pub unsafe fn destroy<P: PortSet>(handle: *mut Shim<P>) {
    if handle.is_null() {
        log::error!("{}: destroy called with a null handle", P::TOP_NAME);
        return;
    }
    Shim::from_raw(handle).destroy()
}

pub extern "C" fn create_raw<P: PortSet>() -> *mut c_void {
    create::<P>().cast()
}

pub unsafe extern "C" fn eval_raw<P: PortSet>(handle: *mut c_void) {
    eval::<P>(handle.cast())
}

pub unsafe extern "C" fn destroy_raw<P: PortSet>(handle: *mut c_void) {
    destroy::<P>(handle.cast())
}

/// The returned table lives until the process exits.
pub unsafe extern "C" fn query_raw<P: PortSet>(num_of_ports: *mut u64) -> *const PortInfoT {
    static TABLES: OnceLock<Mutex<HashMap<TypeId, &'static PortTable>>> = OnceLock::new();
    let mut tables = TABLES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let table = *tables
        .entry(TypeId::of::<P>())
        .or_insert_with(|| Box::leak(Box::new(PortTable::of::<P>())));
    if !num_of_ports.is_null() {
        *num_of_ports = table.entries().len() as u64;
    }
    table.entries().as_ptr()
}

pub extern "C" fn time_raw() -> u64 {
    time::now()
}

pub extern "C" fn set_time_raw(time: u64) {
    time::set(time)
}

pub extern "C" fn advance_time_raw(ticks: u64) -> u64 {
    time::advance(ticks)
}

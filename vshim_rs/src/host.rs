use std::ffi::{c_void, CStr};
use std::ptr::NonNull;

use bitvec::vec::BitVec;
use libloading::{Library, Symbol};

use crate::port::{read_bits, write_bits};
use crate::{export, Direction, PortInfoT, PortSet, ShimResult};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to construct model")]
    Construct,
    #[error("failed to query ports")]
    Query,
    #[error("unknown port {}", _0)]
    UnknownPort(String),
    #[error("port {} is not settable", _0)]
    NotSettable(String),
    #[error("value of {} bits does not fit port {} ({} bits)", _1, _0, _2)]
    Width(String, usize, u64),
    #[error("libloading: {}", _0)]
    Libloading(libloading::Error),
}

impl From<Error> for crate::Error {
    fn from(value: Error) -> Self {
        crate::Error::Host(value)
    }
}

impl From<libloading::Error> for crate::Error {
    fn from(value: libloading::Error) -> Self {
        Error::Libloading(value).into()
    }
}

type CreateFn = unsafe extern "C" fn() -> *mut c_void;
type HandleFn = unsafe extern "C" fn(*mut c_void);
type QueryFn = unsafe extern "C" fn(*mut u64) -> *const PortInfoT;
type TimeFn = unsafe extern "C" fn() -> u64;
type SetTimeFn = unsafe extern "C" fn(u64);
type AdvanceTimeFn = unsafe extern "C" fn(u64) -> u64;

/// Entry points of one shim, resolved from a shared library or taken from
/// a port set linked into this process.
#[derive(Clone, Copy)]
pub struct ShimFns {
    pub create: CreateFn,
    pub eval: HandleFn,
    pub destroy: HandleFn,
    pub query: QueryFn,
    pub time: TimeFn,
    pub set_time: SetTimeFn,
    pub advance_time: AdvanceTimeFn,
}

impl ShimFns {
    pub fn of<P: PortSet>() -> Self {
        Self {
            create: export::create_raw::<P>,
            eval: export::eval_raw::<P>,
            destroy: export::destroy_raw::<P>,
            query: export::query_raw::<P>,
            time: export::time_raw,
            set_time: export::set_time_raw,
            advance_time: export::advance_time_raw,
        }
    }
}

/// A generated shim library loaded into the host.
pub struct DutLib {
    fns: ShimFns,
    _lib: Library,
}

impl DutLib {
    pub fn new(lib_path: &str) -> ShimResult<Self> {
        let lib = unsafe { Library::new(lib_path)? };
        let fns = unsafe {
            ShimFns {
                create: *get::<CreateFn>(&lib, b"create_model")?,
                eval: *get::<HandleFn>(&lib, b"eval")?,
                destroy: *get::<HandleFn>(&lib, b"destroy_model")?,
                query: *get::<QueryFn>(&lib, b"query_ports")?,
                time: *get::<TimeFn>(&lib, b"sim_time_stamp")?,
                set_time: *get::<SetTimeFn>(&lib, b"sim_time_set")?,
                advance_time: *get::<AdvanceTimeFn>(&lib, b"sim_time_advance")?,
            }
        };
        Ok(DutLib { fns, _lib: lib })
    }

    /// A new handle of the loaded model, valid while the library is.
    pub fn dut(&self) -> ShimResult<Dut<'_>> {
        Dut::new(&self.fns)
    }
}

unsafe fn get<'lib, T>(lib: &'lib Library, symbol: &[u8]) -> ShimResult<Symbol<'lib, T>> {
    Ok(lib.get(symbol)?)
}

#[derive(Clone, Debug)]
pub struct Port {
    pub name: String,
    pub width: u64,
    pub direction: Direction,
    pub offset: u64,
}

impl TryFrom<&PortInfoT> for Port {
    type Error = Error;

    fn try_from(value: &PortInfoT) -> Result<Self, Self::Error> {
        if value.name.is_null() {
            return Err(Error::Query);
        }
        let name =
            String::from_utf8_lossy((unsafe { CStr::from_ptr(value.name) }).to_bytes()).to_string();
        let direction = Direction::from_raw(value.direction).ok_or(Error::Query)?;
        Ok(Port {
            name,
            width: value.width,
            direction,
            offset: value.offset,
        })
    }
}

/// One live handle driven by name through a [`ShimFns`] table.
pub struct Dut<'a> {
    fns: &'a ShimFns,
    handle: NonNull<c_void>,
    ports: Vec<Port>,
}

impl<'a> Dut<'a> {
    pub fn new(fns: &'a ShimFns) -> ShimResult<Self> {
        let ports = Self::query_ports(fns)?;
        let handle = NonNull::new(unsafe { (fns.create)() }).ok_or(Error::Construct)?;
        Ok(Dut { fns, handle, ports })
    }

    pub fn query(&self) -> &[Port] {
        &self.ports
    }

    pub fn eval(&mut self) {
        unsafe { (self.fns.eval)(self.handle.as_ptr()) }
    }

    pub fn get(&self, port_name: &str) -> ShimResult<BitVec<u32>> {
        let port = self.port(port_name)?;
        Ok(unsafe { read_bits(self.port_ptr(port), port.width as u32) })
    }

    pub fn set(&mut self, port_name: &str, value: &BitVec<u32>) -> ShimResult<()> {
        let port = self.port(port_name)?;
        if !port.direction.is_settable() {
            return Err(Error::NotSettable(port_name.to_string()).into());
        }
        if value.len() as u64 > port.width {
            return Err(Error::Width(port_name.to_string(), value.len(), port.width).into());
        }
        unsafe { write_bits(self.port_ptr(port), port.width as u32, value) };
        Ok(())
    }

    pub fn time(&self) -> u64 {
        unsafe { (self.fns.time)() }
    }

    pub fn set_time(&self, time: u64) {
        unsafe { (self.fns.set_time)(time) }
    }

    pub fn advance(&self, ticks: u64) -> u64 {
        unsafe { (self.fns.advance_time)(ticks) }
    }

    fn port(&self, port_name: &str) -> ShimResult<&Port> {
        self.ports
            .iter()
            .find(|p| p.name == port_name)
            .ok_or_else(|| Error::UnknownPort(port_name.to_string()).into())
    }

    fn port_ptr(&self, port: &Port) -> *mut u8 {
        unsafe {
            self.handle
                .as_ptr()
                .cast::<u8>()
                .add(port.offset as usize)
                .cast::<*mut u8>()
                .read()
        }
    }

    fn query_ports(fns: &ShimFns) -> ShimResult<Vec<Port>> {
        let mut num_of_ports: u64 = 0;
        let table = unsafe { (fns.query)(&mut num_of_ports as *mut u64) };
        if table.is_null() {
            return Err(Error::Query.into());
        }
        let entries = unsafe { std::slice::from_raw_parts(table, num_of_ports as usize) };
        Ok(entries
            .iter()
            .map(Port::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

impl Drop for Dut<'_> {
    fn drop(&mut self) {
        unsafe { (self.fns.destroy)(self.handle.as_ptr()) }
    }
}

use std::ffi::{c_char, CStr};
use std::mem::size_of;

use bitvec::vec::BitVec;

use crate::Engine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    In = 0,
    Out = 1,
    InOut = 2,
}

impl Direction {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Direction::In),
            1 => Some(Direction::Out),
            2 => Some(Direction::InOut),
            _ => None,
        }
    }

    pub fn is_settable(&self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }
}

/// Generation-time metadata of one leaf port.
#[derive(Clone, Copy, Debug)]
pub struct PortInfo {
    pub name: &'static CStr,
    pub width: u32,
    pub direction: Direction,
}

impl PortInfo {
    pub const fn new(name: &'static CStr, width: u32, direction: Direction) -> Self {
        Self {
            name,
            width,
            direction,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name.to_str().unwrap_or_default()
    }

    /// # Safety
    /// See [`read_bits`].
    pub unsafe fn read(&self, ptr: *const u8) -> BitVec<u32> {
        read_bits(ptr, self.width)
    }
}

pub fn num_of_words(width: u32) -> usize {
    (width as usize).div_ceil(32).max(1)
}

/// Reads the value of a `width`-bit port stored at `ptr`.
///
/// # Safety
/// `ptr` must point at live storage laid out for a port of `width` bits.
pub unsafe fn read_bits(ptr: *const u8, width: u32) -> BitVec<u32> {
    let words = match width {
        0..=8 => vec![ptr.read() as u32],
        9..=16 => vec![ptr.cast::<u16>().read_unaligned() as u32],
        17..=32 => vec![ptr.cast::<u32>().read_unaligned()],
        33..=64 => {
            let value = ptr.cast::<u64>().read_unaligned();
            vec![value as u32, (value >> 32) as u32]
        }
        _ => std::slice::from_raw_parts(ptr.cast::<u32>(), num_of_words(width)).to_vec(),
    };
    let mut bits = BitVec::from_vec(words);
    bits.truncate(width as usize);
    bits
}

/// Stores `value` into a `width`-bit port at `ptr`, dropping bits above the
/// width and zero-extending shorter values.
///
/// # Safety
/// `ptr` must point at live, writable storage laid out for a port of
/// `width` bits.
pub unsafe fn write_bits(ptr: *mut u8, width: u32, value: &BitVec<u32>) {
    let mut bits = value.clone();
    bits.truncate(width as usize);
    bits.resize(num_of_words(width).max(2) * 32, false);
    let words = bits.as_raw_slice();
    match width {
        0..=8 => ptr.write(words[0] as u8),
        9..=16 => ptr.cast::<u16>().write_unaligned(words[0] as u16),
        17..=32 => ptr.cast::<u32>().write_unaligned(words[0]),
        33..=64 => ptr
            .cast::<u64>()
            .write_unaligned(words[0] as u64 | ((words[1] as u64) << 32)),
        _ => std::ptr::copy_nonoverlapping(words.as_ptr(), ptr.cast::<u32>(), num_of_words(width)),
    }
}

/// The fixed set of port fields of one generated model.
///
/// # Safety
/// Implementors must be `#[repr(C)]` structs made only of thin `*mut`
/// pointers (fixed-size arrays of them included), holding exactly one
/// pointer per entry of `PORTS`, in the same order. `bind` must return
/// pointers that stay valid until the engine is dropped, whatever happens
/// to the engine value in between: into a foreign model the engine refers
/// to, or into a [`crate::PortStorage`] it owns. Never into the engine
/// value itself.
pub unsafe trait PortSet: Copy + 'static {
    type Engine: Engine;

    const TOP_NAME: &'static str;
    const PORTS: &'static [PortInfo];
    const TRACE_FILE: Option<&'static str> = None;

    fn bind(engine: &mut Self::Engine) -> Self;

    /// Every port field, in declaration order.
    fn addresses(&self) -> &[*mut u8] {
        let len = size_of::<Self>() / size_of::<*mut u8>();
        unsafe { std::slice::from_raw_parts((self as *const Self).cast::<*mut u8>(), len) }
    }

    /// Byte offset of the `index`-th port field inside the handle.
    fn offset_of(index: usize) -> usize {
        index * size_of::<*mut u8>()
    }
}

/// C view of one port, as returned by the exported port query.
#[repr(C)]
#[derive(Debug)]
pub struct PortInfoT {
    pub name: *const c_char,
    pub width: u64,
    pub direction: u8,
    pub offset: u64,
}

/// Port query table kept alive for the whole process by `export_shim!`.
pub struct PortTable(Vec<PortInfoT>);

// Names point at `'static` C strings.
unsafe impl Send for PortTable {}
unsafe impl Sync for PortTable {}

impl PortTable {
    pub fn of<P: PortSet>() -> Self {
        let entries = P::PORTS
            .iter()
            .enumerate()
            .map(|(index, info)| PortInfoT {
                name: info.name.as_ptr(),
                width: info.width as u64,
                direction: info.direction as u8,
                offset: P::offset_of(index) as u64,
            })
            .collect();
        PortTable(entries)
    }

    pub fn entries(&self) -> &[PortInfoT] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use bitvec::prelude::*;

    use super::{write_bits, Direction, PortInfo, PortSet, PortTable};
    use crate::testing::{WideEngine, WidePorts};
    use crate::Engine;

    #[test]
    fn test_read_write_narrow() {
        let info = PortInfo::new(c"p", 6, Direction::In);
        let mut storage: u8 = 0;
        let ptr = &mut storage as *mut u8;

        let value = bitvec![u32, Lsb0; 1, 0, 1, 1, 0, 1];
        unsafe { write_bits(ptr, info.width, &value) };
        assert_eq!(storage, 0b101101);
        assert_eq!(unsafe { info.read(ptr) }, value);
    }

    #[test]
    fn test_write_truncates_to_width() {
        let info = PortInfo::new(c"p", 4, Direction::In);
        let mut storage: u8 = 0;
        let value = bitvec![u32, Lsb0; 1, 1, 1, 1, 1, 1, 1, 1];
        unsafe { write_bits(&mut storage as *mut u8, info.width, &value) };
        assert_eq!(storage, 0b1111);
    }

    #[test]
    fn test_read_write_64_bit() {
        let info = PortInfo::new(c"p", 40, Direction::In);
        let mut storage: u64 = 0;
        let ptr = (&mut storage as *mut u64).cast::<u8>();

        let mut value: BitVec<u32> = BitVec::repeat(false, 40);
        value.set(0, true);
        value.set(39, true);
        unsafe { write_bits(ptr, info.width, &value) };
        assert_eq!(storage, 1 | (1 << 39));
        assert_eq!(unsafe { info.read(ptr) }, value);
    }

    #[test]
    fn test_read_write_wide() {
        let info = PortInfo::new(c"p", 70, Direction::Out);
        let mut storage = [0u32; 3];
        let ptr = storage.as_mut_ptr().cast::<u8>();

        let mut value: BitVec<u32> = BitVec::repeat(false, 70);
        value.set(3, true);
        value.set(64, true);
        value.set(69, true);
        unsafe { write_bits(ptr, info.width, &value) };
        assert_eq!(storage, [0b1000, 0, 0b100001]);
        assert_eq!(unsafe { info.read(ptr) }, value);
    }

    #[test]
    fn test_port_table_offsets_follow_field_order() {
        let table = PortTable::of::<WidePorts>();
        let pointer_size = std::mem::size_of::<*mut u8>() as u64;
        for (index, entry) in table.entries().iter().enumerate() {
            assert_eq!(entry.offset, index as u64 * pointer_size);
            assert_eq!(entry.width, WidePorts::PORTS[index].width as u64);
        }
    }

    #[test]
    fn test_addresses_cover_every_port() {
        let mut engine = WideEngine::construct().unwrap();
        let ports = WidePorts::bind(&mut engine);
        assert_eq!(ports.addresses().len(), WidePorts::PORTS.len());
        assert_eq!(ports.addresses()[0], ports.a.cast::<u8>());
        assert_eq!(ports.addresses()[2], ports.y.cast::<u8>());
    }
}

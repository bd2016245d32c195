//! Value change dump of the ports of one handle.
//!
//! Dumps must come in non-decreasing time order. After `time::reset()` a
//! dump earlier than the last written timestamp is rejected with
//! [`Error::TimeReversed`]; the handle skips those passes and the trace
//! continues once simulated time passes the last written timestamp.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bitvec::vec::BitVec;
use vcd::{IdCode, TimescaleUnit, Value};

use crate::PortInfo;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open {}: {}", _0.display(), _1)]
    Open(PathBuf, std::io::Error),
    #[error("IO error: {}", _0)]
    Io(std::io::Error),
    #[error("expected {} port values, got {}", _0, _1)]
    ValueCount(usize, usize),
    #[error("time {} is earlier than the last dumped time {}", _1, _0)]
    TimeReversed(u64, u64),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

pub struct VcdWriter<W: Write = BufWriter<File>> {
    writer: vcd::Writer<W>,
    codes: Vec<IdCode>,
    last_values: Vec<Option<BitVec<u32>>>,
    last_time: Option<u64>,
}

impl VcdWriter {
    pub fn create(path: &Path, top_name: &str, ports: &[PortInfo]) -> Result<Self, Error> {
        let file = File::create(path).map_err(|e| Error::Open(path.to_path_buf(), e))?;
        Self::new(BufWriter::new(file), top_name, ports)
    }
}

impl<W: Write> VcdWriter<W> {
    pub fn new(out: W, top_name: &str, ports: &[PortInfo]) -> Result<Self, Error> {
        let mut writer = vcd::Writer::new(out);
        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module(top_name)?;
        let codes = ports
            .iter()
            .map(|port| writer.add_wire(port.width, port.name()))
            .collect::<Result<Vec<IdCode>, _>>()?;
        writer.upscope()?;
        writer.enddefinitions()?;
        Ok(Self {
            writer,
            last_values: vec![None; codes.len()],
            codes,
            last_time: None,
        })
    }

    /// Writes the values that changed since the previous dump. `values` is
    /// in port order.
    pub fn dump(&mut self, time: u64, values: &[BitVec<u32>]) -> Result<(), Error> {
        if values.len() != self.codes.len() {
            return Err(Error::ValueCount(self.codes.len(), values.len()));
        }
        if let Some(last_time) = self.last_time {
            if time < last_time {
                return Err(Error::TimeReversed(last_time, time));
            }
        }
        for (index, value) in values.iter().enumerate() {
            if self.last_values[index].as_ref() == Some(value) {
                continue;
            }
            if self.last_time != Some(time) {
                self.writer.timestamp(time)?;
                self.last_time = Some(time);
            }
            let code = self.codes[index];
            if value.len() == 1 {
                self.writer.change_scalar(code, bit(value[0]))?;
            } else {
                self.writer
                    .change_vector(code, value.iter().rev().map(|b| bit(*b)))?;
            }
            self.last_values[index] = Some(value.clone());
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }
}

fn bit(value: bool) -> Value {
    if value {
        Value::V1
    } else {
        Value::V0
    }
}

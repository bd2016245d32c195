use std::path::PathBuf;

use thiserror::Error;

pub type GenResult<T> = Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid path given: {}", _0.to_string_lossy())]
    InvalidPath(PathBuf),
    #[error("source file not found: {}", _0.to_string_lossy())]
    SvFilePathNotFound(PathBuf),
    #[error("expected a .sv or .v file: {}", _0.to_string_lossy())]
    ExtensionNotSv(PathBuf),
    #[error("IO error: {}", _0)]
    Io(std::io::Error),
    #[error("verilator failed:\n{}", _0)]
    Verilator(String),
    #[error("cannot locate the verilator include directory; set VSHIM_VERILATOR_INCLUDE_DIR or configure pkg-config")]
    VerilatorIncludeDir,
    #[error("cargo build failed:\n{}", _0)]
    Cargo(String),
    #[error("malformed port declaration: {}", _0)]
    PortDecl(String),
    #[error("no ports found for top module {}", _0)]
    NoPorts(String),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

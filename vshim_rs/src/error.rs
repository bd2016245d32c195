use crate::host;

pub type ShimResult<T> = Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vshim_rs: failed to construct model {}: {}", _0, _1)]
    Construct(&'static str, String),
    #[error("vshim_rs: host: {}", _0)]
    Host(host::Error),
}

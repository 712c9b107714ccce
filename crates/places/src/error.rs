use crate::source::SourceError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("place index {index} out of range for {len} displayed places")]
	IndexOutOfRange { index: usize, len: usize },

	#[error(transparent)]
	Source(#[from] SourceError),
}

pub type Result<T> = std::result::Result<T, Error>;

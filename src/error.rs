
//! Error type describing all the ways reading or writing an image can fail.

use std::borrow::Cow;
use std::io::ErrorKind;

/// A result that, if ok, contains `T`, and otherwise contains an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A result that contains no value on success.
pub type UnitResult = Result<()>;

pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;

/// All possible crate failures.
/// Contains a description of what went wrong.
#[derive(Debug)]
pub enum Error {

    /// The file structure is corrupt, a required field is missing,
    /// or the metadata model is inconsistent beyond repair.
    Format(Cow<'static, str>),

    /// The underlying byte stream could not be read or written correctly.
    Io(IoError),

    /// A pixel type does not match what the file or the other buffer
    /// requires, or a pixel-type/codec combination is unsupported.
    Type(Cow<'static, str>),

    /// An operation was issued at the wrong time,
    /// for example on a closed file or an unflushed directory.
    State(Cow<'static, str>),

    /// An impossible parameter combination was requested.
    Logic(Cow<'static, str>),
}

impl Error {

    /// Create an error of the [`Format`](Error::Format) variant.
    pub fn format(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Format(message.into())
    }

    /// Create an error of the [`Type`](Error::Type) variant.
    pub fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Type(message.into())
    }

    /// Create an error of the [`State`](Error::State) variant.
    pub fn state(message: impl Into<Cow<'static, str>>) -> Self {
        Error::State(message.into())
    }

    /// Create an error of the [`Logic`](Error::Logic) variant.
    pub fn logic(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Logic(message.into())
    }
}

/// Enable using the `?` operator on `std::io::Result`.
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        if error.kind() == ErrorKind::UnexpectedEof {
            Error::format("unexpected end of file")
        }
        else {
            Error::Io(error)
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Format(message) => write!(formatter, "invalid file: {}", message),
            Error::Io(error) => write!(formatter, "io error: {}", error),
            Error::Type(message) => write!(formatter, "type error: {}", message),
            Error::State(message) => write!(formatter, "state error: {}", message),
            Error::Logic(message) => write!(formatter, "logic error: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            _ => None,
        }
    }
}

#[inline]
pub(crate) fn u64_to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::format("file offset too large for this machine"))
}

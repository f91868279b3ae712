//
// Errors
//
use std::error;
use std::fmt;
use std::io;
use std::result;

/// Type alias for stylegraph errors
pub type Result<X> = result::Result<X, Error>;

/// Wrapper for the kinds of failures a scan can hit
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Parse(String),
    Codec(bincode::Error),
    Json(serde_json::Error),
    MissingFile(&'static str, Option<io::Error>),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "IO error: {}", err),
            Error::Parse(ref info) => write!(f, "Malformed dump: {}", info),
            Error::Codec(ref err) => write!(f, "Checkpoint encoding error: {}", err),
            Error::Json(ref err) => write!(f, "JSON error: {}", err),
            Error::MissingFile(ref info, ref opt_err) => {
                write!(
                    f,
                    "The {} must already exist at this point but there was a problem opening it. \
                    Wrong directory? Maybe missed a step? The OS error was: ",
                    info
                )?;
                if let Some(ref err) = *opt_err {
                    fmt::Display::fmt(err, f)
                } else {
                    write!(f, "Unknown")
                }
            }
            Error::Other(ref info) => write!(f, "{}", info),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Parse(_) => None,
            Error::Codec(ref err) => Some(&**err),
            Error::Json(ref err) => Some(err),
            Error::MissingFile(_, ref opt_err) => {
                opt_err.as_ref().map(|err| err as &(dyn error::Error + 'static))
            }
            Error::Other(_) => None,
        }
    }
}

//
// Convert everything else into Error
//
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Codec(err)
    }
}
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

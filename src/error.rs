use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most of the PE directory walkers never surface an error: corruption inside an otherwise
/// valid image is recovered locally (clamping, defaults, early termination) and the caller
/// receives a partial result. Errors are reserved for the byte accessor, explicit lookups and
/// the mutation engine.
///
/// # Error Categories
///
/// ## File Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond file boundaries
/// - [`Error::NotSupported`] - Unsupported file format or backend capability
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// ## Mutation Errors
/// - [`Error::WriteLayoutFailed`] - A structural edit could not be planned
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{Error, PeFile};
/// use std::path::Path;
///
/// match PeFile::from_file(Path::new("sample.exe")) {
///     Ok(pe) if pe.is_valid() => println!("{} sections", pe.sections().len()),
///     Ok(_) => println!("not a PE image"),
///     Err(Error::FileError(io_err)) => eprintln!("I/O error: {}", io_err),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type, or the requested backend capability, is not supported.
    ///
    /// Returned by the format dispatcher for recognised but unhandled containers, and by the
    /// mutation engine when the backing store cannot be rewritten (memory-mapped files).
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Recursion limit reached.
    ///
    /// Recursive walkers (resource tree, DER records) bound their depth; this error indicates
    /// that bound was exceeded where a caller explicitly asked for a complete structure.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A structural edit of the image could not be planned or applied.
    ///
    /// The backing store is left untouched when this error is returned, because rewrite plans
    /// are applied to a copy before being flushed.
    #[error("Write layout failed - {message}")]
    WriteLayoutFailed {
        /// Description of the layout problem
        message: String,
    },
}

//! A bunch of wrap errors.
use chordsim_core::error::Error as CoreError;

/// A wrap `Result` contains custom errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors enum mapping global custom errors.
/// The error type can be expressed in decimal, where the high decs represent
/// the error category and the low decs represent the error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
#[repr(u32)]
pub enum Error {
    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String) = 100,
    #[error("Invalid logging level: {0}")]
    InvalidLoggingLevel(String) = 101,
    #[error("No active node left to {0}")]
    NoActiveNode(&'static str) = 200,
    #[error("Core error: {0}")]
    CoreError(#[from] CoreError) = 300,
    #[error("Create File Error: {0}")]
    CreateFileError(String) = 400,
    #[error("Open File Error: {0}")]
    OpenFileError(String) = 401,
    #[error("Cannot find home directory")]
    HomeDirError = 402,
    #[error("Cannot find parent directory")]
    ParentDirError = 403,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error) = 404,
    #[error("Serde yaml error: {0}")]
    SerdeYamlError(#[from] serde_yaml::Error) = 500,
}

impl Error {
    fn discriminant(&self) -> u32 {
        // SAFETY: Because `Self` is marked `repr(u32)`, its layout is a `repr(C)` `union`
        // between `repr(C)` structs, each of which has the `u32` discriminant as its first
        // field, so we can read the discriminant without offsetting the pointer.
        // ref: https://doc.rust-lang.org/std/mem/fn.discriminant.html
        unsafe { *<*const _>::from(self).cast::<u32>() }
    }

    pub fn code(&self) -> u32 {
        self.discriminant()
    }
}

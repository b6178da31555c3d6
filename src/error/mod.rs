mod analysis;
mod input;
mod io;
mod registry;

pub use analysis::AnalysisError;
pub use input::InputFormatError;
pub use io::IoError;
pub use registry::RegistryError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    InputFormat(#[from] InputFormatError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

pub type Result<T> = std::result::Result<T, Error>;

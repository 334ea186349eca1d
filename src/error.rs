#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    IoError,
    InvalidSector,
    InvalidPath,
    InvalidFileName,
    NotFound,
    AlreadyExists,
    NoSpaceOnDevice,
    DirectoryFull,
    DescriptorTableFull,
    OutOfBounds,
}

pub type Result<T> = core::result::Result<T, FsError>;

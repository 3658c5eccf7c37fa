//! Log transport implementations

pub mod local;
pub mod memory;
pub mod sftp;

pub use local::LocalFileTransport;
pub use memory::{MemoryLog, MemoryTransport};
pub use sftp::{SftpConfig, SftpTransport};

pub mod vfs;
pub mod file;
pub mod mem_fs;

use alloc::vec::Vec;
use alloc::string::String;

#[derive(Debug, Clone)]
pub enum FileType {
    Regular,
    Directory,
    SymLink,
    Device,
}

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub file_type: FileType,
    pub permissions: u32,
}

#[derive(Debug)]
pub enum FileSystemError {
    NotFound,
    PermissionDenied,
    AlreadyExists,
    InvalidPath,
    IoError,
    NotSupported,
    FileNotFound,
}

pub trait FileSystem {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FileSystemError>;
    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), FileSystemError>;
    fn create_directory(&mut self, path: &str) -> Result<(), FileSystemError>;
    fn list_directory(&self, path: &str) -> Result<Vec<FileInfo>, FileSystemError>;
    fn delete(&mut self, path: &str) -> Result<(), FileSystemError>;
    fn get_file_info(&self, path: &str) -> Result<FileInfo, FileSystemError>;

    /// Byte length of `path`. Default implementation reads the whole file;
    /// filesystems that track size in metadata should override.
    fn file_length(&self, path: &str) -> Result<u64, FileSystemError> {
        self.read_file(path).map(|data| data.len() as u64)
    }

    /// Reads up to `buf.len()` bytes starting at `offset`, returning the
    /// number of bytes actually copied (short if `offset` is near EOF).
    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, FileSystemError> {
        let data = self.read_file(path)?;
        let start = offset as usize;
        if start >= data.len() {
            return Ok(0);
        }
        let n = core::cmp::min(buf.len(), data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    /// Writes `buf` at `offset`, growing the file with zero bytes if `offset`
    /// lies past the current end.
    fn write_at(&mut self, path: &str, offset: u64, buf: &[u8]) -> Result<(), FileSystemError> {
        let mut data = self.read_file(path).unwrap_or_default();
        let end = offset as usize + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(buf);
        self.write_file(path, &data)
    }
}

//! A trivial in-memory filesystem, mounted at boot for loader/mmap files and
//! used directly in unit tests that need a real `FileSystem` without a disk.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::{FileInfo, FileSystem, FileSystemError, FileType};

pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }
}

impl FileSystem for MemFs {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FileSystemError> {
        self.files.get(path).cloned().ok_or(FileSystemError::NotFound)
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), FileSystemError> {
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn create_directory(&mut self, _path: &str) -> Result<(), FileSystemError> {
        Ok(())
    }

    fn list_directory(&self, _path: &str) -> Result<alloc::vec::Vec<FileInfo>, FileSystemError> {
        Ok(self
            .files
            .keys()
            .map(|name| FileInfo {
                name: name.clone(),
                size: self.files[name].len() as u64,
                file_type: FileType::Regular,
                permissions: 0o644,
            })
            .collect())
    }

    fn delete(&mut self, path: &str) -> Result<(), FileSystemError> {
        self.files.remove(path).map(|_| ()).ok_or(FileSystemError::NotFound)
    }

    fn get_file_info(&self, path: &str) -> Result<FileInfo, FileSystemError> {
        self.files
            .get(path)
            .map(|data| FileInfo {
                name: path.to_string(),
                size: data.len() as u64,
                file_type: FileType::Regular,
                permissions: 0o644,
            })
            .ok_or(FileSystemError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_at_is_short_past_eof() {
        let mut fs = MemFs::new();
        fs.write_file("/a", b"hello").unwrap();
        let mut buf = [0u8; 16];
        let n = fs.read_at("/a", 2, &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], b"llo");
    }

    #[test]
    fn write_at_extends_file() {
        let mut fs = MemFs::new();
        fs.write_file("/a", b"ab").unwrap();
        fs.write_at("/a", 4, b"cd").unwrap();
        let data = fs.read_file("/a").unwrap();
        assert_eq!(data, alloc::vec![b'a', b'b', 0, 0, b'c', b'd']);
    }
}

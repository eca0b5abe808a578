//! Offset-addressed file handles used by the VM file backing. A `FileHandle`
//! is an `Arc`, so `file_reopen` is a cheap clone rather than a second path
//! lookup — the natural way to share one open file across all pages of a
//! single mmap (see memory::file's shared mmap context).

use alloc::string::String;
use alloc::sync::Arc;
use spin::Mutex;

use super::vfs::VFS;
use super::FileSystemError;

pub struct OpenFile {
    pub path: String,
    deny_write: Mutex<bool>,
}

pub type FileHandle = Arc<OpenFile>;

pub fn file_open(path: &str) -> FileHandle {
    Arc::new(OpenFile {
        path: String::from(path),
        deny_write: Mutex::new(false),
    })
}

pub fn file_reopen(file: &FileHandle) -> FileHandle {
    Arc::clone(file)
}

pub fn file_close(_file: FileHandle) {
    // Dropping the Arc releases this reference; the underlying VFS entry
    // has no per-open state to tear down.
}

pub fn file_length(file: &FileHandle) -> Result<u64, FileSystemError> {
    VFS.lock().file_length(&file.path)
}

pub fn file_read_at(file: &FileHandle, buf: &mut [u8], offset: u64) -> Result<usize, FileSystemError> {
    VFS.lock().read_at(&file.path, offset, buf)
}

pub fn file_write_at(file: &FileHandle, buf: &[u8], offset: u64) -> Result<(), FileSystemError> {
    if *file.deny_write.lock() {
        return Err(FileSystemError::PermissionDenied);
    }
    VFS.lock().write_at(&file.path, offset, buf)
}

pub fn file_deny_write(file: &FileHandle) {
    *file.deny_write.lock() = true;
}

pub fn file_allow_write(file: &FileHandle) {
    *file.deny_write.lock() = false;
}

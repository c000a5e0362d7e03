//! Archive entry types and operations

use super::ffi::{self, AE_IFDIR, AE_IFLNK, AE_IFMT, AE_IFREG, LibArchive};
use crate::error::Result;
use std::ffi::CStr;
use std::path::Path;

/// File type of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileType {
    RegularFile,
    Directory,
    SymbolicLink,
    Other,
}

impl FileType {
    fn from_mode(mode: u32) -> Self {
        match mode & AE_IFMT {
            AE_IFREG => FileType::RegularFile,
            AE_IFDIR => FileType::Directory,
            AE_IFLNK => FileType::SymbolicLink,
            _ => FileType::Other,
        }
    }
}

/// Borrowed view of the entry libarchive owns while reading a header
pub(crate) struct Entry<'a> {
    pub(crate) lib: &'a LibArchive,
    pub(crate) entry: *mut ffi::archive_entry,
}

impl<'a> Entry<'a> {
    /// Get the pathname of the entry as stored
    pub(crate) fn pathname(&self) -> Option<String> {
        unsafe { read_str((self.lib.entry_pathname)(self.entry)) }
    }

    /// Get the hardlink target
    pub(crate) fn hardlink(&self) -> Option<String> {
        unsafe { read_str((self.lib.entry_hardlink)(self.entry)) }
    }

    /// Point the entry somewhere else on disk
    pub(crate) fn set_pathname(&mut self, path: &Path) -> Result<()> {
        let c_path = ffi::c_path(path)?;
        unsafe { (self.lib.entry_copy_pathname)(self.entry, c_path.as_ptr()) };
        Ok(())
    }

    /// Retarget the hardlink
    pub(crate) fn set_hardlink(&mut self, path: &Path) -> Result<()> {
        let c_path = ffi::c_path(path)?;
        unsafe { (self.lib.entry_copy_hardlink)(self.entry, c_path.as_ptr()) };
        Ok(())
    }

    /// Get the file type
    pub(crate) fn file_type(&self) -> FileType {
        let mode = unsafe { (self.lib.entry_filetype)(self.entry) };
        FileType::from_mode(mode as u32)
    }

    /// Replace the stored permission bits with what a plain create would
    /// use; libarchive still masks them with the umask
    pub(crate) fn set_default_perm(&mut self) {
        let perm = match self.file_type() {
            FileType::Directory | FileType::SymbolicLink => 0o777,
            _ => 0o666,
        };
        unsafe { (self.lib.entry_set_perm)(self.entry, perm as ffi::mode_t) };
    }

    /// Get the file size in bytes
    pub(crate) fn size(&self) -> i64 {
        unsafe { (self.lib.entry_size)(self.entry) }
    }
}

/// Owned entry built from a file on disk
pub(crate) struct EntryMut<'a> {
    pub(crate) lib: &'a LibArchive,
    pub(crate) entry: *mut ffi::archive_entry,
}

impl<'a> EntryMut<'a> {
    /// Create a new entry
    pub(crate) fn new(lib: &'a LibArchive) -> Result<Self> {
        let entry = unsafe { (lib.entry_new)() };
        if entry.is_null() {
            return Err(crate::Error::NullPointer);
        }
        Ok(EntryMut { lib, entry })
    }

    /// Set the file on disk the entry's metadata is read from
    pub(crate) fn set_sourcepath(&mut self, path: &Path) -> Result<()> {
        let c_path = ffi::c_path(path)?;
        unsafe { (self.lib.entry_copy_sourcepath)(self.entry, c_path.as_ptr()) };
        Ok(())
    }

    /// Get an immutable view of this entry
    pub(crate) fn as_entry(&mut self) -> Entry<'_> {
        Entry {
            lib: self.lib,
            entry: self.entry,
        }
    }
}

impl Drop for EntryMut<'_> {
    fn drop(&mut self) {
        if !self.entry.is_null() {
            unsafe {
                (self.lib.entry_free)(self.entry);
            }
        }
    }
}

unsafe fn read_str(ptr: *const std::os::raw::c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: libarchive returns NUL-terminated strings owned by the entry
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

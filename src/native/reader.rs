//! Archive reading functionality

use super::entry::Entry;
use super::ffi::{self, ARCHIVE_EOF, LibArchive};
use crate::error::{Error, Result};
use std::path::Path;
use std::ptr;

/// Archive reader with RAII resource management
pub(crate) struct ReadArchive<'a> {
    lib: &'a LibArchive,
    archive: *mut ffi::archive,
}

impl<'a> ReadArchive<'a> {
    /// Open an archive file for reading, auto-detecting format and filters
    pub(crate) fn open(lib: &'a LibArchive, path: &Path) -> Result<Self> {
        let archive = unsafe { (lib.read_new)() };
        if archive.is_null() {
            return Err(Error::NullPointer);
        }
        let reader = ReadArchive { lib, archive };
        let c_path = ffi::c_path(path)?;

        unsafe {
            lib.check((lib.read_support_filter_all)(archive), archive)?;
            lib.check((lib.read_support_format_all)(archive), archive)?;
            lib.check(
                (lib.read_open_filename)(archive, c_path.as_ptr(), 10240),
                archive,
            )?;
        }

        Ok(reader)
    }

    /// Read the next entry header
    ///
    /// Returns `None` when there are no more entries. The entry stays valid
    /// only until the next call.
    pub(crate) fn next_entry(&mut self) -> Result<Option<Entry<'a>>> {
        unsafe {
            let mut entry: *mut ffi::archive_entry = ptr::null_mut();
            let ret = (self.lib.read_next_header)(self.archive, &mut entry);

            if ret == ARCHIVE_EOF {
                return Ok(None);
            }

            self.lib.check(ret, self.archive)?;

            Ok(Some(Entry {
                lib: self.lib,
                entry,
            }))
        }
    }

    /// Read data from the current entry
    pub(crate) fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        unsafe {
            let ret = (self.lib.read_data)(
                self.archive,
                buf.as_mut_ptr() as *mut std::os::raw::c_void,
                buf.len(),
            );

            if ret < 0 {
                Err(self.lib.error(self.archive))
            } else {
                Ok(ret as usize)
            }
        }
    }
}

impl Drop for ReadArchive<'_> {
    fn drop(&mut self) {
        unsafe {
            if !self.archive.is_null() {
                (self.lib.read_close)(self.archive);
                (self.lib.read_free)(self.archive);
            }
        }
    }
}

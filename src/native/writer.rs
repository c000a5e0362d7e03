//! Archive writing functionality

use super::entry::Entry;
use super::ffi::{self, LibArchive};
use crate::error::{Error, Result};
use crate::format::CompressionFormat;
use std::path::Path;

/// Tar writer with RAII resource management.
///
/// Always writes restricted pax: plain ustar headers unless an entry needs
/// pax extensions.
pub(crate) struct WriteArchive<'a> {
    lib: &'a LibArchive,
    archive: *mut ffi::archive,
}

impl<'a> WriteArchive<'a> {
    /// Open `path` for writing, truncating it
    pub(crate) fn open_file(
        lib: &'a LibArchive,
        path: &Path,
        compression: CompressionFormat,
    ) -> Result<Self> {
        let archive = unsafe { (lib.write_new)() };
        if archive.is_null() {
            return Err(Error::NullPointer);
        }
        let writer = WriteArchive { lib, archive };
        let c_path = ffi::c_path(path)?;

        unsafe {
            lib.check((lib.write_set_format_pax_restricted)(archive), archive)?;
            match compression {
                CompressionFormat::None => {
                    lib.check((lib.write_add_filter_none)(archive), archive)?;
                }
                CompressionFormat::Gzip => {
                    lib.check((lib.write_add_filter_gzip)(archive), archive)?;
                }
            }
            lib.check((lib.write_open_filename)(archive, c_path.as_ptr()), archive)?;
        }

        Ok(writer)
    }

    /// Write an entry header; warnings such as an unmappable owner name are
    /// not fatal
    pub(crate) fn write_header(&mut self, entry: &Entry<'_>) -> Result<()> {
        unsafe {
            self.lib
                .check_warn((self.lib.write_header)(self.archive, entry.entry), self.archive)?;
        }
        Ok(())
    }

    /// Write data for the current entry
    pub(crate) fn write_data(&mut self, data: &[u8]) -> Result<usize> {
        unsafe {
            let ret = (self.lib.write_data)(
                self.archive,
                data.as_ptr() as *const std::os::raw::c_void,
                data.len(),
            );

            if ret < 0 {
                Err(self.lib.error(self.archive))
            } else {
                Ok(ret as usize)
            }
        }
    }

    /// Finish writing and close the archive
    pub(crate) fn finish(mut self) -> Result<()> {
        unsafe {
            if !self.archive.is_null() {
                self.lib
                    .check((self.lib.write_close)(self.archive), self.archive)?;
                (self.lib.write_free)(self.archive);
                self.archive = std::ptr::null_mut();
            }
        }
        Ok(())
    }
}

impl Drop for WriteArchive<'_> {
    fn drop(&mut self) {
        unsafe {
            if !self.archive.is_null() {
                (self.lib.write_close)(self.archive);
                (self.lib.write_free)(self.archive);
            }
        }
    }
}

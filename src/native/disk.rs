//! Disk-side libarchive objects: metadata capture for `create` and the
//! restore side used by `extract`

use super::entry::Entry;
use super::ffi::{self, LibArchive};
use crate::error::{Error, Result};
use std::ops::BitOr;

/// Flags for controlling extraction behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExtractFlags(i32);

impl ExtractFlags {
    /// Restore file permissions
    pub(crate) const PERM: ExtractFlags = ExtractFlags(0x0002);

    /// Guard against symlink attacks
    pub(crate) const SECURE_SYMLINKS: ExtractFlags = ExtractFlags(0x0100);

    /// Reject entries with '..' in path
    pub(crate) const SECURE_NODOTDOT: ExtractFlags = ExtractFlags(0x0200);

    /// Get the raw integer value of the flags
    pub(crate) fn bits(&self) -> i32 {
        self.0
    }

    /// Flags for one extraction run
    pub(crate) fn for_extract(perms: bool) -> Self {
        let base = ExtractFlags::SECURE_SYMLINKS | ExtractFlags::SECURE_NODOTDOT;
        if perms { base | ExtractFlags::PERM } else { base }
    }
}

impl BitOr for ExtractFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        ExtractFlags(self.0 | rhs.0)
    }
}

/// Archive writer for extracting entries to disk
pub(crate) struct WriteDisk<'a> {
    lib: &'a LibArchive,
    archive: *mut ffi::archive,
}

impl<'a> WriteDisk<'a> {
    /// Create a new disk writer with the given options and standard
    /// user/group lookup
    pub(crate) fn new(lib: &'a LibArchive, flags: ExtractFlags) -> Result<Self> {
        let archive = unsafe { (lib.write_disk_new)() };
        if archive.is_null() {
            return Err(Error::NullPointer);
        }
        let disk = WriteDisk { lib, archive };
        unsafe {
            lib.check((lib.write_disk_set_options)(archive, flags.bits()), archive)?;
            lib.check((lib.write_disk_set_standard_lookup)(archive), archive)?;
        }
        Ok(disk)
    }

    /// Write an entry header to disk
    ///
    /// This creates the file/directory/etc on disk. Returns the libarchive
    /// warning text when the entry was written with a non-fatal problem.
    pub(crate) fn write_header(&mut self, entry: &Entry<'_>) -> Result<Option<String>> {
        unsafe {
            let ret = self.lib.check_warn(
                (self.lib.write_header)(self.archive, entry.entry),
                self.archive,
            )?;
            Ok(self.warning_for(ret))
        }
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

    /// Finish writing the current entry
    pub(crate) fn finish_entry(&mut self) -> Result<Option<String>> {
        unsafe {
            let ret = self.lib.check_warn(
                (self.lib.write_finish_entry)(self.archive),
                self.archive,
            )?;
            Ok(self.warning_for(ret))
        }
    }

    unsafe fn warning_for(&self, ret: std::os::raw::c_int) -> Option<String> {
        // SAFETY: self.archive is live until close/drop
        (ret == ffi::ARCHIVE_WARN).then(|| unsafe { self.lib.warning(self.archive) })
    }

    /// Close the disk writer, applying deferred directory permissions.
    ///
    /// A fixup skipped because its directory was replaced comes back as a
    /// warning.
    pub(crate) fn close(mut self) -> Result<Option<String>> {
        let mut warning = None;
        unsafe {
            if !self.archive.is_null() {
                let ret = self
                    .lib
                    .check_warn((self.lib.write_close)(self.archive), self.archive)?;
                warning = self.warning_for(ret);
                (self.lib.write_free)(self.archive);
                self.archive = std::ptr::null_mut();
            }
        }
        Ok(warning)
    }
}

impl Drop for WriteDisk<'_> {
    fn drop(&mut self) {
        unsafe {
            if !self.archive.is_null() {
                (self.lib.write_close)(self.archive);
                (self.lib.write_free)(self.archive);
            }
        }
    }
}

/// Archive reader for capturing file metadata from disk
pub(crate) struct ReadDisk<'a> {
    lib: &'a LibArchive,
    archive: *mut ffi::archive,
}

impl<'a> ReadDisk<'a> {
    /// Create a disk reader that does not follow symlinks
    pub(crate) fn new(lib: &'a LibArchive) -> Result<Self> {
        let archive = unsafe { (lib.read_disk_new)() };
        if archive.is_null() {
            return Err(Error::NullPointer);
        }
        let disk = ReadDisk { lib, archive };
        unsafe {
            lib.check((lib.read_disk_set_symlink_physical)(archive), archive)?;
            lib.check((lib.read_disk_set_standard_lookup)(archive), archive)?;
        }
        Ok(disk)
    }

    /// Fill `entry` from an lstat of its source path
    pub(crate) fn fill(&mut self, entry: &Entry<'_>) -> Result<()> {
        unsafe {
            self.lib.check_warn(
                (self.lib.read_disk_entry_from_file)(
                    self.archive,
                    entry.entry,
                    -1,
                    std::ptr::null(),
                ),
                self.archive,
            )?;
        }
        Ok(())
    }
}

impl Drop for ReadDisk<'_> {
    fn drop(&mut self) {
        unsafe {
            if !self.archive.is_null() {
                (self.lib.read_close)(self.archive);
                (self.lib.read_free)(self.archive);
            }
        }
    }
}

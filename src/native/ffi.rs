//! libarchive entry points resolved at runtime with `dlopen`.
//!
//! Nothing is linked at build time: a host without libarchive simply fails
//! [`LibArchive::load`], which the facade treats as "use the fallback".

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Opaque `struct archive`
#[allow(non_camel_case_types)]
#[repr(C)]
pub(crate) struct archive {
    _private: [u8; 0],
}

/// Opaque `struct archive_entry`
#[allow(non_camel_case_types)]
#[repr(C)]
pub(crate) struct archive_entry {
    _private: [u8; 0],
}

#[cfg(unix)]
#[allow(non_camel_case_types)]
pub(crate) type mode_t = libc::mode_t;
#[cfg(not(unix))]
#[allow(non_camel_case_types)]
pub(crate) type mode_t = u16;

pub(crate) const ARCHIVE_EOF: c_int = 1;
pub(crate) const ARCHIVE_OK: c_int = 0;
pub(crate) const ARCHIVE_WARN: c_int = -20;

pub(crate) const AE_IFMT: u32 = 0o170000;
pub(crate) const AE_IFREG: u32 = 0o100000;
pub(crate) const AE_IFDIR: u32 = 0o040000;
pub(crate) const AE_IFLNK: u32 = 0o120000;

/// Oldest libarchive whose deferred directory fixups do not follow symlinks
const MIN_VERSION: c_int = 3_006_000;

type ArchiveNew = unsafe extern "C" fn() -> *mut archive;
type ArchiveOp = unsafe extern "C" fn(*mut archive) -> c_int;
type ArchiveInt = unsafe extern "C" fn(*mut archive, c_int) -> c_int;
type ArchivePath = unsafe extern "C" fn(*mut archive, *const c_char) -> c_int;
type EntryStr = unsafe extern "C" fn(*mut archive_entry) -> *const c_char;
type EntrySetStr = unsafe extern "C" fn(*mut archive_entry, *const c_char);

/// Resolved libarchive functions, kept alive together with the library handle
pub(crate) struct LibArchive {
    pub(crate) source: PathBuf,

    pub(crate) version_number: unsafe extern "C" fn() -> c_int,
    pub(crate) version_string: unsafe extern "C" fn() -> *const c_char,
    pub(crate) error_string: unsafe extern "C" fn(*mut archive) -> *const c_char,
    pub(crate) errno: ArchiveOp,

    pub(crate) read_new: ArchiveNew,
    pub(crate) read_support_filter_all: ArchiveOp,
    pub(crate) read_support_format_all: ArchiveOp,
    pub(crate) read_open_filename:
        unsafe extern "C" fn(*mut archive, *const c_char, usize) -> c_int,
    pub(crate) read_next_header:
        unsafe extern "C" fn(*mut archive, *mut *mut archive_entry) -> c_int,
    pub(crate) read_data: unsafe extern "C" fn(*mut archive, *mut c_void, usize) -> isize,
    pub(crate) read_close: ArchiveOp,
    pub(crate) read_free: ArchiveOp,

    pub(crate) read_disk_new: ArchiveNew,
    pub(crate) read_disk_set_standard_lookup: ArchiveOp,
    pub(crate) read_disk_set_symlink_physical: ArchiveOp,
    pub(crate) read_disk_entry_from_file:
        unsafe extern "C" fn(*mut archive, *mut archive_entry, c_int, *const c_void) -> c_int,

    pub(crate) write_new: ArchiveNew,
    pub(crate) write_set_format_pax_restricted: ArchiveOp,
    pub(crate) write_add_filter_gzip: ArchiveOp,
    pub(crate) write_add_filter_none: ArchiveOp,
    pub(crate) write_open_filename: ArchivePath,
    pub(crate) write_header: unsafe extern "C" fn(*mut archive, *mut archive_entry) -> c_int,
    pub(crate) write_data: unsafe extern "C" fn(*mut archive, *const c_void, usize) -> isize,
    pub(crate) write_finish_entry: ArchiveOp,
    pub(crate) write_close: ArchiveOp,
    pub(crate) write_free: ArchiveOp,

    pub(crate) write_disk_new: ArchiveNew,
    pub(crate) write_disk_set_options: ArchiveInt,
    pub(crate) write_disk_set_standard_lookup: ArchiveOp,

    pub(crate) entry_new: unsafe extern "C" fn() -> *mut archive_entry,
    pub(crate) entry_free: unsafe extern "C" fn(*mut archive_entry),
    pub(crate) entry_pathname: EntryStr,
    pub(crate) entry_copy_pathname: EntrySetStr,
    pub(crate) entry_copy_sourcepath: EntrySetStr,
    pub(crate) entry_hardlink: EntryStr,
    pub(crate) entry_copy_hardlink: EntrySetStr,
    pub(crate) entry_filetype: unsafe extern "C" fn(*mut archive_entry) -> mode_t,
    pub(crate) entry_size: unsafe extern "C" fn(*mut archive_entry) -> i64,
    pub(crate) entry_set_perm: unsafe extern "C" fn(*mut archive_entry, mode_t),

    _lib: DynLib,
}

// SAFETY: the struct only holds a library handle and plain function
// pointers; libarchive objects created through them are owned elsewhere.
unsafe impl Send for LibArchive {}
unsafe impl Sync for LibArchive {}

macro_rules! load_sym {
    ($lib:expr, $name:literal) => {{
        let ptr = $lib.sym(concat!($name, "\0"))?;
        // SAFETY: the field receiving the pointer is declared with the
        // signature archive.h / archive_entry.h give this symbol.
        unsafe { std::mem::transmute::<*mut c_void, _>(ptr) }
    }};
}

impl LibArchive {
    /// Open the first candidate that resolves every required symbol
    pub(crate) fn load(candidates: &[PathBuf]) -> Result<Self> {
        if candidates.is_empty() {
            return Err(Error::NativeUnavailable(
                "no libarchive candidates configured".to_string(),
            ));
        }

        let mut failures = Vec::new();
        for candidate in candidates {
            match Self::load_from(candidate) {
                Ok(lib) => return Ok(lib),
                Err(e) => failures.push(format!("{}: {}", candidate.display(), e)),
            }
        }
        Err(Error::NativeUnavailable(failures.join("; ")))
    }

    fn load_from(path: &Path) -> Result<Self> {
        let lib = DynLib::open(path)?;
        let api = LibArchive {
            source: path.to_path_buf(),

            version_number: load_sym!(lib, "archive_version_number"),
            version_string: load_sym!(lib, "archive_version_string"),
            error_string: load_sym!(lib, "archive_error_string"),
            errno: load_sym!(lib, "archive_errno"),

            read_new: load_sym!(lib, "archive_read_new"),
            read_support_filter_all: load_sym!(lib, "archive_read_support_filter_all"),
            read_support_format_all: load_sym!(lib, "archive_read_support_format_all"),
            read_open_filename: load_sym!(lib, "archive_read_open_filename"),
            read_next_header: load_sym!(lib, "archive_read_next_header"),
            read_data: load_sym!(lib, "archive_read_data"),
            read_close: load_sym!(lib, "archive_read_close"),
            read_free: load_sym!(lib, "archive_read_free"),

            read_disk_new: load_sym!(lib, "archive_read_disk_new"),
            read_disk_set_standard_lookup: load_sym!(lib, "archive_read_disk_set_standard_lookup"),
            read_disk_set_symlink_physical: load_sym!(lib, "archive_read_disk_set_symlink_physical"),
            read_disk_entry_from_file: load_sym!(lib, "archive_read_disk_entry_from_file"),

            write_new: load_sym!(lib, "archive_write_new"),
            write_set_format_pax_restricted: load_sym!(lib, "archive_write_set_format_pax_restricted"),
            write_add_filter_gzip: load_sym!(lib, "archive_write_add_filter_gzip"),
            write_add_filter_none: load_sym!(lib, "archive_write_add_filter_none"),
            write_open_filename: load_sym!(lib, "archive_write_open_filename"),
            write_header: load_sym!(lib, "archive_write_header"),
            write_data: load_sym!(lib, "archive_write_data"),
            write_finish_entry: load_sym!(lib, "archive_write_finish_entry"),
            write_close: load_sym!(lib, "archive_write_close"),
            write_free: load_sym!(lib, "archive_write_free"),

            write_disk_new: load_sym!(lib, "archive_write_disk_new"),
            write_disk_set_options: load_sym!(lib, "archive_write_disk_set_options"),
            write_disk_set_standard_lookup: load_sym!(lib, "archive_write_disk_set_standard_lookup"),

            entry_new: load_sym!(lib, "archive_entry_new"),
            entry_free: load_sym!(lib, "archive_entry_free"),
            entry_pathname: load_sym!(lib, "archive_entry_pathname"),
            entry_copy_pathname: load_sym!(lib, "archive_entry_copy_pathname"),
            entry_copy_sourcepath: load_sym!(lib, "archive_entry_copy_sourcepath"),
            entry_hardlink: load_sym!(lib, "archive_entry_hardlink"),
            entry_copy_hardlink: load_sym!(lib, "archive_entry_copy_hardlink"),
            entry_filetype: load_sym!(lib, "archive_entry_filetype"),
            entry_size: load_sym!(lib, "archive_entry_size"),
            entry_set_perm: load_sym!(lib, "archive_entry_set_perm"),

            _lib: lib,
        };

        let version = unsafe { (api.version_number)() };
        if version < MIN_VERSION {
            return Err(Error::NativeUnavailable(format!(
                "libarchive {} is older than 3.6",
                version
            )));
        }
        Ok(api)
    }

    /// Version string reported by the loaded library
    pub(crate) fn version(&self) -> String {
        unsafe {
            let ptr = (self.version_string)();
            if ptr.is_null() {
                return String::new();
            }
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    /// Build an error from the state of `archive`
    ///
    /// # Safety
    /// `archive` must be a live handle created by this library.
    pub(crate) unsafe fn error(&self, archive: *mut archive) -> Error {
        // SAFETY: guaranteed by the caller
        unsafe {
            let code = (self.errno)(archive);
            let msg_ptr = (self.error_string)(archive);
            let message = if msg_ptr.is_null() {
                format!("Unknown error (code: {})", code)
            } else {
                CStr::from_ptr(msg_ptr).to_string_lossy().into_owned()
            };

            if is_format_errno(code) {
                Error::Format { message }
            } else {
                Error::Archive { code, message }
            }
        }
    }

    /// Check a return code from libarchive and convert to Result
    ///
    /// # Safety
    /// `archive` must be a live handle created by this library.
    pub(crate) unsafe fn check(&self, ret: c_int, archive: *mut archive) -> Result<c_int> {
        if ret < ARCHIVE_OK {
            // SAFETY: guaranteed by the caller
            Err(unsafe { self.error(archive) })
        } else {
            Ok(ret)
        }
    }

    /// Like [`check`](Self::check), but lets `ARCHIVE_WARN` through so the
    /// caller can log it
    ///
    /// # Safety
    /// `archive` must be a live handle created by this library.
    pub(crate) unsafe fn check_warn(&self, ret: c_int, archive: *mut archive) -> Result<c_int> {
        if ret == ARCHIVE_WARN {
            Ok(ret)
        } else {
            // SAFETY: guaranteed by the caller
            unsafe { self.check(ret, archive) }
        }
    }

    /// Last error message on `archive`, for logging warnings
    ///
    /// # Safety
    /// `archive` must be a live handle created by this library.
    pub(crate) unsafe fn warning(&self, archive: *mut archive) -> String {
        // SAFETY: guaranteed by the caller
        unsafe { self.error(archive) }.to_string()
    }
}

#[cfg(unix)]
fn is_format_errno(code: c_int) -> bool {
    code == libc::EILSEQ
}

#[cfg(not(unix))]
fn is_format_errno(code: c_int) -> bool {
    code == 42
}

/// Convert a path for libarchive's narrow-string API
pub(crate) fn c_path(path: &Path) -> Result<CString> {
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::InvalidArgument("Path contains invalid UTF-8".to_string()))?;
    CString::new(path_str)
        .map_err(|_| Error::InvalidArgument("Path contains null byte".to_string()))
}

/// Handle to a `dlopen`ed shared library
struct DynLib {
    handle: *mut c_void,
}

impl DynLib {
    #[cfg(unix)]
    fn open(path: &Path) -> Result<Self> {
        let name = c_path(path)?;
        // SAFETY: name is a valid C string; RTLD_LOCAL keeps the symbols
        // private to this handle.
        let handle = unsafe { libc::dlopen(name.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(Error::NativeUnavailable(last_dl_error()));
        }
        Ok(DynLib { handle })
    }

    #[cfg(not(unix))]
    fn open(path: &Path) -> Result<Self> {
        Err(Error::NativeUnavailable(format!(
            "cannot load {} on this platform",
            path.display()
        )))
    }

    /// Resolve a NUL-terminated symbol name
    #[cfg(unix)]
    fn sym(&self, name: &str) -> Result<*mut c_void> {
        let cname = CStr::from_bytes_with_nul(name.as_bytes())
            .map_err(|_| Error::InvalidArgument(format!("bad symbol name {:?}", name)))?;
        // SAFETY: handle came from dlopen and is still open
        let ptr = unsafe {
            libc::dlerror();
            libc::dlsym(self.handle, cname.as_ptr())
        };
        if ptr.is_null() {
            return Err(Error::NativeUnavailable(format!(
                "missing symbol {}: {}",
                cname.to_string_lossy(),
                last_dl_error()
            )));
        }
        Ok(ptr)
    }

    #[cfg(not(unix))]
    fn sym(&self, name: &str) -> Result<*mut c_void> {
        Err(Error::NativeUnavailable(format!("missing symbol {}", name)))
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    // SAFETY: dlerror returns a thread-local string or null
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown dlopen error".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

impl Drop for DynLib {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            if !self.handle.is_null() {
                libc::dlclose(self.handle);
            }
        }
    }
}

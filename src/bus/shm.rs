//! POSIX shared memory segment management.
//!
//! Grounded in the retrieval pack's `other_examples/60f5d29e_..._vortex-core-src-shm.rs`
//! and `other_examples/50221bec_..._shmempipe-src-lib.rs`, both of which map a
//! `#[repr(C)]` header via `nix::sys::mman::{shm_open, mmap}` plus
//! `nix::unistd::ftruncate`. This module follows the same shape, scoped
//! down to the single fixed-size control block the bus needs.

use std::ffi::CString;
use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use crate::error::{Result, SimError};

/// A mapped POSIX shared memory object. Unmaps on drop; the underlying
/// kernel object is only unlinked explicitly via [`ShmSegment::unlink`],
/// which the bus calls once the last attacher detaches.
pub struct ShmSegment {
  name: String,
  #[allow(dead_code)] // kept alive so the mapping remains valid; never read directly
  fd: OwnedFd,
  ptr: NonNull<core::ffi::c_void>,
  len: usize,
}

// The mapping points at memory the OS guarantees is valid for any process
// that holds it; synchronization across processes is the bus's named
// mutex, not Rust's Send/Sync, which can't see across address spaces
// anyway.
unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

impl ShmSegment {
  /// Create a new shared memory object of `len` bytes, sized for `T`.
  /// Fails with [`SimError::ResourceUnavailable`] if the object already
  /// exists, or creation/mapping fails for any other reason.
  pub fn create(name: &str, len: usize) -> Result<Self> {
    let cname = shm_name(name)?;
    let fd = shm_open(
      &cname,
      OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
      Mode::S_IRUSR | Mode::S_IWUSR,
    )
    .map_err(|e| SimError::ResourceUnavailable(format!("shm_open({name}) failed: {e}")))?;

    ftruncate(&fd, len as nix::libc::off_t)
      .map_err(|e| SimError::ResourceUnavailable(format!("ftruncate({name}) failed: {e}")))?;

    let ptr = map(&fd, len)?;
    Ok(Self {
      name: name.to_string(),
      fd,
      ptr,
      len,
    })
  }

  /// Map an existing shared memory object created by another process.
  pub fn open(name: &str, len: usize) -> Result<Self> {
    let cname = shm_name(name)?;
    let fd = shm_open(&cname, OFlag::O_RDWR, Mode::empty())
      .map_err(|e| SimError::ResourceUnavailable(format!("shm_open({name}) failed: {e}")))?;

    let ptr = map(&fd, len)?;
    Ok(Self {
      name: name.to_string(),
      fd,
      ptr,
      len,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// # Safety
  /// The caller must only use the returned pointer for the `T` the
  /// segment was sized for, and must serialize access with the bus's
  /// named mutex before mutating through it.
  pub unsafe fn as_ptr<T>(&self) -> *mut T {
    self.ptr.as_ptr() as *mut T
  }

  /// Remove the underlying kernel object. Existing mappings (including
  /// this one) remain valid until unmapped; only the name is freed.
  pub fn unlink(&self) {
    if let Ok(cname) = CString::new(self.name.as_str()) {
      let _ = shm_unlink(cname.as_c_str());
    }
  }
}

impl Drop for ShmSegment {
  fn drop(&mut self) {
    unsafe {
      let _ = munmap(self.ptr, self.len);
    }
  }
}

fn map(fd: &OwnedFd, len: usize) -> Result<NonNull<core::ffi::c_void>> {
  let len = NonZeroUsize::new(len).ok_or_else(|| {
    SimError::ResourceUnavailable("shared memory segment length must be nonzero".into())
  })?;
  unsafe {
    mmap(
      None,
      len,
      ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
      MapFlags::MAP_SHARED,
      fd,
      0,
    )
    .map_err(|e| SimError::ResourceUnavailable(format!("mmap failed: {e}")))
  }
}

fn shm_name(name: &str) -> Result<CString> {
  CString::new(name)
    .map_err(|_| SimError::InvalidInput(format!("shared memory name {name:?} contains a NUL")))
}

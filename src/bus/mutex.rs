//! A system-wide named mutex, implemented as a POSIX named semaphore
//! initialised to 1 and used as a binary mutex. This is a direct
//! translation of the original's `sem_open("/airplane_sim_bus", ...)` —
//! the original stashes the resulting `sem_t*` inside the shared segment
//! itself and has every attacher dereference that pointer directly,
//! which only happens to work because POSIX named semaphores are
//! frequently mapped at the same address across processes on the same
//! system; it is not guaranteed. We instead have every process open the
//! semaphore by name independently, which gets the same mutual-exclusion
//! semantics without relying on that coincidence.

use std::ffi::CString;

use crate::error::{Result, SimError};

pub struct NamedMutex {
  handle: *mut libc::sem_t,
  name: CString,
}

// The semaphore is a kernel object; the raw pointer here is process-local
// but `sem_wait`/`sem_post` are safe to call from any thread.
unsafe impl Send for NamedMutex {}
unsafe impl Sync for NamedMutex {}

impl NamedMutex {
  /// Open the named semaphore, creating it (initialised to 1) if it does
  /// not already exist. Idempotent: a second caller opening the same
  /// name just gets a handle to the existing semaphore, ignoring the
  /// creation mode/initial-value arguments.
  pub fn create_or_open(name: &str) -> Result<Self> {
    let cname = CString::new(name)
      .map_err(|_| SimError::InvalidInput(format!("mutex name {name:?} contains a NUL")))?;

    let handle = unsafe {
      libc::sem_open(
        cname.as_ptr(),
        libc::O_CREAT,
        0o644 as libc::mode_t,
        1u32,
      )
    };

    if handle == libc::SEM_FAILED {
      return Err(SimError::ResourceUnavailable(format!(
        "sem_open({name}) failed: {}",
        std::io::Error::last_os_error()
      )));
    }

    Ok(Self {
      handle,
      name: cname,
    })
  }

  /// Acquire the mutex, blocking until it is available. Released when
  /// the returned guard is dropped.
  pub fn lock(&self) -> NamedMutexGuard<'_> {
    unsafe {
      // sem_wait only fails on EINTR (retry) or a bad handle (can't
      // happen: `handle` is only ever a successfully sem_open'd value).
      while libc::sem_wait(self.handle) != 0 {
        if std::io::Error::last_os_error().kind() != std::io::ErrorKind::Interrupted {
          break;
        }
      }
    }
    NamedMutexGuard { mutex: self }
  }

  /// Close this process's handle without removing the kernel object.
  pub fn close(&self) {
    unsafe {
      libc::sem_close(self.handle);
    }
  }

  /// Remove the named semaphore from the system. Call only once, from
  /// the last detacher.
  pub fn unlink(&self) {
    unsafe {
      libc::sem_unlink(self.name.as_ptr());
    }
  }
}

pub struct NamedMutexGuard<'a> {
  mutex: &'a NamedMutex,
}

impl Drop for NamedMutexGuard<'_> {
  fn drop(&mut self) {
    unsafe {
      libc::sem_post(self.mutex.handle);
    }
  }
}

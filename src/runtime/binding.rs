//! Scoped thread binding
//!
//! The engine invokes the bridges synchronously on its own internal threads,
//! which may never have touched the managed runtime. [`ScopedThreadBinding`]
//! guarantees the calling thread is attached for exactly the duration of one
//! callback invocation: threads that were already attached are left untouched,
//! threads attached here are detached on drop, on every exit path.

use super::{Runtime, RuntimeResult};

/// RAII guard over one callback invocation's thread attachment.
///
/// Registration state must never leak across threads the engine reuses for
/// unrelated work, so detachment runs in `Drop` rather than on an explicit
/// success path.
pub struct ScopedThreadBinding<'vm, R: Runtime> {
    vm: &'vm R,
    env: R::Env,
    attached_here: bool,
}

impl<'vm, R: Runtime> ScopedThreadBinding<'vm, R> {
    /// Ensure the current thread is attached, remembering whether this call
    /// performed the attachment.
    pub fn attach(vm: &'vm R) -> RuntimeResult<Self> {
        match vm.current_thread_env() {
            Some(env) => Ok(Self {
                vm,
                env,
                attached_here: false,
            }),
            None => {
                let env = vm.attach_current_thread()?;
                Ok(Self {
                    vm,
                    env,
                    attached_here: true,
                })
            }
        }
    }

    #[inline]
    pub fn env(&self) -> &R::Env {
        &self.env
    }

    /// Whether this guard attached the thread (as opposed to finding it
    /// already attached).
    #[inline]
    pub fn attached_here(&self) -> bool {
        self.attached_here
    }
}

impl<R: Runtime> Drop for ScopedThreadBinding<'_, R> {
    fn drop(&mut self) {
        if self.attached_here {
            self.vm.detach_current_thread();
        }
    }
}

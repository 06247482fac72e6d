//! Managed-runtime boundary primitives
//!
//! The application-side frame consumer lives in a separate managed runtime
//! with its own object model, garbage collector, and thread-registration
//! requirements. This module defines the narrow interface the bridges consume:
//! attach-thread, resolve-method-handle, invoke-method, and
//! release-global-handle, plus the opaque handle types that cross it.

pub mod binding;

pub use binding::ScopedThreadBinding;

use std::fmt;

/// Opaque reference to a managed object: a consumer instance, a constructed
/// frame object, a byte container, or a float container. `0` is reserved as
/// the invalid sentinel and is never issued by a conforming runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub const INVALID: ObjectId = ObjectId(0);

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// Resolved identifier for a method on a managed object. Resolved once at
/// bridge construction and cached; never re-resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle(pub u64);

impl MethodHandle {
    pub const INVALID: MethodHandle = MethodHandle(0);

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// Resolved identifier for a managed class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassHandle(pub u64);

impl ClassHandle {
    pub const INVALID: ClassHandle = ClassHandle(0);

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// Typed argument for a managed-method invocation.
///
/// `Object(None)` crosses the boundary as the managed null reference; plane
/// buffers that were never marshaled are passed this way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Bool(bool),
    Object(Option<ObjectId>),
}

/// Errors surfaced by the managed runtime at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to attach the current thread to the managed runtime")]
    AttachFailed,

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid handle passed to the managed runtime")]
    InvalidHandle,

    #[error("managed reference is not a {0}")]
    WrongKind(&'static str),

    #[error("managed invocation failed: {0}")]
    Invocation(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Per-thread view of the managed runtime, valid only while the current
/// thread is attached. Obtained through [`ScopedThreadBinding`].
///
/// Byte and float containers are the transferable buffers used to carry frame
/// payloads across the boundary; both are addressed as [`ObjectId`]s and the
/// runtime tracks their kind.
pub trait RuntimeEnv {
    fn find_class(&self, name: &str) -> RuntimeResult<ClassHandle>;

    /// Class of a live object.
    fn object_class(&self, obj: ObjectId) -> RuntimeResult<ClassHandle>;

    /// Resolve a named method on a class.
    fn resolve_method(&self, class: ClassHandle, name: &str) -> RuntimeResult<MethodHandle>;

    /// Resolve the constructor of `class`.
    fn resolve_constructor(&self, class: ClassHandle) -> RuntimeResult<MethodHandle>;

    /// Construct a managed object. The returned reference is local to the
    /// current invocation unless promoted with [`RuntimeEnv::new_global_ref`].
    fn new_object(
        &self,
        class: ClassHandle,
        ctor: MethodHandle,
        args: &[Value],
    ) -> RuntimeResult<ObjectId>;

    /// Allocate a zero-filled byte container of exactly `len` bytes.
    fn new_byte_container(&self, len: usize) -> RuntimeResult<ObjectId>;

    /// Declared length of a byte container in bytes.
    fn container_len(&self, container: ObjectId) -> RuntimeResult<usize>;

    /// Copy `data` into the container starting at offset 0.
    fn write_bytes(&self, container: ObjectId, data: &[u8]) -> RuntimeResult<()>;

    /// Copy the first `out.len()` bytes of the container into `out`.
    fn read_bytes(&self, container: ObjectId, out: &mut [u8]) -> RuntimeResult<()>;

    /// Allocate a float container holding a copy of `data`.
    fn new_float_container(&self, data: &[f32]) -> RuntimeResult<ObjectId>;

    /// Copy the first `out.len()` floats of the container into `out`.
    fn read_floats(&self, container: ObjectId, out: &mut [f32]) -> RuntimeResult<()>;

    fn invoke_bool(
        &self,
        target: ObjectId,
        method: MethodHandle,
        args: &[Value],
    ) -> RuntimeResult<bool>;

    fn invoke_int(
        &self,
        target: ObjectId,
        method: MethodHandle,
        args: &[Value],
    ) -> RuntimeResult<i32>;

    fn invoke_object(
        &self,
        target: ObjectId,
        method: MethodHandle,
        args: &[Value],
    ) -> RuntimeResult<ObjectId>;

    /// Promote a local reference to a global one that survives past the
    /// current invocation. Must be paired with
    /// [`RuntimeEnv::delete_global_ref`].
    fn new_global_ref(&self, obj: ObjectId) -> RuntimeResult<ObjectId>;

    fn delete_global_ref(&self, obj: ObjectId);

    /// Release a local reference early. Runtimes reclaim unreleased locals
    /// when the invocation returns; releasing eagerly keeps the local table
    /// small on frame-rate call paths.
    fn delete_local_ref(&self, obj: ObjectId);
}

/// The managed runtime itself (the VM), shared across threads.
pub trait Runtime: Send + Sync {
    type Env: RuntimeEnv;

    /// Environment for the current thread, if it is already attached.
    fn current_thread_env(&self) -> Option<Self::Env>;

    /// Attach the calling thread and return its environment.
    fn attach_current_thread(&self) -> RuntimeResult<Self::Env>;

    /// Detach the calling thread. Only valid for threads this process
    /// attached; the bridges only call it through [`ScopedThreadBinding`].
    fn detach_current_thread(&self);
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

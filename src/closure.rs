//! Closures: a function pointer plus an opaque, pointer-sized captured
//! context, invokable with a single parameter.
//!
//! Grounded on the function-pointer-plus-`*mut ()`-context convention the
//! teacher uses for its own late-bound callbacks — `klog`'s swappable
//! backend (`AtomicPtr<()>` transmuted back to a `KlogBackend` fn pointer)
//! and `preempt`'s `RESCHEDULE_CALLBACK`. Because events are stored
//! homogeneously in one pool (§3), a closure's captured context can't be a
//! generic type parameter without infecting every type that touches an
//! `Event`; type erasure through a raw pointer is the same trade the
//! teacher already made twice.

use crate::event::EventHandle;

/// The function signature a closure invokes.
///
/// Receives the opaque context pointer established at construction and the
/// handle of the event the closure is embedded in (per the run loop's
/// "invoke with params = event" contract), and returns a status code —
/// mirroring the `-> i32` convention used pervasively for fallible
/// operations in the teacher codebase.
pub type ClosureFn = fn(*mut (), EventHandle) -> i32;

/// Invoked when a closure is destroyed, to release resources held by its
/// context (if any).
pub type DestructorFn = fn(*mut ());

/// A value binding: function reference, captured context, and the last
/// invocation's parameter/return value.
///
/// Closures are plain data — `Copy` — so they can be embedded directly in
/// an [`crate::event::Event`] slot and passed by value without heap
/// allocation, exactly as the spec requires.
#[derive(Clone, Copy)]
pub struct Closure {
    func: ClosureFn,
    ctx: *mut (),
    destructor: Option<DestructorFn>,
    params: Option<EventHandle>,
    rv: Option<i32>,
}

// SAFETY: `ctx` is an opaque capture the caller is responsible for
// synchronizing; the core never dereferences it itself, only hands it back
// to `func`/`destructor`. The run-to-completion model (§5) means a given
// closure is never invoked from two contexts simultaneously.
unsafe impl Send for Closure {}

impl Closure {
    /// Build a closure with no destructor.
    #[inline]
    pub const fn new(func: ClosureFn, ctx: *mut ()) -> Self {
        Self {
            func,
            ctx,
            destructor: None,
            params: None,
            rv: None,
        }
    }

    /// Build a closure that invokes `destructor` on destroy.
    #[inline]
    pub const fn with_destructor(func: ClosureFn, ctx: *mut (), destructor: DestructorFn) -> Self {
        Self {
            func,
            ctx,
            destructor: Some(destructor),
            params: None,
            rv: None,
        }
    }

    /// The opaque context pointer this closure was constructed with.
    #[inline]
    pub const fn ctx(&self) -> *mut () {
        self.ctx
    }

    /// The parameter passed to the most recent `invoke`, if any.
    #[inline]
    pub const fn last_params(&self) -> Option<EventHandle> {
        self.params
    }

    /// The return value of the most recent `invoke`, if any.
    #[inline]
    pub const fn last_rv(&self) -> Option<i32> {
        self.rv
    }

    /// Store `params`, call the function, and record and return its
    /// result.
    #[inline]
    pub fn invoke(&mut self, params: EventHandle) -> i32 {
        self.params = Some(params);
        let rv = (self.func)(self.ctx, params);
        self.rv = Some(rv);
        rv
    }

    /// Run the destructor, if one was registered.
    #[inline]
    pub fn destroy(&mut self) {
        if let Some(destructor) = self.destructor {
            destructor(self.ctx);
        }
    }
}

//! Timer host abstraction
//!
//! A host environment exposes four timer primitives. [`TimerHost`] is the
//! capability a concrete host implements. [`HostObject`] exposes those
//! primitives as four reassignable members, the slots a monitor takes over
//! while attached and hands back on detach.

use crate::error::HostError;
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;
use std::time::Duration;

/// Timer callback; receives the trailing arguments given at scheduling time
pub type Callback<A> = Box<dyn FnMut(A)>;

/// A scheduling primitive (`setInterval` / `setTimeout`)
pub type ScheduleFn<K, A> = Rc<dyn Fn(Schedule<A>) -> K>;

/// A cancelling primitive (`clearInterval` / `clearTimeout`)
pub type ClearFn<K> = Rc<dyn Fn(K)>;

/// Arguments of one scheduling call, as handed to a scheduling primitive
pub struct Schedule<A> {
    pub callback: Callback<A>,
    pub delay: Duration,
    pub args: A,
    /// Position of the external call that entered the host object
    pub caller: &'static Location<'static>,
}

impl<A: fmt::Debug> fmt::Debug for Schedule<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("delay", &self.delay)
            .field("args", &self.args)
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

/// The four members of a timer host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
    SetInterval,
    ClearInterval,
    SetTimeout,
    ClearTimeout,
}

impl Member {
    /// Validation order used by `attach`
    pub const ALL: [Member; 4] = [
        Member::SetInterval,
        Member::ClearInterval,
        Member::SetTimeout,
        Member::ClearTimeout,
    ];

    /// Host-side member name
    pub fn name(self) -> &'static str {
        match self {
            Member::SetInterval => "setInterval",
            Member::ClearInterval => "clearInterval",
            Member::SetTimeout => "setTimeout",
            Member::ClearTimeout => "clearTimeout",
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Timer primitives of a host environment
///
/// Handles are opaque to everything but the host: they are compared for
/// equality and never inspected.
pub trait TimerHost {
    type Handle: Clone + Eq + fmt::Debug;
    type Args;

    fn set_interval(
        &self,
        callback: Callback<Self::Args>,
        delay: Duration,
        args: Self::Args,
    ) -> Self::Handle;

    fn clear_interval(&self, handle: Self::Handle);

    fn set_timeout(
        &self,
        callback: Callback<Self::Args>,
        delay: Duration,
        args: Self::Args,
    ) -> Self::Handle;

    fn clear_timeout(&self, handle: Self::Handle);
}

struct Members<K, A> {
    set_interval: Option<ScheduleFn<K, A>>,
    clear_interval: Option<ClearFn<K>>,
    set_timeout: Option<ScheduleFn<K, A>>,
    clear_timeout: Option<ClearFn<K>>,
}

impl<K, A> Default for Members<K, A> {
    fn default() -> Self {
        Self {
            set_interval: None,
            clear_interval: None,
            set_timeout: None,
            clear_timeout: None,
        }
    }
}

/// Object exposing the timer primitives through reassignable members
///
/// Members are looked up on every call, so replacing one takes effect for
/// all code calling through the object. No borrow is held while a member
/// runs; members may call back into the object.
pub struct HostObject<K, A> {
    members: RefCell<Members<K, A>>,
}

impl<K: 'static, A: 'static> HostObject<K, A> {
    /// Expose a [`TimerHost`] through the four members
    pub fn bind<H>(host: Rc<H>) -> Self
    where
        H: TimerHost<Handle = K, Args = A> + 'static,
    {
        let set_interval = Rc::clone(&host);
        let clear_interval = Rc::clone(&host);
        let set_timeout = Rc::clone(&host);
        let clear_timeout = host;

        Self::builder()
            .set_interval(move |call: Schedule<A>| {
                set_interval.set_interval(call.callback, call.delay, call.args)
            })
            .clear_interval(move |handle| clear_interval.clear_interval(handle))
            .set_timeout(move |call: Schedule<A>| {
                set_timeout.set_timeout(call.callback, call.delay, call.args)
            })
            .clear_timeout(move |handle| clear_timeout.clear_timeout(handle))
            .build()
    }
}

impl<K, A> HostObject<K, A> {
    /// Assemble an object member by member; unset members stay empty
    pub fn builder() -> HostObjectBuilder<K, A> {
        HostObjectBuilder {
            members: Members::default(),
        }
    }

    pub fn has_member(&self, member: Member) -> bool {
        let members = self.members.borrow();
        match member {
            Member::SetInterval => members.set_interval.is_some(),
            Member::ClearInterval => members.clear_interval.is_some(),
            Member::SetTimeout => members.set_timeout.is_some(),
            Member::ClearTimeout => members.clear_timeout.is_some(),
        }
    }

    /// First member, in [`Member::ALL`] order, that is not set
    pub fn missing_member(&self) -> Option<Member> {
        Member::ALL.into_iter().find(|member| !self.has_member(*member))
    }

    pub fn set_interval_fn(&self) -> Option<ScheduleFn<K, A>> {
        self.members.borrow().set_interval.clone()
    }

    pub fn clear_interval_fn(&self) -> Option<ClearFn<K>> {
        self.members.borrow().clear_interval.clone()
    }

    pub fn set_timeout_fn(&self) -> Option<ScheduleFn<K, A>> {
        self.members.borrow().set_timeout.clone()
    }

    pub fn clear_timeout_fn(&self) -> Option<ClearFn<K>> {
        self.members.borrow().clear_timeout.clone()
    }

    /// Reassign `setInterval`, returning the previous member
    pub fn replace_set_interval(&self, f: Option<ScheduleFn<K, A>>) -> Option<ScheduleFn<K, A>> {
        std::mem::replace(&mut self.members.borrow_mut().set_interval, f)
    }

    /// Reassign `clearInterval`, returning the previous member
    pub fn replace_clear_interval(&self, f: Option<ClearFn<K>>) -> Option<ClearFn<K>> {
        std::mem::replace(&mut self.members.borrow_mut().clear_interval, f)
    }

    /// Reassign `setTimeout`, returning the previous member
    pub fn replace_set_timeout(&self, f: Option<ScheduleFn<K, A>>) -> Option<ScheduleFn<K, A>> {
        std::mem::replace(&mut self.members.borrow_mut().set_timeout, f)
    }

    /// Reassign `clearTimeout`, returning the previous member
    pub fn replace_clear_timeout(&self, f: Option<ClearFn<K>>) -> Option<ClearFn<K>> {
        std::mem::replace(&mut self.members.borrow_mut().clear_timeout, f)
    }

    /// Schedule `callback` to run every `delay`
    #[track_caller]
    pub fn set_interval(
        &self,
        callback: impl FnMut(A) + 'static,
        delay: Duration,
        args: A,
    ) -> Result<K, HostError> {
        let caller = Location::caller();
        let f = self
            .set_interval_fn()
            .ok_or(HostError::MissingMember(Member::SetInterval))?;
        Ok(f(Schedule {
            callback: Box::new(callback),
            delay,
            args,
            caller,
        }))
    }

    pub fn clear_interval(&self, handle: K) -> Result<(), HostError> {
        let f = self
            .clear_interval_fn()
            .ok_or(HostError::MissingMember(Member::ClearInterval))?;
        f(handle);
        Ok(())
    }

    /// Schedule `callback` to run once after `delay`
    #[track_caller]
    pub fn set_timeout(
        &self,
        callback: impl FnMut(A) + 'static,
        delay: Duration,
        args: A,
    ) -> Result<K, HostError> {
        let caller = Location::caller();
        let f = self
            .set_timeout_fn()
            .ok_or(HostError::MissingMember(Member::SetTimeout))?;
        Ok(f(Schedule {
            callback: Box::new(callback),
            delay,
            args,
            caller,
        }))
    }

    pub fn clear_timeout(&self, handle: K) -> Result<(), HostError> {
        let f = self
            .clear_timeout_fn()
            .ok_or(HostError::MissingMember(Member::ClearTimeout))?;
        f(handle);
        Ok(())
    }
}

impl<K, A> fmt::Debug for HostObject<K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = Member::ALL
            .into_iter()
            .filter(|member| self.has_member(*member))
            .map(Member::name)
            .collect();
        f.debug_struct("HostObject").field("members", &set).finish()
    }
}

/// Builder for a [`HostObject`] with hand-written members
pub struct HostObjectBuilder<K, A> {
    members: Members<K, A>,
}

impl<K, A> HostObjectBuilder<K, A> {
    pub fn set_interval(mut self, f: impl Fn(Schedule<A>) -> K + 'static) -> Self {
        self.members.set_interval = Some(Rc::new(f));
        self
    }

    pub fn clear_interval(mut self, f: impl Fn(K) + 'static) -> Self {
        self.members.clear_interval = Some(Rc::new(f));
        self
    }

    pub fn set_timeout(mut self, f: impl Fn(Schedule<A>) -> K + 'static) -> Self {
        self.members.set_timeout = Some(Rc::new(f));
        self
    }

    pub fn clear_timeout(mut self, f: impl Fn(K) + 'static) -> Self {
        self.members.clear_timeout = Some(Rc::new(f));
        self
    }

    pub fn build(self) -> HostObject<K, A> {
        HostObject {
            members: RefCell::new(self.members),
        }
    }
}

//! Render target container.
//!
//! A container is the host element a backend draws into. At most one
//! backend owns it at a time; ownership is held through a [`ContainerLease`]
//! and released when the lease drops. Size changes are published on a watch
//! channel so each backend can observe resizes, and the number of live
//! observers is visible for teardown checks.

use crate::contract::BackendKind;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("container `{id}` is already owned by the {owner} renderer")]
pub struct ContainerBusy {
    pub id: String,
    pub owner: BackendKind,
}

#[derive(Debug)]
struct ContainerState {
    id: String,
    owner: Option<BackendKind>,
    attached: usize,
}

/// Shared handle to a host element. Cloning shares the same element.
#[derive(Clone)]
pub struct Container {
    state: Rc<RefCell<ContainerState>>,
    size: Rc<watch::Sender<Size>>,
}

impl Container {
    pub fn new(id: &str, width: u32, height: u32) -> Self {
        let (size, _) = watch::channel(Size::new(width, height));
        Self {
            state: Rc::new(RefCell::new(ContainerState {
                id: id.to_string(),
                owner: None,
                attached: 0,
            })),
            size: Rc::new(size),
        }
    }

    pub fn id(&self) -> String {
        self.state.borrow().id.clone()
    }

    pub fn size(&self) -> Size {
        *self.size.borrow()
    }

    /// Change the element size and notify observers.
    pub fn resize(&self, width: u32, height: u32) {
        let next = Size::new(width, height);
        if self.size.send_replace(next) != next {
            log::debug!("container {} resized to {next}", self.state.borrow().id);
        }
    }

    pub fn owner(&self) -> Option<BackendKind> {
        self.state.borrow().owner
    }

    /// Drawables currently attached by the owning backend.
    pub fn attached_count(&self) -> usize {
        self.state.borrow().attached
    }

    /// Live resize observers.
    pub fn observer_count(&self) -> usize {
        self.size.receiver_count()
    }

    /// Take exclusive ownership for `kind`.
    pub fn claim(&self, kind: BackendKind) -> Result<ContainerLease, ContainerBusy> {
        let mut state = self.state.borrow_mut();
        if let Some(owner) = state.owner {
            return Err(ContainerBusy {
                id: state.id.clone(),
                owner,
            });
        }
        state.owner = Some(kind);
        state.attached = 0;
        Ok(ContainerLease {
            container: self.clone(),
            kind,
        })
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Container")
            .field("id", &state.id)
            .field("size", &*self.size.borrow())
            .field("owner", &state.owner)
            .field("attached", &state.attached)
            .finish()
    }
}

/// Exclusive ownership of a container by one backend.
#[derive(Debug)]
pub struct ContainerLease {
    container: Container,
    kind: BackendKind,
}

impl ContainerLease {
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn size(&self) -> Size {
        self.container.size()
    }

    pub fn set_attached(&self, count: usize) {
        self.container.state.borrow_mut().attached = count;
    }

    /// Subscribe to size changes. Dropping the receiver disconnects it.
    pub fn observe(&self) -> watch::Receiver<Size> {
        self.container.size.subscribe()
    }
}

impl Drop for ContainerLease {
    fn drop(&mut self) {
        let mut state = self.container.state.borrow_mut();
        state.owner = None;
        state.attached = 0;
    }
}

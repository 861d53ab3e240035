use std::any::Any;
use std::fmt;

use interest_common::{EntityId, OwnerId};

/// Which protocol callback a handler serves.
///
/// The first three discriminants equal the wire kinds of the segments they
/// produce (CREATE = 0, UPDATE = 1, REMOVE = 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandlerKind {
    WriteCreate = 0,
    WriteUpdate = 1,
    WriteRemove = 2,
    ReadCreate = 3,
    ReadUpdate = 4,
    ReadRemove = 5,
    ErrorCreate = 6,
    ErrorUpdate = 7,
    ErrorRemove = 8,
}

impl HandlerKind {
    pub const COUNT: usize = 9;

    pub const ALL: [HandlerKind; Self::COUNT] = [
        Self::WriteCreate,
        Self::WriteUpdate,
        Self::WriteRemove,
        Self::ReadCreate,
        Self::ReadUpdate,
        Self::ReadRemove,
        Self::ErrorCreate,
        Self::ErrorUpdate,
        Self::ErrorRemove,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Outcome of registering or removing a handler. Informational, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    /// A handler was installed into an empty slot.
    Registered,
    /// A handler was installed over an existing one.
    Replaced,
    /// The slot held a handler and is now empty.
    Removed,
    /// The slot was already empty.
    Empty,
}

/// What a handler reports back to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Accept the entry. On the write path, the number of payload bytes
    /// written into the event window; read handlers return `Written(0)`.
    Written(usize),
    /// Drop the entry from this pass.
    Reject,
}

impl Response {
    pub const ACCEPT: Response = Response::Written(0);
}

impl From<usize> for Response {
    fn from(len: usize) -> Self {
        Response::Written(len)
    }
}

/// Caller context threaded through `write`/`read` into every handler.
pub type Context<'a> = Option<&'a mut (dyn Any + 'static)>;

enum Window<'a> {
    Write(&'a mut [u8]),
    Read(&'a [u8]),
}

/// Borrow-scoped view handed to a handler for one entry.
pub struct Event<'a> {
    kind: HandlerKind,
    owner: OwnerId,
    entity: EntityId,
    window: Window<'a>,
    context: Context<'a>,
}

impl<'a> Event<'a> {
    /// Event for the write path; `output` is the space left in the packet.
    pub fn for_write(
        kind: HandlerKind,
        owner: OwnerId,
        entity: EntityId,
        output: &'a mut [u8],
        context: Context<'a>,
    ) -> Self {
        Self {
            kind,
            owner,
            entity,
            window: Window::Write(output),
            context,
        }
    }

    /// Event for the read and error paths; `input` is exactly the entry payload.
    pub fn for_read(
        kind: HandlerKind,
        owner: OwnerId,
        entity: EntityId,
        input: &'a [u8],
        context: Context<'a>,
    ) -> Self {
        Self {
            kind,
            owner,
            entity,
            window: Window::Read(input),
            context,
        }
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Bytes available to a writer, or the payload length for a reader.
    pub fn len(&self) -> usize {
        match &self.window {
            Window::Write(output) => output.len(),
            Window::Read(input) => input.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incoming payload. Empty on the write path.
    pub fn input(&self) -> &[u8] {
        match &self.window {
            Window::Read(input) => input,
            Window::Write(_) => &[],
        }
    }

    /// Outgoing payload window. `None` on the read path.
    pub fn output(&mut self) -> Option<&mut [u8]> {
        match &mut self.window {
            Window::Write(output) => Some(output),
            Window::Read(_) => None,
        }
    }

    /// Copy `bytes` into the output window, rejecting when they do not fit.
    pub fn write(&mut self, bytes: &[u8]) -> Response {
        match self.output() {
            Some(output) if bytes.len() <= output.len() => {
                output[..bytes.len()].copy_from_slice(bytes);
                Response::Written(bytes.len())
            }
            _ => Response::Reject,
        }
    }

    pub fn context<T: Any>(&self) -> Option<&T> {
        self.context.as_deref().and_then(|ctx| ctx.downcast_ref())
    }

    pub fn context_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.context.as_deref_mut().and_then(|ctx| ctx.downcast_mut())
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("entity", &self.entity)
            .field("len", &self.len())
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

pub type Handler = Box<dyn FnMut(&mut Event<'_>) -> Response>;

/// One optional handler per [`HandlerKind`].
#[derive(Default)]
pub struct HandlerTable {
    slots: [Option<Handler>; HandlerKind::COUNT],
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: HandlerKind, handler: Handler) -> HandlerStatus {
        match self.slots[kind.index()].replace(handler) {
            Some(_) => HandlerStatus::Replaced,
            None => HandlerStatus::Registered,
        }
    }

    pub fn remove(&mut self, kind: HandlerKind) -> HandlerStatus {
        match self.slots[kind.index()].take() {
            Some(_) => HandlerStatus::Removed,
            None => HandlerStatus::Empty,
        }
    }

    pub fn contains(&self, kind: HandlerKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Run the handler for the event's kind. `None` when the slot is empty.
    pub fn dispatch(&mut self, event: &mut Event<'_>) -> Option<Response> {
        self.slots[event.kind().index()]
            .as_mut()
            .map(|handler| handler(event))
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(HandlerKind::ALL.iter().filter(|kind| self.contains(**kind)))
            .finish()
    }
}

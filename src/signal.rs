use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by [`Signal::connect`], used to disconnect the slot again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

type Slot<T> = Rc<dyn Fn(&T)>;

/// Single-threaded notification list.
///
/// Slots are snapshotted before each emission, so a slot may connect or
/// disconnect other slots (or itself) while being called.
pub struct Signal<T> {
    slots: RefCell<Vec<(SlotId, Slot<T>)>>,
    next: Cell<u64>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            next: Cell::new(0),
        }
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.borrow().len())
            .finish()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, slot: impl Fn(&T) + 'static) -> SlotId {
        let id = SlotId(self.next.get());
        self.next.set(self.next.get() + 1);
        self.slots.borrow_mut().push((id, Rc::new(slot)));
        id
    }

    /// Returns false when the slot was not connected.
    pub fn disconnect(&self, id: SlotId) -> bool {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|(sid, _)| *sid != id);
        slots.len() != before
    }

    pub fn emit(&self, args: &T) {
        let snapshot: Vec<Slot<T>> = self
            .slots
            .borrow()
            .iter()
            .map(|(_, s)| Rc::clone(s))
            .collect();
        for slot in snapshot {
            slot(args);
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }
}

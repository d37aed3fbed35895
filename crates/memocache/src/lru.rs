//! Recency ordering for cache slots.
//!
//! The list is an arena of links addressed by stable [`Handle`]s. Two sentinel links bound the
//! list, so attaching and detaching at either end never has to special-case an empty list.
//! Handles of removed items are recycled for later insertions.

/// A stable reference to an item in an [`LruList`].
///
/// A handle stays valid until its item is [removed](LruList::remove).
pub type Handle = usize;

const HEAD: Handle = 0;
const TAIL: Handle = 1;

#[derive(Debug)]
struct Link<T> {
    prev: Handle,
    next: Handle,
    /// `None` for the two sentinels and for recycled links.
    item: Option<T>,
}

/// A doubly linked list ordered from most recently used (front) to least recently used (back).
#[derive(Debug)]
pub struct LruList<T> {
    links: Vec<Link<T>>,
    free: Vec<Handle>,
    len: usize,
}

impl<T> LruList<T> {
    pub fn new() -> Self {
        let sentinel = || Link {
            prev: HEAD,
            next: TAIL,
            item: None,
        };
        Self {
            links: vec![sentinel(), sentinel()],
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `item` as the most recently used one.
    pub fn push_front(&mut self, item: T) -> Handle {
        let handle = match self.free.pop() {
            Some(handle) => {
                self.links[handle].item = Some(item);
                handle
            }
            None => {
                self.links.push(Link {
                    prev: HEAD,
                    next: TAIL,
                    item: Some(item),
                });
                self.links.len() - 1
            }
        };
        self.attach_front(handle);
        self.len += 1;
        handle
    }

    /// Marks the item behind `handle` as the most recently used one.
    pub fn move_to_front(&mut self, handle: Handle) {
        if !self.contains(handle) || self.links[HEAD].next == handle {
            return;
        }
        self.detach(handle);
        self.attach_front(handle);
    }

    /// Unlinks and returns the item behind `handle`.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let item = self.links.get_mut(handle)?.item.take()?;
        self.detach(handle);
        self.free.push(handle);
        self.len -= 1;
        Some(item)
    }

    /// The handle of the least recently used item.
    pub fn back(&self) -> Option<Handle> {
        let last = self.links[TAIL].prev;
        (last != HEAD).then_some(last)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.links.get(handle)?.item.as_ref()
    }

    /// Iterates from the most recently used to the least recently used item.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.links[HEAD].next,
        }
    }

    fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    fn detach(&mut self, handle: Handle) {
        let (prev, next) = (self.links[handle].prev, self.links[handle].next);
        self.links[prev].next = next;
        self.links[next].prev = prev;
    }

    fn attach_front(&mut self, handle: Handle) {
        let first = self.links[HEAD].next;
        self.links[handle].prev = HEAD;
        self.links[handle].next = first;
        self.links[first].prev = handle;
        self.links[HEAD].next = handle;
    }
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the `(handle, item)` pairs of an [`LruList`].
pub struct Iter<'a, T> {
    list: &'a LruList<T>,
    cursor: Handle,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == TAIL {
            return None;
        }
        let handle = self.cursor;
        let link = &self.list.links[handle];
        self.cursor = link.next;
        link.item.as_ref().map(|item| (handle, item))
    }
}

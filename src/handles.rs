//! Which driver owns each open file.
//!
//! Every file object handed out by the manager gets exactly one record
//! here, naming the driver that made it. Copies and closes are routed
//! through that record, never through path resolution again. The record
//! also holds a strong reference to the driver, so an unmount can't pull a
//! driver out from under a file that is still open.
//!
//! A record that should exist but doesn't, or a slot that should be free
//! but isn't, means the table is corrupt or a caller released a handle
//! twice. Those are bugs, not runtime conditions, and they panic.

use crate::driver::Driver;

use std::{
    fmt,
    sync::Arc,
};

/// Opaque identifier of an open file.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for HandleId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "HandleId({}v{})", self.index, self.generation)
    }
}

struct Record {
    driver: Arc<Driver>,
    path: String,
}

struct Slot {
    generation: u32,
    record: Option<Record>,
}

#[derive(Default)]
pub(crate) struct HandleTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl HandleTable {
    pub fn new() -> HandleTable {
        HandleTable::default()
    }
    pub fn insert(&mut self, driver: Arc<Driver>, path: &str) -> HandleId {
        let index = match self.free.pop() {
            Some(x) => x,
            None => {
                let index = match u32::try_from(self.slots.len()) {
                    Ok(x) if x < u32::MAX => x,
                    _ => panic!("handle table exhausted opening {:?} ({} \
                                 files open)", path, self.live),
                };
                self.slots.push(Slot { generation: 0, record: None });
                index
            },
        };
        let slot = &mut self.slots[index as usize];
        if slot.record.is_some() {
            panic!("duplicate reference ({}): slot {} is already in use",
                   path, index);
        }
        slot.record = Some(Record { driver, path: path.to_owned() });
        self.live += 1;
        HandleId { index, generation: slot.generation }
    }
    fn record(&self, id: HandleId) -> Option<&Record> {
        match self.slots.get(id.index as usize) {
            Some(slot) if slot.generation == id.generation =>
                slot.record.as_ref(),
            _ => None,
        }
    }
    /// The driver that produced the file behind `id`.
    pub fn driver(&self, id: HandleId, path: &str) -> &Arc<Driver> {
        match self.record(id) {
            Some(x) => &x.driver,
            None => panic!("missing reference ({}): {:?}", path, id),
        }
    }
    pub fn remove(&mut self, id: HandleId, path: &str) -> Arc<Driver> {
        if self.record(id).is_none() {
            panic!("missing reference ({}): {:?}", path, id);
        }
        let slot = &mut self.slots[id.index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        match slot.record.take() {
            Some(x) => x.driver,
            None => unreachable!(),
        }
    }
    pub fn len(&self) -> usize { self.live }
    /// Logical paths of every open file.
    pub fn paths(&self) -> impl Iterator<Item=&str> {
        self.slots.iter().filter_map(|x| x.record.as_ref())
            .map(|x| x.path.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::MemoryDriver;
    fn driver() -> Arc<Driver> {
        Arc::new(Driver::Memory(MemoryDriver::new()))
    }
    #[test] fn insert_and_remove() {
        let mut table = HandleTable::new();
        let a = driver();
        let b = driver();
        let first = table.insert(a.clone(), "a");
        let second = table.insert(b.clone(), "b");
        assert_ne!(first, second);
        assert_eq!(table.len(), 2);
        assert!(Arc::ptr_eq(table.driver(second, "b"), &b));
        assert!(Arc::ptr_eq(&table.remove(first, "a"), &a));
        assert_eq!(table.paths().collect::<Vec<_>>(), &["b"]);
        // the slot is reused, but the old id stays dead
        let third = table.insert(a.clone(), "c");
        assert_ne!(first, third);
        assert_eq!(table.len(), 2);
    }
    #[test] fn handles_keep_drivers_alive() {
        let mut table = HandleTable::new();
        let a = driver();
        let id = table.insert(a.clone(), "a");
        drop(a);
        assert_eq!(Arc::strong_count(table.driver(id, "a")), 1);
    }
    #[test] #[should_panic(expected = "missing reference")]
    fn double_remove() {
        let mut table = HandleTable::new();
        let id = table.insert(driver(), "twice");
        table.remove(id, "twice");
        table.remove(id, "twice");
    }
    #[test] #[should_panic(expected = "missing reference")]
    fn stale_lookup() {
        let mut table = HandleTable::new();
        let id = table.insert(driver(), "stale");
        table.remove(id, "stale");
        table.insert(driver(), "reused");
        table.driver(id, "stale");
    }
    #[test] #[should_panic(expected = "duplicate reference")]
    fn corrupt_free_list() {
        let mut table = HandleTable::new();
        let id = table.insert(driver(), "a");
        table.free.push(id.index);
        table.insert(driver(), "b");
    }
}

//! Generation-counted object arena.
//!
//! Every slot remembers the highest generation it ever handed out, so a
//! fresh insert never reissues a handle that may still be held elsewhere.
//! [`Arena::insert_at`] puts an object back under its original handle,
//! which is how undo and redo re-instate objects. A slot vacated with
//! [`Arena::remove_retained`] is not handed to fresh inserts until
//! [`Arena::release_retained`], so the handle it held stays available
//! for re-instatement.

use docgraph_types::ObjectId;

#[derive(Clone, Debug)]
struct Slot<T> {
    value: Option<T>,
    /// Generation of the current occupant (meaningless when vacant).
    generation: u32,
    /// Generation the next fresh insert into this slot will use.
    next_generation: u32,
}

impl<T> Slot<T> {
    fn vacant() -> Self {
        Self {
            value: None,
            generation: 0,
            next_generation: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    /// Vacant slots held back from fresh inserts.
    retained: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            retained: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Insert a value built from its future handle.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(ObjectId) -> T) -> ObjectId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::vacant());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = ObjectId::new(index, slot.next_generation);
        slot.generation = slot.next_generation;
        slot.next_generation += 1;
        slot.value = Some(build(id));
        self.len += 1;
        id
    }

    /// Re-instate a value under an exact handle. Fails (returning the
    /// value) if the slot is occupied.
    pub(crate) fn insert_at(&mut self, id: ObjectId, value: T) -> Result<(), T> {
        let index = id.index() as usize;
        while self.slots.len() <= index {
            self.free.push(self.slots.len() as u32);
            self.slots.push(Slot::vacant());
        }
        let slot = &mut self.slots[index];
        if slot.value.is_some() {
            return Err(value);
        }
        slot.value = Some(value);
        slot.generation = id.generation();
        slot.next_generation = slot.next_generation.max(id.generation() + 1);
        self.free.retain(|&i| i != id.index());
        self.retained.retain(|&i| i != id.index());
        self.len += 1;
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: ObjectId) -> Option<T> {
        let value = self.vacate(id)?;
        self.free.push(id.index());
        Some(value)
    }

    /// Remove without making the slot available to fresh inserts.
    pub(crate) fn remove_retained(&mut self, id: ObjectId) -> Option<T> {
        let value = self.vacate(id)?;
        self.retained.push(id.index());
        Some(value)
    }

    /// Return every retained vacant slot to the free list.
    pub(crate) fn release_retained(&mut self) {
        self.free.append(&mut self.retained);
    }

    fn vacate(&mut self, id: ObjectId) -> Option<T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.value.is_none() || slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take();
        self.len -= 1;
        value
    }

    pub(crate) fn get(&self, id: ObjectId) -> Option<&T> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Live entries in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ObjectId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (ObjectId::new(i as u32, slot.generation), v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut arena = Arena::default();
        let a = arena.insert_with(|_| "a");
        let b = arena.insert_with(|_| "b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn builder_sees_its_own_handle() {
        let mut arena = Arena::default();
        let id = arena.insert_with(|id| id);
        assert_eq!(arena.get(id), Some(&id));
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut arena = Arena::default();
        let a = arena.insert_with(|_| 1);
        arena.remove(a);
        let b = arena.insert_with(|_| 2);
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn insert_at_restores_exact_handle() {
        let mut arena = Arena::default();
        let a = arena.insert_with(|_| 1);
        arena.remove(a);
        arena.insert_at(a, 10).unwrap();
        assert_eq!(arena.get(a), Some(&10));
        // Slot is occupied now.
        assert_eq!(arena.insert_at(a, 11), Err(11));
        // The next fresh insert does not reuse the slot.
        let c = arena.insert_with(|_| 3);
        assert_ne!(c.index(), a.index());
    }

    #[test]
    fn insert_at_never_lets_fresh_inserts_reissue_a_handle() {
        let mut arena = Arena::default();
        let a = arena.insert_with(|_| 1); // gen 0
        arena.remove(a);
        let b = arena.insert_with(|_| 2); // gen 1
        arena.remove(b);
        arena.insert_at(a, 1).unwrap(); // back to gen 0
        arena.remove(a);
        let c = arena.insert_with(|_| 3);
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn insert_at_beyond_the_end_grows_the_arena() {
        let mut arena = Arena::default();
        let far = ObjectId::new(3, 0);
        arena.insert_at(far, "far").unwrap();
        assert_eq!(arena.len(), 1);
        let near = arena.insert_with(|_| "near");
        assert!(near.index() < 3);
        assert_eq!(arena.iter().count(), 2);
    }

    #[test]
    fn retained_slots_are_skipped_until_released() {
        let mut arena = Arena::default();
        let a = arena.insert_with(|_| 1);
        assert_eq!(arena.remove_retained(a), Some(1));
        assert_eq!(arena.len(), 0);

        let b = arena.insert_with(|_| 2);
        assert_ne!(b.index(), a.index());
        arena.insert_at(a, 1).unwrap();
        assert_eq!(arena.get(a), Some(&1));

        arena.remove_retained(a);
        arena.release_retained();
        let c = arena.insert_with(|_| 3);
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
    }

    #[test]
    fn iter_reports_live_handles() {
        let mut arena = Arena::default();
        let a = arena.insert_with(|_| 'a');
        let b = arena.insert_with(|_| 'b');
        arena.remove(a);
        let live: Vec<_> = arena.iter().map(|(id, v)| (id, *v)).collect();
        assert_eq!(live, vec![(b, 'b')]);
    }
}

//! Slot table of rigid bodies addressed by generational [`BodyId`]s.
//!
//! Removing a body bumps its slot generation, so ids held by joints, force
//! generators or the host stop resolving instead of aliasing whatever body
//! reuses the slot.

use alloc::vec::Vec;

use crate::rigid_body::RigidBody;

/// Unique identifier for a rigid body within a [`PhysicsSystem`](crate::system::PhysicsSystem).
///
/// Ordered by slot, then generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId {
    index: u32,
    generation: u32,
}

impl BodyId {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
enum SlotState {
    Vacant,
    /// Id handed out, body not yet committed.
    Reserved,
    Occupied(RigidBody),
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: SlotState,
}

#[derive(Debug, Default)]
pub struct BodySet {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl BodySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out an id whose body will be [`commit`](Self::commit)ted later.
    pub fn reserve(&mut self) -> BodyId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Reserved;
            return BodyId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            state: SlotState::Reserved,
        });
        BodyId {
            index,
            generation: 0,
        }
    }

    /// Place `body` into a reserved slot. Returns `false` if `id` is stale or
    /// not reserved.
    pub fn commit(&mut self, id: BodyId, body: RigidBody) -> bool {
        match self.slot_mut(id) {
            Some(slot) if matches!(slot.state, SlotState::Reserved) => {
                slot.state = SlotState::Occupied(body);
                self.len += 1;
                true
            }
            _ => false,
        }
    }

    /// Reserve and commit in one go.
    pub fn insert(&mut self, body: RigidBody) -> BodyId {
        let id = self.reserve();
        self.commit(id, body);
        id
    }

    /// Free the slot behind `id`, whether committed or only reserved.
    ///
    /// Returns the body if one was committed.
    pub fn release(&mut self, id: BodyId) -> Option<RigidBody> {
        let slot = self.slot_mut(id)?;
        let previous = core::mem::replace(&mut slot.state, SlotState::Vacant);
        if matches!(previous, SlotState::Vacant) {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        match previous {
            SlotState::Occupied(body) => {
                self.len -= 1;
                Some(body)
            }
            _ => None,
        }
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_reserved(&self, id: BodyId) -> bool {
        matches!(self.slot(id).map(|s| &s.state), Some(SlotState::Reserved))
    }

    pub fn get(&self, id: BodyId) -> Option<&RigidBody> {
        match &self.slot(id)?.state {
            SlotState::Occupied(body) => Some(body),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        match &mut self.slot_mut(id)?.state {
            SlotState::Occupied(body) => Some(body),
            _ => None,
        }
    }

    /// Number of committed bodies.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Committed bodies in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match &slot.state {
            SlotState::Occupied(body) => Some((
                BodyId {
                    index: i as u32,
                    generation: slot.generation,
                },
                body,
            )),
            _ => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut RigidBody)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| match &mut slot.state {
                SlotState::Occupied(body) => Some((
                    BodyId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    body,
                )),
                _ => None,
            })
    }

    /// Ids of committed bodies in slot order.
    pub fn ids(&self) -> Vec<BodyId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Release every slot, committed or reserved.
    pub fn clear(&mut self) {
        for id in self.all_live_ids() {
            self.release(id);
        }
    }

    fn all_live_ids(&self) -> Vec<BodyId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !matches!(slot.state, SlotState::Vacant))
            .map(|(i, slot)| BodyId {
                index: i as u32,
                generation: slot.generation,
            })
            .collect()
    }

    fn slot(&self, id: BodyId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    fn slot_mut(&mut self, id: BodyId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }
}

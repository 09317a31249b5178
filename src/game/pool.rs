use crate::game::note::{HitObjectInfo, NoteState, PooledNote};
use crate::game::timing::VelocityCurve;
use std::collections::VecDeque;

/// How many notes each lane materializes up front.
pub const INITIAL_POOL_SIZE_PER_LANE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u32);

impl SlotId {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Slot storage for pooled notes. Destroyed slots go on a free list and are
/// only handed out again by a fresh [`NoteArena::insert`].
#[derive(Debug, Default)]
pub struct NoteArena {
    slots: Vec<Option<PooledNote>>,
    free: Vec<SlotId>,
}

impl NoteArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { slots: Vec::with_capacity(capacity), free: Vec::new() }
    }

    pub fn insert(&mut self, note: PooledNote) -> SlotId {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(note);
            return id;
        }
        let id = SlotId(self.slots.len() as u32);
        self.slots.push(Some(note));
        id
    }

    #[inline(always)]
    pub fn get(&self, id: SlotId) -> &PooledNote {
        match self.slots.get(id.index()) {
            Some(Some(note)) => note,
            _ => panic!("slot {} is not live", id.index()),
        }
    }

    #[inline(always)]
    pub fn get_mut(&mut self, id: SlotId) -> &mut PooledNote {
        match self.slots.get_mut(id.index()) {
            Some(Some(note)) => note,
            _ => panic!("slot {} is not live", id.index()),
        }
    }

    pub fn remove(&mut self, id: SlotId) -> PooledNote {
        let Some(note) = self.slots.get_mut(id.index()).and_then(Option::take) else {
            panic!("slot {} destroyed twice", id.index());
        };
        self.free.push(id);
        note
    }

    #[inline(always)]
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Total slots ever allocated, live or free.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[derive(Debug, Default)]
pub struct LaneQueues {
    pub pending: VecDeque<HitObjectInfo>,
    pub active: VecDeque<SlotId>,
    pub held: VecDeque<SlotId>,
    pub dead: VecDeque<SlotId>,
}

impl LaneQueues {
    #[inline(always)]
    fn pooled(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.active.iter().chain(&self.held).chain(&self.dead).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleOutcome {
    Reused(HitObjectInfo),
    Destroyed,
}

/// Per-lane pending/active/held/dead queues over one shared note arena.
///
/// This type only moves notes between queues; when to move them is decided by
/// the hit object manager each frame.
#[derive(Debug)]
pub struct LaneObjectPool {
    lanes: Vec<LaneQueues>,
    arena: NoteArena,
}

impl LaneObjectPool {
    pub fn new(key_count: usize) -> Self {
        Self {
            lanes: (0..key_count).map(|_| LaneQueues::default()).collect(),
            arena: NoteArena::with_capacity(key_count * INITIAL_POOL_SIZE_PER_LANE),
        }
    }

    #[inline(always)]
    pub fn key_count(&self) -> usize {
        self.lanes.len()
    }

    #[inline(always)]
    pub fn lane(&self, lane: usize) -> &LaneQueues {
        &self.lanes[lane]
    }

    #[inline(always)]
    pub fn lanes(&self) -> &[LaneQueues] {
        &self.lanes
    }

    #[inline(always)]
    pub fn note(&self, id: SlotId) -> &PooledNote {
        self.arena.get(id)
    }

    #[inline(always)]
    pub fn note_mut(&mut self, id: SlotId) -> &mut PooledNote {
        self.arena.get_mut(id)
    }

    #[inline(always)]
    pub fn arena(&self) -> &NoteArena {
        &self.arena
    }

    /// Queues `objects` (already in time order) as pending in their lanes.
    pub fn fill_pending(&mut self, objects: impl IntoIterator<Item = HitObjectInfo>) {
        for info in objects {
            self.lanes[info.lane_index()].pending.push_back(info);
        }
    }

    /// Materializes up to `per_lane` pending notes in every lane.
    pub fn initialize(&mut self, per_lane: usize, curve: &VelocityCurve) {
        for lane in 0..self.lanes.len() {
            for _ in 0..per_lane {
                let Some(info) = self.lanes[lane].pending.pop_front() else {
                    break;
                };
                self.create(info, curve);
            }
        }
    }

    pub fn create(&mut self, info: HitObjectInfo, curve: &VelocityCurve) -> SlotId {
        let id = self.arena.insert(PooledNote::new(info, curve));
        self.lanes[info.lane_index()].active.push_back(id);
        id
    }

    /// Promotes pending notes of `lane` into the pool while `should_create` holds.
    pub fn promote_pending(
        &mut self,
        lane: usize,
        curve: &VelocityCurve,
        mut should_create: impl FnMut(&HitObjectInfo) -> bool,
    ) -> usize {
        let mut created = 0;
        while let Some(info) = self.lanes[lane].pending.front().copied() {
            if !should_create(&info) {
                break;
            }
            self.lanes[lane].pending.pop_front();
            self.create(info, curve);
            created += 1;
        }
        created
    }

    #[inline(always)]
    pub fn active_head(&self, lane: usize) -> Option<SlotId> {
        self.lanes[lane].active.front().copied()
    }

    #[inline(always)]
    pub fn held_head(&self, lane: usize) -> Option<SlotId> {
        self.lanes[lane].held.front().copied()
    }

    #[inline(always)]
    pub fn dead_head(&self, lane: usize) -> Option<SlotId> {
        self.lanes[lane].dead.front().copied()
    }

    pub fn pop_active(&mut self, lane: usize) -> Option<SlotId> {
        self.lanes[lane].active.pop_front()
    }

    pub fn pop_held(&mut self, lane: usize) -> Option<SlotId> {
        self.lanes[lane].held.pop_front()
    }

    pub fn pop_dead(&mut self, lane: usize) -> Option<SlotId> {
        self.lanes[lane].dead.pop_front()
    }

    /// Sends a slot that was just taken off its queue to the dead queue.
    pub fn kill(&mut self, id: SlotId) {
        let note = self.arena.get_mut(id);
        note.state = NoteState::Dead;
        note.currently_being_held = false;
        let lane = note.info.lane_index();
        self.lanes[lane].dead.push_back(id);
    }

    /// Dead queue for a released long note, with its head cut at `head_position`.
    pub fn kill_hold(&mut self, id: SlotId, head_position: i64) {
        self.arena.get_mut(id).cut_head(head_position);
        self.kill(id);
    }

    /// Moves a slot taken off the active queue into the held queue.
    pub fn change_to_held(&mut self, id: SlotId) {
        let note = self.arena.get_mut(id);
        note.state = NoteState::Held;
        note.currently_being_held = true;
        let lane = note.info.lane_index();
        self.lanes[lane].held.push_back(id);
    }

    /// Rebinds a slot that was just taken off its queue to the next pending note
    /// in its lane, or destroys it when the lane has nothing left.
    pub fn recycle(&mut self, id: SlotId, curve: &VelocityCurve) -> RecycleOutcome {
        let lane = self.arena.get(id).info.lane_index();
        match self.lanes[lane].pending.pop_front() {
            Some(info) => {
                self.arena.get_mut(id).bind(info, curve);
                self.lanes[lane].active.push_back(id);
                RecycleOutcome::Reused(info)
            }
            None => {
                self.arena.remove(id);
                RecycleOutcome::Destroyed
            }
        }
    }

    /// Destroys every pooled note and clears the pending queues.
    pub fn clear(&mut self) {
        for lane in 0..self.lanes.len() {
            let queues = std::mem::take(&mut self.lanes[lane]);
            for id in queues.pooled() {
                self.arena.remove(id);
            }
        }
    }

    pub fn iter_pooled(&self) -> impl Iterator<Item = (SlotId, &PooledNote)> + '_ {
        self.lanes
            .iter()
            .flat_map(LaneQueues::pooled)
            .map(|id| (id, self.arena.get(id)))
    }

    pub fn update_offsets(&mut self, current_track_position: i64, scroll_speed: f32) {
        for lane in &self.lanes {
            for id in lane.pooled() {
                self.arena.get_mut(id).update_offsets(current_track_position, scroll_speed);
            }
        }
    }

    #[inline(always)]
    pub fn any_active(&self) -> bool {
        self.lanes.iter().any(|l| !l.active.is_empty())
    }

    #[inline(always)]
    pub fn any_held(&self) -> bool {
        self.lanes.iter().any(|l| !l.held.is_empty())
    }

    #[inline(always)]
    pub fn any_dead(&self) -> bool {
        self.lanes.iter().any(|l| !l.dead.is_empty())
    }

    /// Checks the queue invariants: no slot in two queues, every slot's state and
    /// lane agree with its queue, and each queue is in time order.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = vec![false; self.arena.capacity()];
        for (lane_idx, lane) in self.lanes.iter().enumerate() {
            let queues = [
                ("active", &lane.active, NoteState::Active),
                ("held", &lane.held, NoteState::Held),
                ("dead", &lane.dead, NoteState::Dead),
            ];
            for (name, queue, state) in queues {
                let mut last_time = i32::MIN;
                for &id in queue {
                    if std::mem::replace(&mut seen[id.index()], true) {
                        return Err(format!("slot {} queued twice (lane {lane_idx})", id.index()));
                    }
                    let note = self.arena.get(id);
                    if note.state != state {
                        return Err(format!(
                            "slot {} in {name} queue has state {:?}",
                            id.index(),
                            note.state
                        ));
                    }
                    if note.info.lane_index() != lane_idx {
                        return Err(format!("slot {} queued in wrong lane {lane_idx}", id.index()));
                    }
                    // Held notes leave in release order, dead notes in arrival order.
                    let key = match state {
                        NoteState::Active => note.info.start_time,
                        NoteState::Held | NoteState::Dead => continue,
                    };
                    if key < last_time {
                        return Err(format!("{name} queue of lane {lane_idx} is out of order"));
                    }
                    last_time = key;
                }
            }

            let mut last_pending = i32::MIN;
            for info in &lane.pending {
                if info.start_time < last_pending {
                    return Err(format!("pending queue of lane {lane_idx} is out of order"));
                }
                last_pending = info.start_time;
            }
        }

        let queued = seen.iter().filter(|&&s| s).count();
        if queued != self.arena.live() {
            return Err(format!("{} live slots but {queued} queued", self.arena.live()));
        }
        Ok(())
    }

    /// Notes still owned by the pool: pending plus pooled.
    pub fn note_count(&self) -> usize {
        self.lanes
            .iter()
            .map(|l| l.pending.len() + l.active.len() + l.held.len() + l.dead.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_curve() -> VelocityCurve {
        VelocityCurve::new(1.0, vec![], false).unwrap()
    }

    #[test]
    fn initialize_materializes_per_lane_budget() {
        let curve = flat_curve();
        let mut pool = LaneObjectPool::new(2);
        pool.fill_pending((0..5).map(|i| HitObjectInfo::tap(1, i * 100)));
        pool.fill_pending([HitObjectInfo::tap(2, 50)]);
        pool.initialize(INITIAL_POOL_SIZE_PER_LANE, &curve);

        assert_eq!(pool.lane(0).active.len(), 2);
        assert_eq!(pool.lane(0).pending.len(), 3);
        assert_eq!(pool.lane(1).active.len(), 1);
        assert!(pool.lane(1).pending.is_empty());
        pool.validate().unwrap();
    }

    #[test]
    fn recycle_reuses_slot_identity() {
        let curve = flat_curve();
        let mut pool = LaneObjectPool::new(1);
        pool.fill_pending([HitObjectInfo::tap(1, 0), HitObjectInfo::tap(1, 500)]);
        pool.initialize(1, &curve);

        let id = pool.pop_active(0).unwrap();
        pool.kill(id);
        let dead = pool.pop_dead(0).unwrap();
        assert_eq!(dead, id);
        assert_eq!(pool.recycle(dead, &curve), RecycleOutcome::Reused(HitObjectInfo::tap(1, 500)));
        assert_eq!(pool.active_head(0), Some(id));
        assert_eq!(pool.note(id).uses, 2);
        pool.validate().unwrap();
    }

    #[test]
    fn recycle_on_exhausted_lane_destroys() {
        let curve = flat_curve();
        let mut pool = LaneObjectPool::new(1);
        pool.fill_pending([HitObjectInfo::tap(1, 0)]);
        pool.initialize(1, &curve);

        let id = pool.pop_active(0).unwrap();
        assert_eq!(pool.recycle(id, &curve), RecycleOutcome::Destroyed);
        assert_eq!(pool.arena().live(), 0);
        assert_eq!(pool.note_count(), 0);
        pool.validate().unwrap();
    }

    #[test]
    fn hold_then_release_lands_in_dead() {
        let curve = flat_curve();
        let mut pool = LaneObjectPool::new(1);
        pool.fill_pending([HitObjectInfo::long_note(1, 100, 900)]);
        pool.initialize(1, &curve);

        let id = pool.pop_active(0).unwrap();
        pool.change_to_held(id);
        assert!(pool.note(id).currently_being_held);
        assert_eq!(pool.held_head(0), Some(id));

        let id = pool.pop_held(0).unwrap();
        pool.kill_hold(id, 50_000);
        assert_eq!(pool.note(id).state, NoteState::Dead);
        assert_eq!(pool.note(id).initial_track_position, 50_000);
        assert!(!pool.note(id).currently_being_held);
        pool.validate().unwrap();
    }

    #[test]
    fn clear_frees_every_slot() {
        let curve = flat_curve();
        let mut pool = LaneObjectPool::new(2);
        pool.fill_pending([HitObjectInfo::tap(1, 0), HitObjectInfo::tap(2, 0)]);
        pool.initialize(2, &curve);
        let id = pool.pop_active(1).unwrap();
        pool.kill(id);

        pool.clear();
        assert_eq!(pool.arena().live(), 0);
        assert_eq!(pool.note_count(), 0);

        // Freed slots are handed out again on the next materialization.
        pool.fill_pending([HitObjectInfo::tap(1, 10)]);
        pool.initialize(1, &curve);
        assert_eq!(pool.arena().capacity(), 2);
    }

    #[test]
    fn validate_catches_double_queueing() {
        let curve = flat_curve();
        let mut pool = LaneObjectPool::new(1);
        pool.fill_pending([HitObjectInfo::tap(1, 0)]);
        pool.initialize(1, &curve);
        let id = pool.active_head(0).unwrap();
        pool.lanes[0].dead.push_back(id);
        assert!(pool.validate().is_err());
    }
}

use log::debug;

/// One resident line. Slots live in a per-set arena; `prev`/`next` are slot
/// indices forming the recency list, `None` marks the list ends.
#[derive(Debug, Clone)]
struct CacheLine {
    tag: u32,
    dirty: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

impl CacheLine {
    fn new(tag: u32) -> Self {
        Self {
            tag,
            dirty: false,
            prev: None,
            next: None,
        }
    }
}

/// A set: arena of line slots plus the recency list threaded through them.
/// Head is most-recently-used, tail is the eviction candidate. The list
/// itself is unbounded; `CacheBank` bounds it through the occupancy counter.
#[derive(Debug, Clone)]
struct CacheSet {
    lines: Vec<CacheLine>,
    head: Option<usize>,
    tail: Option<usize>,
    occupancy: usize,
}

impl CacheSet {
    fn new(ways: usize) -> Self {
        Self {
            lines: Vec::with_capacity(ways),
            head: None,
            tail: None,
            occupancy: 0,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.lines[slot].prev, self.lines[slot].next);
        match prev {
            Some(p) => self.lines[p].next = next,
            None => self.head = next, // slot was at head
        }
        match next {
            Some(n) => self.lines[n].prev = prev,
            None => self.tail = prev, // slot was at tail
        }
        self.lines[slot].prev = None;
        self.lines[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.lines[slot].prev = None;
        self.lines[slot].next = self.head;
        match self.head {
            Some(h) => self.lines[h].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    /// Unlinks and returns the least-recently-used slot. Caller must have
    /// checked occupancy; an empty list here is a broken invariant.
    fn evict_lru(&mut self) -> usize {
        let slot = match self.tail {
            Some(t) => t,
            None => panic!("eviction requested on an empty set"),
        };
        self.unlink(slot);
        slot
    }

    fn find_by_tag(&self, tag: u32) -> Option<usize> {
        let mut cur = self.head;
        while let Some(slot) = cur {
            if self.lines[slot].tag == tag {
                return Some(slot);
            }
            cur = self.lines[slot].next;
        }
        None
    }
}

/// Stable handle to a resident line, returned by `lookup` and `fill`.
/// Carries the tag so later updates can re-verify the slot still holds it.
#[derive(Debug, Clone, Copy)]
pub struct LineRef {
    set: usize,
    slot: usize,
    tag: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct FillResult {
    pub line: LineRef,
    pub evicted: bool,
    pub evicted_dirty: bool,
}

/// One cache instance: geometry plus `n_sets` independent LRU sets.
#[derive(Debug)]
pub struct CacheBank {
    assoc: usize,
    #[allow(unused)]
    n_sets: usize,
    index_mask: u32,
    index_mask_offset: u32,
    tag_shift: u32,
    sets: Vec<CacheSet>,
}

impl CacheBank {
    /// Geometry must have been validated (see `SimConfig::validate`): all
    /// parameters are powers of two and `size / (block_size * assoc) >= 1`.
    pub fn new(size: u32, block_size: u32, assoc: u32) -> Self {
        let n_sets = size / (block_size * assoc);

        let byte_offset_bits = block_size.ilog2();
        let set_index_bits = n_sets.ilog2();
        let index_mask = (n_sets - 1) << byte_offset_bits;
        let tag_shift = byte_offset_bits + set_index_bits;

        debug!("bank size = {size}, sets = {n_sets}, assoc = {assoc}");
        debug!("bank index mask = {index_mask:#b}, mask offset = {byte_offset_bits}");

        let assoc = assoc as usize;
        let n_sets = n_sets as usize;
        Self {
            assoc,
            n_sets,
            index_mask,
            index_mask_offset: byte_offset_bits,
            tag_shift,
            sets: vec![CacheSet::new(assoc); n_sets],
        }
    }

    pub fn set_index(&self, addr: u32) -> usize {
        ((addr & self.index_mask) >> self.index_mask_offset) as usize
    }

    /// Address bits above index and byte offset. Block size is in bytes
    /// everywhere, so tag and index ranges partition the address exactly.
    pub fn tag(&self, addr: u32) -> u32 {
        addr >> self.tag_shift
    }

    #[cfg(test)]
    fn occupancy(&self, set: usize) -> usize {
        self.sets[set].occupancy
    }

    pub fn lookup(&self, addr: u32) -> Option<LineRef> {
        let set = self.set_index(addr);
        let tag = self.tag(addr);
        self.sets[set]
            .find_by_tag(tag)
            .map(|slot| LineRef { set, slot, tag })
    }

    /// Moves an already-resident line to the front of its recency list.
    pub fn touch(&mut self, line: &LineRef) {
        self.check_resident(line);
        self.sets[line.set].unlink(line.slot);
        self.sets[line.set].push_front(line.slot);
    }

    /// Marks a resident line dirty (write-back stores only).
    pub fn mark_dirty(&mut self, line: &LineRef) {
        self.check_resident(line);
        self.sets[line.set].lines[line.slot].dirty = true;
    }

    // A handle outliving the line it named means the set changed between
    // the hit check and this update, which sequential processing rules out.
    fn check_resident(&self, line: &LineRef) {
        let held = self.sets[line.set].lines[line.slot].tag;
        if held != line.tag {
            panic!(
                "line with tag {:#x} in set {} vanished between hit check and update (found {:#x})",
                line.tag, line.set, held
            );
        }
    }

    /// Brings the block holding `addr` into its set. Evicts the LRU line
    /// first when the set is full; the new line starts clean at the front.
    pub fn fill(&mut self, addr: u32) -> FillResult {
        let set_idx = self.set_index(addr);
        let tag = self.tag(addr);
        let set = &mut self.sets[set_idx];

        let (slot, evicted, evicted_dirty) = if set.occupancy == self.assoc {
            // full set: replace the tail, occupancy stays at the cap
            let slot = set.evict_lru();
            let was_dirty = set.lines[slot].dirty;
            set.lines[slot] = CacheLine::new(tag);
            (slot, true, was_dirty)
        } else {
            set.occupancy += 1;
            set.lines.push(CacheLine::new(tag));
            (set.lines.len() - 1, false, false)
        };
        set.push_front(slot);

        FillResult {
            line: LineRef {
                set: set_idx,
                slot,
                tag,
            },
            evicted,
            evicted_dirty,
        }
    }

    /// Releases every resident line, returning how many were dirty so the
    /// caller can charge their write-backs.
    pub fn flush(&mut self) -> u64 {
        let mut dirty = 0;
        for set in &mut self.sets {
            dirty += set.lines.iter().filter(|line| line.dirty).count() as u64;
            set.lines.clear();
            set.head = None;
            set.tail = None;
            set.occupancy = 0;
        }
        dirty
    }
}

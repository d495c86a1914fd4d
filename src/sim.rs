use crate::cache::CacheBank;
use crate::config::{AllocatePolicy, Organization, SimConfig, WritePolicy};
use crate::stats::SimStats;
use crate::trace::AccessKind;
use crate::Result;

/// In unified mode there is literally one bank; instruction and data
/// references contend for the same sets.
#[derive(Debug)]
enum Banks {
    Unified(CacheBank),
    Split { inst: CacheBank, data: CacheBank },
}

/// The whole simulation state: the bank(s) plus the running statistics,
/// built once at startup and driven one reference at a time.
#[derive(Debug)]
pub struct Simulator {
    banks: Banks,
    write_policy: WritePolicy,
    allocate_policy: AllocatePolicy,
    words_per_block: u64,
    stats: SimStats,
}

impl Simulator {
    pub fn new(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let banks = match config.organization() {
            Organization::Unified(size) => {
                Banks::Unified(CacheBank::new(size, config.block_size, config.assoc))
            }
            Organization::Split { inst, data } => Banks::Split {
                inst: CacheBank::new(inst, config.block_size, config.assoc),
                data: CacheBank::new(data, config.block_size, config.assoc),
            },
        };
        Ok(Self {
            banks,
            write_policy: config.write_policy,
            allocate_policy: config.allocate_policy,
            words_per_block: config.words_per_block(),
            stats: SimStats::default(),
        })
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Runs one reference through the cache, updating LRU state and
    /// statistics. References must arrive in trace order; every update
    /// here is observed by the next reference.
    pub fn process(&mut self, kind: AccessKind, addr: u32) {
        match kind {
            AccessKind::InstFetch => self.stats.inst.accesses += 1,
            AccessKind::DataLoad | AccessKind::DataStore => self.stats.data.accesses += 1,
        }

        let unified = matches!(self.banks, Banks::Unified(_));
        let bank = match (&mut self.banks, kind) {
            (Banks::Unified(bank), _) => bank,
            (Banks::Split { inst, .. }, AccessKind::InstFetch) => inst,
            (Banks::Split { data, .. }, _) => data,
        };
        let words_per_block = self.words_per_block;

        let hit = bank.lookup(addr);

        if hit.is_none() {
            match kind {
                AccessKind::InstFetch => self.stats.inst.misses += 1,
                AccessKind::DataLoad | AccessKind::DataStore => self.stats.data.misses += 1,
            }
        }

        match (kind, hit) {
            (AccessKind::DataLoad | AccessKind::InstFetch, Some(line)) => {
                bank.touch(&line);
            }
            (AccessKind::DataStore, Some(line)) => {
                bank.touch(&line);
                match self.write_policy {
                    WritePolicy::WriteBack => bank.mark_dirty(&line),
                    // every written-through store costs one word, hit or not
                    WritePolicy::WriteThrough => self.stats.data.copies_back += 1,
                }
            }
            (AccessKind::DataLoad, None) => {
                let fill = bank.fill(addr);
                self.stats.data.demand_fetches += words_per_block;
                if fill.evicted && fill.evicted_dirty {
                    self.stats.data.copies_back += words_per_block;
                    self.stats.data.replacements += 1;
                }
            }
            (AccessKind::DataStore, None) => match self.allocate_policy {
                AllocatePolicy::WriteAllocate => {
                    let fill = bank.fill(addr);
                    self.stats.data.demand_fetches += words_per_block;
                    if fill.evicted && fill.evicted_dirty {
                        self.stats.data.copies_back += words_per_block;
                        self.stats.data.replacements += 1;
                    }
                    match self.write_policy {
                        WritePolicy::WriteBack => bank.mark_dirty(&fill.line),
                        WritePolicy::WriteThrough => self.stats.data.copies_back += 1,
                    }
                }
                AllocatePolicy::NoWriteAllocate => {
                    // the store bypasses the cache entirely
                    self.stats.data.copies_back += 1;
                }
            },
            (AccessKind::InstFetch, None) => {
                let fill = bank.fill(addr);
                self.stats.inst.demand_fetches += words_per_block;
                if fill.evicted {
                    self.stats.inst.replacements += 1;
                    // a fetch sharing the bank with data may push out a
                    // dirty data line; the write-back is data traffic
                    if fill.evicted_dirty && unified {
                        self.stats.data.copies_back += words_per_block;
                    }
                }
            }
        }
    }

    /// Drains the cache at end of run. Every dirty resident line owes one
    /// block write-back; only stores dirty lines, so the traffic is data's.
    pub fn flush(&mut self) {
        let dirty = match &mut self.banks {
            Banks::Unified(bank) => bank.flush(),
            Banks::Split { inst, data } => inst.flush() + data.flush(),
        };
        self.stats.data.copies_back += dirty * self.words_per_block;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unified(size: u32) -> SimConfig {
        SimConfig {
            unified_size: Some(size),
            ..Default::default()
        }
    }

    #[test]
    fn repeated_fetch_hits_after_first_miss() {
        // 1024/16/1 -> 64 sets, direct-mapped
        let mut sim = Simulator::new(&unified(1024)).unwrap();

        sim.process(AccessKind::InstFetch, 0x1000);
        assert_eq!(sim.stats().inst.misses, 1);
        assert_eq!(sim.stats().inst.demand_fetches, 4);

        sim.process(AccessKind::InstFetch, 0x1000);
        assert_eq!(sim.stats().inst.accesses, 2);
        assert_eq!(sim.stats().inst.misses, 1);
    }

    #[test]
    fn dirty_eviction_charges_a_block_of_write_backs() {
        // split data cache 256/16/2 -> 8 sets; three stores conflict in set 0
        let config = SimConfig {
            data_size: Some(256),
            inst_size: Some(256),
            assoc: 2,
            ..Default::default()
        };
        let mut sim = Simulator::new(&config).unwrap();

        // tags 1, 2, 3 of set 0: bits above offset(4) + index(3)
        let a = 1 << 7;
        let b = 2 << 7;
        let c = 3 << 7;

        sim.process(AccessKind::DataStore, a); // allocate, dirty
        sim.process(AccessKind::DataStore, b); // allocate, set now full
        sim.process(AccessKind::DataStore, c); // evicts dirty a

        let data = sim.stats().data;
        assert_eq!(data.misses, 3);
        assert_eq!(data.demand_fetches, 12);
        assert_eq!(data.replacements, 1);
        assert_eq!(data.copies_back, 4);
    }

    #[test]
    fn write_through_store_hit_costs_exactly_one_word() {
        let config = SimConfig {
            write_policy: WritePolicy::WriteThrough,
            ..unified(1024)
        };
        let mut sim = Simulator::new(&config).unwrap();

        sim.process(AccessKind::DataStore, 0x40); // miss, allocate
        assert_eq!(sim.stats().data.copies_back, 1);
        assert_eq!(sim.stats().data.demand_fetches, 4);

        sim.process(AccessKind::DataStore, 0x40); // hit
        assert_eq!(sim.stats().data.copies_back, 2);

        // nothing is dirty under write-through, so flushing adds no traffic
        sim.flush();
        assert_eq!(sim.stats().data.copies_back, 2);
    }

    #[test]
    fn no_write_allocate_store_miss_bypasses_the_cache() {
        let config = SimConfig {
            allocate_policy: AllocatePolicy::NoWriteAllocate,
            ..unified(1024)
        };
        let mut sim = Simulator::new(&config).unwrap();

        sim.process(AccessKind::DataStore, 0x40);
        let data = sim.stats().data;
        assert_eq!(data.misses, 1);
        assert_eq!(data.copies_back, 1);
        assert_eq!(data.demand_fetches, 0);

        // the block was never brought in
        sim.process(AccessKind::DataLoad, 0x40);
        assert_eq!(sim.stats().data.misses, 2);
    }

    #[test]
    fn unified_fetch_can_evict_a_dirty_data_line() {
        // 64/16/1 -> 4 sets, direct-mapped; store and fetch collide in set 0
        let mut sim = Simulator::new(&unified(64)).unwrap();

        sim.process(AccessKind::DataStore, 0x000); // dirty line in set 0
        sim.process(AccessKind::InstFetch, 0x100); // same set, different tag

        assert_eq!(sim.stats().inst.replacements, 1);
        // the victim's write-back lands on the data side
        assert_eq!(sim.stats().data.copies_back, 4);
        assert_eq!(sim.stats().inst.copies_back, 0);
    }

    #[test]
    fn split_banks_do_not_contend() {
        let config = SimConfig {
            inst_size: Some(64),
            data_size: Some(64),
            ..Default::default()
        };
        let mut sim = Simulator::new(&config).unwrap();

        sim.process(AccessKind::DataStore, 0x000);
        sim.process(AccessKind::InstFetch, 0x100);

        // the fetch landed in its own bank's empty set
        assert_eq!(sim.stats().inst.replacements, 0);
        assert_eq!(sim.stats().data.copies_back, 0);

        // and the dirty data line is still resident
        sim.process(AccessKind::DataLoad, 0x000);
        assert_eq!(sim.stats().data.misses, 1);
    }

    #[test]
    fn flush_writes_back_every_dirty_line() {
        let mut sim = Simulator::new(&unified(1024)).unwrap();

        sim.process(AccessKind::DataStore, 0x000);
        sim.process(AccessKind::DataStore, 0x040);
        sim.process(AccessKind::DataLoad, 0x080);
        assert_eq!(sim.stats().data.copies_back, 0);

        sim.flush();
        // two dirty lines, four words each
        assert_eq!(sim.stats().data.copies_back, 8);
    }

    #[test]
    fn accesses_split_into_hits_plus_misses() {
        let mut sim = Simulator::new(&unified(256)).unwrap();

        // 16 sets, index bits 4..7: these references land in four
        // different sets, so only first touches of a block miss
        let trace = [
            (AccessKind::InstFetch, 0x1000),
            (AccessKind::InstFetch, 0x1004), // same block as 0x1000
            (AccessKind::DataLoad, 0x2010),
            (AccessKind::DataStore, 0x2010), // same block as the load
            (AccessKind::DataLoad, 0x3020),
            (AccessKind::InstFetch, 0x1000),
            (AccessKind::DataStore, 0x4030),
        ];
        for (kind, addr) in trace {
            sim.process(kind, addr);
        }

        let stats = sim.stats();
        assert_eq!(stats.inst.accesses, 3);
        assert_eq!(stats.data.accesses, 4);
        assert_eq!(stats.inst.hits() + stats.inst.misses, stats.inst.accesses);
        assert_eq!(stats.data.hits() + stats.data.misses, stats.data.accesses);
        assert_eq!(stats.inst.misses, 1);
        assert_eq!(stats.data.misses, 3);
    }

    #[test]
    fn load_heavy_conflict_storm_stays_within_occupancy() {
        // single-set cache of associativity 2 under ten distinct blocks
        let config = SimConfig {
            unified_size: Some(32),
            assoc: 2,
            ..Default::default()
        };
        let mut sim = Simulator::new(&config).unwrap();

        for tag in 0..10u32 {
            sim.process(AccessKind::DataLoad, tag << 4);
        }
        let data = sim.stats().data;
        assert_eq!(data.accesses, 10);
        assert_eq!(data.misses, 10);
        assert_eq!(data.demand_fetches, 40);
        // clean loads evict clean lines: no write-back traffic at all
        assert_eq!(data.copies_back, 0);
        assert_eq!(data.replacements, 0);
    }
}

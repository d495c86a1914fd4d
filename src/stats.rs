use serde::Serialize;

/// Running totals for one reference kind (instruction or data side).
/// Counters only ever go up; hits are derived as `accesses - misses`.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct AccessStats {
    pub accesses: u64,
    pub misses: u64,
    pub replacements: u64,
    pub demand_fetches: u64,
    pub copies_back: u64,
}

impl AccessStats {
    pub fn hits(&self) -> u64 {
        self.accesses - self.misses
    }

    pub fn miss_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.misses as f64 / self.accesses as f64
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SimStats {
    pub inst: AccessStats,
    pub data: AccessStats,
}

impl SimStats {
    pub fn print_report(&self) {
        println!();
        println!("*** CACHE STATISTICS ***");
        print_side("INSTRUCTIONS", &self.inst);
        print_side("DATA", &self.data);
        println!(" TRAFFIC (in words)");
        println!(
            "  demand fetch:  {}",
            self.inst.demand_fetches + self.data.demand_fetches
        );
        println!(
            "  copies back:   {}",
            self.inst.copies_back + self.data.copies_back
        );
    }
}

fn print_side(label: &str, stats: &AccessStats) {
    println!(" {label}");
    println!("  accesses:  {}", stats.accesses);
    println!("  misses:    {}", stats.misses);
    if stats.accesses == 0 {
        println!("  miss rate: 0 (0)");
    } else {
        println!(
            "  miss rate: {:.4} (hit rate {:.4})",
            stats.miss_rate(),
            stats.hits() as f64 / stats.accesses as f64
        );
    }
    println!("  replace:   {}", stats.replacements);
}

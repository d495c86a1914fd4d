use std::{fs, path::PathBuf};

use clap::Parser;
use log::debug;

use config::{
    AllocatePolicy, SimConfig, WritePolicy, DEFAULT_ADDRESS_BITS, DEFAULT_ASSOC,
    DEFAULT_BLOCK_SIZE,
};
use sim::Simulator;
use trace::Trace;

mod cache;
mod config;
mod logger;
mod sim;
mod stats;
mod trace;

pub type BoxDynError = Box<dyn std::error::Error>;
pub type Result<T> = std::result::Result<T, BoxDynError>;

const PRINT_INTERVAL: u64 = 100_000;

#[derive(clap::Parser, Debug)]
#[command(about = "Trace-driven set-associative cache simulator")]
struct Args {
    /// Path to the trace to be replayed
    trace: PathBuf,

    /// Cache block size in bytes
    #[arg(short = 'b', long)]
    block_size: Option<u32>,

    /// Unified cache size in bytes
    #[arg(short = 'u', long, conflicts_with_all = ["inst_size", "data_size"])]
    unified_size: Option<u32>,

    /// Instruction cache size in bytes (selects a split cache)
    #[arg(short = 'i', long)]
    inst_size: Option<u32>,

    /// Data cache size in bytes (selects a split cache)
    #[arg(short = 'd', long)]
    data_size: Option<u32>,

    /// Cache associativity
    #[arg(short = 'a', long)]
    assoc: Option<u32>,

    /// Set the write policy to write through instead of write back
    #[arg(long)]
    write_through: bool,

    /// Set the allocation policy to no write allocate
    #[arg(long)]
    no_write_allocate: bool,

    /// Path to a JSON cache configuration, overriding the flags above
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the statistics as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Whether should print debug information
    #[arg(long)]
    debug: bool,
}

fn config_from_flags(args: &Args) -> SimConfig {
    SimConfig {
        block_size: args.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
        assoc: args.assoc.unwrap_or(DEFAULT_ASSOC),
        address_bits: DEFAULT_ADDRESS_BITS,
        unified_size: args.unified_size,
        inst_size: args.inst_size,
        data_size: args.data_size,
        write_policy: if args.write_through {
            WritePolicy::WriteThrough
        } else {
            WritePolicy::WriteBack
        },
        allocate_policy: if args.no_write_allocate {
            AllocatePolicy::NoWriteAllocate
        } else {
            AllocatePolicy::WriteAllocate
        },
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.debug);

    let config = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => config_from_flags(&args),
    };

    let mut sim = Simulator::new(&config)?;
    config.print_settings();

    let trace = Trace::open(&args.trace)?;
    let mut processed = 0u64;
    for reference in trace {
        sim.process(reference.kind, reference.addr);
        processed += 1;
        if processed % PRINT_INTERVAL == 0 {
            debug!("processed {processed} references");
        }
    }
    sim.flush();

    if args.json {
        println!("{}", serde_json::to_string_pretty(sim.stats())?);
    } else {
        sim.stats().print_report();
    }

    Ok(())
}

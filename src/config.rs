use serde::{Deserialize, Serialize};

use crate::Result;

/// Words are the unit of the traffic statistics.
pub const WORD_SIZE: u32 = 4;

pub const DEFAULT_CACHE_SIZE: u32 = 8 * 1024;
pub const DEFAULT_BLOCK_SIZE: u32 = 16;
pub const DEFAULT_ASSOC: u32 = 1;
pub const DEFAULT_ADDRESS_BITS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WritePolicy {
    #[serde(rename = "WriteBack")]
    WriteBack,
    #[serde(rename = "WriteThrough")]
    WriteThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocatePolicy {
    #[serde(rename = "WriteAllocate")]
    WriteAllocate,
    #[serde(rename = "NoWriteAllocate")]
    NoWriteAllocate,
}

/// Whether instructions and data share one bank or get one each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Organization {
    Unified(u32),
    Split { inst: u32, data: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(rename = "block_size", default = "default_block_size")]
    pub block_size: u32,
    #[serde(rename = "assoc", default = "default_assoc")]
    pub assoc: u32,
    #[serde(rename = "address_bits", default = "default_address_bits")]
    pub address_bits: u32,
    #[serde(rename = "unified_size", default)]
    pub unified_size: Option<u32>,
    #[serde(rename = "inst_size", default)]
    pub inst_size: Option<u32>,
    #[serde(rename = "data_size", default)]
    pub data_size: Option<u32>,
    #[serde(rename = "write_policy")]
    pub write_policy: WritePolicy,
    #[serde(rename = "allocate_policy")]
    pub allocate_policy: AllocatePolicy,
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

fn default_assoc() -> u32 {
    DEFAULT_ASSOC
}

fn default_address_bits() -> u32 {
    DEFAULT_ADDRESS_BITS
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            assoc: DEFAULT_ASSOC,
            address_bits: DEFAULT_ADDRESS_BITS,
            unified_size: None,
            inst_size: None,
            data_size: None,
            write_policy: WritePolicy::WriteBack,
            allocate_policy: AllocatePolicy::WriteAllocate,
        }
    }
}

impl SimConfig {
    /// Giving either split size selects split mode; the other side falls
    /// back to the default size, as does a unified cache with no size given.
    pub fn organization(&self) -> Organization {
        if self.inst_size.is_some() || self.data_size.is_some() {
            Organization::Split {
                inst: self.inst_size.unwrap_or(DEFAULT_CACHE_SIZE),
                data: self.data_size.unwrap_or(DEFAULT_CACHE_SIZE),
            }
        } else {
            Organization::Unified(self.unified_size.unwrap_or(DEFAULT_CACHE_SIZE))
        }
    }

    pub fn words_per_block(&self) -> u64 {
        (self.block_size / WORD_SIZE) as u64
    }

    pub fn validate(&self) -> Result<()> {
        macro_rules! checkp2 {
            ($a:expr) => {
                if !$a.is_power_of_two() {
                    return Err(format!(
                        "Invalid cache config {} = {} is not power of two",
                        stringify!($a),
                        $a
                    )
                    .into());
                }
            };
        }
        let block_size = self.block_size;
        let assoc = self.assoc;
        checkp2!(block_size);
        checkp2!(assoc);

        if self.block_size < WORD_SIZE {
            return Err(format!(
                "Invalid cache config block_size = {} is smaller than one word ({WORD_SIZE} bytes)",
                self.block_size
            )
            .into());
        }

        match self.organization() {
            Organization::Unified(size) => self.check_bank("unified", size)?,
            Organization::Split { inst, data } => {
                self.check_bank("instruction", inst)?;
                self.check_bank("data", data)?;
            }
        }
        Ok(())
    }

    fn check_bank(&self, label: &str, size: u32) -> Result<()> {
        if !size.is_power_of_two() {
            return Err(format!(
                "Invalid cache config {label} size = {size} is not power of two"
            )
            .into());
        }
        let line_bytes = self.block_size * self.assoc;
        if size % line_bytes != 0 || size / line_bytes == 0 {
            return Err(format!(
                "Invalid cache config {label} size = {size} leaves no whole set \
                 (block size {} x associativity {})",
                self.block_size, self.assoc
            )
            .into());
        }
        let n_sets = size / line_bytes;
        // power-of-two block and size make this hold unless assoc is odd,
        // which checkp2 above already rejects; keep the guard anyway
        if !n_sets.is_power_of_two() {
            return Err(format!(
                "Invalid cache config {label} size = {size} yields {n_sets} sets, not a power of two"
            )
            .into());
        }
        let used_bits = self.block_size.ilog2() + n_sets.ilog2();
        if used_bits >= self.address_bits {
            return Err(format!(
                "Invalid cache config {label} size = {size} needs {used_bits} index+offset bits \
                 but addresses have {}",
                self.address_bits
            )
            .into());
        }
        Ok(())
    }

    pub fn print_settings(&self) {
        println!("*** CACHE SETTINGS ***");
        match self.organization() {
            Organization::Split { inst, data } => {
                println!("  Split I- D-cache");
                println!("  I-cache size: \t{inst}");
                println!("  D-cache size: \t{data}");
            }
            Organization::Unified(size) => {
                println!("  Unified I- D-cache");
                println!("  Size: \t{size}");
            }
        }
        println!("  Associativity: \t{}", self.assoc);
        println!("  Block size: \t\t{}", self.block_size);
        println!(
            "  Write policy: \t{}",
            match self.write_policy {
                WritePolicy::WriteBack => "WRITE BACK",
                WritePolicy::WriteThrough => "WRITE THROUGH",
            }
        );
        println!(
            "  Allocation policy: \t{}",
            match self.allocate_policy {
                AllocatePolicy::WriteAllocate => "WRITE ALLOCATE",
                AllocatePolicy::NoWriteAllocate => "WRITE NO ALLOCATE",
            }
        );
    }
}

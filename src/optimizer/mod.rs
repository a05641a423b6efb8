pub mod cfg;
pub mod dataflow;
mod loops;
#[cfg(test)]
mod optimizer_tests;
mod peephole;

use crate::ir::{IrCode, OpCode};

pub use cfg::{BasicBlock, ControlFlowGraph};

/// Optimization levels selected by `-O0..-O3`. Each level includes the
/// passes of the previous one.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd)]
pub enum OptLevel {
    #[default]
    O0,
    O1,
    O2,
    O3,
}

impl TryFrom<u8> for OptLevel {
    type Error = u8;

    fn try_from(level: u8) -> Result<Self, u8> {
        match level {
            0 => Ok(Self::O0),
            1 => Ok(Self::O1),
            2 => Ok(Self::O2),
            3 => Ok(Self::O3),
            other => Err(other),
        }
    }
}

/// Rewrites the IR at the given level. Passes run per function region, in
/// the fixed order: peephole passes first, then the dataflow-driven passes,
/// then the loop transforms.
pub fn optimize(code: IrCode, level: OptLevel) -> IrCode {
    if level == OptLevel::O0 {
        return code;
    }

    let mut out = IrCode::with_capacity(code.len());
    for region in function_regions(code) {
        let mut region = peephole::run(region);
        if level >= OptLevel::O2 {
            region = cfg::eliminate_unreachable(region);
            region = dataflow::eliminate_redundant_computations(region);
            region = dataflow::eliminate_dead_by_liveness(region);
        }
        if level >= OptLevel::O3 {
            region = loops::run(region);
            region = peephole::copy_chain_window(region);
        }
        out.extend(region);
    }
    out
}

/// Splits the flat stream into per-function regions; each `FUNCTION_BEGIN`
/// starts a new one. Anything before the first marker forms its own region.
fn function_regions(code: IrCode) -> Vec<IrCode> {
    let mut regions: Vec<IrCode> = Vec::new();
    for instr in code {
        if instr.op == OpCode::FunctionBegin || regions.is_empty() {
            regions.push(IrCode::new());
        }
        regions.last_mut().expect("region exists").push(instr);
    }
    regions
}

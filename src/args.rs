use clap::Parser;
use std::path::PathBuf;

/// C-- compiler targeting x86_64.
#[derive(Debug, Parser)]
#[command(name = "cmmc", version, about = "C-- compiler targeting x86_64")]
pub struct Args {
    /// Source file to compile
    pub input: PathBuf,

    /// Optimization level (0-3)
    #[arg(
        short = 'O',
        value_name = "LEVEL",
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=3)
    )]
    pub opt_level: u8,

    /// Request debug-info emission
    #[arg(short = 'g')]
    pub debug_info: bool,

    /// Report stage timings and progress
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Stop after assembly generation; do not assemble or link
    #[arg(short = 'S')]
    pub no_assemble: bool,

    /// Stop after assembling; do not link
    #[arg(short = 'c')]
    pub no_link: bool,

    /// Output path (defaults to the input stem)
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Narrate pipeline stages on stdout
    #[arg(long)]
    pub print_stages: bool,

    /// Dump IR after generation
    #[arg(long)]
    pub print_ir: bool,

    /// Dump the control-flow graph
    #[arg(long)]
    pub print_cfg: bool,

    /// Dump the generated assembly
    #[arg(long)]
    pub print_asm: bool,

    /// Preserve temporary files
    #[arg(long)]
    pub keep_intermediate: bool,
}

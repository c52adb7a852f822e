use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use log::warn;
use structopt::StructOpt;
use thumbjit_core::error::EncodeError;
use thumbjit_core::state::Encoder;

/// Assembles a Thumb-2 action list into machine code.
///
/// The action list is a little-endian stream of 16-bit half-words, as produced by
/// `ActionListBuilder` or any other tool that emits the `ESCAPE`-tagged action format
/// `thumbjit-core` consumes.
#[derive(StructOpt)]
#[structopt(name = "thumbjit")]
struct Opt {
    /// Path to the action-list file.
    action_list: PathBuf,

    /// Integer arguments the action list's RELPC/LABELPC/IMM*/IMMTHUMB actions consume, in
    /// order.
    #[structopt(long)]
    arg: Vec<i32>,

    /// Number of sections the action list addresses via the SECTION action.
    #[structopt(long, default_value = "1")]
    sections: u8,

    /// Where to write the assembled machine code. Defaults to stdout.
    #[structopt(long, short)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Opt::from_args()) {
        eprintln!("thumbjit: {e}");
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
    let raw = fs::read(&opt.action_list)?;
    let action_list = halfwords_from_le_bytes(&raw)?;

    let mut enc = Encoder::new(opt.sections.max(1));
    enc.setup(&action_list);
    enc.put(0, &opt.arg).map_err(report)?;
    let codesize = enc.link().map_err(report)?;

    let mut dest = vec![0u16; codesize / 2];
    enc.encode(&mut dest).map_err(report)?;

    let out_bytes: Vec<u8> = dest.iter().flat_map(|h| h.to_le_bytes()).collect();
    match opt.output {
        Some(path) => fs::write(path, out_bytes)?,
        None => io::stdout().write_all(&out_bytes)?,
    }
    Ok(())
}

fn report(e: EncodeError) -> EncodeError {
    warn!("{e}");
    e
}

fn halfwords_from_le_bytes(raw: &[u8]) -> Result<Vec<u16>, Box<dyn Error>> {
    if raw.len() % 2 != 0 {
        return Err("action-list file has an odd number of bytes".into());
    }
    Ok(raw.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect())
}

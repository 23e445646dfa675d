//! Command-line front-end for the Herbrand equivalence analysis.
//!
//! Run with: `cargo run --bin herbrand -- program.txt`
//!
//! Reads a program in the textual mini-language, prints the parsed program
//! and its normalised CFG, runs the analysis to its fixed point, and prints
//! the initial partition plus the final partition at every CFG node.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use herbrand_rs::analysis::Analysis;
use herbrand_rs::cfg::Cfg;
use herbrand_rs::display::cfg_listing;
use herbrand_rs::parser::parse_program;

#[derive(Parser)]
#[command(name = "herbrand")]
#[command(about = "Herbrand equivalence analysis over a textual program")]
struct Args {
    /// Program file in the textual mini-language
    input: PathBuf,

    /// Print the CFG as Graphviz dot and exit
    #[arg(long)]
    dot: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let level = match args.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let text = std::fs::read_to_string(&args.input)
        .wrap_err_with(|| format!("reading {}", args.input.display()))?;
    let program = parse_program(&text)
        .wrap_err_with(|| format!("parsing {}", args.input.display()))?;

    if args.dot {
        let cfg = Cfg::build(&program);
        print!("{}", cfg.to_dot(&program)?);
        return Ok(());
    }

    println!("{}", program.listing());

    let mut analysis = Analysis::new(&program);
    println!("{}", cfg_listing(analysis.cfg(), &program));

    let iterations = analysis.run();
    log::info!("fixed point after {} iterations", iterations);

    print!("{}", analysis.report());
    Ok(())
}

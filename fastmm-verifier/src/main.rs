use anyhow::{anyhow, Result};
use clap::{arg, Command};
use fastmm_core::verify::{verify_alpha, verify_mu, verify_omega};
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("fastmm-verifier")
        .about("Verifies claimed matrix multiplication exponent bounds")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("verify_omega")
                .about("Verifies a claimed bound omega(1, 1, K) <= value")
                .arg(arg!(<Q> "Base tensor parameter q").value_parser(clap::value_parser!(f64)))
                .arg(arg!(<K> "Rectangular parameter K").value_parser(clap::value_parser!(f64)))
                .arg(
                    arg!(<PARAMS> "Path to the saved parameter file")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("verify_alpha")
                .about("Verifies a claimed bound alpha >= value")
                .arg(arg!(<Q> "Base tensor parameter q").value_parser(clap::value_parser!(f64)))
                .arg(
                    arg!(<PARAMS> "Path to the saved parameter file")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("verify_mu")
                .about("Verifies a claimed bound mu <= value")
                .arg(arg!(<Q> "Base tensor parameter q").value_parser(clap::value_parser!(f64)))
                .arg(
                    arg!(<PARAMS> "Path to the saved parameter file")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    if let Err(e) = match matches.subcommand() {
        Some(("verify_omega", sub_m)) => verify_omega(
            *sub_m.get_one::<f64>("Q").unwrap(),
            *sub_m.get_one::<f64>("K").unwrap(),
            sub_m.get_one::<PathBuf>("PARAMS").unwrap(),
        )
        .map(|_| ()),
        Some(("verify_alpha", sub_m)) => verify_alpha(
            *sub_m.get_one::<f64>("Q").unwrap(),
            sub_m.get_one::<PathBuf>("PARAMS").unwrap(),
        )
        .map(|_| ()),
        Some(("verify_mu", sub_m)) => verify_mu(
            *sub_m.get_one::<f64>("Q").unwrap(),
            sub_m.get_one::<PathBuf>("PARAMS").unwrap(),
        )
        .map(|_| ()),
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: package base directory
fn dir_arg() -> Arg {
    Arg::new("dir")
        .short('d')
        .long("dir")
        .value_name("BASEDIR")
        .required(true)
        .help("Path to the package base directory")
}

fn build_cli() -> Command {
    Command::new("neopkg")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Neo Package Project")
        .about("Package manager for the neo server ecosystem")
        .subcommand_required(false)
        .subcommand(
            Command::new("search")
                .about("Search package info")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(dir_arg())
                .arg(
                    Arg::new("experimental")
                        .long("experimental")
                        .action(clap::ArgAction::SetTrue)
                        .help("Include alpha releases in results"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Update the package rosters and report upgradable packages")
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("install")
                .about("Install packages")
                .arg(Arg::new("packages").required(true).num_args(1..).help("Package names"))
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Uninstall a package")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("audit")
                .about("Audit a package descriptor")
                .arg(Arg::new("descriptor").required(true).help("Path to package.yml")),
        )
        .subcommand(
            Command::new("plan")
                .about("Audit packages and emit their build matrix")
                .arg(Arg::new("packages").required(true).num_args(1..).help("Package names")),
        )
        .subcommand(
            Command::new("build")
                .about("Build a package's release archive")
                .arg(Arg::new("descriptor").required(true).help("Path to package.yml"))
                .arg(
                    Arg::new("version")
                        .long("version")
                        .help("Specific release tag to build (defaults to the latest)"),
                )
                .arg(
                    Arg::new("dest")
                        .long("dest")
                        .default_value("./tmp")
                        .help("Working directory for the build"),
                ),
        )
        .subcommand(
            Command::new("rebuild-plan")
                .about("Refresh caches, probe availability and plan unavailable packages")
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("rebuild-cache")
                .about("Refresh caches and availability, then push them to the catalog")
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("neopkg.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}

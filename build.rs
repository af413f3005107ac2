//! Build script for generating the `metal-provider` man pages.
//!
//! Packaging picks up `metal-provider.1` plus one page per subcommand
//! (`metal-provider-create.1`, ...) from the build output directory.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render_page(command: Command, out_dir: &Path, file_name: &str) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    File::create(out_dir.join(file_name))?.write_all(&buffer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
    })?);

    let command = Cli::command();
    let root = command.get_name().to_owned();
    for subcommand in command.get_subcommands() {
        let page_name = format!("{root}-{}", subcommand.get_name());
        render_page(
            subcommand.clone().name(page_name.clone()),
            &out_dir,
            &format!("{page_name}.1"),
        )?;
    }
    render_page(command, &out_dir, &format!("{root}.1"))?;

    Ok(())
}

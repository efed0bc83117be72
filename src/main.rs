use anyhow::{bail, Result};
use std::path::PathBuf;

const USAGE: &str = "usage:
  formedit edit <settings-dir> [plugin]
  formedit rename <root> <path>

env:
  FORMEDIT_CONFIG    config file (default <dir>/formedit.yaml)
  FORMEDIT_LOG       log filter, e.g. debug or formedit=trace
  FORMEDIT_HEADLESS  1 to draw off-screen and print a JSON summary
  FORMEDIT_TICKS     frames to draw in headless mode";

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["edit", dir] => formedit::ui::run_edit(PathBuf::from(dir), None),
        ["edit", dir, plugin] => formedit::ui::run_edit(PathBuf::from(dir), Some(plugin.to_string())),
        ["rename", root, path] => formedit::ui::run_rename(PathBuf::from(root), path.to_string()),
        ["-h" | "--help" | "help"] => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!("{USAGE}"),
    }
}

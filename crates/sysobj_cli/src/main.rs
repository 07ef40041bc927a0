/* 📖 # Why is the CLI a fixed demo?

The `sysobj` binary exists to show the handle lifecycle end to end on a real directory.
It takes no arguments:

1. Reads `sysobj.toml` from the current directory if present, defaults otherwise
2. Designates the current directory as root
3. Recreates `arg/` in OVERWRITE mode and adds `hello.txt` and `world.txt`
4. Prints the indexed children of `arg/` and how many entries were created

Exit codes:
- 0: Success
- 1: Any handle or configuration error
*/

use std::env;
use std::path::Path;
use std::process;

use sysobj_base::tracing::init_tracing;
use sysobj_base::{PalHandle, RealPal, SysobjResult, WriteMode};
use sysobj_engine::{
    CreationMode, EngineConfig, Entry, FsContext, FsObject, HandleOptions, load_config,
};
use tracing::info;

const CONFIG_FILE: &str = "sysobj.toml";

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let current_dir = env::current_dir().unwrap_or_else(|e| {
        eprintln!("Error: Failed to get current directory: {}", e);
        process::exit(1);
    });

    let pal = PalHandle::new(RealPal::new(current_dir.clone()));

    let config = match read_config(&pal) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config from {}: {}", CONFIG_FILE, e);
            process::exit(1);
        }
    };

    let ctx = FsContext::with_config(pal, config);
    if let Err(e) = run(&ctx, &current_dir) {
        eprintln!("Error: {:?}", e);
        process::exit(1);
    }
}

fn read_config(pal: &PalHandle) -> SysobjResult<EngineConfig> {
    let path = Path::new(CONFIG_FILE);
    if pal.path_exists(path)? {
        info!(path = CONFIG_FILE, "loading configuration");
        load_config(pal, path)
    } else {
        Ok(EngineConfig::default())
    }
}

fn run(ctx: &FsContext, current_dir: &Path) -> SysobjResult<()> {
    let root = ctx.designate_root(current_dir)?;
    println!("Root: {}", root.path().display());

    let arg = root.make_subdirectory("arg", HandleOptions::new(CreationMode::Overwrite))?;
    let hello = arg.make_file("hello.txt", CreationMode::Create)?;
    hello.write("hello\n", WriteMode::Truncate)?;
    let world = arg.make_file("world.txt", CreationMode::Create)?;
    world.write("world\n", WriteMode::Truncate)?;

    println!("Children of {}:", arg.path().display());
    for (name, entry) in arg.children()?.iter() {
        let kind = match entry {
            Entry::File(_) => "file",
            Entry::Directory(_) => "directory",
        };
        println!("  {} ({})", name, kind);
    }
    println!("Entries created: {}", ctx.creation_log().count());
    Ok(())
}

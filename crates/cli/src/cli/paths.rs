use anyhow::Result;
use pic2acg_core::paths::Paths;

pub fn run(paths: &Paths) -> Result<()> {
    println!("Files directory: {}", paths.files_dir.display());
    println!("  Config: {}", paths.config_file().display());
    println!("  Pointer: {}", paths.pointer_file().display());

    match std::fs::read_to_string(paths.pointer_file()) {
        Ok(root) => println!("Data root: {}", root.trim()),
        Err(_) => println!("Data root: {} (default)", paths.files_dir.display()),
    }
    Ok(())
}

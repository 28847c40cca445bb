use std::path::Path;

/// Whether `program` resolves to a file, either as a path or through `PATH`.
pub fn command_exists(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }

    let as_path = Path::new(program);
    if as_path.components().count() > 1 {
        return as_path.is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let full = dir.join(program);
                let exe = full.with_extension(std::env::consts::EXE_EXTENSION);
                full.is_file() || (cfg!(windows) && exe.is_file())
            })
        })
        .unwrap_or(false)
}

//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `checkup_core` linkage and
//!   schema bootstrap.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("checkup_core version={}", checkup_core::core_version());

    match checkup_core::db::open_db_in_memory() {
        Ok(conn) => {
            drop(conn);
            println!(
                "schema_version={}",
                checkup_core::db::migrations::latest_version()
            );
        }
        Err(err) => {
            eprintln!("db bootstrap failed: {err}");
            std::process::exit(1);
        }
    }
}

use crate::cli::{current_dir, load_settings};
use crate::error::Result;
use crate::trust::{TrustLevel, TrustStore};
use crate::workspace::paths::{home_dir, normalize};

fn open_store() -> Result<TrustStore> {
    let settings = load_settings()?;
    Ok(TrustStore::open(settings.trust_file()))
}

/// Record a trust level for a path.
pub async fn run_set(path: &str, level: TrustLevel) -> Result<()> {
    let path = normalize(path, &current_dir(), home_dir().as_deref());
    open_store()?.set(&path, level)?;
    eprintln!("gatehouse: {} is now {}", path.display(), level);
    Ok(())
}

/// Remove the trust record for a path.
pub async fn run_unset(path: &str) -> Result<()> {
    let path = normalize(path, &current_dir(), home_dir().as_deref());
    if open_store()?.unset(&path)? {
        eprintln!("gatehouse: removed trust record for {}", path.display());
    } else {
        eprintln!("gatehouse: no trust record for {}", path.display());
    }
    Ok(())
}

/// List every trust record.
pub async fn run_list() -> Result<()> {
    let rules = open_store()?.load_rules()?;
    if rules.is_empty() {
        println!("No trusted folders recorded.");
        return Ok(());
    }
    for (path, level) in rules.iter() {
        println!("{:<14} {}", level.to_string(), path.display());
    }
    Ok(())
}

/// Classify paths against the trust store.
pub async fn run_check(paths: &[String]) -> Result<()> {
    let rules = open_store()?.load_rules()?;
    let cwd = current_dir();
    let home = home_dir();
    for raw in paths {
        let path = normalize(raw, &cwd, home.as_deref());
        println!("{:<10} {}", rules.classify(&path).to_string(), path.display());
    }
    Ok(())
}

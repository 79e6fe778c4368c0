use std::path::PathBuf;

use colored::Colorize;

use crate::db::open_data_dir;
use crate::error::Result;
use crate::registry::{BankRegistry, DEFAULT_REGISTRY};
use crate::settings::{load_settings, save_settings, shellexpand_path, REGISTRY_FILE};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    save_settings(&settings)?;

    let registry_path = resolved.join(REGISTRY_FILE);
    if registry_path.exists() {
        BankRegistry::load(&registry_path)?;
        println!("Keeping existing bank registry {}", registry_path.display());
    } else {
        std::fs::write(&registry_path, DEFAULT_REGISTRY)?;
        println!("Wrote default bank registry {}", registry_path.display());
    }

    open_data_dir(&resolved)?;

    println!("{} mailtally at {}", "Initialized".green(), resolved.display());
    Ok(())
}

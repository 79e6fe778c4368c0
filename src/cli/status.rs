use crate::db::{count_rows, get_connection, init_db};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();
    let registry_path = settings.registry_file();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    if registry_path.exists() {
        println!("Registry:   {}", registry_path.display());
    } else {
        println!("Registry:   (built-in)");
    }
    let registry = settings.load_registry()?;
    println!("Banks:      {}", registry.banks().len());

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        init_db(&conn)?;
        println!();
        println!("Transactions:  {}", count_rows(&conn, "transactions")?);
        println!("Tags:          {}", count_rows(&conn, "tags")?);
        println!("Rules:         {}", count_rows(&conn, "keyword_rules")?);
        println!("Imports:       {}", count_rows(&conn, "imports")?);
    } else {
        println!();
        println!("Database not found. Run `mailtally init` to set up.");
    }

    Ok(())
}

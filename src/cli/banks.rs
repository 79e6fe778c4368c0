use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::registry::Field;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let registry = settings.load_registry()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Sender", "Card type", "Keywords", "Excludes", "Patterns"]);
    for bank in registry.banks() {
        let kinds = |field: Field| {
            bank.rules_for(field)
                .map(|r| r.kind.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let patterns = format!(
            "amount: {}\ndescription: {}",
            kinds(Field::Amount),
            kinds(Field::Description)
        );
        table.add_row(vec![
            Cell::new(&bank.id),
            Cell::new(&bank.sender),
            Cell::new(&bank.card_type),
            Cell::new(bank.keywords.join(", ")),
            Cell::new(bank.exclude_keywords.join(", ")),
            Cell::new(patterns),
        ]);
    }
    println!("Banks ({})\n{table}", settings.registry_file().display());
    Ok(())
}

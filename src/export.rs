use std::io::Write;

use clap::ValueEnum;

use crate::error::Result;
use crate::models::StoredTransaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

const CSV_HEADER: [&str; 10] = [
    "id", "date", "time", "amount", "description", "card_type", "bank", "category", "tags", "created_at",
];

/// Write transactions as a pretty JSON array, tags included.
pub fn write_json<W: Write>(txns: &[StoredTransaction], mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, txns)?;
    writeln!(out)?;
    Ok(())
}

/// Write transactions as CSV with tags joined by `;`.
pub fn write_csv<W: Write>(txns: &[StoredTransaction], out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(CSV_HEADER)?;
    for t in txns {
        wtr.write_record([
            t.id.to_string(),
            t.date.clone(),
            t.time.clone().unwrap_or_default(),
            format!("{:.2}", t.amount),
            t.description.clone(),
            t.card_type.clone(),
            t.bank.clone(),
            t.category.clone(),
            t.tags.join(";"),
            t.created_at.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write<W: Write>(format: ExportFormat, txns: &[StoredTransaction], out: W) -> Result<()> {
    match format {
        ExportFormat::Json => write_json(txns, out),
        ExportFormat::Csv => write_csv(txns, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn() -> StoredTransaction {
        StoredTransaction {
            id: 7,
            amount: 30.07,
            description: "MAXI #8634".into(),
            card_type: "credit card".into(),
            date: "2025-02-04".into(),
            time: Some("19:10:00".into()),
            bank: "cibc_credit".into(),
            category: "Groceries".into(),
            tags: vec!["Food".into(), "Weekly".into()],
            created_at: "2025-02-04 19:11:00".into(),
        }
    }

    #[test]
    fn test_csv_export() {
        let mut buf = Vec::new();
        write(ExportFormat::Csv, &[txn()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,date,time,amount,description,card_type,bank,category,tags,created_at"
        );
        assert_eq!(
            lines.next().unwrap(),
            "7,2025-02-04,19:10:00,30.07,MAXI #8634,credit card,cibc_credit,Groceries,Food;Weekly,2025-02-04 19:11:00"
        );
    }

    #[test]
    fn test_json_export() {
        let mut buf = Vec::new();
        write(ExportFormat::Json, &[txn()], &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["description"], "MAXI #8634");
        assert_eq!(value[0]["tags"][1], "Weekly");
        assert_eq!(value[0]["amount"], 30.07);
    }
}

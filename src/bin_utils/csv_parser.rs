use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Account that exists on the sandbox ledger before any request runs.
#[derive(Debug, Deserialize)]
pub struct GenesisAccount {
    pub secret: String,
    pub balance: Decimal,
}

/// Parses genesis accounts in CSV format, one `secret,balance` row each.
pub struct CsvAccountParser<R> {
    iter: DeserializeRecordsIntoIter<R, GenesisAccount>,
}

impl<R> CsvAccountParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .comment(Some(b'#'))
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvAccountParser<R>
where
    R: Read,
{
    type Item = (u64, Result<GenesisAccount, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}

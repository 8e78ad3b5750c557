// Copyright (c) 2026 fieldserve
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

const DEFAULT_DB_URL: &str = "sqlite://database/fieldserve.db";
const DEFAULT_PORT: u16 = 4000;

/// Process-wide configuration, read from the environment once at startup
/// and immutable afterwards. Changing the rates and restarting does not
/// touch invoices that were already issued.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Billed per labor hour, in the operator's (single) currency.
    pub labor_rate: Decimal,
    /// Percentage applied to the invoice subtotal, e.g. 9 for 9%.
    pub tax_rate: Decimal,
    pub database_url: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            labor_rate: Decimal::from(80),
            tax_rate: Decimal::from(9),
            database_url: DEFAULT_DB_URL.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();

        let labor_rate = decimal_var("LABOR_RATE")?.unwrap_or(defaults.labor_rate);
        let tax_rate = decimal_var("TAX_RATE")?.unwrap_or(defaults.tax_rate);
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port number: {raw}"))?,
            Err(_) => defaults.port,
        };

        Ok(Settings {
            labor_rate,
            tax_rate,
            database_url,
            port,
        })
    }
}

fn decimal_var(name: &str) -> Result<Option<Decimal>> {
    match std::env::var(name) {
        Ok(raw) => {
            let value = Decimal::from_str(&raw)
                .with_context(|| format!("{name} is not a valid decimal: {raw}"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_rates() {
        let settings = Settings::default();
        assert_eq!(settings.labor_rate, Decimal::from(80));
        assert_eq!(settings.tax_rate, Decimal::from(9));
        assert_eq!(settings.port, 4000);
    }
}

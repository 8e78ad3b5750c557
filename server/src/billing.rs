// Copyright (c) 2026 fieldserve
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use common::{LineItem, MaterialItem};
use rust_decimal::{Decimal, RoundingStrategy};

const DECIMAL_PLACES: u32 = 2;

/// Subtotal, tax and total for one invoice. All three satisfy
/// `total = subtotal + tax_amount` by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Builds the billable lines for an approved report: the labor charge
/// first, then one line per material in the order the technician listed
/// them. Every line satisfies `amount = qty * unit_price`.
pub fn build_line_items(
    labor_hours: Decimal,
    labor_rate: Decimal,
    materials: &[MaterialItem],
) -> Vec<LineItem> {
    let mut items = Vec::with_capacity(materials.len() + 1);
    items.push(LineItem {
        description: "Labor charges".to_string(),
        qty: labor_hours,
        unit_price: labor_rate,
        amount: labor_hours * labor_rate,
    });
    for material in materials {
        items.push(LineItem {
            description: material.name.clone(),
            qty: material.qty,
            unit_price: material.unit_price,
            amount: material.qty * material.unit_price,
        });
    }
    items
}

/// Sums the line amounts and applies the tax rate (a percentage, e.g. 9
/// for 9%). The tax amount is rounded half-up to 2 decimal places;
/// subtotal and line amounts are kept exact.
pub fn totals(items: &[LineItem], tax_rate: Decimal) -> Totals {
    let subtotal: Decimal = items.iter().map(|item| item.amount).sum();
    let tax_amount = (subtotal * tax_rate / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    Totals {
        subtotal,
        tax_amount,
        total: subtotal + tax_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn material(name: &str, qty: &str, unit_price: &str) -> MaterialItem {
        MaterialItem {
            name: name.to_string(),
            qty: dec(qty),
            unit_price: dec(unit_price),
        }
    }

    #[test]
    fn test_labor_line_comes_first() {
        let items = build_line_items(dec("2"), dec("80"), &[material("Fuse box", "3", "10")]);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Labor charges");
        assert_eq!(items[0].qty, dec("2"));
        assert_eq!(items[0].unit_price, dec("80"));
        assert_eq!(items[0].amount, dec("160"));
        assert_eq!(items[1].description, "Fuse box");
        assert_eq!(items[1].amount, dec("30"));
    }

    #[test]
    fn test_materials_keep_their_order() {
        let materials = vec![
            material("Conduit", "1", "5"),
            material("Breaker", "2", "40"),
            material("Wire (m)", "12.5", "1.2"),
        ];
        let items = build_line_items(dec("1"), dec("80"), &materials);

        let descriptions: Vec<&str> =
            items.iter().map(|item| item.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec!["Labor charges", "Conduit", "Breaker", "Wire (m)"]
        );
        assert_eq!(items[3].amount, dec("15"));
    }

    #[test]
    fn test_reference_invoice_example() {
        // 2h at 80 plus 3 units at 10, taxed at 9%.
        let items = build_line_items(dec("2"), dec("80"), &[material("Sealant", "3", "10")]);
        let totals = totals(&items, dec("9"));

        assert_eq!(totals.subtotal, dec("190"));
        assert_eq!(totals.tax_amount, dec("17.10"));
        assert_eq!(totals.total, dec("207.10"));
    }

    #[test]
    fn test_zero_work_yields_zero_invoice() {
        let items = build_line_items(Decimal::ZERO, dec("80"), &[]);
        let totals = totals(&items, dec("9"));

        assert_eq!(items.len(), 1);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_tax_rounds_half_up_not_half_even() {
        // 0.25 * 10% = 0.025: half-even would give 0.02, half-up gives 0.03.
        let items = vec![LineItem {
            description: "Labor charges".to_string(),
            qty: dec("1"),
            unit_price: dec("0.25"),
            amount: dec("0.25"),
        }];
        let totals = totals(&items, dec("10"));

        assert_eq!(totals.tax_amount, dec("0.03"));
        assert_eq!(totals.total, dec("0.28"));
    }

    #[test]
    fn test_fractional_hours_stay_exact() {
        let items = build_line_items(dec("2.5"), dec("80"), &[]);
        let totals = totals(&items, dec("9"));

        assert_eq!(totals.subtotal, dec("200"));
        assert_eq!(totals.tax_amount, dec("18"));
        assert_eq!(totals.total, dec("218"));
    }
}

use chrono::NaiveDate;
use serde::Serialize;

use crate::{constants::SHOPPING_LIST_SUFFIX, schema::CartIngredient};

/// One summed line of a shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Sums amounts per (name, unit), keeping the order of first appearance.
pub fn aggregate(rows: &[CartIngredient]) -> Vec<ShoppingItem> {
    let mut items: Vec<ShoppingItem> = Vec::new();
    for row in rows {
        match items
            .iter_mut()
            .find(|item| item.name == row.name && item.measurement_unit == row.measurement_unit)
        {
            Some(item) => item.amount += i64::from(row.amount),
            None => items.push(ShoppingItem {
                name: row.name.to_owned(),
                measurement_unit: row.measurement_unit.to_owned(),
                amount: i64::from(row.amount),
            }),
        }
    }
    items
}

/// Upper-cases the first letter of every run of letters and lower-cases the rest.
pub fn title_case(line: &str) -> String {
    let mut result = String::with_capacity(line.len());
    let mut in_word = false;
    for c in line.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingList {
    pub owner: String,
    pub date: NaiveDate,
    pub items: Vec<ShoppingItem>,
}

impl ShoppingList {
    pub fn new(owner: String, date: NaiveDate, rows: &[CartIngredient]) -> Self {
        Self {
            owner,
            date,
            items: aggregate(rows),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Shopping list: {}", self.owner),
            format!("Date: {}", self.date.format("%Y-%m-%d")),
        ];
        lines.extend(self.items.iter().map(|item| {
            title_case(&format!(
                "-- {} -- ({}) -- {}",
                item.name, item.measurement_unit, item.amount
            ))
        }));
        lines
    }
}

pub fn filename(username: &str) -> String {
    format!("{username}{SHOPPING_LIST_SUFFIX}")
}

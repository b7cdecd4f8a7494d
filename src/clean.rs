use tracing::info;

use crate::models::{Cell, CleaningStats, Dataset};

/// Trims headers and text cells, turns blank text into `Missing` and drops
/// rows with no values at all. Rows are never deduplicated and never rejected
/// for a missing student number, so row counts stay comparable with the source.
pub fn clean_dataset(mut dataset: Dataset) -> (Dataset, CleaningStats) {
    let rows_raw = dataset.len();

    for header in dataset.columns.iter_mut() {
        *header = header.trim().to_string();
    }

    for column in 0..dataset.columns.len() {
        let is_text_column = dataset
            .rows
            .iter()
            .any(|row| row.get(column).is_some_and(Cell::is_text));
        if !is_text_column {
            continue;
        }
        for row in dataset.rows.iter_mut() {
            if let Some(cell) = row.get_mut(column) {
                *cell = clean_text_cell(cell);
            }
        }
    }

    dataset
        .rows
        .retain(|row| !row.iter().all(Cell::is_missing));
    let rows_after_drop_all_empty = dataset.len();

    let stats = CleaningStats {
        rows_raw,
        rows_after_drop_all_empty,
        dropped_missing_student_number: 0,
        dropped_duplicates_full_row: 0,
        rows_final: dataset.len(),
    };
    info!(
        rows_raw = stats.rows_raw,
        rows_final = stats.rows_final,
        "cleaned dataset"
    );
    (dataset, stats)
}

fn clean_text_cell(cell: &Cell) -> Cell {
    match cell.text() {
        Some(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Cell::Missing
            } else {
                Cell::Text(trimmed.to_string())
            }
        }
        None => Cell::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    #[test]
    fn trims_headers_and_text_cells() {
        let dataset = Dataset::new(
            vec!["  Student Number ".into(), "Module\t".into()],
            vec![vec![Cell::Integer(1001), text("  CS101  ")]],
        );
        let (cleaned, stats) = clean_dataset(dataset);
        assert_eq!(cleaned.columns, vec!["Student Number", "Module"]);
        assert_eq!(cleaned.rows[0], vec![Cell::Integer(1001), text("CS101")]);
        assert_eq!(stats.rows_final, 1);
    }

    #[test]
    fn numbers_in_text_columns_become_text() {
        let dataset = Dataset::new(
            vec!["Week".into()],
            vec![vec![text("Week 1")], vec![Cell::Integer(2)], vec![Cell::Real(2.5)]],
        );
        let (cleaned, _) = clean_dataset(dataset);
        assert_eq!(cleaned.rows[1][0], text("2"));
        assert_eq!(cleaned.rows[2][0], text("2.5"));
    }

    #[test]
    fn numeric_columns_are_untouched() {
        let dataset = Dataset::new(
            vec!["Student Number".into()],
            vec![vec![Cell::Real(1001.0)], vec![Cell::Integer(7)]],
        );
        let (cleaned, _) = clean_dataset(dataset);
        assert_eq!(cleaned.rows[0][0], Cell::Real(1001.0));
    }

    #[test]
    fn drops_only_fully_empty_rows() {
        let dataset = Dataset::new(
            vec!["Student Number".into(), "Reason".into()],
            vec![
                vec![Cell::Missing, text("   ")],
                vec![Cell::Missing, text("absent")],
                vec![Cell::Integer(1), text("absent")],
                vec![Cell::Integer(1), text("absent")],
            ],
        );
        let (cleaned, stats) = clean_dataset(dataset);
        assert_eq!(
            stats,
            CleaningStats {
                rows_raw: 4,
                rows_after_drop_all_empty: 3,
                dropped_missing_student_number: 0,
                dropped_duplicates_full_row: 0,
                rows_final: 3,
            }
        );
        assert_eq!(cleaned.len(), 3);
    }

    fn arb_cell() -> impl Strategy<Value = Cell> {
        prop_oneof![
            Just(Cell::Missing),
            any::<i32>().prop_map(|value| Cell::Integer(value.into())),
            "[ a-z]{0,4}".prop_map(Cell::Text),
        ]
    }

    proptest! {
        #[test]
        fn row_counts_never_grow(rows in proptest::collection::vec(proptest::collection::vec(arb_cell(), 3), 0..20)) {
            let raw = Dataset::new(vec!["a".into(), "b".into(), "c".into()], rows);
            let (cleaned, _) = clean_dataset(raw.clone());
            let blank_rows = cleaned_blank_count(&raw);
            let (_, stats) = clean_dataset(raw);
            prop_assert!(stats.rows_final <= stats.rows_after_drop_all_empty);
            prop_assert!(stats.rows_after_drop_all_empty <= stats.rows_raw);
            prop_assert_eq!(stats.rows_after_drop_all_empty, stats.rows_raw - blank_rows);
            prop_assert_eq!(cleaned.len(), stats.rows_final);
        }
    }

    fn cleaned_blank_count(raw: &Dataset) -> usize {
        raw.rows
            .iter()
            .filter(|row| {
                row.iter().all(|cell| match cell {
                    Cell::Text(value) => value.trim().is_empty(),
                    other => other.is_missing(),
                })
            })
            .count()
    }
}

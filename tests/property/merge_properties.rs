//! Merge completeness: every input row survives the join exactly once, in order.

use ddxgen::generation::{merge_results, GenerationResult};
use ddxgen::store::{CaseId, CheckpointTable, Dataset, INDEX_COLUMN};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn dataset(texts: &[String]) -> Dataset {
    Dataset::from_rows(
        vec!["case_description".to_string(), "site".to_string()],
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| vec![text.clone(), format!("site-{}", i % 3)])
            .collect(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn test_merge_keeps_every_row_in_order(
        texts in prop::collection::vec("[a-z ]{0,12}", 0..25),
        succeeded in prop::collection::btree_set(0u64..40, 0..25),
    ) {
        let data = dataset(&texts);
        let mut table = CheckpointTable::empty(INDEX_COLUMN);
        for id in &succeeded {
            table.insert(
                CaseId(*id),
                GenerationResult::new()
                    .with_field("first_diagnosis", format!("dx-{}", id))
                    .with_field("rationale", "r"),
            );
        }

        let renames = [("first_diagnosis", "openai_first_diagnosis"), ("rationale", "openai_rationale")];
        let merged = merge_results(&data, &table, &renames);

        prop_assert_eq!(merged.len(), texts.len());
        prop_assert_eq!(&merged.columns[..2], data.columns());
        if !succeeded.is_empty() {
            prop_assert_eq!(merged.columns.len(), 4);
        }

        let in_range: BTreeSet<u64> = succeeded
            .iter()
            .copied()
            .filter(|id| (*id as usize) < texts.len())
            .collect();
        let mut empty_rows = 0;
        for (i, row) in merged.rows.iter().enumerate() {
            prop_assert_eq!(&row[0], &texts[i]);
            prop_assert_eq!(row.len(), merged.columns.len());
            if in_range.contains(&(i as u64)) {
                prop_assert_eq!(&row[2], &format!("dx-{}", i));
            } else if row.len() > 2 {
                prop_assert!(row[2..].iter().all(String::is_empty));
                empty_rows += 1;
            }
        }
        if !succeeded.is_empty() {
            prop_assert_eq!(empty_rows, texts.len() - in_range.len());
        }
        prop_assert!(merged.column_index(INDEX_COLUMN).is_none());
    }
}

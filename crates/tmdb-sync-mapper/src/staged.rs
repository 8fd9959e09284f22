/// One table's worth of mapped rows, ready to be handed to the bulk
/// loader. `parent_fk_column` is `None` for a kind's root table (loaded
/// with an upsert) and `Some(column)` for a child table scoped to the
/// batch's parent ids (loaded with delete-then-insert).
pub struct StagedTable {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub conflict_key: &'static [&'static str],
    pub update_columns: &'static [&'static str],
    pub parent_fk_column: Option<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl StagedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

//! Record accumulation state and emitted rows

/// Values accumulated for the current record, one slot per column
///
/// Every slot starts as an empty string; a column never found in the source
/// is emitted empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTemplate {
    values: Vec<String>,
}

impl RecordTemplate {
    pub fn new(columns: usize) -> Self {
        Self {
            values: vec![String::new(); columns],
        }
    }

    pub fn set(&mut self, column: usize, value: &str) {
        if let Some(slot) = self.values.get_mut(column) {
            slot.clear();
            slot.push_str(value);
        }
    }

    pub fn get(&self, column: usize) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Move the accumulated values out as a row, leaving every slot empty
    pub fn take_row(&mut self) -> Row {
        let columns = self.values.len();
        Row {
            values: std::mem::replace(&mut self.values, vec![String::new(); columns]),
        }
    }
}

/// One completed record, owned by whoever receives it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<String>,
}

impl Row {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, column: usize) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

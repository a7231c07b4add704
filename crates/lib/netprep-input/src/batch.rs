use arrow::array::{Float64Array, RecordBatch, StringArray, UInt64Array};

pub fn read_u64_column(column_name: &str, record_batch: &RecordBatch) -> Vec<u64> {
    let array = match record_batch.column_by_name(column_name) {
        Some(array) => array,
        None => panic!("Column {} is missing in the input table", column_name),
    };
    array
        .as_any()
        .downcast_ref::<UInt64Array>()
        .unwrap_or_else(|| panic!("Column {} is not a u64 column", column_name))
        .values()
        .to_vec()
}

pub fn read_f64_column(column_name: &str, record_batch: &RecordBatch) -> Vec<f64> {
    let array = match record_batch.column_by_name(column_name) {
        Some(array) => array,
        None => panic!("Column {} is missing in the input table", column_name),
    };
    array
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap_or_else(|| panic!("Column {} is not a f64 column", column_name))
        .values()
        .to_vec()
}

pub fn read_string_column(column_name: &str, record_batch: &RecordBatch) -> Vec<String> {
    let array = match record_batch.column_by_name(column_name) {
        Some(array) => array,
        None => panic!("Column {} is missing in the input table", column_name),
    };
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap_or_else(|| panic!("Column {} is not a string column", column_name))
        .iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect()
}

use super::*;
use std::path::Path;

impl DataFrame {
	/// Write the dataframe to a csv file with a header row. Missing values are written as empty fields.
	pub fn to_path(&self, path: &Path) -> Result<(), DataFrameError> {
		let mut writer = csv::Writer::from_path(path)?;
		self.to_csv(&mut writer)?;
		writer.flush()?;
		Ok(())
	}

	pub fn to_csv<W>(&self, writer: &mut csv::Writer<W>) -> Result<(), DataFrameError>
	where
		W: std::io::Write,
	{
		writer.write_record(self.columns.iter().map(|column| column.name()))?;
		let mut record: Vec<String> = vec![String::new(); self.ncols()];
		for row in 0..self.nrows() {
			for (field, column) in record.iter_mut().zip(self.columns.iter()) {
				field.clear();
				match column {
					Column::Number(column) => {
						let value = column.data[row];
						if value.is_finite() {
							field.push_str(&value.to_string());
						}
					}
					Column::Categorical(column) => {
						if let Some(label) = column.value(row) {
							field.push_str(label);
						}
					}
				}
			}
			writer.write_record(record.iter())?;
		}
		Ok(())
	}
}

#[test]
fn test_write_then_load() {
	let dataframe = DataFrame::from_columns(vec![
		Column::Number(NumberColumn::new(
			"tissue_lung".to_owned(),
			vec![1.0, 0.0, f64::NAN],
		)),
		Column::Categorical(CategoricalColumn::from_labels(
			"drug".to_owned(),
			vec![Some("Erlotinib"), None, Some("Nilotinib")],
		)),
	])
	.unwrap();
	let mut writer = csv::Writer::from_writer(Vec::new());
	dataframe.to_csv(&mut writer).unwrap();
	let bytes = writer.into_inner().map_err(|_| ()).unwrap();
	let text = String::from_utf8(bytes.clone()).unwrap();
	assert_eq!(text, "tissue_lung,drug\n1,Erlotinib\n0,\n,Nilotinib\n");
	let loaded = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(bytes)),
		FromCsvOptions::default(),
	)
	.unwrap();
	let drug = loaded.column("drug").unwrap().as_categorical().unwrap();
	assert_eq!(
		drug.iter().collect::<Vec<_>>(),
		vec![Some("Erlotinib"), None, Some("Nilotinib")]
	);
}

/*!
This module renders rows of strings as a plain text table, used to print ranked results to the terminal.
*/

/// A `Table` has a header row and any number of value rows. Every row is padded out to the width of the widest value in its column.
#[derive(Debug, Clone)]
pub struct Table {
	padding: usize,
	header: Vec<String>,
	rows: Vec<Vec<String>>,
}

impl Table {
	pub fn new<I, S>(header: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			padding: 1,
			header: header.into_iter().map(Into::into).collect(),
			rows: Vec::new(),
		}
	}

	pub fn with_padding(mut self, padding: usize) -> Self {
		self.padding = padding;
		self
	}

	/// Append a row. Rows shorter than the header are filled with empty cells and extra cells are ignored.
	pub fn push_row<I, S>(&mut self, row: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut row: Vec<String> = row.into_iter().map(Into::into).collect();
		row.resize(self.header.len(), String::new());
		self.rows.push(row);
	}

	pub fn n_rows(&self) -> usize {
		self.rows.len()
	}

	fn column_widths(&self) -> Vec<usize> {
		let mut column_widths: Vec<usize> = self
			.header
			.iter()
			.map(|value| value.chars().count())
			.collect();
		for row in self.rows.iter() {
			for (column_width, value) in column_widths.iter_mut().zip(row.iter()) {
				*column_width = usize::max(*column_width, value.chars().count());
			}
		}
		column_widths
	}
}

impl std::fmt::Display for Table {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let column_widths = self.column_widths();
		let line = Line {
			column_widths: &column_widths,
			padding: self.padding,
		};
		let header = Row {
			column_widths: &column_widths,
			padding: self.padding,
			values: &self.header,
		};
		writeln!(f, "{}", header)?;
		writeln!(f, "{}", line)?;
		for values in self.rows.iter() {
			let row = Row {
				column_widths: &column_widths,
				padding: self.padding,
				values,
			};
			writeln!(f, "{}", row)?;
		}
		Ok(())
	}
}

struct Line<'a> {
	column_widths: &'a [usize],
	padding: usize,
}

impl<'a> std::fmt::Display for Line<'a> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "|")?;
		for column_width in self.column_widths.iter() {
			write!(f, "{}|", "-".repeat(column_width + 2 * self.padding))?;
		}
		Ok(())
	}
}

struct Row<'a> {
	column_widths: &'a [usize],
	padding: usize,
	values: &'a [String],
}

impl<'a> std::fmt::Display for Row<'a> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let padding = " ".repeat(self.padding);
		write!(f, "|")?;
		for (column_width, value) in self.column_widths.iter().zip(self.values) {
			let fill = column_width - value.chars().count();
			write!(f, "{}{}{}{}|", padding, value, " ".repeat(fill), padding)?;
		}
		Ok(())
	}
}

#[test]
fn test_table() {
	let mut table = Table::new(vec!["strategy", "rmse"]);
	table.push_row(vec!["all_one_hot", "1.25"]);
	table.push_row(vec!["one_hot_target"]);
	assert_eq!(table.n_rows(), 2);
	let expected = "\
| strategy       | rmse |
|----------------|------|
| all_one_hot    | 1.25 |
| one_hot_target |      |
";
	assert_eq!(table.to_string(), expected);
}

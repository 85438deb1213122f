use pad::{Alignment, PadStr};

/// A bordered text table for terminal listings.
pub struct Table {
    titles: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(titles: &[&str]) -> Self {
        Self {
            titles: titles.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows shorter than the title row are filled with empty cells, longer
    /// ones are cut.
    pub fn add(&mut self, mut row: Vec<String>) {
        row.resize(self.titles.len(), String::new());
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let widths: Vec<usize> = (0..self.titles.len())
            .map(|col| {
                std::iter::once(&self.titles)
                    .chain(self.rows.iter())
                    .map(|row| console::measure_text_width(&row[col]))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut split = String::from("+");
        for width in widths.iter() {
            split.push_str(&"-".repeat(width + 2));
            split.push('+');
        }

        let mut out = String::new();
        out.push_str(&split);
        out.push('\n');
        Self::render_row(&mut out, &self.titles, &widths);
        out.push_str(&split);
        out.push('\n');
        for row in self.rows.iter() {
            Self::render_row(&mut out, row, &widths);
        }
        out.push_str(&split);
        out
    }

    pub fn show(&self) {
        println!("{}", self.render());
    }

    fn render_row(out: &mut String, row: &[String], widths: &[usize]) {
        out.push('|');
        for (cell, width) in row.iter().zip(widths) {
            out.push(' ');
            out.push_str(&cell.pad_to_width_with_alignment(*width, Alignment::Left));
            out.push_str(" |");
        }
        out.push('\n');
    }
}

/// Renders fixed-width test data: each value is padded to its declared
/// field width, rows are joined with the configured separator.
pub struct FwfFactory {
    widths: Vec<u32>,
    rows: Vec<Vec<String>>,
    separator: String,
    right_align: bool,
    trailing_separator: bool,
}

impl FwfFactory {
    pub fn new(widths: &[u32]) -> Self {
        Self {
            widths: widths.to_vec(),
            rows: Vec::new(),
            separator: "\n".to_string(),
            right_align: false,
            trailing_separator: true,
        }
    }

    /// Adds one row; each value must fit its field width.
    pub fn row(mut self, values: &[&str]) -> Self {
        assert_eq!(
            values.len(),
            self.widths.len(),
            "row arity does not match field widths"
        );
        self.rows
            .push(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn rows(mut self, rows: &[&[&str]]) -> Self {
        for values in rows {
            self = self.row(values);
        }
        self
    }

    /// Right-justify values inside their fields (numeric convention).
    pub fn right_aligned(mut self) -> Self {
        self.right_align = true;
        self
    }

    pub fn separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    /// Leave the last row unterminated.
    pub fn without_trailing_separator(mut self) -> Self {
        self.trailing_separator = false;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, row) in self.rows.iter().enumerate() {
            for (value, &width) in row.iter().zip(self.widths.iter()) {
                let width = width as usize;
                assert!(
                    value.len() <= width,
                    "value '{value}' wider than field width {width}"
                );
                if self.right_align {
                    for _ in value.len()..width {
                        out.push(' ');
                    }
                    out.push_str(value);
                } else {
                    out.push_str(value);
                    for _ in value.len()..width {
                        out.push(' ');
                    }
                }
            }
            if self.trailing_separator || index + 1 < self.rows.len() {
                out.push_str(&self.separator);
            }
        }
        out
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.render().into_bytes()
    }
}

use ratatui::style::{Color, Modifier, Style};

pub struct Theme {
    // Background colors
    pub bg_primary: Color,
    pub bg_secondary: Color,
    pub bg_tertiary: Color,
    pub bg_selected: Color,

    // Text colors
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_muted: Color,
    pub text_accent: Color,

    // Status colors
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,

    // Syntax highlighting
    pub syntax_keyword: Color,
    pub syntax_string: Color,
    pub syntax_number: Color,
    pub syntax_comment: Color,
    pub syntax_function: Color,
    pub syntax_operator: Color,
    pub syntax_type: Color,

    // UI elements
    pub border: Color,
    pub border_focused: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            // Panels
            bg_primary: Color::Rgb(24, 26, 33),
            bg_secondary: Color::Rgb(30, 33, 43),
            bg_tertiary: Color::Rgb(40, 44, 57),
            bg_selected: Color::Rgb(50, 56, 74),

            // Text colors
            text_primary: Color::Rgb(230, 233, 240),
            text_secondary: Color::Rgb(180, 185, 200),
            text_muted: Color::Rgb(120, 125, 145),
            text_accent: Color::Rgb(100, 180, 255),

            // Status colors
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 190, 80),
            error: Color::Rgb(255, 100, 100),
            info: Color::Rgb(100, 180, 255),

            // Syntax highlighting
            syntax_keyword: Color::Rgb(198, 120, 221), // Purple
            syntax_string: Color::Rgb(152, 195, 121),  // Green
            syntax_number: Color::Rgb(209, 154, 102),  // Orange
            syntax_comment: Color::Rgb(92, 99, 112),   // Gray
            syntax_function: Color::Rgb(97, 175, 239), // Blue
            syntax_operator: Color::Rgb(86, 182, 194), // Cyan
            syntax_type: Color::Rgb(229, 192, 123),    // Yellow

            // UI elements
            border: Color::Rgb(60, 65, 80),
            border_focused: Color::Rgb(100, 180, 255),
        }
    }

    pub fn normal(&self) -> Style {
        Style::default().fg(self.text_primary).bg(self.bg_primary)
    }

    pub fn header(&self) -> Style {
        Style::default()
            .fg(self.text_primary)
            .bg(self.bg_secondary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected(&self) -> Style {
        Style::default().fg(self.text_primary).bg(self.bg_selected)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.text_muted)
    }

    pub fn border_style(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.border_focused)
        } else {
            Style::default().fg(self.border)
        }
    }

    pub fn status_success(&self) -> Style {
        Style::default().fg(self.success)
    }

    pub fn status_error(&self) -> Style {
        Style::default().fg(self.error)
    }
}

/// How a bare word in generated SQL is coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordClass {
    Keyword,
    Function,
    Type,
    Number,
    Plain,
}

/// Classify one word of a read-only query. Models answering questions emit
/// SELECTs, so only the vocabulary of those is recognised.
pub fn classify(word: &str) -> WordClass {
    if !word.is_empty() && word.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return WordClass::Number;
    }
    match word.to_ascii_uppercase().as_str() {
        "SELECT" | "DISTINCT" | "FROM" | "WHERE" | "AND" | "OR" | "NOT" | "IN" | "IS"
        | "NULL" | "LIKE" | "ILIKE" | "BETWEEN" | "EXISTS" | "CASE" | "WHEN" | "THEN"
        | "ELSE" | "END" | "JOIN" | "INNER" | "LEFT" | "RIGHT" | "FULL" | "OUTER"
        | "CROSS" | "ON" | "USING" | "GROUP" | "BY" | "HAVING" | "ORDER" | "ASC"
        | "DESC" | "NULLS" | "FIRST" | "LAST" | "LIMIT" | "OFFSET" | "WITH" | "AS"
        | "UNION" | "INTERSECT" | "EXCEPT" | "ALL" | "TRUE" | "FALSE" | "OVER"
        | "PARTITION" | "FILTER" | "INTERVAL" => WordClass::Keyword,
        "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" | "ROUND" | "COALESCE" | "NULLIF"
        | "CAST" | "EXTRACT" | "DATE_TRUNC" | "DATE_PART" | "TO_CHAR" | "LOWER"
        | "UPPER" | "LENGTH" | "CONCAT" | "STRING_AGG" | "ARRAY_AGG" | "ROW_NUMBER"
        | "RANK" | "DENSE_RANK" | "LAG" | "LEAD" | "NOW" => WordClass::Function,
        "INTEGER" | "INT" | "BIGINT" | "NUMERIC" | "DECIMAL" | "REAL" | "FLOAT"
        | "TEXT" | "VARCHAR" | "DATE" | "TIMESTAMP" | "BOOLEAN" => WordClass::Type,
        _ => WordClass::Plain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("select"), WordClass::Keyword);
        assert_eq!(classify("GROUP"), WordClass::Keyword);
        assert_eq!(classify("count"), WordClass::Function);
        assert_eq!(classify("numeric"), WordClass::Type);
        assert_eq!(classify("3.14"), WordClass::Number);
        assert_eq!(classify("Customer"), WordClass::Plain);
        // Statements a question never needs are not highlighted.
        assert_eq!(classify("DELETE"), WordClass::Plain);
    }
}
